use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use cyder_tools::log::{debug, info};
use strum_macros::{AsRefStr, Display, EnumString};

use super::{KeyValueStore, KvError};
use crate::error::BaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UsageFeature {
    RateMe,
    StyleExtractor,
}

/// Free-trial allowance per feature per calendar day. The stored value is the
/// remaining count; a date with no entry starts at the full ceiling.
#[derive(Clone)]
pub struct DailyUsage {
    kv: Arc<dyn KeyValueStore>,
    limit: u32,
    timezone: Tz,
}

fn usage_key(feature: UsageFeature, date: NaiveDate) -> String {
    format!("usage_{}_{}", feature, date.format("%Y-%m-%d"))
}

impl DailyUsage {
    pub fn new(kv: Arc<dyn KeyValueStore>, limit: u32, timezone: Tz) -> Self {
        Self { kv, limit, timezone }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn remaining_on(&self, feature: UsageFeature, date: NaiveDate) -> Result<u32, KvError> {
        let stored = self.kv.get(&usage_key(feature, date))?;
        Ok(stored
            .and_then(|raw| raw.parse::<u32>().ok())
            .map(|n| n.min(self.limit))
            .unwrap_or(self.limit))
    }

    pub fn remaining(&self, feature: UsageFeature) -> Result<u32, KvError> {
        self.remaining_on(feature, self.today())
    }

    /// Takes one use. Returns what is left afterwards.
    pub fn consume_on(&self, feature: UsageFeature, date: NaiveDate) -> Result<u32, BaseError> {
        let remaining = self.remaining_on(feature, date)?;
        if remaining == 0 {
            info!("daily limit reached for {} on {}", feature, date);
            return Err(BaseError::LimitReached(Some(format!(
                "You've used all {} free tries for today. Come back tomorrow!",
                self.limit
            ))));
        }
        let left = remaining - 1;
        self.kv.set(&usage_key(feature, date), &left.to_string())?;
        self.prune_before(feature, date)?;
        debug!("{} usage on {}: {} left", feature, date, left);
        Ok(left)
    }

    pub fn consume(&self, feature: UsageFeature) -> Result<u32, BaseError> {
        self.consume_on(feature, self.today())
    }

    /// Counters from earlier days are never read again.
    fn prune_before(&self, feature: UsageFeature, date: NaiveDate) -> Result<(), KvError> {
        let prefix = format!("usage_{}_", feature);
        let current = usage_key(feature, date);
        for key in self.kv.keys()? {
            if key.starts_with(&prefix) && key < current {
                self.kv.remove(&key)?;
            }
        }
        Ok(())
    }
}
