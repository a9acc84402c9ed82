use std::sync::Arc;

use strum_macros::{AsRefStr, Display, EnumString};

use super::{KeyValueStore, KvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OnboardingFlow {
    Welcome,
    RateMe,
    StyleExtractor,
    Upload,
}

#[derive(Clone)]
pub struct OnboardingFlags {
    kv: Arc<dyn KeyValueStore>,
}

fn flag_key(flow: OnboardingFlow) -> String {
    format!("onboarding_seen_{}", flow)
}

impl OnboardingFlags {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn has_seen(&self, flow: OnboardingFlow) -> Result<bool, KvError> {
        Ok(self.kv.get(&flag_key(flow))?.as_deref() == Some("true"))
    }

    pub fn mark_seen(&self, flow: OnboardingFlow) -> Result<(), KvError> {
        self.kv.set(&flag_key(flow), "true")
    }

    pub fn reset(&self, flow: OnboardingFlow) -> Result<(), KvError> {
        self.kv.remove(&flag_key(flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::prefs::MemoryKv;

    #[test]
    fn test_flags_are_per_flow() {
        let kv = Arc::new(MemoryKv::new());
        let flags = OnboardingFlags::new(kv.clone());
        assert!(!flags.has_seen(OnboardingFlow::Welcome).unwrap());

        flags.mark_seen(OnboardingFlow::Welcome).unwrap();
        assert!(flags.has_seen(OnboardingFlow::Welcome).unwrap());
        assert!(!flags.has_seen(OnboardingFlow::RateMe).unwrap());
        assert_eq!(kv.get("onboarding_seen_welcome").unwrap().as_deref(), Some("true"));

        flags.reset(OnboardingFlow::Welcome).unwrap();
        assert!(!flags.has_seen(OnboardingFlow::Welcome).unwrap());
    }
}
