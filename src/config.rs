use std::{fs, path::Path, time::Duration};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::schema::enum_def::CheckoutEnvironment;

// --- START BACKEND CONFIG ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialBackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl PartialBackendConfig {
    fn merge_into(self, final_config: &mut BackendConfig) {
        if let Some(url) = self.url {
            final_config.url = url;
        }
        if let Some(anon_key) = self.anon_key {
            final_config.anon_key = anon_key;
        }
    }
}

// --- START STORAGE CONFIG ---

/// Storage driver type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    #[default]
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_local_storage_root")]
    pub local_root: String,
    /// Longest image edge after client-side compression.
    #[serde(default = "default_max_image_edge")]
    pub max_image_edge: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::default(),
            bucket: default_bucket(),
            local_root: default_local_storage_root(),
            max_image_edge: default_max_image_edge(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialStorageConfig {
    pub driver: Option<StorageDriver>,
    pub bucket: Option<String>,
    pub local_root: Option<String>,
    pub max_image_edge: Option<u32>,
}

impl PartialStorageConfig {
    fn merge_into(self, final_config: &mut StorageConfig) {
        if let Some(driver) = self.driver {
            final_config.driver = driver;
        }
        if let Some(bucket) = self.bucket {
            final_config.bucket = bucket;
        }
        if let Some(local_root) = self.local_root {
            final_config.local_root = local_root;
        }
        if let Some(max_image_edge) = self.max_image_edge {
            final_config.max_image_edge = max_image_edge;
        }
    }
}

// --- START AI CONFIG ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    /// Keys baked into the build. Keys from the `api_keys` table are appended at runtime.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Most preferred first.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub proxy: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_keys: Vec::new(),
            models: default_models(),
            key_cache_ttl: default_key_cache_ttl(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            referer: None,
            title: Some("OG Prompts".to_string()),
            proxy: None,
        }
    }
}

impl AiConfig {
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl)
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let millis = self.backoff_base_ms.saturating_mul(factor).min(self.backoff_max_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAiConfig {
    pub endpoint: Option<String>,
    pub api_keys: Option<Vec<String>>,
    pub models: Option<Vec<String>>,
    pub key_cache_ttl: Option<u64>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub proxy: Option<String>,
}

impl PartialAiConfig {
    fn merge_into(self, final_config: &mut AiConfig) {
        if let Some(endpoint) = self.endpoint { final_config.endpoint = endpoint; }
        if let Some(api_keys) = self.api_keys { final_config.api_keys = api_keys; }
        if let Some(models) = self.models { final_config.models = models; }
        if let Some(ttl) = self.key_cache_ttl { final_config.key_cache_ttl = ttl; }
        if let Some(base) = self.backoff_base_ms { final_config.backoff_base_ms = base; }
        if let Some(max) = self.backoff_max_ms { final_config.backoff_max_ms = max; }
        if let Some(referer) = self.referer { final_config.referer = Some(referer); }
        if let Some(title) = self.title { final_config.title = Some(title); }
        if let Some(proxy) = self.proxy { final_config.proxy = Some(proxy); }
    }
}

// --- START CHECKOUT CONFIG ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditPack {
    pub price_id: String,
    pub credits: i64,
    pub label: String,
    pub usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub client_token: Option<String>,
    #[serde(default)]
    pub environment: CheckoutEnvironment,
    #[serde(default = "default_credit_packs")]
    pub packs: Vec<CreditPack>,
    /// Catalogue price used by the Pro upgrade overlay.
    pub pro_price_id: Option<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            client_token: None,
            environment: CheckoutEnvironment::default(),
            packs: default_credit_packs(),
            pro_price_id: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialCheckoutConfig {
    pub client_token: Option<String>,
    pub environment: Option<CheckoutEnvironment>,
    pub packs: Option<Vec<CreditPack>>,
    pub pro_price_id: Option<String>,
}

impl PartialCheckoutConfig {
    fn merge_into(self, final_config: &mut CheckoutConfig) {
        if let Some(token) = self.client_token { final_config.client_token = Some(token); }
        if let Some(environment) = self.environment { final_config.environment = environment; }
        if let Some(packs) = self.packs { final_config.packs = packs; }
        if let Some(pro_price_id) = self.pro_price_id { final_config.pro_price_id = Some(pro_price_id); }
    }
}

// --- SMALL SECTIONS ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path of the JSON file holding liked ids, onboarding flags and usage counters.
    pub local_store_path: String,
    pub free_trial_daily_limit: u32,
    pub leaderboard_vote_step: f64,
    pub payout_min_credits: i64,
    pub search_debounce_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_store_path: "storage/local_store.json".to_string(),
            free_trial_daily_limit: 3,
            leaderboard_vote_step: 0.01,
            payout_min_credits: 500,
            search_debounce_ms: 300,
        }
    }
}

impl ClientConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialClientConfig {
    pub local_store_path: Option<String>,
    pub free_trial_daily_limit: Option<u32>,
    pub leaderboard_vote_step: Option<f64>,
    pub payout_min_credits: Option<i64>,
    pub search_debounce_ms: Option<u64>,
}

impl PartialClientConfig {
    fn merge_into(self, final_config: &mut ClientConfig) {
        if let Some(path) = self.local_store_path { final_config.local_store_path = path; }
        if let Some(limit) = self.free_trial_daily_limit { final_config.free_trial_daily_limit = limit; }
        if let Some(step) = self.leaderboard_vote_step { final_config.leaderboard_vote_step = step; }
        if let Some(min) = self.payout_min_credits { final_config.payout_min_credits = min; }
        if let Some(ms) = self.search_debounce_ms { final_config.search_debounce_ms = ms; }
    }
}

// Default values
fn default_bucket() -> String {
    "images".to_string()
}

fn default_local_storage_root() -> String {
    "storage/objects".to_string()
}

fn default_max_image_edge() -> u32 {
    1600
}

fn default_ai_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_models() -> Vec<String> {
    vec![
        "google/gemini-2.0-flash-exp:free".to_string(),
        "qwen/qwen2.5-vl-72b-instruct:free".to_string(),
        "meta-llama/llama-3.2-11b-vision-instruct:free".to_string(),
    ]
}

fn default_key_cache_ttl() -> u64 {
    60
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    8000
}

fn default_credit_packs() -> Vec<CreditPack> {
    vec![
        CreditPack { price_id: "pri_credits_100".to_string(), credits: 100, label: "Starter".to_string(), usd: 4.99 },
        CreditPack { price_id: "pri_credits_500".to_string(), credits: 500, label: "Creator".to_string(), usd: 19.99 },
        CreditPack { price_id: "pri_credits_1200".to_string(), credits: 1200, label: "Studio".to_string(), usd: 39.99 },
    ]
}

// Used for deserializing user-provided config files where all fields are optional.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub log_level: Option<String>,
    pub timezone: Option<String>,
    pub backend: Option<PartialBackendConfig>,
    pub storage: Option<PartialStorageConfig>,
    pub ai: Option<PartialAiConfig>,
    pub checkout: Option<PartialCheckoutConfig>,
    pub client: Option<PartialClientConfig>,
}

impl PartialConfig {
    /// Merges the fields of this partial config into a final config, overwriting existing values.
    fn merge_into(self, final_config: &mut FinalConfig) {
        if let Some(log_level) = self.log_level { final_config.log_level = log_level; }
        if let Some(timezone) = self.timezone { final_config.timezone = Some(timezone); }
        if let Some(backend) = self.backend {
            backend.merge_into(&mut final_config.backend)
        }
        if let Some(storage) = self.storage {
            storage.merge_into(&mut final_config.storage)
        }
        if let Some(ai) = self.ai {
            ai.merge_into(&mut final_config.ai)
        }
        if let Some(checkout) = self.checkout {
            checkout.merge_into(&mut final_config.checkout)
        }
        if let Some(client) = self.client {
            client.merge_into(&mut final_config.client)
        }
    }
}

// The fully resolved configuration used by the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FinalConfig {
    pub log_level: String,
    pub timezone: Option<String>,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub checkout: CheckoutConfig,
    pub client: ClientConfig,
}

impl FinalConfig {
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.timezone
            .as_ref()
            .and_then(|tz_str| tz_str.parse::<chrono_tz::Tz>().ok())
            .unwrap_or(chrono_tz::Tz::Etc__UTC)
    }
}

fn get_env_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn get_env_list(key: &str) -> Option<Vec<String>> {
    let raw: String = get_env_var(key)?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

fn get_config_from_env() -> PartialConfig {
    PartialConfig {
        log_level: get_env_var("LOG_LEVEL"),
        timezone: get_env_var("TIMEZONE"),
        backend: Some(PartialBackendConfig {
            url: get_env_var("BACKEND_URL"),
            anon_key: get_env_var("BACKEND_ANON_KEY"),
        }),
        storage: None,
        ai: Some(PartialAiConfig {
            api_keys: get_env_list("OPENROUTER_API_KEYS"),
            models: get_env_list("OPENROUTER_MODELS"),
            ..Default::default()
        }),
        checkout: Some(PartialCheckoutConfig {
            client_token: get_env_var("CHECKOUT_CLIENT_TOKEN"),
            ..Default::default()
        }),
        client: Some(PartialClientConfig {
            local_store_path: get_env_var("LOCAL_STORE_PATH"),
            ..Default::default()
        }),
    }
}

fn load_partial(path: &Path) -> Option<PartialConfig> {
    if !path.exists() {
        return None;
    }
    let config_str = fs::read_to_string(path).ok()?;
    let partial: PartialConfig = serde_yaml::from_str(&config_str)
        .unwrap_or_else(|e| panic!("Failed to parse configuration file at {:?}: {}", path, e));
    Some(partial)
}

impl FinalConfig {
    pub fn load() -> Self {
        let default_config_path = Path::new("config.default.yaml");
        let user_config_path_primary = Path::new("config.local.yaml");
        let user_config_path_fallback = Path::new("config.yaml");

        // Determine which user config file to use for overrides
        let user_config_path = if cfg!(debug_assertions) && user_config_path_primary.exists() {
            user_config_path_primary
        } else {
            user_config_path_fallback
        };

        let mut final_config = FinalConfig {
            log_level: "info".to_string(),
            ..Default::default()
        };

        if let Some(file_defaults) = load_partial(default_config_path) {
            file_defaults.merge_into(&mut final_config);
        }

        if let Some(user_config) = load_partial(user_config_path) {
            user_config.merge_into(&mut final_config);
        }

        // Environment variables have the highest priority.
        get_config_from_env().merge_into(&mut final_config);

        if final_config.ai.models.is_empty() {
            final_config.ai.models = default_models();
        }

        final_config
    }
}

pub static CONFIG: Lazy<FinalConfig> = Lazy::new(FinalConfig::load);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_merge_overrides_only_present_fields() {
        let mut config = FinalConfig::default();
        let partial: PartialConfig = serde_yaml::from_str(
            "ai:\n  api_keys: [k1, k2]\n  backoff_base_ms: 5\nclient:\n  free_trial_daily_limit: 5\n",
        )
        .unwrap();
        partial.merge_into(&mut config);

        assert_eq!(config.ai.api_keys, vec!["k1", "k2"]);
        assert_eq!(config.ai.backoff_base_ms, 5);
        assert_eq!(config.ai.models, default_models());
        assert_eq!(config.client.free_trial_daily_limit, 5);
        assert_eq!(config.client.payout_min_credits, 500);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<PartialConfig, _> = serde_yaml::from_str("bogus: 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let ai = AiConfig::default();
        assert_eq!(ai.backoff(0), Duration::from_millis(1000));
        assert_eq!(ai.backoff(1), Duration::from_millis(2000));
        assert_eq!(ai.backoff(2), Duration::from_millis(4000));
        assert_eq!(ai.backoff(5), Duration::from_millis(8000));
        assert_eq!(ai.backoff(64), Duration::from_millis(8000));
    }

    #[test]
    fn test_timezone_fallback() {
        let mut config = FinalConfig::default();
        assert_eq!(config.timezone(), chrono_tz::Tz::Etc__UTC);
        config.timezone = Some("Asia/Tokyo".to_string());
        assert_eq!(config.timezone(), chrono_tz::Tz::Asia__Tokyo);
        config.timezone = Some("Not/AZone".to_string());
        assert_eq!(config.timezone(), chrono_tz::Tz::Etc__UTC);
    }
}
