#![forbid(unsafe_code)]

//! Typed view of the platform environment. The actor runs either on the
//! hosting platform (API token plus default store/dataset ids injected via
//! environment variables) or locally against a filesystem storage emulation.
//!
//! The builder takes an injectable lookup closure so tests can exercise every
//! combination without touching the process environment.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://api.apify.com";
pub const DEFAULT_INPUT_KEY: &str = "INPUT";
pub const DEFAULT_STORAGE_DIR: &str = "./storage";
pub const DEFAULT_PROXY_HOSTNAME: &str = "proxy.apify.com";
pub const DEFAULT_PROXY_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub token: Option<String>,
    pub api_base: String,
    /// Base for user-facing retrieval URLs; may differ from `api_base` when
    /// the actor talks to the API through an internal endpoint.
    pub public_api_base: String,
    pub default_key_value_store_id: Option<String>,
    pub default_dataset_id: Option<String>,
    pub input_key: String,
    pub local_storage_dir: PathBuf,
    pub is_at_home: bool,
    pub proxy_password: Option<String>,
    pub proxy_hostname: String,
    pub proxy_port: u16,
}

impl ActorConfig {
    /// Platform storage needs the token plus both default store ids; anything
    /// less falls back to the local filesystem emulation.
    pub fn platform_storage_available(&self) -> bool {
        self.is_at_home
            && self.token.is_some()
            && self.default_key_value_store_id.is_some()
            && self.default_dataset_id.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub local_storage_dir: Option<PathBuf>,
    pub input_key: Option<String>,
}

pub fn load_config(overrides: ConfigOverrides) -> ActorConfig {
    build_config(env_var_string, overrides)
}

fn build_config(
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> ActorConfig {
    let api_base = env_lookup("APIFY_API_BASE_URL")
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let public_api_base = env_lookup("APIFY_API_PUBLIC_BASE_URL")
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| api_base.clone());

    let input_key = overrides
        .input_key
        .or_else(|| env_lookup("APIFY_INPUT_KEY"))
        .unwrap_or_else(|| DEFAULT_INPUT_KEY.to_string());
    let local_storage_dir = overrides
        .local_storage_dir
        .or_else(|| env_lookup("APIFY_LOCAL_STORAGE_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

    let is_at_home = env_lookup("APIFY_IS_AT_HOME")
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));

    let proxy_hostname =
        env_lookup("APIFY_PROXY_HOSTNAME").unwrap_or_else(|| DEFAULT_PROXY_HOSTNAME.to_string());
    let proxy_port = env_lookup("APIFY_PROXY_PORT")
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PROXY_PORT);

    ActorConfig {
        token: env_lookup("APIFY_TOKEN"),
        api_base,
        public_api_base,
        default_key_value_store_id: env_lookup("APIFY_DEFAULT_KEY_VALUE_STORE_ID"),
        default_dataset_id: env_lookup("APIFY_DEFAULT_DATASET_ID"),
        input_key,
        local_storage_dir,
        is_at_home,
        proxy_password: env_lookup("APIFY_PROXY_PASSWORD"),
        proxy_hostname,
        proxy_port,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)], overrides: ConfigOverrides) -> ActorConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        build_config(|key| map.get(key).cloned(), overrides)
    }

    #[test]
    fn defaults_apply_with_empty_environment() {
        let config = config_from(&[], ConfigOverrides::default());
        assert!(config.token.is_none());
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.public_api_base, DEFAULT_API_BASE);
        assert_eq!(config.input_key, DEFAULT_INPUT_KEY);
        assert_eq!(config.local_storage_dir, PathBuf::from(DEFAULT_STORAGE_DIR));
        assert!(!config.is_at_home);
        assert_eq!(config.proxy_hostname, DEFAULT_PROXY_HOSTNAME);
        assert_eq!(config.proxy_port, DEFAULT_PROXY_PORT);
        assert!(!config.platform_storage_available());
    }

    #[test]
    fn platform_environment_is_read() {
        let config = config_from(
            &[
                ("APIFY_TOKEN", "secret"),
                ("APIFY_API_BASE_URL", "https://api.internal.example/"),
                ("APIFY_DEFAULT_KEY_VALUE_STORE_ID", "store123"),
                ("APIFY_DEFAULT_DATASET_ID", "dataset456"),
                ("APIFY_IS_AT_HOME", "1"),
            ],
            ConfigOverrides::default(),
        );
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.api_base, "https://api.internal.example");
        // Public base falls back to the API base when unset.
        assert_eq!(config.public_api_base, "https://api.internal.example");
        assert!(config.platform_storage_available());
    }

    #[test]
    fn overrides_beat_environment() {
        let config = config_from(
            &[
                ("APIFY_INPUT_KEY", "OTHER"),
                ("APIFY_LOCAL_STORAGE_DIR", "/env/storage"),
            ],
            ConfigOverrides {
                local_storage_dir: Some(PathBuf::from("/cli/storage")),
                input_key: Some("CUSTOM".into()),
            },
        );
        assert_eq!(config.input_key, "CUSTOM");
        assert_eq!(config.local_storage_dir, PathBuf::from("/cli/storage"));
    }

    #[test]
    fn invalid_proxy_port_defaults() {
        let config = config_from(&[("APIFY_PROXY_PORT", "nope")], ConfigOverrides::default());
        assert_eq!(config.proxy_port, DEFAULT_PROXY_PORT);
    }

    #[test]
    fn platform_storage_requires_every_id() {
        let config = config_from(
            &[("APIFY_TOKEN", "secret"), ("APIFY_IS_AT_HOME", "true")],
            ConfigOverrides::default(),
        );
        assert!(!config.platform_storage_available());
    }
}
