#![forbid(unsafe_code)]

//! Proxy resolution. An explicit `proxyUrls` list in the job input wins as a
//! static proxy; otherwise the platform's rotating proxy is composed from the
//! environment, with a fresh session per processed URL. Failure to set up a
//! proxy degrades to direct connections with a warning, never an abort.

use crate::config::ActorConfig;
use anyhow::{Result, bail};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfigurationInput {
    pub use_apify_proxy: Option<bool>,
    pub proxy_urls: Vec<String>,
    pub groups: Vec<String>,
    pub country_code: Option<String>,
}

/// Composes platform proxy URLs with an incrementing session so every
/// processed URL gets a distinct exit IP.
#[derive(Debug)]
pub struct RotatingProxy {
    password: String,
    hostname: String,
    port: u16,
    groups: Vec<String>,
    country_code: Option<String>,
    session_counter: AtomicU64,
}

impl RotatingProxy {
    pub fn from_config(
        config: &ActorConfig,
        input: Option<&ProxyConfigurationInput>,
    ) -> Result<Self> {
        let Some(password) = config.proxy_password.clone() else {
            bail!("proxy password not configured (APIFY_PROXY_PASSWORD)");
        };
        let (groups, country_code) = match input {
            Some(input) => (input.groups.clone(), input.country_code.clone()),
            None => (Vec::new(), None),
        };
        Ok(Self {
            password,
            hostname: config.proxy_hostname.clone(),
            port: config.proxy_port,
            groups,
            country_code,
            session_counter: AtomicU64::new(1),
        })
    }

    pub fn new_url(&self) -> Result<String> {
        let session = self.session_counter.fetch_add(1, Ordering::Relaxed);
        let mut username_parts = Vec::new();
        if !self.groups.is_empty() {
            username_parts.push(format!("groups-{}", self.groups.join("+")));
        }
        username_parts.push(format!("session-vimeo_{session}"));
        if let Some(country) = &self.country_code {
            username_parts.push(format!("country-{country}"));
        }
        let username = username_parts.join(",");
        Ok(format!(
            "http://{username}:{}@{}:{}",
            self.password, self.hostname, self.port
        ))
    }
}

/// The batch driver's view of proxy configuration: a static URL, a rotating
/// provider, or nothing.
#[derive(Debug, Default)]
pub struct ProxySelection {
    static_url: Option<String>,
    rotating: Option<RotatingProxy>,
}

impl ProxySelection {
    /// Resolution precedence mirrors the job input contract: explicit
    /// `proxyUrls` first, then the platform provider, then no proxy.
    pub fn resolve(config: &ActorConfig, input: Option<&ProxyConfigurationInput>) -> Self {
        if let Some(input) = input
            && let Some(first) = input.proxy_urls.first()
        {
            info!("using custom proxy URL provided in input");
            return Self {
                static_url: Some(first.clone()),
                rotating: None,
            };
        }

        match RotatingProxy::from_config(config, input) {
            Ok(rotating) => {
                info!("using platform proxy configuration");
                Self {
                    static_url: None,
                    rotating: Some(rotating),
                }
            }
            Err(err) => {
                warn!("unable to initialize proxy configuration: {err}");
                Self::default()
            }
        }
    }

    /// Picks the proxy URL for the next batch item. A rotation failure falls
    /// back to the static URL with a warning.
    pub fn url_for_next_item(&self) -> Option<String> {
        if let Some(rotating) = &self.rotating {
            match rotating.new_url() {
                Ok(url) => return Some(url),
                Err(err) => {
                    warn!("unable to obtain fresh proxy URL: {err}");
                }
            }
        }
        self.static_url.clone()
    }
}
