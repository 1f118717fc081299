// config.rs
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::{collections::HashMap, fmt, time::Duration};
use tracing::warn;

pub const DEFAULT_API_VERSION: &str = "2025-07";
pub const DEFAULT_TARGET_SKU: &str = "9000000";
pub const DEFAULT_MARKER_TAG: &str = "prescription-required";

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shopify_shared_secret: Option<String>,
    pub shopify_access_token: String,
    pub shopify_shop: String,
    pub shopify_api_version: String,
    #[serde(default)]
    pub shopify_api_base_url: Option<String>,
    pub target_sku: String,
    pub marker_tag: String,
    pub tag_delay_secs: u64,
    pub api_timeout_secs: u64,
    /// Accept unsigned deliveries. Local testing only.
    pub skip_hmac_check: bool,
    pub bind_address: String,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Loads the configuration from an explicit variable map instead of the
    /// process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("shopify_api_version", DEFAULT_API_VERSION)?
            .set_default("target_sku", DEFAULT_TARGET_SKU)?
            .set_default("marker_tag", DEFAULT_MARKER_TAG)?
            .set_default("tag_delay_secs", 0_i64)?
            .set_default("api_timeout_secs", 10_i64)?
            .set_default("skip_hmac_check", false)?
            .set_default("bind_address", "0.0.0.0:3000")?
            .add_source(env)
            .build()
            .context("failed to read configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.normalize();
        config.validate()?;

        if config.skip_hmac_check {
            warn!("SKIP_HMAC_CHECK is enabled; webhook signatures will not be verified");
        }

        Ok(config)
    }

    // Stored tags are trimmed when parsed, so a padded marker would never
    // match an existing tag and every delivery would tag again.
    fn normalize(&mut self) {
        for value in [
            &mut self.target_sku,
            &mut self.marker_tag,
            &mut self.shopify_shop,
        ] {
            *value = value.trim().to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.shared_secret().is_none() && !self.skip_hmac_check {
            anyhow::bail!("SHOPIFY_SHARED_SECRET not set");
        }
        if self.shopify_access_token.trim().is_empty() {
            anyhow::bail!("SHOPIFY_ACCESS_TOKEN not set");
        }

        let shop_pattern = Regex::new(r"^[a-z0-9][a-z0-9-]*\.myshopify\.com$")?;
        if !shop_pattern.is_match(&self.shopify_shop) {
            anyhow::bail!(
                "SHOPIFY_SHOP must be a *.myshopify.com domain, got {:?}",
                self.shopify_shop
            );
        }

        if self.target_sku.is_empty() {
            anyhow::bail!("TARGET_SKU must not be empty");
        }
        if self.marker_tag.is_empty() || self.marker_tag.contains(',') {
            anyhow::bail!("MARKER_TAG must be a single non-empty tag");
        }
        if self.api_timeout_secs == 0 {
            anyhow::bail!("API_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }

    /// The shared secret, treating an empty value as unset.
    pub fn shared_secret(&self) -> Option<&str> {
        self.shopify_shared_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }

    pub fn tag_delay(&self) -> Duration {
        Duration::from_secs(self.tag_delay_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Root of the Admin REST API, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        match &self.shopify_api_base_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!(
                "https://{}/admin/api/{}",
                self.shopify_shop, self.shopify_api_version
            ),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("shopify_shared_secret", &self.shared_secret().map(|_| "<redacted>"))
            .field("shopify_access_token", &"<redacted>")
            .field("shopify_shop", &self.shopify_shop)
            .field("shopify_api_version", &self.shopify_api_version)
            .field("shopify_api_base_url", &self.shopify_api_base_url)
            .field("target_sku", &self.target_sku)
            .field("marker_tag", &self.marker_tag)
            .field("tag_delay_secs", &self.tag_delay_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("skip_hmac_check", &self.skip_hmac_check)
            .field("bind_address", &self.bind_address)
            .finish()
    }
}
