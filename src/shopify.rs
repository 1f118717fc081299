// shopify.rs
use anyhow::{Context, Result};
use reqwest::{header, Client, Url};
use serde::Serialize;

use crate::config::Config;
use crate::order::OrderId;

#[derive(Debug, Clone)]
pub struct ShopifyClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct OrderUpdate<'a> {
    order: OrderTags<'a>,
}

#[derive(Debug, Serialize)]
struct OrderTags<'a> {
    id: &'a OrderId,
    tags: &'a str,
}

impl ShopifyClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut token = header::HeaderValue::from_str(&config.shopify_access_token)
            .context("SHOPIFY_ACCESS_TOKEN is not a valid header value")?;
        token.set_sensitive(true);
        headers.insert(header::HeaderName::from_static("x-shopify-access-token"), token);
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(concat!("order-tagger/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.api_timeout())
            .build()?;

        let base_url = Url::parse(&config.api_base_url())
            .with_context(|| format!("invalid Admin API URL {:?}", config.api_base_url()))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Admin API URL {} cannot take a path", base_url);
        }

        Ok(Self { client, base_url })
    }

    /// `{base}/orders/{id}.json`, with the id escaped as a single path
    /// segment.
    fn order_url(&self, id: &OrderId) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Admin API URL {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .push("orders")
            .push(&format!("{}.json", id));
        Ok(url)
    }

    /// Overwrites the order's tags. Only `id` and `tags` are sent so no other
    /// field of the order is touched.
    pub async fn update_order_tags(&self, id: &OrderId, tags: &str) -> Result<()> {
        let url = self.order_url(id)?;
        let payload = OrderUpdate {
            order: OrderTags { id, tags },
        };

        let response = self.client.put(url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to update tags on order {}: {} {}", id, status, body);
        }

        Ok(())
    }
}
