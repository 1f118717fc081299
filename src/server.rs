// server.rs
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::WebhookError;
use crate::order::Order;
use crate::reconcile::{reconcile, Action, SkipReason};
use crate::scheduler::DeferredTasks;
use crate::shopify::ShopifyClient;
use crate::webhook::{WebhookVerifier, HEADER_SHOP_DOMAIN, HEADER_TOPIC, HEADER_WEBHOOK_ID};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub shopify: ShopifyClient,
    pub webhook_verifier: WebhookVerifier,
    pub deferred: DeferredTasks,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let webhook_verifier = match config.shared_secret() {
            _ if config.skip_hmac_check => WebhookVerifier::disabled(),
            Some(secret) => WebhookVerifier::new(secret),
            None => anyhow::bail!("SHOPIFY_SHARED_SECRET not set"),
        };
        let shopify = ShopifyClient::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            shopify,
            webhook_verifier,
            deferred: DeferredTasks::new(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/orders-create", post(handle_webhook))
        .route("/webhooks/orders-update", post(handle_webhook))
        .route("/health", get(health_check))
        .with_state(Arc::new(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Delivery metadata Shopify sends alongside the payload. Only logged.
#[derive(Debug)]
struct Delivery {
    webhook_id: String,
    topic: String,
    shop_domain: String,
}

impl Delivery {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };

        Self {
            webhook_id: header(HEADER_WEBHOOK_ID)
                .unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4())),
            topic: header(HEADER_TOPIC).unwrap_or_else(|| "unknown".to_string()),
            shop_domain: header(HEADER_SHOP_DOMAIN).unwrap_or_default(),
        }
    }
}

// The body is taken as raw bytes: the signature covers the exact payload on
// the wire, so it must be checked before any JSON parsing.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    let delivery = Delivery::from_headers(&headers);
    debug!(
        webhook_id = %delivery.webhook_id,
        topic = %delivery.topic,
        shop = %delivery.shop_domain,
        bytes = body.len(),
        "Webhook received"
    );

    if !state.webhook_verifier.verify_signature(&headers, &body) {
        warn!(webhook_id = %delivery.webhook_id, "Invalid webhook signature");
        return Err(WebhookError::Unauthorized);
    }

    let order: Order = serde_json::from_slice(&body).map_err(|e| {
        warn!(webhook_id = %delivery.webhook_id, "Failed to parse order payload: {}", e);
        WebhookError::from(e)
    })?;

    info!(
        webhook_id = %delivery.webhook_id,
        topic = %delivery.topic,
        order_id = %order.id,
        "Verified webhook for order"
    );

    let delay = state.config.tag_delay();
    if delay.is_zero() {
        // Run on its own task so a panic while tagging becomes a 500 instead
        // of a dropped connection.
        tokio::spawn(tag_order(state, order))
            .await
            .context("tagging task failed")?;
    } else {
        info!("Deferring tagging of order {} by {:?}", order.id, delay);
        let deferred = state.deferred.clone();
        deferred.schedule(delay, tag_order(state, order));
    }

    Ok("OK")
}

async fn tag_order(state: Arc<AppState>, order: Order) {
    if let Err(e) = apply_tagging(&state.shopify, &state.config, &order).await {
        error!("Error tagging order {}: {:#}", order.id, e);
    }
}

/// Reconciles `order` and, when needed, issues the single tag update.
pub async fn apply_tagging(
    shopify: &ShopifyClient,
    config: &Config,
    order: &Order,
) -> Result<Action> {
    let action = reconcile(order, &config.target_sku, &config.marker_tag);

    match &action {
        Action::NoOp(SkipReason::SkuNotFound) => {
            info!(
                "SKU {} not found in order {}. No tag added.",
                config.target_sku, order.id
            );
        }
        Action::NoOp(SkipReason::AlreadyTagged) => {
            info!(
                "Tag {:?} already present on order {}. Skipping update.",
                config.marker_tag, order.id
            );
        }
        Action::AddTag(tags) => {
            info!("Adding tag {:?} to order {}", config.marker_tag, order.id);
            shopify
                .update_order_tags(&order.id, tags)
                .await
                .with_context(|| format!("tag update for order {} failed", order.id))?;
            info!("Order {} tagged successfully", order.id);
        }
    }

    Ok(action)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now()
    }))
}
