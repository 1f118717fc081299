pub mod config;
pub mod error;
pub mod order;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod shopify;
pub mod webhook;

pub use config::Config;
pub use error::WebhookError;
pub use order::{LineItem, Order, OrderId, TagSet};
pub use reconcile::{reconcile, Action, SkipReason};
pub use scheduler::DeferredTasks;
pub use server::{router, AppState};
pub use shopify::ShopifyClient;
pub use webhook::{sign, verify, WebhookVerifier};
