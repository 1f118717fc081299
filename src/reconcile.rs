// reconcile.rs
use crate::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SkuNotFound,
    AlreadyTagged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp(SkipReason),
    /// Replace the order's tags with this `", "` joined string.
    AddTag(String),
}

/// Decides whether `marker_tag` must be added to `order`.
///
/// Pure: the caller applies [`Action::AddTag`] with a single update call.
/// The marker is compared the way stored tags are read back, trimmed.
pub fn reconcile(order: &Order, target_sku: &str, marker_tag: &str) -> Action {
    if !order.has_sku(target_sku) {
        return Action::NoOp(SkipReason::SkuNotFound);
    }

    let marker_tag = marker_tag.trim();
    let mut tags = order.tag_set();
    if tags.contains(marker_tag) {
        return Action::NoOp(SkipReason::AlreadyTagged);
    }

    tags.push(marker_tag);
    Action::AddTag(tags.render())
}
