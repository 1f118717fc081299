// order.rs
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Shopify sends numeric ids, some proxies forward them as strings. Either
/// form is echoed back unchanged in the update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderId {
    Number(u64),
    Text(String),
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderId::Number(id) => write!(f, "{}", id),
            OrderId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub sku: Option<String>,
}

/// The subset of an order webhook payload this service reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tags: Option<String>,
}

// Shopify may send `null` where a list is expected; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Order {
    pub fn has_sku(&self, sku: &str) -> bool {
        self.line_items
            .iter()
            .any(|item| item.sku.as_deref() == Some(sku))
    }

    pub fn tag_set(&self) -> TagSet {
        TagSet::parse(self.tags.as_deref().unwrap_or_default())
    }
}

/// Tags parsed from Shopify's comma separated `tags` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    pub const SEPARATOR: &'static str = ", ";

    /// Splits on commas and trims each tag. Empty entries are dropped and
    /// only the first occurrence of a repeated tag is kept.
    pub fn parse(raw: &str) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
        Self { tags }
    }

    /// Exact, case-sensitive lookup.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn push(&mut self, tag: &str) {
        if !self.contains(tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn render(&self) -> String {
        self.tags.join(Self::SEPARATOR)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
