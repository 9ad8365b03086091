use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A record exactly as an input source delivered it, before any validation.
///
/// Well-formed records hold three fields: kind, timestamp and product id.
/// Other field counts are kept so the normalizer can reject them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl<K, T, P> From<(K, T, P)> for RawRecord
where
    K: Into<String>,
    T: Into<String>,
    P: Into<String>,
{
    fn from((kind, timestamp, product_id): (K, T, P)) -> Self {
        Self {
            fields: vec![kind.into(), timestamp.into(), product_id.into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    View,
    Purchase,
}

impl EventKind {
    /// Parse the wire token. Matching is case-sensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "VIEW" => Some(EventKind::View),
            "PURCHASE" => Some(EventKind::Purchase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "VIEW",
            EventKind::Purchase => "PURCHASE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: u64,
    pub product_id: String,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: u64, product_id: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp,
            product_id: product_id.into(),
        }
    }

    pub fn is_view(&self) -> bool {
        self.kind == EventKind::View
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == EventKind::Purchase
    }
}

/// Views before the last purchase, keyed by product id in lexicographic order.
pub type ResultMap = BTreeMap<String, u64>;

/// Per-product detail derived from a truncated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub views_before_purchase: u64,
    /// Purchases inside the session, the last one included.
    pub purchases: u64,
    pub first_timestamp: u64,
    pub last_purchase_timestamp: u64,
    /// Events that happened after the last purchase and were cut off.
    pub discarded_events: u64,
}
