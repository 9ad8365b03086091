//! Per-product view-before-purchase sessionization.
//!
//! Raw `(kind, timestamp, product id)` records flow through three stages:
//! [`normalize`] validates them into [`Event`]s, [`sessionize`] groups them per
//! product and cuts every group at its last purchase, and [`aggregate`]
//! counts the views left in each session.

pub mod aggregator;
pub mod error;
pub mod normalizer;
pub mod sessionizer;
pub mod types;

pub use aggregator::{aggregate, summarize};
pub use error::MalformedRecordError;
pub use normalizer::normalize;
pub use sessionizer::{Session, Sessions, sessionize};
pub use types::{Event, EventKind, ProductSummary, RawRecord, ResultMap};

/// Run the whole pipeline over a batch of raw records.
pub fn count_views_before_purchase<I>(records: I) -> Result<ResultMap, MalformedRecordError>
where
    I: IntoIterator<Item = RawRecord>,
{
    let events = normalize(records)?;
    Ok(aggregate(&sessionize(events)))
}
