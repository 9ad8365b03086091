use std::collections::{BTreeMap, BTreeSet};

use crate::sessionizer::Sessions;
use crate::types::{Event, ProductSummary, ResultMap};

/// Count the views inside every truncated session.
///
/// The closing purchase is never a view, so it never counts.
pub fn aggregate(sessions: &Sessions) -> ResultMap {
    sessions
        .iter()
        .map(|(product_id, session)| (product_id.clone(), session.view_count()))
        .collect()
}

pub fn summarize(sessions: &Sessions) -> BTreeMap<String, ProductSummary> {
    sessions
        .iter()
        .filter_map(|(product_id, session)| {
            let first = session.events.first()?;
            let last_purchase = session.last_purchase()?;
            Some((
                product_id.clone(),
                ProductSummary {
                    views_before_purchase: session.view_count(),
                    purchases: session.purchase_count(),
                    first_timestamp: first.timestamp,
                    last_purchase_timestamp: last_purchase.timestamp,
                    discarded_events: session.discarded as u64,
                },
            ))
        })
        .collect()
}

/// Every distinct product id appearing in `events`.
pub fn product_ids(events: &[Event]) -> BTreeSet<String> {
    events.iter().map(|e| e.product_id.clone()).collect()
}

/// Add a zero entry for each product that has no entry yet.
///
/// Post-processing for consumers that want purchase-less products reported;
/// [`aggregate`] itself never produces them.
pub fn with_unpurchased<I>(mut result: ResultMap, product_ids: I) -> ResultMap
where
    I: IntoIterator<Item = String>,
{
    for product_id in product_ids {
        result.entry(product_id).or_insert(0);
    }
    result
}
