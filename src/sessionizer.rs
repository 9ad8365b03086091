//! Groups events per product and cuts each group at its last purchase.
//!
//! Groups are independent, so they are reduced in parallel with rayon. Every
//! worker returns its own `(product, session)` pair and the pairs are merged
//! into the ordered map on the calling thread afterwards.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::Event;

/// The chronologically ordered events of one product, up to and including
/// its last purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub events: Vec<Event>,
    /// Number of events that came after the last purchase.
    pub discarded: usize,
}

impl Session {
    pub fn view_count(&self) -> u64 {
        self.events.iter().filter(|e| e.is_view()).count() as u64
    }

    pub fn purchase_count(&self) -> u64 {
        self.events.iter().filter(|e| e.is_purchase()).count() as u64
    }

    /// The purchase that closes the session.
    pub fn last_purchase(&self) -> Option<&Event> {
        self.events.last().filter(|e| e.is_purchase())
    }
}

pub type Sessions = BTreeMap<String, Session>;

/// Build one session per product that has at least one purchase.
///
/// Products without any purchase are left out entirely.
pub fn sessionize(events: Vec<Event>) -> Sessions {
    group_by_product(events)
        .into_par_iter()
        .filter_map(|(product_id, group)| {
            truncate_at_last_purchase(group).map(|session| (product_id, session))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Partition by exact product id. Each group keeps the input order.
pub fn group_by_product(events: Vec<Event>) -> HashMap<String, Vec<Event>> {
    let mut groups: HashMap<String, Vec<Event>> = HashMap::new();
    for event in events {
        match groups.get_mut(&event.product_id) {
            Some(group) => group.push(event),
            None => {
                groups.insert(event.product_id.clone(), vec![event]);
            }
        }
    }
    groups
}

/// Sort one product's events by timestamp and keep the prefix that ends at
/// the rightmost purchase. Returns `None` when there is no purchase.
pub fn truncate_at_last_purchase(mut group: Vec<Event>) -> Option<Session> {
    // Stable: events sharing a timestamp stay in input order.
    group.sort_by_key(|event| event.timestamp);

    let last_purchase = group.iter().rposition(Event::is_purchase)?;
    let discarded = group.len() - last_purchase - 1;
    group.truncate(last_purchase + 1);

    Some(Session {
        events: group,
        discarded,
    })
}

#[cfg(test)]
mod tests;
