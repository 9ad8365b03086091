use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, OnceLock};

use anyhow::Result;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;

use sessionize::{ProductSummary, ResultMap};

static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Print a warning to stderr unless the exact same message was printed before.
pub fn warn_once(message: impl Into<String>) {
    let message = message.into();
    let cache = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));

    if let Ok(mut warned) = cache.lock()
        && warned.insert(message.clone())
    {
        eprintln!("{message}");
    }
}

#[derive(Clone)]
pub struct NumberFormatOptions {
    pub use_comma: bool,
    pub use_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for NumberFormatOptions {
    fn default() -> Self {
        Self {
            use_comma: false,
            use_human: false,
            locale: "en".to_string(),
            decimal_places: 2,
        }
    }
}

/// Format a number for display. Accepts both u32 and u64.
pub fn format_number(n: impl Into<u64>, options: &NumberFormatOptions) -> String {
    let n: u64 = n.into();
    let locale = match options.locale.as_str() {
        "de" => Locale::de,
        "fr" => Locale::fr,
        "es" => Locale::es,
        "it" => Locale::it,
        "ja" => Locale::ja,
        "ko" => Locale::ko,
        "zh" => Locale::zh,
        _ => Locale::en,
    };

    if options.use_human {
        const UNITS: [(u64, &str); 4] = [
            (1_000_000_000_000, "t"),
            (1_000_000_000, "b"),
            (1_000_000, "m"),
            (1_000, "k"),
        ];
        for (scale, suffix) in UNITS {
            if n >= scale {
                return format!(
                    "{:.prec$}{suffix}",
                    n as f64 / scale as f64,
                    prec = options.decimal_places
                );
            }
        }
        n.to_string()
    } else if options.use_comma {
        n.to_formatted_string(&locale)
    } else {
        n.to_string()
    }
}

fn render_rows(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for (i, row) in std::iter::once(header).chain(rows).enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(col, (cell, &width))| {
                // First column is the product id, the rest are numbers.
                if col == 0 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

pub fn render_counts_table(result: &ResultMap, options: &NumberFormatOptions) -> String {
    if result.is_empty() {
        return "No purchases found.\n".to_string();
    }

    let rows = result
        .iter()
        .map(|(product_id, count)| vec![product_id.clone(), format_number(*count, options)])
        .collect();
    render_rows(&["Product", "Views before purchase"], rows)
}

pub fn render_summary_table(
    summaries: &BTreeMap<String, ProductSummary>,
    options: &NumberFormatOptions,
) -> String {
    if summaries.is_empty() {
        return "No purchases found.\n".to_string();
    }

    let rows = summaries
        .iter()
        .map(|(product_id, s)| {
            vec![
                product_id.clone(),
                format_number(s.views_before_purchase, options),
                format_number(s.purchases, options),
                s.first_timestamp.to_string(),
                s.last_purchase_timestamp.to_string(),
                format_number(s.discarded_events, options),
            ]
        })
        .collect();
    render_rows(
        &[
            "Product",
            "Views",
            "Purchases",
            "First seen",
            "Last purchase",
            "Discarded",
        ],
        rows,
    )
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        simd_json::to_string_pretty(value)?
    } else {
        simd_json::to_string(value)?
    };
    Ok(json)
}
