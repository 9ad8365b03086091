use crate::error::{MalformedRecordError, NormalizeResult};
use crate::types::{Event, EventKind, RawRecord};

/// Validate every record and convert it into a typed event.
///
/// Output order matches input order. The first malformed record aborts the
/// whole batch; use [`normalize_each`] to decide per record instead.
pub fn normalize<I>(records: I) -> NormalizeResult<Vec<Event>>
where
    I: IntoIterator<Item = RawRecord>,
{
    normalize_each(records).collect()
}

/// Lazily normalize records one by one, yielding a result per record.
pub fn normalize_each<I>(records: I) -> impl Iterator<Item = NormalizeResult<Event>>
where
    I: IntoIterator<Item = RawRecord>,
{
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index, record))
}

pub fn normalize_record(index: usize, record: RawRecord) -> NormalizeResult<Event> {
    let found = record.fields.len();
    let Ok([kind, timestamp, product_id]) = <[String; 3]>::try_from(record.fields) else {
        return Err(MalformedRecordError::FieldCount { index, found });
    };

    let kind = EventKind::from_token(&kind)
        .ok_or(MalformedRecordError::UnknownKind { index, kind })?;

    let timestamp = match parse_timestamp(&timestamp) {
        Some(ts) => ts,
        None => {
            return Err(MalformedRecordError::InvalidTimestamp {
                index,
                value: timestamp,
            });
        }
    };

    Ok(Event {
        kind,
        timestamp,
        product_id,
    })
}

/// Base-10 unsigned integer with optional surrounding whitespace and a single
/// optional leading `+`.
fn parse_timestamp(value: &str) -> Option<u64> {
    let trimmed = value.trim_ascii();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
