use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::firestore::value::{FirestoreValue, ValueKind};
use crate::helper::error::{invalid_argument, validation_error, HelperResult};
use crate::helper::DocumentMap;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
/// Reserved: a document's id lives in its key, never in its fields.
pub const ID_FIELD: &str = "id";

/// Source of "now" for timestamp stamping, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

pub fn reject_id_field(data: &DocumentMap) -> HelperResult<()> {
    if data.contains_key(ID_FIELD) {
        return Err(invalid_argument(
            "Document data must not contain an 'id' field",
        ));
    }
    Ok(())
}

/// Checks that `createdAt` / `updatedAt`, when present, are non-negative integers.
pub fn validate_timestamp_fields(data: &DocumentMap) -> HelperResult<()> {
    for field in [CREATED_AT, UPDATED_AT] {
        let Some(value) = data.get(field) else {
            continue;
        };
        match value.kind() {
            ValueKind::Integer(millis) if *millis >= 0 => {}
            _ => {
                return Err(validation_error(format!(
                    "{field} must be a non-negative integer timestamp in milliseconds, got {value}"
                )))
            }
        }
    }
    Ok(())
}

/// Reads a timestamp field written by the stamper.
pub fn timestamp_millis(data: &DocumentMap, field: &str) -> Option<i64> {
    data.get(field).and_then(FirestoreValue::as_integer)
}

/// Sets both timestamps from a single clock reading, keeping `existing_created_at` when given.
pub fn stamp_for_create(
    mut data: DocumentMap,
    existing_created_at: Option<i64>,
    now: i64,
) -> DocumentMap {
    let created_at = existing_created_at.unwrap_or(now);
    data.insert(CREATED_AT.to_string(), FirestoreValue::from_integer(created_at));
    data.insert(UPDATED_AT.to_string(), FirestoreValue::from_integer(now));
    data
}

/// Refreshes `updatedAt` and strips any `createdAt`, which only the create path may write.
///
/// `updatedAt` never moves backwards relative to `previous_updated_at`.
pub fn stamp_for_update(
    mut data: DocumentMap,
    previous_updated_at: Option<i64>,
    now: i64,
) -> DocumentMap {
    data.remove(CREATED_AT);
    let updated_at = previous_updated_at.map_or(now, |previous| previous.max(now));
    data.insert(UPDATED_AT.to_string(), FirestoreValue::from_integer(updated_at));
    data
}
