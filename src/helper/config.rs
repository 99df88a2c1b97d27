use serde::{Deserialize, Serialize};

use crate::firestore::api::TransactionOptions;
use crate::helper::error::{configuration_error, HelperResult};
use crate::util::backoff::BackoffConfig;

pub const DEFAULT_ID_LENGTH: usize = 30;
pub const DEFAULT_QUERY_LIMIT: u32 = 25;
/// The store rejects transactions writing more than this many documents.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: usize = 5;
pub const CONNECTION_PROBE_ID: &str = "__test__";

/// Tunables for a [`FirestoreHelper`](crate::helper::FirestoreHelper).
///
/// Field names are camelCase on the wire so settings can live next to other JSON configuration:
///
/// ```
/// use firestore_helper::helper::HelperSettings;
///
/// let settings = HelperSettings::from_json_str(r#"{ "defaultQueryLimit": 50 }"#).unwrap();
/// assert_eq!(settings.default_query_limit, 50);
/// assert_eq!(settings.id_length, 30);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperSettings {
    pub id_length: usize,
    pub default_query_limit: u32,
    pub max_batch_size: usize,
    pub max_transaction_attempts: usize,
    /// Delay before the first transaction retry; later retries back off exponentially.
    pub retry_interval_millis: u64,
    /// Probe the store when [`FirestoreHelper::connect`](crate::helper::FirestoreHelper::connect) binds.
    pub verify_connection: bool,
    pub connection_probe_id: String,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            id_length: DEFAULT_ID_LENGTH,
            default_query_limit: DEFAULT_QUERY_LIMIT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            retry_interval_millis: BackoffConfig::default().interval_millis,
            verify_connection: true,
            connection_probe_id: CONNECTION_PROBE_ID.to_string(),
        }
    }
}

impl HelperSettings {
    pub fn from_json_str(input: &str) -> HelperResult<Self> {
        let settings: HelperSettings = serde_json::from_str(input)
            .map_err(|err| configuration_error(format!("Invalid helper settings: {err}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> HelperResult<()> {
        if self.id_length == 0 {
            return Err(configuration_error("idLength must be greater than zero"));
        }
        if self.default_query_limit == 0 {
            return Err(configuration_error(
                "defaultQueryLimit must be greater than zero",
            ));
        }
        if self.max_batch_size == 0 {
            return Err(configuration_error("maxBatchSize must be greater than zero"));
        }
        if self.max_transaction_attempts == 0 {
            return Err(configuration_error(
                "maxTransactionAttempts must be greater than zero",
            ));
        }
        if self.connection_probe_id.is_empty() || self.connection_probe_id.contains('/') {
            return Err(configuration_error(
                "connectionProbeId must be a non-empty document id",
            ));
        }
        Ok(())
    }

    pub(crate) fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            max_attempts: self.max_transaction_attempts,
            backoff: BackoffConfig {
                interval_millis: self.retry_interval_millis,
                ..BackoffConfig::default()
            },
        }
    }
}
