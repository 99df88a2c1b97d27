use rand::Rng;

pub const DEFAULT_INTERVAL_MILLIS: u64 = 100;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;
pub const MAX_BACKOFF_MILLIS: u64 = 5_000;
pub const RANDOM_FACTOR: f64 = 0.5;

/// Exponential backoff with jitter, used between transaction attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub interval_millis: u64,
    pub backoff_factor: f64,
    pub max_millis: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            interval_millis: DEFAULT_INTERVAL_MILLIS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_millis: MAX_BACKOFF_MILLIS,
        }
    }
}

pub fn calculate_backoff_millis(backoff_count: u32, config: BackoffConfig) -> u64 {
    calculate_backoff_with_rng(backoff_count, config, &mut rand::thread_rng())
}

fn calculate_backoff_with_rng<R: Rng + ?Sized>(
    backoff_count: u32,
    config: BackoffConfig,
    rng: &mut R,
) -> u64 {
    let base = (config.interval_millis as f64) * config.backoff_factor.powi(backoff_count as i32);
    let jitter = RANDOM_FACTOR * base * rng.gen_range(-1.0..=1.0);
    let value = (base + jitter).round().clamp(0.0, config.max_millis as f64);
    value as u64
}
