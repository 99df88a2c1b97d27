use std::time::Duration;

/// Asynchronously waits for the provided duration; returns immediately for a zero duration.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn zero_sleep_returns_immediately() {
        let started = Instant::now();
        sleep(Duration::ZERO).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn sleeps_for_requested_duration() {
        let started = Instant::now();
        sleep(Duration::from_millis(5)).await;
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
