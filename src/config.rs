use std::time::Duration;

/// Default tracking-service endpoint.
pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9512;

/// Per-call timeout for tracking-service requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Bounded best-effort init retry: attempts and inter-attempt delay.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Tracking-service connection settings.
///
/// `max_attempts`/`retry_delay` bound the init retry loop in
/// [`TrackingAdapter::run`](crate::TrackingAdapter::run); tests use a zero
/// delay to keep the loop deterministic.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub address: String,
    pub port: u16,
    /// Timeout applied to individual service calls.
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = ServiceConfig::default();
        assert_eq!(config.address, "localhost");
        assert_eq!(config.port, 9512);
        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }
}
