use std::env;
use std::time::Duration;

/// Upper bound on `RETRY_ATTEMPTS`; a request never waits through more
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// How long a request may wait for a book or user lock before failing with `Busy`
    pub lock_timeout: Duration,
    /// Total attempts for a request that keeps hitting `Busy`
    pub retry_attempts: u32,
    /// Delay before the first retry; doubled on each further attempt
    pub retry_backoff: Duration,
    /// Loyalty points for returning an issued book on time
    pub return_points: i32,
    pub profile: String,
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            if profile == "default" {
                "sqlite://circulation.db?mode=rwc".to_string()
            } else {
                format!("sqlite://circulation_{}.db?mode=rwc", profile)
            }
        });

        Self {
            database_url,
            lock_timeout: Duration::from_millis(parse_var("LOCK_TIMEOUT_MS", 2_000)),
            retry_attempts: parse_var("RETRY_ATTEMPTS", 3u32).clamp(1, MAX_RETRY_ATTEMPTS),
            retry_backoff: Duration::from_millis(parse_var("RETRY_BACKOFF_MS", 25)),
            return_points: parse_var("RETURN_POINTS", 10),
            profile,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            lock_timeout: Duration::from_millis(2_000),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(25),
            return_points: 10,
            profile: "default".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}='{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 6] = [
        "PROFILE",
        "DATABASE_URL",
        "LOCK_TIMEOUT_MS",
        "RETRY_ATTEMPTS",
        "RETRY_BACKOFF_MS",
        "RETURN_POINTS",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn defaults_when_unset() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.database_url, "sqlite://circulation.db?mode=rwc");
        assert_eq!(config.lock_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.return_points, 10);
    }

    #[test]
    #[serial]
    fn reads_overrides_and_ignores_garbage() {
        clear_env();
        unsafe {
            env::set_var("PROFILE", "branch");
            env::set_var("LOCK_TIMEOUT_MS", "150");
            env::set_var("RETRY_ATTEMPTS", "0");
            env::set_var("RETURN_POINTS", "lots");
        }
        let config = Config::from_env();
        assert_eq!(config.database_url, "sqlite://circulation_branch.db?mode=rwc");
        assert_eq!(config.lock_timeout, Duration::from_millis(150));
        // At least one attempt is always made
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.return_points, 10);
        clear_env();
    }

    #[test]
    #[serial]
    fn retry_attempts_are_capped() {
        clear_env();
        unsafe { env::set_var("RETRY_ATTEMPTS", "500") };
        let config = Config::from_env();
        assert_eq!(config.retry_attempts, MAX_RETRY_ATTEMPTS);
        clear_env();
    }
}
