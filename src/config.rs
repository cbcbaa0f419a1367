use std::env;
use std::time::Duration;

use crate::services::coordinator::CoordinatorSettings;
use crate::services::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub cache_ttl_secs: u64,
    pub provider_timeout_secs: u64,
    pub service_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub default_days_ahead: u32,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "servicebook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", 30),
            provider_timeout_secs: parse_var("PROVIDER_TIMEOUT_SECS", 15),
            service_timeout_secs: parse_var("SERVICE_TIMEOUT_SECS", 6),
            retry_attempts: parse_var("RETRY_ATTEMPTS", 3),
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", 1000),
            default_days_ahead: parse_var("DEFAULT_DAYS_AHEAD", 14),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        }
    }

    pub fn twilio_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_phone_number.is_empty()
    }

    /// Settings for the provider and service lookup coordinators, in that order.
    pub fn coordinator_settings(&self) -> (CoordinatorSettings, CoordinatorSettings) {
        let ttl = Duration::from_secs(self.cache_ttl_secs);
        let retry = RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        };
        (
            CoordinatorSettings {
                ttl,
                timeout: Duration::from_secs(self.provider_timeout_secs),
                retry: retry.clone(),
            },
            CoordinatorSettings {
                ttl,
                timeout: Duration::from_secs(self.service_timeout_secs),
                retry,
            },
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
