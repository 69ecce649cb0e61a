use std::env;

use chrono::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub zone_buffer_size: usize,
    pub dispatch: DispatchSettings,
}

/// Tunables for the dispatch core. Earnings constants are global, not
/// per-store; windows are fixed per phase.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub base_pay: f64,
    pub bonus: f64,
    /// Fraction of the item price paid to the rider on top of base + bonus.
    pub earnings_rate: f64,
    pub offer_ttl_secs: i64,
    pub pickup_window_secs: i64,
    pub delivery_window_secs: i64,
    pub pickup_code_ttl_secs: i64,
    pub max_code_attempts: u32,
}

impl DispatchSettings {
    pub fn offer_ttl(&self) -> Duration {
        Duration::seconds(self.offer_ttl_secs)
    }

    pub fn pickup_window(&self) -> Duration {
        Duration::seconds(self.pickup_window_secs)
    }

    pub fn delivery_window(&self) -> Duration {
        Duration::seconds(self.delivery_window_secs)
    }

    pub fn pickup_code_ttl(&self) -> Duration {
        Duration::seconds(self.pickup_code_ttl_secs)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            base_pay: 500.0,
            bonus: 100.0,
            earnings_rate: 0.10,
            offer_ttl_secs: 120,
            pickup_window_secs: 1_800,
            delivery_window_secs: 3_600,
            pickup_code_ttl_secs: 7_200,
            max_code_attempts: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = DispatchSettings::default();
        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            zone_buffer_size: parse_or_default("ZONE_BUFFER_SIZE", 256)?,
            dispatch: DispatchSettings {
                base_pay: parse_or_default("RIDER_BASE_PAY", defaults.base_pay)?,
                bonus: parse_or_default("RIDER_BONUS", defaults.bonus)?,
                earnings_rate: parse_or_default("RIDER_EARNINGS_RATE", defaults.earnings_rate)?,
                offer_ttl_secs: parse_or_default("OFFER_TTL_SECS", defaults.offer_ttl_secs)?,
                pickup_window_secs: parse_or_default(
                    "PICKUP_WINDOW_SECS",
                    defaults.pickup_window_secs,
                )?,
                delivery_window_secs: parse_or_default(
                    "DELIVERY_WINDOW_SECS",
                    defaults.delivery_window_secs,
                )?,
                pickup_code_ttl_secs: parse_or_default(
                    "PICKUP_CODE_TTL_SECS",
                    defaults.pickup_code_ttl_secs,
                )?,
                max_code_attempts: parse_or_default(
                    "MAX_CODE_ATTEMPTS",
                    defaults.max_code_attempts,
                )?,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
