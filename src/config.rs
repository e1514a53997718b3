use std::env;
use std::time::Duration;

use crate::engine::lifecycle::StageDurations;
use crate::engine::routing::RoutingPolicy;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub routing: RoutingPolicy,
    pub stages: StageDurations,
    pub failure_queue_size: usize,
    pub event_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            routing: RoutingPolicy::default(),
            stages: StageDurations::default(),
            failure_queue_size: 1024,
            event_buffer_size: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let proximity_threshold_m = parse_or_default(
            "PROXIMITY_THRESHOLD_M",
            defaults.routing.proximity_threshold_m,
        )?;
        if !proximity_threshold_m.is_finite() || proximity_threshold_m < 0.0 {
            return Err(AppError::Internal(format!(
                "invalid PROXIMITY_THRESHOLD_M: {proximity_threshold_m}"
            )));
        }

        let time_unit = Duration::from_millis(parse_or_default("TIME_UNIT_MS", 1000u64)?);
        let stages = StageDurations {
            time_unit,
            accept_units: parse_or_default("STAGE_ACCEPT_UNITS", defaults.stages.accept_units)?,
            pickup_units: parse_or_default("STAGE_PICKUP_UNITS", defaults.stages.pickup_units)?,
            deliver_units: parse_or_default("STAGE_DELIVER_UNITS", defaults.stages.deliver_units)?,
        };
        validate_stages(&stages)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_log_format(env::var("LOG_FORMAT").ok().as_deref())?,
            routing: RoutingPolicy {
                proximity_threshold_m,
                nearest_area_count: parse_or_default(
                    "NEAREST_AREA_COUNT",
                    defaults.routing.nearest_area_count,
                )?,
            },
            stages,
            failure_queue_size: parse_or_default("FAILURE_QUEUE_SIZE", defaults.failure_queue_size)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
        })
    }
}

fn validate_stages(stages: &StageDurations) -> Result<(), AppError> {
    stages.checked_waits().map(|_| ()).ok_or_else(|| {
        AppError::Internal(format!(
            "stage durations overflow: TIME_UNIT_MS={} with {}/{}/{} units",
            stages.time_unit.as_millis(),
            stages.accept_units,
            stages.pickup_units,
            stages.deliver_units
        ))
    })
}

fn parse_log_format(raw: Option<&str>) -> Result<LogFormat, AppError> {
    match raw {
        None | Some("compact") => Ok(LogFormat::Compact),
        Some("json") => Ok(LogFormat::Json),
        Some(other) => Err(AppError::Internal(format!(
            "invalid LOG_FORMAT: {other}, expected compact/json"
        ))),
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
