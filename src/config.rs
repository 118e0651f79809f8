use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::lifecycle::AutoApprovePolicy;
use crate::lifecycle::sweep::DEFAULT_STALE_THRESHOLD_DAYS;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    // Collaborator services; default to the scopes this process serves
    pub request_service_url: String,
    pub request_dates_service_url: String,
    pub status_log_service_url: String,
    pub upstream_timeout_secs: u64,

    pub stale_threshold_days: u64,
    pub auto_approve_staff_ids: Vec<u64>,

    // Rate limiting
    pub rate_lifecycle_per_min: u32,
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_staff_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("AUTO_APPROVE_STAFF_IDS has an invalid staff id '{}'", s))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let server_addr = env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?;
        let local_base = format!("http://{}", server_addr);

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            request_service_url: env::var("REQUEST_SERVICE_URL")
                .unwrap_or_else(|_| format!("{}/request", local_base)),
            request_dates_service_url: env::var("REQUEST_DATES_SERVICE_URL")
                .unwrap_or_else(|_| format!("{}/request_dates", local_base)),
            status_log_service_url: env::var("STATUS_LOG_SERVICE_URL")
                .unwrap_or_else(|_| format!("{}/status_log", local_base)),
            upstream_timeout_secs: var_or("UPSTREAM_TIMEOUT_SECS", 10)?,
            stale_threshold_days: var_or("STALE_THRESHOLD_DAYS", DEFAULT_STALE_THRESHOLD_DAYS)?,
            auto_approve_staff_ids: parse_staff_ids(
                &env::var("AUTO_APPROVE_STAFF_IDS").unwrap_or_default(),
            )?,
            rate_lifecycle_per_min: var_or("RATE_LIFECYCLE_PER_MIN", 1000)?,
            server_addr,
        })
    }

    pub fn auto_approve_policy(&self) -> AutoApprovePolicy {
        AutoApprovePolicy::new(self.auto_approve_staff_ids.iter().copied())
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/wfh_scheduling_test".into(),
            server_addr: "127.0.0.1:0".into(),
            request_service_url: "http://127.0.0.1:0/request".into(),
            request_dates_service_url: "http://127.0.0.1:0/request_dates".into(),
            status_log_service_url: "http://127.0.0.1:0/status_log".into(),
            upstream_timeout_secs: 1,
            stale_threshold_days: DEFAULT_STALE_THRESHOLD_DAYS,
            auto_approve_staff_ids: Vec::new(),
            rate_lifecycle_per_min: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_id_list_parsing() {
        assert_eq!(parse_staff_ids("").unwrap(), Vec::<u64>::new());
        assert_eq!(parse_staff_ids("130002, 140001,").unwrap(), vec![130002, 140001]);
        assert!(parse_staff_ids("130002,abc").is_err());
    }

    #[test]
    fn policy_comes_from_the_staff_list() {
        let mut config = Config::for_tests();
        config.auto_approve_staff_ids = vec![130002];
        let policy = config.auto_approve_policy();
        assert_eq!(
            policy.initial_status(130002),
            crate::model::request_date::RequestStatus::Approved
        );
    }
}
