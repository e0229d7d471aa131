use crate::error::{ReporterError, Result};
use crate::exception::{ErrorKind, KindPattern, ReportingPolicy};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Key/value configuration store, seeded from the process environment.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::from_pairs(env::vars())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.set(key.as_ref(), value.as_ref());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse a value, `Ok(None)` when the key is absent.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| ReporterError::config(key, format!("{:?}: {}", raw, e)))
            })
            .transpose()
    }
}

pub const APP_NAME: &str = "APP_NAME";
pub const APP_DEBUG: &str = "APP_DEBUG";
pub const RECIPIENTS: &str = "ERROR_REPORT_RECIPIENTS";
pub const SUPPRESSED: &str = "ERROR_REPORT_SUPPRESSED";
pub const CAPTURED: &str = "ERROR_REPORT_CAPTURED";
pub const LOGIN_PATH: &str = "ERROR_REPORT_LOGIN_PATH";
pub const ATTACH_REQUEST: &str = "ERROR_REPORT_ATTACH_REQUEST";
pub const INPUT_LIMIT: &str = "ERROR_REPORT_INPUT_LIMIT";

/// Settings for the error-reporting filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Prefix of every notification subject.
    pub app_name: String,
    /// Show full error pages to callers.
    pub debug: bool,
    pub recipients: Vec<String>,
    pub policy: ReportingPolicy,
    pub login_path: String,
    /// Include the request snapshot in notifications.
    pub attach_request: bool,
    /// Largest request body scanned for inputs, in bytes.
    pub input_body_limit: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            app_name: "Site".to_string(),
            debug: false,
            recipients: Vec::new(),
            policy: ReportingPolicy::default(),
            login_path: "/login".to_string(),
            attach_request: true,
            input_body_limit: 64 * 1024,
        }
    }
}

impl ReporterConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::new())
    }

    /// Load from a config store; absent keys keep their defaults.
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();

        let policy = match (config.get(SUPPRESSED), config.get(CAPTURED)) {
            (None, None) => defaults.policy,
            (suppressed, captured) => ReportingPolicy::new(
                match suppressed {
                    Some(raw) => parse_list::<ErrorKind>(SUPPRESSED, &raw)?,
                    None => defaults.policy.suppressed().iter().copied().collect::<Vec<_>>(),
                },
                match captured {
                    Some(raw) => parse_list::<KindPattern>(CAPTURED, &raw)?,
                    None => defaults.policy.captured().iter().copied().collect::<Vec<_>>(),
                },
            ),
        };

        Ok(Self {
            app_name: config.get(APP_NAME).unwrap_or(defaults.app_name),
            debug: config.get_parsed(APP_DEBUG)?.unwrap_or(defaults.debug),
            recipients: match config.get(RECIPIENTS) {
                Some(raw) => parse_list::<String>(RECIPIENTS, &raw)?,
                None => defaults.recipients,
            },
            policy,
            login_path: config.get(LOGIN_PATH).unwrap_or(defaults.login_path),
            attach_request: config
                .get_parsed(ATTACH_REQUEST)?
                .unwrap_or(defaults.attach_request),
            input_body_limit: config
                .get_parsed(INPUT_LIMIT)?
                .unwrap_or(defaults.input_body_limit),
        })
    }
}

/// Comma-separated list; blank entries are skipped.
fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| ReporterError::config(key, format!("{:?}: {}", item, e)))
        })
        .collect()
}
