//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::onboarding::registry::DEFAULT_SESSION_TTL;

/// Which record store backend to persist onboarded policies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Sheets via the v4 REST API.
    Sheets,
    /// Local libSQL database file.
    LibSql,
    /// Process memory (lost on exit).
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sheets" | "google_sheets" => Ok(Self::Sheets),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "POLICY_ONBOARD_STORE".to_string(),
                message: format!("unknown backend '{other}' (expected sheets, libsql or memory)"),
            }),
        }
    }
}

/// Google Sheets connection settings.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// A1-notation range rows are appended after, e.g. `Sheet1`.
    pub range: String,
    pub access_token: SecretString,
    pub base_url: String,
    pub timeout: Duration,
}

/// Application configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub backend: StoreBackend,
    pub sheets: Option<SheetsConfig>,
    pub db_path: PathBuf,
    /// Idle time after which an onboarding session is discarded.
    pub session_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("POLICY_ONBOARD_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "POLICY_ONBOARD_PORT".to_string(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => 8080,
        };

        let spreadsheet_id = lookup("GOOGLE_SHEETS_SPREADSHEET_ID").filter(|s| !s.trim().is_empty());

        let backend = match lookup("POLICY_ONBOARD_STORE") {
            Some(raw) => raw.parse()?,
            None if spreadsheet_id.is_some() => StoreBackend::Sheets,
            None => StoreBackend::LibSql,
        };

        let sheets = if backend == StoreBackend::Sheets {
            let spreadsheet_id = spreadsheet_id.ok_or_else(|| ConfigError::MissingRequired {
                key: "GOOGLE_SHEETS_SPREADSHEET_ID".to_string(),
                hint: "Set it to the ID of the policies spreadsheet.".to_string(),
            })?;
            let access_token = lookup("GOOGLE_SHEETS_ACCESS_TOKEN")
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingRequired {
                    key: "GOOGLE_SHEETS_ACCESS_TOKEN".to_string(),
                    hint: "Provide an OAuth access token with the spreadsheets scope.".to_string(),
                })?;
            let timeout_secs: u64 = match lookup("GOOGLE_SHEETS_TIMEOUT_SECS") {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "GOOGLE_SHEETS_TIMEOUT_SECS".to_string(),
                    message: format!("'{raw}' is not a number of seconds"),
                })?,
                None => 30,
            };

            Some(SheetsConfig {
                spreadsheet_id,
                range: lookup("GOOGLE_SHEETS_RANGE").unwrap_or_else(|| "Sheet1".to_string()),
                access_token: SecretString::from(access_token),
                base_url: lookup("GOOGLE_SHEETS_BASE_URL")
                    .unwrap_or_else(|| "https://sheets.googleapis.com".to_string()),
                timeout: Duration::from_secs(timeout_secs),
            })
        } else {
            None
        };

        let db_path = lookup("POLICY_ONBOARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/policies.db"));

        let session_ttl = match lookup("POLICY_ONBOARD_SESSION_TTL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "POLICY_ONBOARD_SESSION_TTL_SECS".to_string(),
                        message: format!("'{raw}' is not a positive number of seconds"),
                    });
                }
            },
            None => DEFAULT_SESSION_TTL,
        };

        Ok(Self {
            port,
            backend,
            sheets,
            db_path,
            session_ttl,
        })
    }
}
