use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::auth::UserDirectory;
use crate::calendar::{parse_time_of_day, Calendar, SlotCatalogue};
use crate::compactor::CHECK_INTERVAL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

/// Server settings, read once at startup from `HALLBOOK_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// The WAL lives at `<data_dir>/bookings.wal`.
    pub data_dir: PathBuf,
    pub users: UserDirectory,
    /// Empty means any hall name is accepted.
    pub halls: Vec<String>,
    pub max_connections: usize,
    /// Appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
    pub calendar: Calendar,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset and empty variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        fn parsed<T: FromStr>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                Some(raw) => raw.parse().map_err(|e| invalid(var, format!("{raw:?}: {e}"))),
                None => Ok(default),
            }
        }

        let users = UserDirectory::parse(
            &get("HALLBOOK_USERS").unwrap_or_else(|| "hallbook:hallbook:admin".into()),
        )
        .map_err(|e| invalid("HALLBOOK_USERS", e))?;

        let halls = get("HALLBOOK_HALLS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let slot_start = match get("HALLBOOK_SLOT_START") {
            Some(raw) => parse_time_of_day(&raw).map_err(|e| invalid("HALLBOOK_SLOT_START", e))?,
            None => parse_time_of_day("09:00").map_err(|e| invalid("HALLBOOK_SLOT_START", e))?,
        };
        let catalogue = SlotCatalogue::new(
            slot_start,
            parsed(get("HALLBOOK_SLOT_MINUTES"), "HALLBOOK_SLOT_MINUTES", 60)?,
            parsed(get("HALLBOOK_SLOT_COUNT"), "HALLBOOK_SLOT_COUNT", 8)?,
        )
        .map_err(|e| invalid("HALLBOOK_SLOT_*", e))?;
        let calendar = Calendar::new(
            parsed(get("HALLBOOK_TZ_OFFSET_MINUTES"), "HALLBOOK_TZ_OFFSET_MINUTES", 0)?,
            catalogue,
        )
        .map_err(|e| invalid("HALLBOOK_TZ_OFFSET_MINUTES", e))?;

        let max_connections = parsed(get("HALLBOOK_MAX_CONNECTIONS"), "HALLBOOK_MAX_CONNECTIONS", 256)?;
        if max_connections == 0 {
            return Err(invalid("HALLBOOK_MAX_CONNECTIONS", "must be at least 1"));
        }

        let metrics_port = get("HALLBOOK_METRICS_PORT")
            .map(|raw| raw.parse::<u16>().map_err(|e| invalid("HALLBOOK_METRICS_PORT", format!("{raw:?}: {e}"))))
            .transpose()?;

        Ok(Self {
            bind: get("HALLBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(get("HALLBOOK_PORT"), "HALLBOOK_PORT", 5433)?,
            data_dir: PathBuf::from(get("HALLBOOK_DATA_DIR").unwrap_or_else(|| "./data".into())),
            users,
            halls,
            max_connections,
            compact_threshold: parsed(get("HALLBOOK_COMPACT_THRESHOLD"), "HALLBOOK_COMPACT_THRESHOLD", 1000)?,
            compact_interval: CHECK_INTERVAL,
            tls_cert: get("HALLBOOK_TLS_CERT"),
            tls_key: get("HALLBOOK_TLS_KEY"),
            metrics_port,
            calendar,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5433");
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/bookings.wal"));
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.compact_threshold, 1000);
        assert!(cfg.halls.is_empty());
        assert!(cfg.users.identity("hallbook").is_some_and(|id| id.is_admin()));
        assert_eq!(cfg.calendar.catalogue, SlotCatalogue::default());
        assert_eq!(cfg.metrics_port, None);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("HALLBOOK_PORT", "6543"),
            ("HALLBOOK_HALLS", "Auditorium, Seminar Room ,"),
            ("HALLBOOK_USERS", "alice:pw:user,root:pw:admin"),
            ("HALLBOOK_TZ_OFFSET_MINUTES", "330"),
            ("HALLBOOK_SLOT_START", "08:30"),
            ("HALLBOOK_SLOT_MINUTES", "30"),
            ("HALLBOOK_SLOT_COUNT", "4"),
            ("HALLBOOK_METRICS_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 6543);
        assert_eq!(cfg.halls, vec!["Auditorium", "Seminar Room"]);
        assert_eq!(cfg.users.len(), 2);
        assert_eq!(cfg.calendar.offset.local_minus_utc(), 330 * 60);
        assert_eq!(cfg.calendar.catalogue.first_start_minute, 8 * 60 + 30);
        assert_eq!(cfg.calendar.catalogue.count, 4);
        assert_eq!(cfg.metrics_port, Some(9000));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config(&[("HALLBOOK_PORT", "port")]).is_err());
        assert!(config(&[("HALLBOOK_USERS", "alice")]).is_err());
        assert!(config(&[("HALLBOOK_SLOT_START", "9am")]).is_err());
        assert!(config(&[("HALLBOOK_SLOT_COUNT", "30")]).is_err());
        assert!(config(&[("HALLBOOK_TZ_OFFSET_MINUTES", "100000")]).is_err());
        assert!(config(&[("HALLBOOK_MAX_CONNECTIONS", "0")]).is_err());
        let err = config(&[("HALLBOOK_METRICS_PORT", "70000")]).unwrap_err();
        assert!(err.to_string().starts_with("HALLBOOK_METRICS_PORT"));
    }
}
