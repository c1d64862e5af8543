//! Server configuration, read from `ROLLCALL_*` environment variables.
//!
//! | Variable                       | Default          | Meaning                              |
//! |--------------------------------|------------------|--------------------------------------|
//! | `ROLLCALL_BIND`                | `127.0.0.1:8080` | listen address                       |
//! | `ROLLCALL_TOKEN_TTL_SECS`      | `15`             | token lifetime                       |
//! | `ROLLCALL_TOKEN_LENGTH`        | `8`              | characters per token                 |
//! | `ROLLCALL_SESSION_SCOPE`       | `per-teacher`    | `per-teacher` or `global`            |
//! | `ROLLCALL_STORE_TIMEOUT_MS`    | `2000`           | upper bound on a record-store call   |
//! | `ROLLCALL_SWEEP_INTERVAL_MS`   | `0`              | rotation sweep period, `0` disables  |
//! | `ROLLCALL_IDLE_TIMEOUT_SECS`   | `300`            | close silent connections after this  |
//! | `ROLLCALL_TEACHERS`            | (none)           | seed accounts, `alice:pw1,bob:pw2`   |
//!
//! Unparseable values are logged and ignored; the default stays in force.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rollcall_protocol::TeacherId;
use rollcall_session::{SessionConfig, SessionScope};
use rollcall_sweep::SweepConfig;

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// Token lifetime, length, scope and store timeout.
    pub session: SessionConfig,
    /// Background rotation sweep. Off by default: tokens rotate only when
    /// a teacher asks for the current one, so a stale token is reported as
    /// `TokenExpired` rather than `InvalidToken`.
    pub sweep: SweepConfig,
    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,
    /// Teacher accounts to create at startup.
    pub teachers: Vec<(TeacherId, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session: SessionConfig::default(),
            sweep: SweepConfig::default(),
            idle_timeout: Duration::from_secs(300),
            teachers: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key → value source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut c = Self::default();

        if let Some(v) = lookup("ROLLCALL_BIND") {
            c.bind_addr = v;
        }
        if let Some(secs) = parse::<u64>(&lookup, "ROLLCALL_TOKEN_TTL_SECS") {
            c.session.token_ttl = Duration::from_secs(secs);
        }
        if let Some(len) = parse::<usize>(&lookup, "ROLLCALL_TOKEN_LENGTH") {
            c.session.token_length = len;
        }
        if let Some(scope) = parse::<SessionScope>(&lookup, "ROLLCALL_SESSION_SCOPE") {
            c.session.scope = scope;
        }
        if let Some(ms) = parse::<u64>(&lookup, "ROLLCALL_STORE_TIMEOUT_MS") {
            c.session.store_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "ROLLCALL_SWEEP_INTERVAL_MS") {
            c.sweep.interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(secs) = parse::<u64>(&lookup, "ROLLCALL_IDLE_TIMEOUT_SECS") {
            c.idle_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(v) = lookup("ROLLCALL_TEACHERS") {
            c.teachers = parse_teachers(&v);
        }

        c.session = c.session.validated();
        c
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid setting");
            None
        }
    }
}

/// `alice:pw1,bob:pw2` → `[(alice, pw1), (bob, pw2)]`. Entries without a
/// colon are skipped.
fn parse_teachers(raw: &str) -> Vec<(TeacherId, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once(':') {
                Some((teacher, password)) => {
                    Some((TeacherId::from(teacher.trim()), password.to_string()))
                }
                None => {
                    tracing::warn!(entry, "ROLLCALL_TEACHERS entry has no password");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_lookup_empty_gives_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.session.token_ttl, Duration::from_secs(15));
        assert!(config.sweep.interval.is_none(), "sweep is opt-in");
        assert!(config.teachers.is_empty());
    }

    #[test]
    fn test_from_lookup_reads_every_setting() {
        let config = config_from(&[
            ("ROLLCALL_BIND", "0.0.0.0:9000"),
            ("ROLLCALL_TOKEN_TTL_SECS", "30"),
            ("ROLLCALL_TOKEN_LENGTH", "10"),
            ("ROLLCALL_SESSION_SCOPE", "global"),
            ("ROLLCALL_STORE_TIMEOUT_MS", "500"),
            ("ROLLCALL_SWEEP_INTERVAL_MS", "250"),
            ("ROLLCALL_IDLE_TIMEOUT_SECS", "60"),
            ("ROLLCALL_TEACHERS", "alice:pw1, bob:pw2"),
        ]);

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.session.token_ttl, Duration::from_secs(30));
        assert_eq!(config.session.token_length, 10);
        assert_eq!(config.session.scope, SessionScope::Global);
        assert_eq!(config.session.store_timeout, Duration::from_millis(500));
        assert_eq!(config.sweep.interval, Some(Duration::from_millis(250)));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(
            config.teachers,
            vec![
                (TeacherId::from("alice"), "pw1".to_string()),
                (TeacherId::from("bob"), "pw2".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_lookup_invalid_number_keeps_default() {
        let config = config_from(&[("ROLLCALL_TOKEN_TTL_SECS", "soon")]);
        assert_eq!(config.session.token_ttl, Duration::from_secs(15));
    }

    #[test]
    fn test_from_lookup_zero_sweep_disables_it() {
        let config = config_from(&[("ROLLCALL_SWEEP_INTERVAL_MS", "0")]);
        assert!(config.sweep.interval.is_none());
    }

    #[test]
    fn test_from_lookup_clamps_token_length() {
        let config = config_from(&[("ROLLCALL_TOKEN_LENGTH", "1000")]);
        assert_eq!(config.session.token_length, SessionConfig::MAX_TOKEN_LENGTH);
    }

    #[test]
    fn test_parse_teachers_skips_entries_without_password() {
        let teachers = parse_teachers("alice:pw1,,nobody,bob:p:w");
        assert_eq!(
            teachers,
            vec![
                (TeacherId::from("alice"), "pw1".to_string()),
                (TeacherId::from("bob"), "p:w".to_string()),
            ]
        );
    }
}
