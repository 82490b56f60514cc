//! Minimal runtime configuration helpers.
//! Provider configuration attributes take precedence over these environment defaults.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOKEN_PATH: &str = "tado-token.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the OAuth token is read from and written back to.
    pub token_path: PathBuf,
    /// Global timeout applied to every HTTP request.
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_path = match lookup("TADO_TOKEN_PATH") {
            Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
            _ => PathBuf::from(DEFAULT_TOKEN_PATH),
        };

        let http_timeout_secs = match lookup("TADO_HTTP_TIMEOUT_SECS") {
            Some(v) if !v.trim().is_empty() => match v.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Err("TADO_HTTP_TIMEOUT_SECS must be a positive integer".to_string()),
            },
            _ => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Config {
            token_path,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(cfg.token_path, PathBuf::from(DEFAULT_TOKEN_PATH));
        assert_eq!(cfg.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = Config::from_lookup(lookup_in(&[
            ("TADO_TOKEN_PATH", " /var/lib/tado/token.json "),
            ("TADO_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.token_path, PathBuf::from("/var/lib/tado/token.json"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(Config::from_lookup(lookup_in(&[("TADO_HTTP_TIMEOUT_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_in(&[("TADO_HTTP_TIMEOUT_SECS", "soon")])).is_err());
    }
}
