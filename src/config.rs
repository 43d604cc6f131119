//! Provider configuration
//!
//! Settings come from a TOML file; anything the file leaves unset falls back
//! to the matching environment variable.
//!
//! ```toml
//! host = "https://usegalaxy.example.org"
//! api_key = "0123456789abcdef"
//! wait_for_host = 300
//! poll_interval = 2
//! state_file = "~/galaxy/state.toml"
//! ```

use crate::cancel::CancelToken;
use crate::paths;
use anyhow::{Context, Result, bail};
use declarative::{Diagnostic, Diagnostics};
use galaxykit::backend::http::GalaxyBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const ENV_HOST: &str = "GALAXY_HOST";
pub const ENV_API_KEY: &str = "GALAXY_API_KEY";
pub const ENV_WAIT: &str = "GALAXY_WAIT";
pub const ENV_POLL_INTERVAL: &str = "GALAXY_POLL_INTERVAL";

/// Seconds between job state polls unless configured otherwise
pub const DEFAULT_POLL_INTERVAL: u64 = 2;

/// Delay between host probes while waiting for Galaxy to come up
pub const HOST_PROBE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Galaxy instance URL
    pub host: String,
    /// API key of an administrator account
    pub api_key: String,
    /// Seconds to wait for the host to answer before connecting, 0 for forever
    pub wait_for_host: Option<u64>,
    /// Seconds between job state polls
    pub poll_interval: Option<u64>,
    /// Where resource state is persisted
    pub state_file: Option<String>,
}

impl ProviderConfig {
    /// Load `path` (if it exists) and fill the gaps from the environment
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load the default config file location
    pub fn load_default() -> Result<Self> {
        Self::load(&paths::config_file()?)
    }

    /// Parse a config file, or return the empty config if it doesn't exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Fill unset settings through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.host.is_empty()
            && let Some(host) = lookup(ENV_HOST)
        {
            self.host = host;
        }
        if self.api_key.is_empty()
            && let Some(key) = lookup(ENV_API_KEY)
        {
            self.api_key = key;
        }
        if self.wait_for_host.is_none()
            && let Some(wait) = lookup(ENV_WAIT)
        {
            self.wait_for_host = Some(
                wait.trim()
                    .parse()
                    .with_context(|| format!("{ENV_WAIT} must be a number of seconds"))?,
            );
        }
        if self.poll_interval.is_none()
            && let Some(interval) = lookup(ENV_POLL_INTERVAL)
        {
            self.poll_interval = Some(
                interval
                    .trim()
                    .parse()
                    .with_context(|| format!("{ENV_POLL_INTERVAL} must be a number of seconds"))?,
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("Galaxy host URL must be provided and non-empty");
        }
        if self.api_key.trim().is_empty() {
            bail!("API key must be provided and non-empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL))
    }

    /// Resolved state file path
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(paths::expand(path)),
            None => paths::state_file(),
        }
    }

    /// Build a backend for the configured host.
    ///
    /// Waits for the host first when `wait_for_host` is set, then checks the
    /// connection. A failed check is reported but still yields the backend.
    pub fn connect(&self, cancel: &CancelToken) -> Result<(GalaxyBackend, Diagnostics)> {
        self.validate()?;
        let backend = GalaxyBackend::new(&self.host, &self.api_key);

        if let Some(wait) = self.wait_for_host {
            let limit = (wait > 0).then(|| Duration::from_secs(wait));
            wait_for_host(|| backend.probe().ok(), limit, HOST_PROBE_INTERVAL, cancel);
        }

        let mut diags = Diagnostics::new();
        if let Err(e) = backend.version() {
            diags.push(
                Diagnostic::error("cannot connect to Galaxy")
                    .with_detail(e.to_string())
                    .for_resource(self.host.clone()),
            );
        }
        Ok((backend, diags))
    }
}

/// Probe until the host answers with a status below 400.
///
/// Gives up after `limit` (`None` waits forever) or on cancellation. Returns
/// whether the host came up.
pub fn wait_for_host<P>(
    probe: P,
    limit: Option<Duration>,
    interval: Duration,
    cancel: &CancelToken,
) -> bool
where
    P: Fn() -> Option<u16>,
{
    let start = Instant::now();
    loop {
        if probe().is_some_and(|status| status < 400) {
            return true;
        }
        if limit.is_some_and(|limit| start.elapsed() >= limit) {
            log::warn!("Galaxy host did not come up in time");
            return false;
        }
        log::info!("Waiting for Galaxy host..");
        if cancel.wait(interval) {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "host = \"https://galaxy.example.org\"\napi_key = \"abc\"\npoll_interval = 5\n",
        )
        .unwrap();

        let config = ProviderConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "https://galaxy.example.org");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = ProviderConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(DEFAULT_POLL_INTERVAL));
    }

    #[test]
    fn test_env_fills_gaps_only() {
        let mut config = ProviderConfig {
            host: "https://from-file.example.org".into(),
            ..ProviderConfig::default()
        };
        config
            .apply_env_from(env(&[
                (ENV_HOST, "https://from-env.example.org"),
                (ENV_API_KEY, "envkey"),
                (ENV_WAIT, "0"),
            ]))
            .unwrap();
        assert_eq!(config.host, "https://from-file.example.org");
        assert_eq!(config.api_key, "envkey");
        assert_eq!(config.wait_for_host, Some(0));
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = ProviderConfig::default();
        let err = config
            .apply_env_from(env(&[(ENV_POLL_INTERVAL, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_POLL_INTERVAL));
    }

    #[test]
    fn test_validate_requires_host_and_key() {
        let err = ProviderConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("host"));

        let config = ProviderConfig {
            host: "https://galaxy.example.org".into(),
            ..ProviderConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("API key"));
    }

    #[test]
    fn test_state_path_expands() {
        let config = ProviderConfig {
            state_file: Some("/var/lib/galaxy/state.toml".into()),
            ..ProviderConfig::default()
        };
        assert_eq!(
            config.state_path().unwrap(),
            PathBuf::from("/var/lib/galaxy/state.toml")
        );
    }

    #[test]
    fn test_wait_for_host_until_ready() {
        let probes = Cell::new(0);
        let up = wait_for_host(
            || {
                probes.set(probes.get() + 1);
                match probes.get() {
                    1 => None,
                    2 => Some(502),
                    _ => Some(200),
                }
            },
            None,
            Duration::from_millis(1),
            &CancelToken::new(),
        );
        assert!(up);
        assert_eq!(probes.get(), 3);
    }

    #[test]
    fn test_wait_for_host_gives_up() {
        let up = wait_for_host(
            || None,
            Some(Duration::from_millis(20)),
            Duration::from_millis(5),
            &CancelToken::new(),
        );
        assert!(!up);
    }

    #[test]
    fn test_wait_for_host_observes_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let probes = Cell::new(0);
        let up = wait_for_host(
            || {
                probes.set(probes.get() + 1);
                None
            },
            None,
            Duration::from_secs(60),
            &cancel,
        );
        assert!(!up);
        assert_eq!(probes.get(), 1);
    }
}
