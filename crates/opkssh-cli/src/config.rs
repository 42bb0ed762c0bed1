// ABOUTME: Configuration loading for the opkssh CLI.
// ABOUTME: Reads ~/.config/opkssh/config.toml with provider and SSH slot settings.

use anyhow::{bail, Context, Result};
use opkssh_ssh::{default_ssh_dir, DEFAULT_KEY_NAMES, DEFAULT_TTL};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub ssh: SshConfig,
}

/// How to reach the OIDC identity provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Helper program that runs the OIDC flow and prints a proof token.
    pub command: Option<String>,
    /// Arguments passed to the helper.
    pub args: Vec<String>,
    /// Give up on the helper after this many seconds (0 disables the limit).
    pub timeout_secs: u64,
    /// Request a GQ-signed proof.
    pub gq: bool,
    /// Extra claims forwarded to the helper.
    pub claims: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            gq: false,
            claims: BTreeMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

/// Where and how the certificate is installed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// SSH directory (defaults to ~/.ssh). `~` and `$VARS` are expanded.
    pub dir: Option<String>,
    /// SSH directory given on the command line, used verbatim.
    #[serde(skip)]
    pub dir_override: Option<PathBuf>,
    /// Candidate key basenames, in priority order.
    pub key_names: Vec<String>,
    /// Principals the certificate authorizes (empty = server policy decides).
    pub principals: Vec<String>,
    /// Certificate lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            dir: None,
            dir_override: None,
            key_names: DEFAULT_KEY_NAMES.iter().map(|s| s.to_string()).collect(),
            principals: Vec::new(),
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

impl Config {
    /// Default config location (~/.config/opkssh/config.toml).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("opkssh").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Check values that would otherwise fail late or write somewhere unexpected.
    pub fn validate(&self) -> Result<()> {
        if self.ssh.key_names.is_empty() {
            bail!("ssh.key_names must list at least one key name");
        }
        for name in &self.ssh.key_names {
            let path_like = name.contains('/') || name.contains('\\');
            if name.is_empty() || path_like || name == "." || name == ".." {
                bail!("ssh.key_names entry {:?} must be a plain file name", name);
            }
        }
        if self.ssh.ttl_secs == 0 {
            bail!("ssh.ttl_secs must be greater than zero");
        }
        if let Some(command) = &self.provider.command {
            if command.trim().is_empty() {
                bail!("provider.command must not be empty");
            }
        }
        Ok(())
    }

    /// Resolved SSH directory.
    pub fn ssh_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.ssh.dir_override {
            return Ok(dir.clone());
        }
        match &self.ssh.dir {
            Some(dir) => {
                let expanded = shellexpand::full(dir)
                    .with_context(|| format!("Failed to expand ssh.dir {:?}", dir))?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => default_ssh_dir().context("Could not determine home directory"),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ssh.ttl_secs)
    }

    pub fn proof_timeout(&self) -> Option<Duration> {
        match self.provider.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Configured claims as a JSON object for the proof request.
    pub fn extra_claims(&self) -> Map<String, Value> {
        self.provider
            .claims
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}
