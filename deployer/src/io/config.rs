//! Deployer configuration stored in `deploy.toml` at the deployment root.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::process::DEFAULT_OUTPUT_LIMIT_BYTES;

/// Default config file name, relative to the deployment root.
pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

/// Deployer configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// deployer has always used, so an absent file behaves like the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Repository cloned when the working copy is absent.
    pub repo_url: String,

    /// Working copy directory name, relative to the deployment root.
    pub app_dir: String,

    /// Runtime config file name, written inside the working copy.
    pub config_file: String,

    /// Kill any child process running longer than this. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,

    /// Truncate captured stdout/stderr beyond this many bytes per stream.
    pub output_limit_bytes: usize,

    pub install: CommandConfig,

    pub launch: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandConfig {
    /// Program and arguments (e.g. `["yarn","install","--check-files"]`).
    pub command: Vec<String>,
}

impl CommandConfig {
    fn from_argv(argv: &[&str]) -> Self {
        Self {
            command: argv.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self.command.first() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(anyhow!("{name}.command must be a non-empty array")),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/lyfe00011/levanter.git".to_string(),
            app_dir: "levanter".to_string(),
            config_file: "config.env".to_string(),
            command_timeout_secs: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            install: CommandConfig::from_argv(&["yarn", "install", "--check-files"]),
            launch: CommandConfig::from_argv(&["yarn", "pm2", "startOrReload", "ecosystem.config.js"]),
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(anyhow!("repo_url must not be empty"));
        }
        ensure_single_component("app_dir", &self.app_dir)?;
        ensure_single_component("config_file", &self.config_file)?;
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        self.install.validate("install")?;
        self.launch.validate("launch")?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Working copy location under `root`.
    pub fn app_path(&self, root: &Path) -> PathBuf {
        root.join(&self.app_dir)
    }

    /// Runtime config file location under `root`.
    pub fn config_env_path(&self, root: &Path) -> PathBuf {
        self.app_path(root).join(&self.config_file)
    }
}

/// `value` must be one plain path segment: no separators, `..` or absolute paths.
fn ensure_single_component(name: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(anyhow!(
            "{name} must be a single relative path component (got '{value}')"
        )),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DeployConfig::default()`.
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.exists() {
        let cfg = DeployConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DeployConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DeployConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, DeployConfig::default());
        assert_eq!(cfg.command_timeout(), None);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        let cfg = DeployConfig {
            command_timeout_secs: Some(600),
            ..DeployConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "app_dir = \"bot\"\n\n[install]\ncommand = [\"npm\", \"ci\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.app_dir, "bot");
        assert_eq!(cfg.install.command, vec!["npm", "ci"]);
        assert_eq!(cfg.launch, DeployConfig::default().launch);
        assert_eq!(cfg.repo_url, DeployConfig::default().repo_url);
    }

    #[test]
    fn rejects_nested_app_dir() {
        for bad in ["../elsewhere", "a/b", "/abs", ""] {
            let cfg = DeployConfig {
                app_dir: bad.to_string(),
                ..DeployConfig::default()
            };
            assert!(cfg.validate().is_err(), "accepted app_dir '{bad}'");
        }
    }

    #[test]
    fn rejects_empty_commands_and_zero_timeout() {
        let cfg = DeployConfig {
            launch: CommandConfig {
                command: vec![" ".to_string()],
            },
            ..DeployConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DeployConfig {
            command_timeout_secs: Some(0),
            ..DeployConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DeployConfig {
            output_limit_bytes: 0,
            ..DeployConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn paths_are_rooted() {
        let cfg = DeployConfig::default();
        let root = Path::new("/srv/deploy");
        assert_eq!(cfg.app_path(root), PathBuf::from("/srv/deploy/levanter"));
        assert_eq!(
            cfg.config_env_path(root),
            PathBuf::from("/srv/deploy/levanter/config.env")
        );
    }
}
