//! Deployment CLI.
//!
//! Clones (or updates) the application repository under the deployment root,
//! writes its `config.env`, installs dependencies and starts or reloads it
//! under the process supervisor.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use deployer::core::credential::{CredentialError, SESSION_ID_VAR};
use deployer::deploy::{planned_commands, run_deploy};
use deployer::exit_codes;
use deployer::io::config::{DEFAULT_CONFIG_FILE, DeployConfig, load_config, write_config};
use deployer::io::console::{Console, StdConsole};
use deployer::io::env::{DEFAULT_ENV_FILE, load_env_file, session_from_env};
use deployer::io::process::SystemRunner;
use deployer::logging;
use deployer::steps::{DeployContext, Workspace};

#[derive(Parser)]
#[command(
    name = "deployer",
    version,
    about = "Clone, configure, install and launch a supervised application"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: clone/pull, write config, install, start or reload.
    Deploy {
        /// Deployment root; the working copy lives beneath it.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Config file (defaults to `<root>/deploy.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Dotenv file providing `SESSION_ID` (defaults to `<root>/.env`).
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
    /// Write `deploy.toml` with default values if missing.
    Init {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate config and print the commands a deploy would run.
    Check {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILURE
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Deploy {
            root,
            config,
            env_file,
        } => cmd_deploy(&root, config, env_file),
        Command::Init { root, force } => cmd_init(&root, force),
        Command::Check { root, config } => cmd_check(&root, config),
    }
}

fn cmd_deploy(root: &Path, config: Option<PathBuf>, env_file: Option<PathBuf>) -> Result<i32> {
    let console = StdConsole;

    let env_path = env_file.unwrap_or_else(|| root.join(DEFAULT_ENV_FILE));
    load_env_file(&env_path)?;
    let session = match session_from_env() {
        Ok(session) => session,
        Err(CredentialError::Missing) => {
            console.error(&format!(
                "❌ Missing {SESSION_ID_VAR} in .env file. Please add it before deploying."
            ));
            return Ok(exit_codes::FAILURE);
        }
        Err(err) => {
            console.error(&format!("❌ Invalid {SESSION_ID_VAR}: {err}"));
            return Ok(exit_codes::FAILURE);
        }
    };

    let config_path = config.unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let cfg = load_config(&config_path)?;
    let runner =
        SystemRunner::new(cfg.command_timeout()).with_output_limit(cfg.output_limit_bytes);
    let ctx = DeployContext::new(Workspace::new(root, cfg)?, session);

    let outcome = run_deploy(&ctx, &runner, &console, |report| {
        debug!(step = %report.kind, outcome = ?report.outcome, "step finished");
    })?;
    Ok(outcome.exit_code())
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let path = root.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        println!(
            "📁 {} already exists, leaving it unchanged (use --force to overwrite).",
            path.display()
        );
        return Ok(exit_codes::OK);
    }
    write_config(&path, &DeployConfig::default())?;
    println!("🛠️ Wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_check(root: &Path, config: Option<PathBuf>) -> Result<i32> {
    let config_path = config.unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let cfg = load_config(&config_path)?;
    let ws = Workspace::new(root, cfg)?;
    println!("repository: {}", ws.config().repo_url);
    println!("working copy: {}", ws.app_path().display());
    println!("config file: {}", ws.config_env_path().display());
    for (kind, spec) in planned_commands(&ws)? {
        println!("{kind:>12}: {spec}  (in {})", spec.cwd.display());
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_deploy_defaults() {
        let cli = Cli::parse_from(["deployer", "deploy"]);
        match cli.command {
            Command::Deploy {
                root,
                config,
                env_file,
            } => {
                assert_eq!(root, PathBuf::from("."));
                assert!(config.is_none());
                assert!(env_file.is_none());
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["deployer", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }

    #[test]
    fn parse_check_with_config() {
        let cli = Cli::parse_from(["deployer", "check", "--config", "ops/deploy.toml"]);
        match cli.command {
            Command::Check { config, .. } => {
                assert_eq!(config, Some(PathBuf::from("ops/deploy.toml")));
            }
            _ => panic!("expected check"),
        }
    }
}
