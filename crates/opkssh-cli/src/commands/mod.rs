// ABOUTME: CLI command definitions using clap
// ABOUTME: Defines the login and status subcommands and their shared slot options

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

pub mod login;
pub mod status;

#[derive(Parser)]
#[command(
    name = "opkssh",
    version,
    about = "Log in with OpenID Connect and install an SSH certificate"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ~/.config/opkssh/config.toml)
    #[arg(long, global = true, env = "OPKSSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Authenticate and install a fresh SSH certificate into ~/.ssh
    Login(LoginArgs),

    /// Show which default key slots opkssh may write
    Status(SlotArgs),
}

/// Options selecting the SSH directory and candidate key slots.
#[derive(Args, Debug, Clone, Default)]
pub struct SlotArgs {
    /// SSH directory to install into (defaults to ~/.ssh)
    #[arg(long)]
    pub ssh_dir: Option<PathBuf>,

    /// Candidate key file name, in priority order (repeatable)
    #[arg(long = "key-name", value_name = "NAME")]
    pub key_names: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    #[command(flatten)]
    pub slots: SlotArgs,

    /// Principal the certificate authorizes (repeatable; none = server policy)
    #[arg(long = "principal", value_name = "LOGIN")]
    pub principals: Vec<String>,

    /// Helper program that performs the OIDC flow
    #[arg(long, env = "OPKSSH_PROVIDER_COMMAND")]
    pub provider_command: Option<String>,

    /// Request a GQ-signed identity proof
    #[arg(long)]
    pub gq: bool,

    /// Certificate lifetime in seconds
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Seconds to wait for the identity provider (0 = no limit)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl SlotArgs {
    /// Apply command line overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.ssh_dir {
            config.ssh.dir_override = Some(dir.clone());
        }
        if !self.key_names.is_empty() {
            config.ssh.key_names = self.key_names.clone();
        }
    }
}

impl LoginArgs {
    /// Apply command line overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        self.slots.apply(config);
        if !self.principals.is_empty() {
            config.ssh.principals = self.principals.clone();
        }
        if let Some(command) = &self.provider_command {
            config.provider.command = Some(command.clone());
            // Helper arguments from the file belong to the configured helper.
            config.provider.args.clear();
        }
        if self.gq {
            config.provider.gq = true;
        }
        if let Some(ttl) = self.ttl_secs {
            config.ssh.ttl_secs = ttl;
        }
        if let Some(timeout) = self.timeout_secs {
            config.provider.timeout_secs = timeout;
        }
    }
}
