// ABOUTME: Library exports for the opkssh CLI
// ABOUTME: Dispatches commands and maps login errors to actionable hints

use anyhow::Result;
use opkssh_ssh::SshError;

pub mod commands;
pub mod config;
pub mod logging;
pub mod provider;

pub use commands::{Cli, Command, LoginArgs, SlotArgs};
pub use config::Config;

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Login(args) => {
            args.apply(&mut config);
            config.validate()?;
            commands::login::run(&config).await
        }
        Command::Status(args) => {
            args.apply(&mut config);
            config.validate()?;
            commands::status::run(&config)
        }
    }
}

/// Suggest a next step for errors the user can resolve.
pub fn hint_for(err: &anyhow::Error) -> Option<String> {
    let ssh_err = err.chain().find_map(|e| e.downcast_ref::<SshError>())?;
    match ssh_err {
        SshError::NoAvailableSlot { candidates, .. } => Some(format!(
            "Every default key file ({}) holds a key opkssh did not create. Move one aside or pass --key-name.",
            candidates.join(", ")
        )),
        SshError::PartialWrite { public_path, .. } => Some(format!(
            "{} is missing or stale. Run 'opkssh login' again to replace it.",
            public_path.display()
        )),
        _ => None,
    }
}
