// ABOUTME: Implementation of 'opkssh login'
// ABOUTME: Runs the OIDC helper, issues the certificate, and reports the installed slot

use anyhow::{Context, Result};
use colored::Colorize;
use opkssh_ssh::{IdentityProvider, InstalledKeyPair, LoginOptions, SafeInstaller};

use crate::config::Config;
use crate::provider::CommandProvider;

/// Build login options from resolved configuration.
pub fn login_options(config: &Config) -> Result<LoginOptions> {
    let installer =
        SafeInstaller::new(config.ssh_dir()?).with_candidates(config.ssh.key_names.clone());

    let mut options = LoginOptions::new(installer);
    options.principals = config.ssh.principals.clone();
    options.extra_claims = config.extra_claims();
    options.gq_sign = config.provider.gq;
    options.ttl = config.ttl();
    options.proof_timeout = config.proof_timeout();
    Ok(options)
}

/// The identity provider named by the configuration.
pub fn provider(config: &Config) -> Result<CommandProvider> {
    let command = config.provider.command.as_deref().context(
        "No identity provider configured. Set provider.command in the config file or pass --provider-command.",
    )?;
    Ok(CommandProvider::new(command, config.provider.args.clone()))
}

pub async fn run(config: &Config) -> Result<()> {
    let provider = provider(config)?;
    let options = login_options(config)?;
    let installed = perform(&provider, &options).await?;
    print_installed(&installed);
    Ok(())
}

/// Log in through `provider`; errors keep their `SshError` for hints.
pub async fn perform<P>(provider: &P, options: &LoginOptions) -> Result<InstalledKeyPair>
where
    P: IdentityProvider + ?Sized,
{
    opkssh_ssh::login(provider, options).await.map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err).context(format!("Login failed during {}", stage))
    })
}

fn print_installed(installed: &InstalledKeyPair) {
    let action = if installed.replaced {
        "Replaced"
    } else {
        "Installed"
    };
    println!("{} SSH certificate", action.green().bold());
    println!(
        "  {}: {}",
        "Private key".dimmed(),
        installed.slot.private_path().display()
    );
    println!(
        "  {}:  {}",
        "Certificate".dimmed(),
        installed.slot.public_path().display()
    );
}
