// ABOUTME: Implementation of 'opkssh status'
// ABOUTME: Reports each candidate key slot and whether login may write it

use anyhow::Result;
use colored::Colorize;
use opkssh_ssh::{KeySlot, SafeInstaller, SlotState};

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let installer =
        SafeInstaller::new(config.ssh_dir()?).with_candidates(config.ssh.key_names.clone());

    println!(
        "{} {}",
        "Key slots in".bold(),
        installer.ssh_dir().display()
    );

    let survey = installer.survey();
    for (slot, state) in &survey {
        println!("  {:<12} {}", slot.name(), describe(slot, state));
    }

    match survey.iter().find(|(_, state)| state.is_claimable()) {
        Some((slot, _)) => println!("Next login writes {}", slot.private_path().display()),
        None => println!(
            "{}",
            "No slot available: login will refuse to overwrite these keys.".red()
        ),
    }
    Ok(())
}

/// One-line human description of a slot state.
pub fn describe(slot: &KeySlot, state: &SlotState) -> String {
    match state {
        SlotState::Free => "free".green().to_string(),
        SlotState::Owned => "opkssh certificate (will be replaced)".green().to_string(),
        SlotState::Orphaned => format!(
            "{} ({} has no .pub file)",
            "in use".yellow(),
            slot.private_path().display()
        ),
        SlotState::Foreign { comment } if comment.is_empty() => {
            format!("{} (uncommented key)", "in use".yellow())
        }
        SlotState::Foreign { comment } => format!("{} ({})", "in use".yellow(), comment),
        SlotState::Unreadable(err) => format!("{} ({})", "unreadable".red(), err),
    }
}
