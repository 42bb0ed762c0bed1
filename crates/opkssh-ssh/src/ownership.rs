// ABOUTME: Ownership tag that marks key files written by opkssh.
// ABOUTME: Parses authorized-key lines and compares their comment to the tag exactly.

use ssh_key::{Certificate, PublicKey};
use thiserror::Error;

/// Comment appended to every certificate file this tool writes.
pub const DEFAULT_OWNERSHIP_TAG: &str = "openpubkey";

const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

/// Reasons an authorized-key line could not be read.
#[derive(Error, Debug)]
pub enum KeyLineError {
    #[error("no key entry found")]
    Empty,

    #[error("missing base64 key data")]
    MissingKeyData,

    #[error(transparent)]
    Key(#[from] ssh_key::Error),
}

/// Ownership tag checked before any existing key slot is overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    tag: String,
}

impl Ownership {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether a key comment marks the key as ours.
    ///
    /// Whole-field, case-sensitive equality. Comments are free-form, so a
    /// comment merely containing the tag is someone else's key.
    pub fn owns(&self, comment: &str) -> bool {
        comment == self.tag
    }

    /// Append the tag to an authorized-key line as its comment.
    pub fn mark(&self, line: &str) -> String {
        format!("{} {}", line, self.tag)
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::new(DEFAULT_OWNERSHIP_TAG)
    }
}

fn is_field_separator(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Extract the comment of the first key entry in an authorized-key file.
///
/// Blank lines and `#` lines are skipped. The key type and base64 data must
/// decode as a public key or certificate. The comment is everything after the
/// single separator following the key data, untrimmed; it is empty when the
/// entry has no comment.
pub fn authorized_key_comment(contents: &str) -> Result<&str, KeyLineError> {
    let line = contents
        .lines()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .ok_or(KeyLineError::Empty)?;

    let (key_type, rest) = line
        .trim_start()
        .split_once(is_field_separator)
        .ok_or(KeyLineError::MissingKeyData)?;
    let (data, comment) = rest.split_once(is_field_separator).unwrap_or((rest, ""));
    if data.is_empty() {
        return Err(KeyLineError::MissingKeyData);
    }

    let entry = format!("{} {}", key_type, data);
    if key_type.ends_with(CERT_ALGORITHM_SUFFIX) {
        Certificate::from_openssh(&entry)?;
    } else {
        PublicKey::from_openssh(&entry)?;
    }

    Ok(comment)
}
