// ABOUTME: Safe installation of a key/certificate pair into a default SSH key slot.
// ABOUTME: Only free slots or slots carrying our ownership tag are ever written.

use crate::error::{Result, SshError};
use crate::format::KeyMaterial;
use crate::ownership::{authorized_key_comment, Ownership};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default key basenames, in priority order.
pub const DEFAULT_KEY_NAMES: [&str; 2] = ["id_ecdsa", "id_dsa"];

const PRIVATE_KEY_MODE: u32 = 0o600;
const PUBLIC_KEY_MODE: u32 = 0o644;
const SSH_DIR_MODE: u32 = 0o700;

/// Default SSH directory (~/.ssh).
pub fn default_ssh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh"))
}

/// A candidate (private key, public key) path pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
    name: String,
    private_path: PathBuf,
    public_path: PathBuf,
}

impl KeySlot {
    pub fn new(ssh_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            private_path: ssh_dir.join(name),
            public_path: ssh_dir.join(format!("{}.pub", name)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn private_path(&self) -> &Path {
        &self.private_path
    }

    pub fn public_path(&self) -> &Path {
        &self.public_path
    }
}

/// What the installer concluded about one slot.
#[derive(Debug)]
pub enum SlotState {
    /// No private key file: safe to write.
    Free,
    /// Private key without a public file: never claimed.
    Orphaned,
    /// Public file carries our ownership tag: safe to overwrite.
    Owned,
    /// Public file belongs to some other key.
    Foreign { comment: String },
    /// Public file could not be read or parsed: skipped.
    Unreadable(SshError),
}

impl SlotState {
    pub fn is_claimable(&self) -> bool {
        matches!(self, SlotState::Free | SlotState::Owned)
    }
}

/// The slot a login was installed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeyPair {
    pub slot: KeySlot,
    /// True when an earlier opkssh key was overwritten.
    pub replaced: bool,
}

/// Chooses and writes a default SSH key slot without clobbering foreign keys.
///
/// Candidates are scanned strictly in order and the first claimable slot
/// wins. A slot is claimable when its private key is absent, or when both
/// files exist and the public file's comment equals the ownership tag. A
/// private key without a public file, a foreign comment, or a public file
/// that cannot be read or parsed all skip to the next candidate. When no
/// candidate is claimable nothing is written.
#[derive(Debug, Clone)]
pub struct SafeInstaller {
    ssh_dir: PathBuf,
    candidates: Vec<String>,
    ownership: Ownership,
}

impl SafeInstaller {
    /// Installer for `ssh_dir` with the default candidates and ownership tag.
    pub fn new(ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_dir: ssh_dir.into(),
            candidates: DEFAULT_KEY_NAMES.iter().map(|s| s.to_string()).collect(),
            ownership: Ownership::default(),
        }
    }

    pub fn with_candidates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn ssh_dir(&self) -> &Path {
        &self.ssh_dir
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// Candidate slots in priority order.
    pub fn slots(&self) -> impl Iterator<Item = KeySlot> + '_ {
        self.candidates
            .iter()
            .map(move |name| KeySlot::new(&self.ssh_dir, name))
    }

    /// Classify one slot without modifying anything.
    pub fn inspect(&self, slot: &KeySlot) -> SlotState {
        if !is_present(slot.private_path()) {
            return SlotState::Free;
        }
        if !is_present(slot.public_path()) {
            return SlotState::Orphaned;
        }

        let contents = match fs::read_to_string(slot.public_path()) {
            Ok(contents) => contents,
            Err(source) => {
                return SlotState::Unreadable(SshError::ReadKey {
                    path: slot.public_path().to_path_buf(),
                    source,
                })
            }
        };

        match authorized_key_comment(&contents) {
            Ok(comment) if self.ownership.owns(comment) => SlotState::Owned,
            Ok(comment) => SlotState::Foreign {
                comment: comment.to_string(),
            },
            Err(source) => SlotState::Unreadable(SshError::ParseKey {
                path: slot.public_path().to_path_buf(),
                source,
            }),
        }
    }

    /// Classify every candidate slot, in order.
    pub fn survey(&self) -> Vec<(KeySlot, SlotState)> {
        self.slots()
            .map(|slot| {
                let state = self.inspect(&slot);
                (slot, state)
            })
            .collect()
    }

    /// Write `material` into the first claimable slot.
    ///
    /// # Errors
    /// - `SshError::CreateDirectory` if the ssh directory is not a directory or
    ///   cannot be probed or created.
    /// - `SshError::NoAvailableSlot` if every candidate is taken; nothing is written.
    /// - `SshError::WriteKey` if the private key cannot be written; the
    ///   certificate is then not attempted.
    /// - `SshError::PartialWrite` if the private key was written but the
    ///   certificate was not.
    pub fn install(&self, material: &KeyMaterial) -> Result<InstalledKeyPair> {
        let dir_exists = self.check_ssh_dir()?;

        for slot in self.slots() {
            match self.inspect(&slot) {
                SlotState::Free => return self.write(slot, material, dir_exists, false),
                SlotState::Owned => return self.write(slot, material, dir_exists, true),
                SlotState::Orphaned => {
                    debug!(path = %slot.private_path().display(), "private key has no public key file, skipping");
                }
                SlotState::Foreign { comment } => {
                    debug!(path = %slot.public_path().display(), comment = %comment, "key not created by opkssh, skipping");
                }
                SlotState::Unreadable(err) => {
                    warn!(error = %err, "skipping key slot");
                }
            }
        }

        Err(SshError::NoAvailableSlot {
            ssh_dir: self.ssh_dir.clone(),
            candidates: self.candidates.clone(),
        })
    }

    fn write(
        &self,
        slot: KeySlot,
        material: &KeyMaterial,
        dir_exists: bool,
        replaced: bool,
    ) -> Result<InstalledKeyPair> {
        if !dir_exists {
            self.create_ssh_dir()?;
        }

        info!(path = %slot.private_path().display(), "writing secret key");
        write_with_mode(
            slot.private_path(),
            material.private_key().as_bytes(),
            PRIVATE_KEY_MODE,
        )
        .map_err(|source| SshError::WriteKey {
            path: slot.private_path().to_path_buf(),
            source,
        })?;

        info!(path = %slot.public_path().display(), "writing public key");
        let certificate = self.ownership.mark(material.certificate());
        write_with_mode(slot.public_path(), certificate.as_bytes(), PUBLIC_KEY_MODE).map_err(
            |source| SshError::PartialWrite {
                private_path: slot.private_path().to_path_buf(),
                public_path: slot.public_path().to_path_buf(),
                source,
            },
        )?;

        Ok(InstalledKeyPair { slot, replaced })
    }

    /// Whether the ssh directory exists. Anything other than a directory or a
    /// missing path is an error, so I/O faults are not reported as full slots.
    fn check_ssh_dir(&self) -> Result<bool> {
        let not_a_directory = |source| SshError::CreateDirectory {
            path: self.ssh_dir.clone(),
            source,
        };
        match fs::metadata(&self.ssh_dir) {
            Ok(meta) if meta.is_dir() => Ok(true),
            Ok(_) => Err(not_a_directory(io::Error::other("not a directory"))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(not_a_directory(source)),
        }
    }

    fn create_ssh_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.ssh_dir).map_err(|source| SshError::CreateDirectory {
            path: self.ssh_dir.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.ssh_dir, fs::Permissions::from_mode(SSH_DIR_MODE)).map_err(
                |source| SshError::SetPermissions {
                    path: self.ssh_dir.clone(),
                    source,
                },
            )?;
        }

        Ok(())
    }
}

/// A path counts as present unless it is definitely missing.
fn is_present(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}

#[cfg(unix)]
fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents)?;
    // `mode` only applies to newly created files and is subject to umask.
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_with_mode(path: &Path, contents: &[u8], _mode: u32) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    Ok(())
}
