// ABOUTME: Error types for SSH certificate issuance and installation using thiserror.
// ABOUTME: Covers key generation, identity proof, certificate construction, and key slot writes.

use crate::ownership::KeyLineError;
use crate::proof::ProviderError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while issuing or installing an OIDC-bound SSH key.
#[derive(Error, Debug)]
pub enum SshError {
    /// Failed to generate the signing keypair.
    #[error("failed to generate SSH key: {0}")]
    GenerateKey(#[source] ssh_key::Error),

    /// The identity provider could not produce a proof for the signing key.
    #[error("identity provider {provider} failed: {source}")]
    IdentityProof {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// The identity proof is bound to a different key than the one signing the certificate.
    #[error("identity proof is bound to key {actual}, expected {expected}")]
    ProofKeyMismatch { expected: String, actual: String },

    /// The signing key does not use the single algorithm the signer is restricted to.
    #[error("signing key algorithm {actual} does not match required algorithm {expected}")]
    AlgorithmMismatch { expected: String, actual: String },

    /// Failed to assemble the certificate fields.
    #[error("failed to build SSH certificate: {0}")]
    BuildCertificate(#[source] ssh_key::Error),

    /// The signer refused or failed to sign the certificate.
    #[error("failed to sign SSH certificate: {0}")]
    SignCertificate(#[source] ssh_key::Error),

    /// Failed to serialize a key or certificate.
    #[error("failed to serialize key: {0}")]
    SerializeKey(#[source] ssh_key::Error),

    /// Failed to read an existing public key file.
    #[error("failed to read SSH public key from {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing public key file is not a valid authorized-key entry.
    #[error("failed to parse SSH public key from {path}: {source}")]
    ParseKey {
        path: PathBuf,
        #[source]
        source: KeyLineError,
    },

    /// Failed to create the SSH directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set file permissions.
    #[error("failed to set permissions on {path}: {source}")]
    SetPermissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the private key file. Nothing else was written.
    #[error("failed to write key to {path}: {source}")]
    WriteKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The private key was written but the certificate file was not.
    #[error(
        "wrote private key {private_path} but failed to write certificate {public_path}: {source}"
    )]
    PartialWrite {
        private_path: PathBuf,
        public_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every candidate key slot is taken by a key this tool did not create.
    #[error(
        "no default ssh key file free for openpubkey in {ssh_dir} (checked: {})",
        .candidates.join(", ")
    )]
    NoAvailableSlot {
        ssh_dir: PathBuf,
        candidates: Vec<String>,
    },
}

/// The step of a login an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    GenerateKey,
    IdentityProof,
    Certificate,
    Install,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStage::GenerateKey => "key generation",
            LoginStage::IdentityProof => "identity proof",
            LoginStage::Certificate => "certificate construction",
            LoginStage::Install => "key installation",
        };
        f.write_str(name)
    }
}

impl SshError {
    /// Which login step produced this error.
    pub fn stage(&self) -> LoginStage {
        match self {
            SshError::GenerateKey(_) => LoginStage::GenerateKey,
            SshError::IdentityProof { .. } => LoginStage::IdentityProof,
            SshError::ProofKeyMismatch { .. }
            | SshError::AlgorithmMismatch { .. }
            | SshError::BuildCertificate(_)
            | SshError::SignCertificate(_)
            | SshError::SerializeKey(_) => LoginStage::Certificate,
            SshError::ReadKey { .. }
            | SshError::ParseKey { .. }
            | SshError::CreateDirectory { .. }
            | SshError::SetPermissions { .. }
            | SshError::WriteKey { .. }
            | SshError::PartialWrite { .. }
            | SshError::NoAvailableSlot { .. } => LoginStage::Install,
        }
    }
}

/// Result type alias using SshError.
pub type Result<T> = std::result::Result<T, SshError>;
