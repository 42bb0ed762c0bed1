// ABOUTME: OIDC-bound SSH certificate issuance and safe installation into ~/.ssh.
// ABOUTME: Re-exports the binder, signer, formatter, installer, and login flow.

pub mod cert;
pub mod error;
pub mod format;
pub mod install;
pub mod key;
pub mod login;
pub mod ownership;
pub mod proof;

pub use cert::{bind, sign, RestrictedSigner, UnsignedCertificate, Validity, DEFAULT_TTL};
pub use error::{LoginStage, Result, SshError};
pub use format::{format_certificate, format_private_key, KeyMaterial, PRIVATE_KEY_COMMENT};
pub use install::{
    default_ssh_dir, InstalledKeyPair, KeySlot, SafeInstaller, SlotState, DEFAULT_KEY_NAMES,
};
pub use key::{generate_signing_key, PROOF_ALGORITHM, SIGNING_ALGORITHM};
pub use login::{acquire_proof, issue_certificate, login, LoginOptions};
pub use ownership::{Ownership, DEFAULT_OWNERSHIP_TAG};
pub use proof::{IdentityProof, IdentityProvider, ProofRequest, ProviderError};
