// ABOUTME: Binds an identity proof to an SSH user certificate and signs it.
// ABOUTME: The certificate is self-signed by the same key the proof commits to.

use crate::error::{Result, SshError};
use crate::key::SIGNING_ALGORITHM;
use crate::proof::IdentityProof;
use rand::rngs::OsRng;
use signature::Signer;
use ssh_key::certificate::{Builder, CertType};
use ssh_key::public::KeyData;
use ssh_key::{Algorithm, Certificate, HashAlg, PrivateKey, PublicKey, Signature};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Certificate extension that carries the compact identity proof token.
pub const PKT_EXTENSION: &str = "openpubkey-pkt";

/// Default certificate lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How far `valid_after` is backdated to tolerate clock skew on the server.
const BACKDATE_SECS: u64 = 60;

const PERMIT_EXTENSIONS: [&str; 5] = [
    "permit-X11-forwarding",
    "permit-agent-forwarding",
    "permit-port-forwarding",
    "permit-pty",
    "permit-user-rc",
];

/// Validity window of a certificate, in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub valid_after: u64,
    pub valid_before: u64,
}

impl Validity {
    /// Window starting shortly before `now` and lasting `ttl`.
    pub fn starting_at(now: u64, ttl: Duration) -> Self {
        Self {
            valid_after: now.saturating_sub(BACKDATE_SECS),
            valid_before: now.saturating_add(ttl.as_secs()),
        }
    }

    /// Window starting at the current system time.
    pub fn from_now(ttl: Duration) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::starting_at(now, ttl)
    }
}

/// Certificate fields derived from an identity proof, before signing.
#[derive(Debug, Clone)]
pub struct UnsignedCertificate {
    public_key: KeyData,
    key_id: String,
    principals: Vec<String>,
    validity: Validity,
    extensions: BTreeMap<String, String>,
}

impl UnsignedCertificate {
    pub fn public_key(&self) -> &KeyData {
        &self.public_key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Empty means the certificate is valid for every principal.
    pub fn principals(&self) -> &[String] {
        &self.principals
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }
}

/// Build the unsigned certificate for `proof`.
///
/// `signing_key` is the public half of the keypair that will sign the
/// certificate. It must be the key the proof is bound to; anything else is a
/// programming error and is reported as `SshError::ProofKeyMismatch`.
/// Principals are passed through as given.
pub fn bind(
    proof: &IdentityProof,
    signing_key: &PublicKey,
    principals: &[String],
    validity: Validity,
) -> Result<UnsignedCertificate> {
    if proof.public_key().key_data() != signing_key.key_data() {
        return Err(SshError::ProofKeyMismatch {
            expected: signing_key.fingerprint(HashAlg::Sha256).to_string(),
            actual: proof.public_key().fingerprint(HashAlg::Sha256).to_string(),
        });
    }

    let mut extensions: BTreeMap<String, String> = PERMIT_EXTENSIONS
        .iter()
        .map(|name| (name.to_string(), String::new()))
        .collect();
    extensions.insert(PKT_EXTENSION.to_string(), proof.token().to_string());

    Ok(UnsignedCertificate {
        public_key: proof.public_key().key_data().clone(),
        key_id: proof.identity().unwrap_or_default().to_string(),
        principals: principals.to_vec(),
        validity,
        extensions,
    })
}

/// A signer that only ever produces signatures of one algorithm.
pub struct RestrictedSigner<'a> {
    key: &'a PrivateKey,
    algorithm: Algorithm,
}

impl<'a> RestrictedSigner<'a> {
    /// Restrict `key` to `algorithm`.
    ///
    /// # Errors
    /// Returns `SshError::AlgorithmMismatch` if the key is of another algorithm.
    pub fn new(key: &'a PrivateKey, algorithm: Algorithm) -> Result<Self> {
        let actual = key.algorithm();
        if actual.as_str() != algorithm.as_str() {
            return Err(SshError::AlgorithmMismatch {
                expected: algorithm.as_str().to_string(),
                actual: actual.as_str().to_string(),
            });
        }
        Ok(Self { key, algorithm })
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }
}

impl Signer<Signature> for RestrictedSigner<'_> {
    fn try_sign(&self, msg: &[u8]) -> std::result::Result<Signature, signature::Error> {
        let sig = self.key.try_sign(msg)?;
        if sig.algorithm().as_str() != self.algorithm.as_str() {
            return Err(signature::Error::new());
        }
        Ok(sig)
    }
}

impl From<&RestrictedSigner<'_>> for KeyData {
    fn from(signer: &RestrictedSigner<'_>) -> KeyData {
        signer.key.public_key().key_data().clone()
    }
}

/// Sign `unsigned` with the keypair it was bound to.
///
/// Signing is restricted to `ecdsa-sha2-nistp256`; there is no fallback.
pub fn sign(unsigned: &UnsignedCertificate, signing_key: &PrivateKey) -> Result<Certificate> {
    let signer = RestrictedSigner::new(signing_key, SIGNING_ALGORITHM)?;
    let validity = unsigned.validity;

    let mut builder = Builder::new_with_random_nonce(
        &mut OsRng,
        unsigned.public_key.clone(),
        validity.valid_after,
        validity.valid_before,
    )
    .map_err(SshError::BuildCertificate)?;

    builder
        .cert_type(CertType::User)
        .map_err(SshError::BuildCertificate)?;
    builder
        .key_id(unsigned.key_id.clone())
        .map_err(SshError::BuildCertificate)?;

    if unsigned.principals.is_empty() {
        // The verifying server decides which logins this identity may use.
        builder
            .all_principals_valid()
            .map_err(SshError::BuildCertificate)?;
    } else {
        for principal in &unsigned.principals {
            builder
                .valid_principal(principal.clone())
                .map_err(SshError::BuildCertificate)?;
        }
    }

    for (name, data) in &unsigned.extensions {
        builder
            .extension(name.clone(), data.clone())
            .map_err(SshError::BuildCertificate)?;
    }

    debug!(
        key_id = %unsigned.key_id,
        principals = unsigned.principals.len(),
        valid_before = validity.valid_before,
        "signing certificate"
    );

    builder.sign(&signer).map_err(SshError::SignCertificate)
}
