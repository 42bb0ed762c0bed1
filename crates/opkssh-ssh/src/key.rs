// ABOUTME: Signing keypair generation for certificate login.
// ABOUTME: One fresh ECDSA P-256 key per login, never negotiated.

use crate::error::{Result, SshError};
use rand::rngs::OsRng;
use ssh_key::{Algorithm, EcdsaCurve, PrivateKey};

/// The only SSH algorithm used to sign login certificates.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::Ecdsa {
    curve: EcdsaCurve::NistP256,
};

/// JWS algorithm identifier handed to the identity provider for the same key.
pub const PROOF_ALGORITHM: &str = "ES256";

/// Generate a fresh ECDSA P-256 signing key.
///
/// # Errors
/// Returns `SshError::GenerateKey` if the key cannot be generated. Callers
/// should abort the login rather than retry.
pub fn generate_signing_key() -> Result<PrivateKey> {
    PrivateKey::random(&mut OsRng, SIGNING_ALGORITHM).map_err(SshError::GenerateKey)
}
