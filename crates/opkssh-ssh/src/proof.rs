// ABOUTME: Contract with the OIDC identity provider that vouches for a signing key.
// ABOUTME: Defines the proof request, the opaque proof token, and the provider trait.

use crate::key::PROOF_ALGORITHM;
use async_trait::async_trait;
use serde_json::{Map, Value};
use ssh_key::PublicKey;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by an identity provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to launch identity provider: {0}")]
    Launch(#[source] std::io::Error),

    #[error("invalid proof request: {0}")]
    InvalidRequest(String),

    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),

    #[error("identity provider timed out after {0:?}")]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the core asks the identity provider to vouch for.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    /// Public half of the signing keypair the proof must bind to.
    pub public_key: PublicKey,
    /// JWS algorithm identifier of that key.
    pub algorithm: String,
    /// Additional claims to embed alongside the key commitment.
    pub extra_claims: Map<String, Value>,
    /// Request the strengthened (GQ-signed) proof variant.
    pub gq_sign: bool,
}

impl ProofRequest {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            algorithm: PROOF_ALGORITHM.to_string(),
            extra_claims: Map::new(),
            gq_sign: false,
        }
    }
}

/// Opaque identity proof token bound to a signing public key.
///
/// The token is carried verbatim into the certificate; its claims are never
/// inspected here.
#[derive(Clone)]
pub struct IdentityProof {
    token: String,
    public_key: PublicKey,
    identity: Option<String>,
}

impl IdentityProof {
    /// Wrap a compact proof token together with the key the provider bound it to.
    pub fn new(token: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            token: token.into(),
            public_key,
            identity: None,
        }
    }

    /// Attach the identity label the provider reported (e.g. an email address).
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

impl fmt::Debug for IdentityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProof")
            .field("token", &"[REDACTED]")
            .field("public_key", &self.public_key.algorithm())
            .field("identity", &self.identity)
            .finish()
    }
}

/// An OIDC-backed source of identity proofs.
///
/// Implementations own the whole authentication flow, including any browser
/// or device interaction. Nothing on disk is touched while this runs.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Authenticate the user and return a proof bound to `request.public_key`.
    async fn authenticate(&self, request: ProofRequest) -> Result<IdentityProof, ProviderError>;
}
