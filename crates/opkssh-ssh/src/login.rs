// ABOUTME: End-to-end certificate login: keygen, identity proof, certificate, install.
// ABOUTME: Runs each step to completion in order; nothing touches disk before install.

use crate::cert::{bind, sign, Validity, DEFAULT_TTL};
use crate::error::{Result, SshError};
use crate::format::{KeyMaterial, PRIVATE_KEY_COMMENT};
use crate::install::{InstalledKeyPair, SafeInstaller};
use crate::key::generate_signing_key;
use crate::proof::{IdentityProof, IdentityProvider, ProofRequest, ProviderError};
use serde_json::{Map, Value};
use ssh_key::{Certificate, PrivateKey};
use std::time::Duration;
use tracing::{debug, info};

/// Parameters of a single login.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Logins the certificate authorizes; empty leaves it to server policy.
    pub principals: Vec<String>,
    /// Extra claims forwarded to the identity provider.
    pub extra_claims: Map<String, Value>,
    /// Ask the provider for a GQ-signed proof.
    pub gq_sign: bool,
    /// Certificate lifetime.
    pub ttl: Duration,
    /// Upper bound on the identity provider round trip.
    pub proof_timeout: Option<Duration>,
    /// Comment embedded in the private key file.
    pub private_key_comment: String,
    pub installer: SafeInstaller,
}

impl LoginOptions {
    pub fn new(installer: SafeInstaller) -> Self {
        Self {
            principals: Vec::new(),
            extra_claims: Map::new(),
            gq_sign: false,
            ttl: DEFAULT_TTL,
            proof_timeout: None,
            private_key_comment: PRIVATE_KEY_COMMENT.to_string(),
            installer,
        }
    }
}

/// Obtain a proof from `provider`, bounded by `timeout`.
///
/// Dropping the returned future, or hitting the timeout, abandons the
/// provider without side effects on disk.
pub async fn acquire_proof<P>(
    provider: &P,
    request: ProofRequest,
    timeout: Option<Duration>,
) -> Result<IdentityProof>
where
    P: IdentityProvider + ?Sized,
{
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, provider.authenticate(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::TimedOut(limit)),
        },
        None => provider.authenticate(request).await,
    };

    outcome.map_err(|source| SshError::IdentityProof {
        provider: provider.name().to_string(),
        source,
    })
}

/// Bind `proof` to a certificate and sign it with `signing_key`.
pub fn issue_certificate(
    signing_key: &PrivateKey,
    proof: &IdentityProof,
    principals: &[String],
    validity: Validity,
) -> Result<Certificate> {
    let unsigned = bind(proof, signing_key.public_key(), principals, validity)?;
    sign(&unsigned, signing_key)
}

/// Run a full login against `provider` and install the result.
///
/// A retry must start over from the beginning: the proof is only valid for
/// the keypair generated here.
pub async fn login<P>(provider: &P, options: &LoginOptions) -> Result<InstalledKeyPair>
where
    P: IdentityProvider + ?Sized,
{
    let signing_key = generate_signing_key()?;
    debug!(algorithm = signing_key.algorithm().as_str(), "generated signing key");

    let request = ProofRequest {
        extra_claims: options.extra_claims.clone(),
        gq_sign: options.gq_sign,
        ..ProofRequest::new(signing_key.public_key().clone())
    };
    info!(provider = provider.name(), "requesting identity proof");
    let proof = acquire_proof(provider, request, options.proof_timeout).await?;

    let certificate = issue_certificate(
        &signing_key,
        &proof,
        &options.principals,
        Validity::from_now(options.ttl),
    )?;
    let material = KeyMaterial::new(&signing_key, &certificate, &options.private_key_comment)?;

    let installed = options.installer.install(&material)?;
    info!(
        slot = installed.slot.name(),
        replaced = installed.replaced,
        "installed certificate"
    );
    Ok(installed)
}
