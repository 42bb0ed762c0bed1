// ABOUTME: Identity provider backed by an external OIDC helper program.
// ABOUTME: Sends the proof request as JSON on stdin and reads the proof token from stdout.

use async_trait::async_trait;
use opkssh_ssh::{IdentityProof, IdentityProvider, ProofRequest, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as ProcessCommand;
use tracing::debug;

/// Request written to the helper's stdin.
#[derive(Debug, Serialize)]
struct HelperRequest<'a> {
    public_key: String,
    alg: &'a str,
    claims: &'a Map<String, Value>,
    gq: bool,
}

/// Response expected on the helper's stdout.
#[derive(Debug, Deserialize)]
struct HelperResponse {
    token: String,
    #[serde(default)]
    identity: Option<String>,
}

/// Runs a helper program that performs the OIDC flow.
///
/// The helper's stderr is passed through so it can show login URLs or
/// device codes. The helper is killed if the login is abandoned.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl IdentityProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.program
    }

    async fn authenticate(&self, request: ProofRequest) -> Result<IdentityProof, ProviderError> {
        let public_key = request
            .public_key
            .to_openssh()
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;
        let payload = serde_json::to_vec(&HelperRequest {
            public_key,
            alg: &request.algorithm,
            claims: &request.extra_claims,
            gq: request.gq_sign,
        })
        .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        debug!(program = %self.program, "launching identity helper");
        let mut child = ProcessCommand::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProviderError::Launch)?;

        // Feed stdin while collecting output; a helper may exit without
        // reading its request, and then only its status and stdout matter.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&payload).await {
                    Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("identity helper closed stdin early");
                    }
                    other => other?,
                }
            }
            // Dropping stdin here signals end of request.
            Ok::<_, io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if !output.status.success() {
            return Err(ProviderError::Authentication(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        fed?;

        let response: HelperResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let token = response.token.trim();
        if token.is_empty() {
            return Err(ProviderError::InvalidResponse("empty token".to_string()));
        }

        let proof = IdentityProof::new(token, request.public_key);
        Ok(match response.identity.filter(|id| !id.is_empty()) {
            Some(identity) => proof.with_identity(identity),
            None => proof,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use opkssh_ssh::generate_signing_key;

    fn shell(script: &str) -> CommandProvider {
        CommandProvider::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
    }

    fn request() -> ProofRequest {
        let key = generate_signing_key().expect("should generate key");
        ProofRequest::new(key.public_key().clone())
    }

    #[tokio::test]
    async fn test_reads_token_and_identity() {
        let provider = shell(
            r#"cat >/dev/null; printf '{"token":"h.p.s","identity":"alice@example.com"}'"#,
        );
        let request = request();
        let key = request.public_key.clone();

        let proof = provider.authenticate(request).await.expect("should succeed");
        assert_eq!(proof.token(), "h.p.s");
        assert_eq!(proof.identity(), Some("alice@example.com"));
        assert_eq!(proof.public_key(), &key);
    }

    #[tokio::test]
    async fn test_request_json_reaches_helper() {
        // Echo the request back as the token to inspect what was sent.
        let provider = shell(
            r#"req=$(cat); printf '{"token":"%s"}' "$(printf '%s' "$req" | tr -d '"')""#,
        );
        let request = request();

        let proof = provider.authenticate(request).await.expect("should succeed");
        assert!(proof.token().contains("alg:ES256"));
        assert!(proof.token().contains("gq:false"));
        assert!(proof.token().contains("public_key:ecdsa-sha2-nistp256 "));
        assert_eq!(proof.identity(), None);
    }

    #[tokio::test]
    async fn test_helper_ignoring_stdin_still_succeeds() {
        let provider = shell(r#"printf '{"token":"a.b.c"}'"#);
        let mut request = request();
        // Larger than a pipe buffer, so the write cannot complete before exit.
        for i in 0..4000 {
            request
                .extra_claims
                .insert(format!("claim_{}", i), Value::String("x".repeat(16)));
        }

        for _ in 0..20 {
            let proof = provider
                .authenticate(request.clone())
                .await
                .expect("should succeed without the helper reading stdin");
            assert_eq!(proof.token(), "a.b.c");
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_authentication_error() {
        let provider = shell("cat >/dev/null; exit 3");
        let result = provider.authenticate(request()).await;
        assert!(matches!(result, Err(ProviderError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_bad_json_is_invalid_response() {
        let provider = shell("cat >/dev/null; echo not-json");
        let result = provider.authenticate(request()).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_empty_token_is_invalid_response() {
        let provider = shell(r#"cat >/dev/null; printf '{"token":"  "}'"#);
        let result = provider.authenticate(request()).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let provider = CommandProvider::new("/nonexistent/opkssh-helper", vec![]);
        let result = provider.authenticate(request()).await;
        assert!(matches!(result, Err(ProviderError::Launch(_))));
    }
}
