//! Signature gate for library images.
//!
//! A materialized image is kept when its signature verifies or when the
//! operator explicitly accepts it. Everything else removes the image.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::{SignatureStatus, SignatureVerifier, TrustPrompt};
use crate::error::{PullError, Result};

pub const PROMPT: &str = "Do you wish to proceed? [N/y] ";

/// How a pulled image got past (or failed) the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    Verified,
    /// Reported as not signed, kept on operator request.
    UnsignedAccepted,
    UnsignedDeclined,
    /// The check itself failed and the operator kept the image anyway.
    VerificationError,
    /// No check was performed.
    Skipped,
}

/// What to do when the signature check cannot be carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationErrorPolicy {
    /// Treat the image as unsigned and ask the operator.
    #[default]
    Degrade,
    /// Remove the image and fail the pull.
    Fail,
}

/// Only `y` followed by a newline, in any case, is a yes.
pub fn is_affirmative(answer: &str) -> bool {
    answer.to_lowercase() == "y\n"
}

#[derive(Clone)]
pub struct TrustGate {
    verifier: Arc<dyn SignatureVerifier>,
    prompt: Arc<dyn TrustPrompt>,
    policy: VerificationErrorPolicy,
}

impl TrustGate {
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        prompt: Arc<dyn TrustPrompt>,
        policy: VerificationErrorPolicy,
    ) -> Self {
        Self {
            verifier,
            prompt,
            policy,
        }
    }

    /// Check `image` and decide whether it stays.
    ///
    /// On `Ok` the image is still in place. On `Err` it has been removed,
    /// except when the removal itself failed ([`PullError::CleanupFailed`]).
    pub async fn evaluate(&self, image: &Path, cancel: &CancellationToken) -> Result<TrustDecision> {
        match self.assess(image, cancel).await {
            Ok(TrustDecision::UnsignedDeclined) => {
                warn!("Aborting.");
                remove_rejected(image).await?;
                Err(PullError::TrustDeclined)
            }
            Ok(decision) => Ok(decision),
            Err(e) => {
                remove_rejected(image).await?;
                Err(e)
            }
        }
    }

    /// Run the signature check and, when it does not succeed, ask the
    /// operator. Leaves `image` alone.
    pub async fn assess(&self, image: &Path, cancel: &CancellationToken) -> Result<TrustDecision> {
        let check_failed = match self.verifier.verify(image).await {
            Ok(SignatureStatus::Signed) => {
                info!(image = %image.display(), "Image signature verified");
                return Ok(TrustDecision::Verified);
            }
            Ok(SignatureStatus::NotSigned) => false,
            Err(e) => {
                warn!(image = %image.display(), error = %e, "Unable to verify image signature");
                if self.policy == VerificationErrorPolicy::Fail {
                    return Err(PullError::Verification(e.to_string()));
                }
                true
            }
        };

        warn!(
            image = %image.display(),
            "Image might not be trusted; no valid signature was found"
        );

        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PullError::Interrupted),
            answer = self.prompt.confirm(PROMPT) => answer
                .map_err(|e| PullError::UserInput(format!("unable to read answer: {e}")))?,
        };

        Ok(match (accepted, check_failed) {
            (false, _) => TrustDecision::UnsignedDeclined,
            (true, true) => TrustDecision::VerificationError,
            (true, false) => TrustDecision::UnsignedAccepted,
        })
    }
}

async fn remove_rejected(image: &Path) -> Result<()> {
    match tokio::fs::remove_file(image).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PullError::CleanupFailed {
            path: image.to_path_buf(),
            source,
        }),
    }
}
