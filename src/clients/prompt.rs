//! Interactive yes/no question on the terminal.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use super::TrustPrompt;
use crate::trust::is_affirmative;

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinPrompt {
    timeout: Option<Duration>,
}

impl StdinPrompt {
    /// With a timeout, an unanswered question counts as "no".
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TrustPrompt for StdinPrompt {
    async fn confirm(&self, question: &str) -> io::Result<bool> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(question.as_bytes()).await?;
        stderr.flush().await?;

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        let read = stdin.read_line(&mut answer);

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "No answer before timeout");
                    return Ok(false);
                }
            },
            None => {
                read.await?;
            }
        }

        Ok(is_affirmative(&answer))
    }
}
