//! Paid completion calls: debit, forward, refund on failure.
//!
//! Each call runs on its own tokio task. Dropping the caller's future (a
//! client disconnect) does not cancel the task, so a debit always settles
//! into either a delivered completion or a refund. Refunds that hit an
//! unavailable store are retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, warn};

use crate::domain::ports::{CompletionProvider, CompletionProviderError};
use crate::domain::{
    AccessDecision, AccessGate, CompletionReceipt, Debit, Error, ErrorCode, Operation, Prompt,
    ProviderKind, SessionResolution, TraceId,
};

/// Upper bound on a single upstream completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// How hard a failed refund is retried before it is reported as lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundRetry {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RefundRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RefundRetry {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(exponent)
            .min(self.max_backoff)
    }
}

#[derive(Clone)]
pub struct CompletionDispatcher {
    gate: AccessGate,
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
    refund_retry: RefundRetry,
}

impl CompletionDispatcher {
    pub fn new(gate: AccessGate, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            gate,
            provider,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
            refund_retry: RefundRetry::default(),
        }
    }

    #[must_use]
    pub fn with_refund_retry(mut self, refund_retry: RefundRetry) -> Self {
        self.refund_retry = refund_retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authorize, debit and forward `prompt`, refunding if the provider
    /// produces no usable output.
    pub async fn dispatch(
        &self,
        resolution: SessionResolution,
        prompt: Prompt,
    ) -> Result<CompletionReceipt, Error> {
        let dispatcher = self.clone();
        let task = tokio::spawn(TraceId::propagate(async move {
            dispatcher.run(&resolution, &prompt).await
        }));
        task.await
            .map_err(|err| Error::internal(format!("completion task aborted: {err}")))?
    }

    async fn run(
        &self,
        resolution: &SessionResolution,
        prompt: &Prompt,
    ) -> Result<CompletionReceipt, Error> {
        let debit = match self.gate.authorize(resolution, Operation::Completion).await? {
            AccessDecision::Allow(debit) => debit,
            AccessDecision::Deny(reason) => return Err(reason.into_error()),
        };

        let failure = match tokio::time::timeout(self.timeout, self.provider.complete(prompt)).await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return Ok(CompletionReceipt {
                    text,
                    tokens_charged: debit.amount,
                    balance_after: debit.balance_after,
                });
            }
            Ok(Ok(_)) => CompletionProviderError::empty_response(),
            Ok(Err(err)) => err,
            Err(_) => CompletionProviderError::timeout(),
        };

        warn!(identity = %debit.identity, error = %failure, "completion failed; refunding");
        let refunded = self.refund_with_retry(&debit).await;
        Err(Error::provider(ProviderKind::Completion, failure.to_string()).with_details(json!({
            "provider": ProviderKind::Completion.as_str(),
            "refunded": refunded,
        })))
    }

    /// Only an unavailable store is worth retrying; any other refusal will
    /// not change on a second attempt.
    async fn refund_with_retry(&self, debit: &Debit) -> bool {
        let max_attempts = self.refund_retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.gate.refund(debit).await {
                Ok(_) => return true,
                Err(err) if err.code() == ErrorCode::ServiceUnavailable && attempt < max_attempts => {
                    tokio::time::sleep(self.refund_retry.delay(attempt)).await;
                }
                Err(err) => {
                    error!(
                        identity = %debit.identity,
                        amount = debit.amount.get(),
                        attempts = attempt,
                        code = ?err.code(),
                        "debit left unrefunded; needs manual reconciliation"
                    );
                    return false;
                }
            }
        }
        false
    }
}
