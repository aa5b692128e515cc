use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::catalog::SymbolCatalog;
use crate::oracle::Oracle;
use crate::prepare::post_format;
use crate::worker::{JobOutcome, Lane, OracleWorker};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a line has no value. The display text is what the sheet shows in the
/// result column.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("Calculation timeout")]
    Timeout,
    /// The oracle answered with its own error message.
    #[error("{0}")]
    Oracle(String),
    #[error("Invalid expression")]
    InvalidExpression,
    #[error("Calculation failed")]
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Value(String),
    Failed(EvalError),
}

impl Outcome {
    /// Classify raw oracle output.
    pub fn from_raw(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self::Failed(EvalError::InvalidExpression);
        }
        let lower = text.to_lowercase();
        if ["error", "undefined", "invalid"]
            .iter()
            .any(|k| lower.contains(k))
        {
            return Self::Failed(EvalError::Oracle(text.to_string()));
        }
        Self::Value(post_format(text))
    }
}

/// Fixed answers for a few literals that never reach the oracle.
pub fn special_answer(expression: &str) -> Option<&'static str> {
    match expression.trim().to_lowercase().as_str() {
        "0/0" => Some(r"¯\_(ツ)_/¯"),
        "infinity" | "inf" => Some("∞ The void stares back ∞"),
        _ => None,
    }
}

// ── Evaluator ──

/// Async façade over the oracle worker: submits prepared expressions, enforces
/// the timeout, aborts the oracle when the caller gives up, and maps raw
/// answers into [`Outcome`]s.
pub struct Evaluator {
    worker: OracleWorker,
    catalog: OnceCell<Arc<SymbolCatalog>>,
    timeout: Duration,
}

impl Evaluator {
    pub fn start(oracle: Arc<dyn Oracle>, timeout: Duration) -> Result<Self, std::io::Error> {
        Ok(Self {
            worker: OracleWorker::start(oracle)?,
            catalog: OnceCell::new(),
            timeout,
        })
    }

    /// Function and variable names, fetched from the oracle on first use.
    pub async fn catalog(&self) -> Arc<SymbolCatalog> {
        self.catalog
            .get_or_init(|| async {
                let symbols = match self.worker.symbols() {
                    Ok(rx) => rx.await.ok(),
                    Err(_) => None,
                };
                let Some((functions, variables)) = symbols else {
                    tracing::warn!("oracle worker gone, using an empty symbol catalog");
                    return Arc::new(SymbolCatalog::default());
                };
                let catalog = SymbolCatalog::from_symbols(&functions, &variables);
                tracing::debug!(
                    basic = catalog.basic().len(),
                    advanced = catalog.advanced().len(),
                    "symbol catalog loaded"
                );
                Arc::new(catalog)
            })
            .await
            .clone()
    }

    /// Ask the oracle to refresh exchange rates on the background lane.
    pub async fn refresh_rates(&self) -> bool {
        match self.worker.refresh_rates() {
            Ok(rx) => rx.await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Abort whatever the oracle is doing right now. An evaluation hit by
    /// this without being cancelled itself is transparently retried.
    pub fn abort(&self) {
        self.worker.abort_current();
    }

    /// Evaluate prepared `expression`. Returns `None` if `cancel` fires first.
    pub async fn evaluate(&self, expression: &str, cancel: &CancellationToken) -> Option<Outcome> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let attempt = cancel.child_token();
            let (id, rx) =
                match self
                    .worker
                    .submit(Lane::Interactive, expression.to_string(), attempt.clone())
                {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::warn!("{e}");
                        return Some(Outcome::Failed(EvalError::Unavailable));
                    }
                };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.worker.abort_job(id);
                    return None;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    attempt.cancel();
                    self.worker.abort_job(id);
                    tracing::debug!(expression, "evaluation timed out");
                    return Some(Outcome::Failed(EvalError::Timeout));
                }
                reply = rx => match reply {
                    Ok(JobOutcome::Finished(Ok(raw))) => return Some(Outcome::from_raw(&raw)),
                    Ok(JobOutcome::Finished(Err(e))) => {
                        tracing::warn!(expression, "oracle call failed: {e}");
                        return Some(Outcome::Failed(EvalError::Unavailable));
                    }
                    Ok(JobOutcome::Interrupted) => {
                        tracing::debug!(expression, "evaluation interrupted, retrying");
                    }
                    Ok(JobOutcome::Skipped) => return None,
                    Err(_) => return Some(Outcome::Failed(EvalError::Unavailable)),
                },
            }
        }
    }
}
