mod qalc;

pub use qalc::{QalcOracle, RATES_MAX_AGE};

/// A function or variable name known to the oracle, with its category path
/// (e.g. "Trigonometry", "Number Theory/Arithmetics").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub category: String,
}

impl Symbol {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// The external expression engine. Implementations are stateful and
/// non-reentrant: at most one `evaluate` call may be in flight at a time,
/// which the [`OracleWorker`](crate::worker::OracleWorker) guarantees.
///
/// `abort` is the exception. It is called from other threads while
/// `evaluate` is running and must stop whatever call is currently in flight.
pub trait Oracle: Send + Sync + 'static {
    /// Evaluate prepared expression text. Returns the oracle's formatted
    /// answer, which may itself be an error message (e.g. "error: ...").
    fn evaluate(&self, expression: &str) -> Result<String, OracleError>;

    /// Best-effort, global abort of the call currently in flight. An abort
    /// that lands before the call has started must still stop it.
    fn abort(&self);

    /// Forget any abort aimed at an earlier call. Runs before each
    /// `evaluate`, never concurrently with `abort`.
    fn reset_abort(&self) {}

    fn list_functions(&self) -> Vec<Symbol>;

    fn list_variables(&self) -> Vec<Symbol>;

    /// Refresh auxiliary currency data if it is stale. Returns false when the
    /// refresh was unnecessary or failed.
    fn refresh_rates(&self) -> bool;
}
