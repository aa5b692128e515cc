pub mod catalog;
pub mod classify;
pub mod completions;
pub mod config;
pub mod evaluator;
pub mod manager;
pub mod oracle;
pub mod prepare;
pub mod rates;
pub mod resolve;
pub mod session;
pub mod sheet;
pub mod undo;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-exports
pub use catalog::SymbolCatalog;
pub use config::{ConfigError, TallyConfig};
pub use evaluator::{EvalError, Evaluator, Outcome};
pub use manager::{CalculationManager, ChannelSink, Completion, CompletionSink};
pub use oracle::{Oracle, OracleError, QalcOracle, Symbol};
pub use rates::spawn_rate_refresher;
pub use session::Session;
pub use sheet::{EvalState, Line, Sheet};
pub use undo::{Snapshot, UndoEngine};
