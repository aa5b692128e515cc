use crossterm::event::Event as TermEvent;
use tally_core::{Completion, CompletionSink};
use tokio::sync::mpsc;

/// Unified event type for the main loop.
pub enum AppEvent {
    Terminal(TermEvent),
    Calc(Completion),
    Tick,
    Quit,
}

/// Feeds evaluation completions into the main loop.
pub struct AppCompletionSink {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl AppCompletionSink {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl CompletionSink for AppCompletionSink {
    async fn deliver(&self, completion: Completion) {
        let _ = self.tx.send(AppEvent::Calc(completion));
    }
}
