use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::catalog::SymbolCatalog;
use crate::classify::should_evaluate;
use crate::evaluator::{Evaluator, Outcome, special_answer};
use crate::prepare::prepare_input;
use crate::resolve::resolve;
use crate::sheet::{EvalState, Sheet};

/// A finished evaluation on its way back to the event loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub index: usize,
    pub token_id: u64,
    pub outcome: Outcome,
}

/// Where evaluation tasks deliver their completions. The receiving side must
/// hand each one to [`CalculationManager::complete`] on the event loop.
#[async_trait::async_trait]
pub trait CompletionSink: Send + Sync {
    async fn deliver(&self, completion: Completion);
}

/// Sink backed by an unbounded tokio channel.
pub struct ChannelSink(mpsc::UnboundedSender<Completion>);

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

#[async_trait::async_trait]
impl CompletionSink for ChannelSink {
    async fn deliver(&self, completion: Completion) {
        if self.0.send(completion).is_err() {
            tracing::trace!("completion receiver dropped");
        }
    }
}

struct LiveToken {
    id: u64,
    cancel: CancellationToken,
}

/// Tracks one evaluation slot per line. A completion is applied only if its
/// token is still the live one for that line; anything else is stale.
pub struct CalculationManager {
    evaluator: Arc<Evaluator>,
    catalog: Arc<SymbolCatalog>,
    sink: Arc<dyn CompletionSink>,
    slots: Vec<Option<LiveToken>>,
    next_token: u64,
}

impl CalculationManager {
    pub fn new(
        evaluator: Arc<Evaluator>,
        catalog: Arc<SymbolCatalog>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            evaluator,
            catalog,
            sink,
            slots: Vec::new(),
            next_token: 1,
        }
    }

    pub fn catalog(&self) -> &Arc<SymbolCatalog> {
        &self.catalog
    }

    /// (Re)start evaluation of line `index`, superseding any evaluation already
    /// running for it. A synchronous change to the line's result cascades.
    pub fn submit(&mut self, sheet: &mut Sheet, index: usize) {
        self.resize(sheet.len());
        if self.dispatch(sheet, index) {
            self.cascade(sheet, index);
        }
    }

    /// Re-submit every line from `from` onwards in a single forward pass.
    pub fn resubmit_from(&mut self, sheet: &mut Sheet, from: usize) {
        self.resize(sheet.len());
        for index in from..sheet.len() {
            if sheet.expression(index).trim().is_empty() {
                self.cancel(sheet, index);
                sheet.clear_result(index);
            } else {
                self.dispatch(sheet, index);
            }
        }
    }

    /// Apply a completion. Returns false, changing nothing, if its token is no
    /// longer live for that line.
    pub fn complete(&mut self, sheet: &mut Sheet, completion: Completion) -> bool {
        let Completion {
            index,
            token_id,
            outcome,
        } = completion;
        let live = self.slots.get(index).and_then(Option::as_ref).map(|t| t.id);
        if live != Some(token_id) {
            tracing::trace!(index, token = token_id, "discarding stale completion");
            return false;
        }
        self.slots[index] = None;
        match outcome {
            Outcome::Value(text) => sheet.record_result(index, text),
            Outcome::Failed(err) => sheet.record_failure(index, err.to_string()),
        }
        self.cascade(sheet, index);
        true
    }

    /// Stop evaluating line `index`; the line goes back to idle.
    pub fn cancel(&mut self, sheet: &mut Sheet, index: usize) {
        if self.cancel_slot(index) {
            sheet.set_state(index, EvalState::Idle);
        }
    }

    /// Match the slot count to `len`, cancelling evaluations past the end.
    pub fn resize(&mut self, len: usize) {
        for index in len..self.slots.len() {
            self.cancel_slot(index);
        }
        self.slots.resize_with(len, || None);
    }

    /// Make room for a line inserted at `at`. Evaluations at or after `at`
    /// are cancelled since their positional references shifted.
    pub fn insert_slot(&mut self, at: usize) {
        self.cancel_from(at);
        let at = at.min(self.slots.len());
        self.slots.insert(at, None);
    }

    /// Drop the slot of a line removed at `at`, cancelling evaluations at or
    /// after it.
    pub fn remove_slot(&mut self, at: usize) {
        self.cancel_from(at);
        if at < self.slots.len() {
            self.slots.remove(at);
        }
    }

    /// Forget every live evaluation without touching results.
    pub fn orphan_all(&mut self) {
        self.cancel_from(0);
    }

    pub fn in_flight(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn live_token(&self, index: usize) -> Option<u64> {
        self.slots.get(index).and_then(Option::as_ref).map(|t| t.id)
    }

    // ── Internals ──

    fn cascade(&mut self, sheet: &mut Sheet, index: usize) {
        if index + 1 < sheet.len() {
            tracing::debug!(from = index + 1, "cascading");
            self.resubmit_from(sheet, index + 1);
        }
    }

    fn cancel_slot(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index).and_then(Option::take) {
            Some(token) => {
                token.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn cancel_from(&mut self, from: usize) {
        for index in from..self.slots.len() {
            self.cancel_slot(index);
        }
    }

    /// Start work for line `index`. Returns true when the line's result
    /// changed synchronously.
    fn dispatch(&mut self, sheet: &mut Sheet, index: usize) -> bool {
        if index >= sheet.len() {
            return false;
        }
        self.cancel_slot(index);

        let text = sheet.expression(index).to_string();
        if prepare_input(&text).trim().is_empty() {
            return sheet.clear_result(index);
        }
        if let Some(answer) = special_answer(&text) {
            let changed = sheet.result(index) != answer;
            sheet.record_result(index, answer.to_string());
            return changed;
        }
        if !should_evaluate(&text, &self.catalog) {
            return sheet.clear_result(index);
        }

        let expression = resolve(&text, index, &sheet.results());
        let token_id = self.next_token;
        self.next_token += 1;
        let cancel = CancellationToken::new();
        self.slots[index] = Some(LiveToken {
            id: token_id,
            cancel: cancel.clone(),
        });
        sheet.set_state(index, EvalState::Evaluating);
        tracing::debug!(index, token = token_id, %expression, "submitting");

        let evaluator = Arc::clone(&self.evaluator);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Some(outcome) = evaluator.evaluate(&expression, &cancel).await {
                sink.deliver(Completion {
                    index,
                    token_id,
                    outcome,
                })
                .await;
            }
        });
        false
    }
}

impl Drop for CalculationManager {
    fn drop(&mut self) {
        self.orphan_all();
    }
}
