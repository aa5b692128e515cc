use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::oracle::{Oracle, OracleError, Symbol};

/// Scripted oracle for tests: integer arithmetic on a single binary operator,
/// canned answers, per-expression delays, and an observable abort counter.
#[derive(Default)]
pub(crate) struct FakeOracle {
    answers: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    aborts: AtomicUsize,
    resets: AtomicUsize,
    rate_refreshes: AtomicUsize,
}

impl FakeOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, expression: &str, answer: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(expression.into(), answer.into());
    }

    pub fn delay(&self, expression: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(expression.into(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn rate_refreshes(&self) -> usize {
        self.rate_refreshes.load(Ordering::SeqCst)
    }

    /// Wait until `count` evaluations have started.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Oracle for FakeOracle {
    fn evaluate(&self, expression: &str) -> Result<String, OracleError> {
        let expression = expression.trim().to_string();
        let aborts_at_start = self.aborts();
        self.calls.lock().unwrap().push(expression.clone());

        let delay = self.delays.lock().unwrap().get(&expression).copied();
        if let Some(delay) = delay {
            let started = Instant::now();
            while started.elapsed() < delay {
                if self.aborts() != aborts_at_start {
                    return Err(OracleError::Unavailable("aborted".into()));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        if let Some(answer) = self.answers.lock().unwrap().get(&expression) {
            return Ok(answer.clone());
        }
        Ok(compute(&expression))
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_abort(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn list_functions(&self) -> Vec<Symbol> {
        vec![
            Symbol::new("sin", "Trigonometry"),
            Symbol::new("sqrt", "Exponents & Logarithms"),
            Symbol::new("gcd", "Number Theory/Arithmetics"),
        ]
    }

    fn list_variables(&self) -> Vec<Symbol> {
        vec![
            Symbol::new("pi", "Basic Constants"),
            Symbol::new("golden", "Basic Constants"),
        ]
    }

    fn refresh_rates(&self) -> bool {
        self.rate_refreshes.fetch_add(1, Ordering::SeqCst);
        true
    }
}

fn compute(expression: &str) -> String {
    let expr: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
    if let Ok(n) = expr.parse::<i64>() {
        return n.to_string();
    }
    let Some(pos) = expr
        .get(1..)
        .and_then(|rest| rest.find(['+', '-', '*', '/']))
        .map(|p| p + 1)
    else {
        return format!("error: cannot evaluate \"{expr}\"");
    };
    let (lhs, rhs) = (&expr[..pos], &expr[pos + 1..]);
    let (Ok(a), Ok(b)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) else {
        return format!("error: cannot evaluate \"{expr}\"");
    };
    match &expr[pos..pos + 1] {
        "+" => (a + b).to_string(),
        "-" => (a - b).to_string(),
        "*" => (a * b).to_string(),
        _ if b == 0 => "error: division by zero".into(),
        _ => (a / b).to_string(),
    }
}
