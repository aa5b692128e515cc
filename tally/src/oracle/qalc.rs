use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{Oracle, OracleError, Symbol};

/// Exchange rates older than this are refreshed.
pub const RATES_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest a rate download may run before it is killed.
pub const RATES_FETCH_LIMIT: Duration = Duration::from_secs(15);

/// Files libqalculate writes under its data directory when it downloads
/// exchange rates.
const RATE_FILES: &[&str] = &["eurofxref-daily.xml", "rates.json", "btc.json"];

/// How often a running `qalc` child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The `qalc` child of the call in flight. `abort_pending` records an abort
/// that arrived before the child was spawned.
#[derive(Default)]
struct Running {
    child: Option<Child>,
    abort_pending: bool,
}

/// Oracle backed by libqalculate's `qalc` command-line front end.
///
/// Every evaluation spawns `qalc -t <expr>`; `abort` kills the running child.
pub struct QalcOracle {
    program: PathBuf,
    running: Mutex<Running>,
    rates_dir: Option<PathBuf>,
    max_rate_age: Duration,
    fetch_limit: Duration,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn kill(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Age of the newest exchange-rate file in `dir`, `None` when there is none.
fn rates_age(dir: &Path) -> Option<Duration> {
    RATE_FILES
        .iter()
        .filter_map(|name| std::fs::metadata(dir.join(name)).and_then(|m| m.modified()).ok())
        .max()
        .map(|newest| newest.elapsed().unwrap_or_default())
}

impl QalcOracle {
    pub fn new() -> Self {
        Self::with_program("qalc")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            running: Mutex::new(Running::default()),
            rates_dir: dirs::data_dir().map(|d| d.join("qalculate")),
            max_rate_age: RATES_MAX_AGE,
            fetch_limit: RATES_FETCH_LIMIT,
        }
    }

    pub fn with_max_rate_age(mut self, age: Duration) -> Self {
        self.max_rate_age = age;
        self
    }

    /// Spawn `qalc` with `args`, wait for it (or for `abort`, or for `limit`
    /// to pass), return trimmed stdout.
    fn run(&self, args: &[&str], limit: Option<Duration>) -> Result<String, OracleError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                OracleError::Unavailable(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        // Drain stdout on a helper thread so a chatty child can't fill the pipe.
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut out = String::new();
            if let Some(mut stdout) = stdout {
                let _ = stdout.read_to_string(&mut out);
            }
            out
        });

        {
            let mut running = lock(&self.running);
            if std::mem::take(&mut running.abort_pending) {
                tracing::debug!("abort arrived before qalc started");
                kill(child);
            } else {
                running.child = Some(child);
            }
        }

        let started = Instant::now();
        let mut timed_out = false;
        loop {
            {
                let mut running = lock(&self.running);
                let Some(child) = running.child.as_mut() else {
                    // Taken and killed by abort().
                    break;
                };
                if child.try_wait()?.is_some() {
                    running.child.take();
                    break;
                }
                if limit.is_some_and(|limit| started.elapsed() >= limit) {
                    if let Some(child) = running.child.take() {
                        kill(child);
                    }
                    timed_out = true;
                    break;
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let out = reader
            .join()
            .map_err(|_| OracleError::Unavailable("qalc output reader panicked".into()))?;
        if timed_out {
            return Err(OracleError::Unavailable(format!(
                "{} killed after {:?}",
                self.program.display(),
                started.elapsed()
            )));
        }
        Ok(out.trim().to_string())
    }
}

impl Default for QalcOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for QalcOracle {
    fn evaluate(&self, expression: &str) -> Result<String, OracleError> {
        // Leading space keeps expressions like "-5+3" from parsing as flags.
        let expr = format!(" {expression}");
        self.run(&["-t", &expr], None)
    }

    fn abort(&self) {
        let mut running = lock(&self.running);
        match running.child.take() {
            Some(child) => kill(child),
            None => running.abort_pending = true,
        }
    }

    fn reset_abort(&self) {
        lock(&self.running).abort_pending = false;
    }

    fn list_functions(&self) -> Vec<Symbol> {
        FUNCTIONS
            .iter()
            .map(|(name, category)| Symbol::new(name, category))
            .collect()
    }

    fn list_variables(&self) -> Vec<Symbol> {
        VARIABLES
            .iter()
            .map(|(name, category)| Symbol::new(name, category))
            .collect()
    }

    fn refresh_rates(&self) -> bool {
        if let Some(age) = self.rates_dir.as_deref().and_then(rates_age)
            && age < self.max_rate_age
        {
            tracing::debug!(?age, "exchange rates are fresh");
            return false;
        }
        // Never aborted itself; an abort left over from the last evaluation
        // must not kill the download.
        self.reset_abort();
        match self.run(&["-e", "-t", "0"], Some(self.fetch_limit)) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("exchange rate refresh failed: {e}");
                false
            }
        }
    }
}

// ── Symbol tables ──
//
// `qalc` has no machine-readable listing, so the catalog is a fixed subset of
// libqalculate's definitions with their upstream categories.

const FUNCTIONS: &[(&str, &str)] = &[
    ("sin", "Trigonometry"),
    ("cos", "Trigonometry"),
    ("tan", "Trigonometry"),
    ("asin", "Trigonometry"),
    ("acos", "Trigonometry"),
    ("atan", "Trigonometry"),
    ("atan2", "Trigonometry"),
    ("sinh", "Trigonometry"),
    ("cosh", "Trigonometry"),
    ("tanh", "Trigonometry"),
    ("sqrt", "Exponents & Logarithms"),
    ("cbrt", "Exponents & Logarithms"),
    ("root", "Exponents & Logarithms"),
    ("ln", "Exponents & Logarithms"),
    ("log", "Exponents & Logarithms"),
    ("log2", "Exponents & Logarithms"),
    ("log10", "Exponents & Logarithms"),
    ("exp", "Exponents & Logarithms"),
    ("exp2", "Exponents & Logarithms"),
    ("exp10", "Exponents & Logarithms"),
    ("pow", "Exponents & Logarithms"),
    ("lambertw", "Exponents & Logarithms"),
    ("abs", "Number Theory/Arithmetics"),
    ("gcd", "Number Theory/Arithmetics"),
    ("lcm", "Number Theory/Arithmetics"),
    ("mod", "Number Theory/Arithmetics"),
    ("rem", "Number Theory/Arithmetics"),
    ("round", "Number Theory/Rounding"),
    ("floor", "Number Theory/Rounding"),
    ("ceil", "Number Theory/Rounding"),
    ("trunc", "Number Theory/Rounding"),
    ("isprime", "Number Theory/Prime Numbers"),
    ("factorial", "Combinatorics"),
    ("binomial", "Combinatorics"),
    ("mean", "Statistics/Descriptive Statistics"),
    ("median", "Statistics/Descriptive Statistics"),
    ("max", "Statistics/Descriptive Statistics"),
    ("min", "Statistics/Descriptive Statistics"),
    ("stdev", "Statistics/Descriptive Statistics"),
    ("if", "Logical"),
    ("days", "Date & Time"),
    ("today", "Date & Time"),
    ("re", "Complex Numbers"),
    ("im", "Complex Numbers"),
    ("det", "Matrices & Vectors"),
    ("transpose", "Matrices & Vectors"),
    ("permanent", "Matrices & Vectors"),
    ("integrate", "Calculus"),
    ("diff", "Calculus"),
    ("gamma", "Special Functions"),
    ("erf", "Special Functions"),
    ("bin", "Number Theory/Number Bases"),
    ("hex", "Number Theory/Number Bases"),
];

const VARIABLES: &[(&str, &str)] = &[
    ("pi", "Basic Constants"),
    ("e", "Basic Constants"),
    ("golden", "Basic Constants"),
    ("euler", "Basic Constants"),
    ("catalan", "Basic Constants"),
    ("speed_of_light", "Physical Constants/Universal Constants"),
    ("planck", "Physical Constants/Universal Constants"),
    ("gravity", "Physical Constants/Universal Constants"),
    ("avogadro", "Physical Constants/Physico-Chemical Constants"),
    ("boltzmann", "Physical Constants/Physico-Chemical Constants"),
    ("elementary_charge", "Physical Constants/Electromagnetic Constants"),
    ("x", "Unknowns"),
    ("y", "Unknowns"),
    ("googol", "Large Numbers"),
];
