//! Benchmark and comparison history, plus the oracle result they are judged against.
//!
//! All writes go through one mutex. Each run is issued a [`Ticket`] before it starts.
//! The oracle is the result of the trusted run with the lowest ticket; it is only
//! published once every lower trusted ticket has been recorded or released, and is
//! never replaced afterwards, so it does not depend on completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Coordinates, InputLabel};

/// One row of the chronological benchmark log.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkRecord {
    pub input_label: InputLabel,
    pub implementation: String,
    pub elapsed_ms: f64,
}

/// One completed run, kept for correctness comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonRecord {
    pub result: Coordinates,
    pub elapsed_ms: f64,
    pub implementation: String,
    pub input_size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    /// No oracle has been established yet.
    Unknown,
}

/// Whether `reset` keeps the benchmark log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetainBenchmarks {
    Keep,
    Discard,
}

/// Submission slot of a run, tied to the ledger generation it was issued in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket {
    generation: u64,
    sequence: u64,
}

/// Everything `record` needs to know about a finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunEntry {
    pub implementation: String,
    pub input_label: InputLabel,
    pub input_size: usize,
    pub elapsed_ms: f64,
    pub result: Coordinates,
    pub trusted_reference: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OracleOrigin {
    /// Copied from a precomputed case.
    Preset,
    Run(u64),
}

#[derive(Debug, Default)]
struct LedgerState {
    generation: u64,
    next_sequence: u64,
    benchmarks: Vec<BenchmarkRecord>,
    comparisons: Vec<ComparisonRecord>,
    /// Written at most once per generation.
    oracle: Option<(Coordinates, OracleOrigin)>,
    /// Trusted tickets issued but not yet recorded or released.
    pending_trusted: BTreeSet<u64>,
    /// Trusted results waiting for lower pending tickets to resolve.
    candidates: BTreeMap<u64, Coordinates>,
}

impl LedgerState {
    fn issue(&mut self, trusted: bool) -> Ticket {
        let ticket = Ticket {
            generation: self.generation,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        if trusted {
            self.pending_trusted.insert(ticket.sequence);
        }
        ticket
    }

    fn clear(&mut self, retain: RetainBenchmarks) {
        self.generation += 1;
        self.comparisons.clear();
        self.oracle = None;
        self.pending_trusted.clear();
        self.candidates.clear();
        if retain == RetainBenchmarks::Discard {
            self.benchmarks.clear();
        }
    }

    /// Publishes the lowest trusted result once no lower trusted ticket is outstanding.
    fn settle(&mut self) {
        if self.oracle.is_some() {
            self.candidates.clear();
            return;
        }
        let lowest = match self.candidates.keys().next() {
            Some(&sequence) => sequence,
            None => return,
        };
        if self.pending_trusted.range(..lowest).next().is_some() {
            return;
        }
        if let Some(result) = self.candidates.remove(&lowest) {
            log::info!("oracle established by ticket {}: {}", lowest, result);
            self.oracle = Some((result, OracleOrigin::Run(lowest)));
            self.candidates.clear();
        }
    }

    fn verdict(&self, record: &ComparisonRecord) -> Verdict {
        match &self.oracle {
            None => Verdict::Unknown,
            Some((oracle, _)) if *oracle == record.result => Verdict::Correct,
            Some(_) => Verdict::Incorrect,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResultLedger {
    state: Mutex<LedgerState>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a submission slot; take it before starting the run.
    ///
    /// While a trusted ticket is outstanding no higher trusted result can become
    /// the oracle.
    pub fn ticket(&self, trusted: bool) -> Ticket {
        self.state().issue(trusted)
    }

    /// Appends a run submitted just now.
    pub fn record(&self, entry: RunEntry) -> ComparisonRecord {
        let mut state = self.state();
        let ticket = state.issue(entry.trusted_reference);
        Self::append(&mut state, ticket, entry)
    }

    /// Appends a run that was issued `ticket` at submission.
    ///
    /// Returns `None` and records nothing if the ledger has been reset since the
    /// ticket was issued.
    pub fn record_ticketed(&self, ticket: Ticket, entry: RunEntry) -> Option<ComparisonRecord> {
        let mut state = self.state();
        if ticket.generation != state.generation {
            log::debug!(
                "discarding result of {} from a superseded vector set",
                entry.implementation
            );
            return None;
        }
        Some(Self::append(&mut state, ticket, entry))
    }

    /// Gives up a ticket whose run produced no result.
    pub fn release(&self, ticket: Ticket) {
        let mut state = self.state();
        if ticket.generation == state.generation && state.pending_trusted.remove(&ticket.sequence)
        {
            state.settle();
        }
    }

    fn append(state: &mut LedgerState, ticket: Ticket, entry: RunEntry) -> ComparisonRecord {
        state.benchmarks.push(BenchmarkRecord {
            input_label: entry.input_label,
            implementation: entry.implementation.clone(),
            elapsed_ms: entry.elapsed_ms,
        });
        let record = ComparisonRecord {
            result: entry.result,
            elapsed_ms: entry.elapsed_ms,
            implementation: entry.implementation,
            input_size: entry.input_size,
        };
        state.comparisons.push(record.clone());

        state.pending_trusted.remove(&ticket.sequence);
        if entry.trusted_reference && state.oracle.is_none() {
            state.candidates.insert(ticket.sequence, record.result.clone());
        }
        state.settle();
        record
    }

    /// Verdict against the oracle as it stands now.
    pub fn is_correct(&self, record: &ComparisonRecord) -> Verdict {
        self.state().verdict(record)
    }

    /// Verdict for a run recorded under `ticket`, or `None` while a trusted run of
    /// the same generation may still establish the oracle.
    ///
    /// A ticket from a superseded generation is judged `Unknown`.
    pub fn settled_verdict(&self, ticket: Ticket, record: &ComparisonRecord) -> Option<Verdict> {
        let state = self.state();
        if ticket.generation != state.generation {
            return Some(Verdict::Unknown);
        }
        if state.oracle.is_none() && !state.pending_trusted.is_empty() {
            return None;
        }
        Some(state.verdict(record))
    }

    pub fn oracle(&self) -> Option<Coordinates> {
        self.state().oracle.as_ref().map(|(oracle, _)| oracle.clone())
    }

    /// Drops comparisons and the oracle; outstanding tickets become stale.
    pub fn reset(&self, retain: RetainBenchmarks) {
        self.state().clear(retain);
    }

    /// Like [`reset`](Self::reset), then installs a known-good oracle.
    pub fn reset_with_oracle(&self, oracle: Coordinates, retain: RetainBenchmarks) {
        let mut state = self.state();
        state.clear(retain);
        state.oracle = Some((oracle, OracleOrigin::Preset));
    }

    pub fn benchmarks(&self) -> Vec<BenchmarkRecord> {
        self.state().benchmarks.clone()
    }

    pub fn comparisons(&self) -> Vec<ComparisonRecord> {
        self.state().comparisons.clone()
    }
}
