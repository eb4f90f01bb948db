//! Batch orchestration: build, sign, submit and confirm relay jobs.
//!
//! Coordinates the encoder, signer, relay client and confirmation watcher
//! and reports one outcome per job.

pub mod config;
pub mod dispatcher;
pub mod gas;

use alloy_primitives::Bytes;
use serde::Serialize;
use relaybench_tx::SubmissionReceipt;
use relaybench_types::{ConfirmationRecord, Deadline, Identifier, RelayError};

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use gas::GasPolicy;

/// One unit of work: calldata for the target contract plus its declared cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub cost: u64,
    pub calldata: Bytes,
}

impl Job {
    pub fn new(cost: u64, calldata: impl Into<Bytes>) -> Self {
        Self { cost, calldata: calldata.into() }
    }
}

/// Final state of a single job.
#[derive(Debug)]
pub enum JobOutcome {
    /// `RelayExecuted` observed for the job's identifier.
    Confirmed(ConfirmationRecord),
    /// The relay refused the request.
    Rejected { status: u16, body: String },
    /// The deadline block passed without a matching event.
    TimedOut { deadline: u64 },
    /// Encoding, signing, transport or cancellation failure.
    Failed(RelayError),
}

impl JobOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, JobOutcome::Confirmed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Confirmed(_) => "confirmed",
            JobOutcome::Rejected { .. } => "rejected",
            JobOutcome::TimedOut { .. } => "timeout",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

/// Per-job report, in submission order.
#[derive(Debug)]
pub struct JobReport {
    pub index: usize,
    pub cost: u64,
    pub gas_limit: u64,
    /// Missing only when encoding failed.
    pub identifier: Option<Identifier>,
    pub receipt: Option<SubmissionReceipt>,
    pub outcome: JobOutcome,
}

/// Result of a whole batch.
#[derive(Debug)]
pub struct BatchResult {
    pub deadline: Deadline,
    pub jobs: Vec<JobReport>,
}

impl BatchResult {
    pub fn total_cost(&self) -> u64 {
        self.jobs.iter().map(|j| j.cost).sum()
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.outcome.is_confirmed())
    }

    pub fn timed_out(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| matches!(j.outcome, JobOutcome::TimedOut { .. }))
    }

    /// Jobs that were rejected or failed before confirmation tracking.
    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, JobOutcome::Rejected { .. } | JobOutcome::Failed(_)))
    }

    pub fn outcome_for(&self, identifier: &Identifier) -> Option<&JobOutcome> {
        self.jobs
            .iter()
            .find(|j| j.identifier.as_ref() == Some(identifier))
            .map(|j| &j.outcome)
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            deadline: self.deadline.block(),
            jobs: self.jobs.len(),
            total_cost: self.total_cost(),
            confirmed: self.confirmed().count(),
            timed_out: self.timed_out().count(),
            failed: self.failed().count(),
        }
    }
}

/// Counts for logging and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub deadline: u64,
    pub jobs: usize,
    pub total_cost: u64,
    pub confirmed: usize,
    pub timed_out: usize,
    pub failed: usize,
}
