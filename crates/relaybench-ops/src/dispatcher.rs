//! Job dispatcher.
//!
//! Jobs are signed and submitted one by one in the given order; every
//! accepted job is then tracked by a single shared confirmation watcher and
//! all waits are joined at the end. A failure in one job never stops the
//! others.

use std::sync::Arc;

use alloy_primitives::Address;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relaybench_crypto::signer::{self, RelaySigner};
use relaybench_tx::{RelaySubmitter, SubmissionReceipt};
use relaybench_types::{
    ConfirmationRecord, Deadline, Identifier, RelayError, Result, TransactionRequest,
};
use relaybench_watch::{ChainReader, ConfirmationWatcher, PendingConfirmation};

use crate::{BatchResult, Config, Job, JobOutcome, JobReport};

enum Progress {
    Finished(JobOutcome),
    Awaiting(PendingConfirmation),
}

struct Submission {
    index: usize,
    cost: u64,
    gas_limit: u64,
    identifier: Option<Identifier>,
    receipt: Option<SubmissionReceipt>,
    progress: Progress,
}

impl Submission {
    async fn resolve(self) -> JobReport {
        let outcome = match self.progress {
            Progress::Finished(outcome) => outcome,
            Progress::Awaiting(pending) => outcome_of(pending.wait().await),
        };
        JobReport {
            index: self.index,
            cost: self.cost,
            gas_limit: self.gas_limit,
            identifier: self.identifier,
            receipt: self.receipt,
            outcome,
        }
    }
}

fn outcome_of(result: Result<ConfirmationRecord>) -> JobOutcome {
    match result {
        Ok(record) => JobOutcome::Confirmed(record),
        Err(RelayError::ConfirmationTimeout { deadline, .. }) => JobOutcome::TimedOut { deadline },
        Err(RelayError::RejectedByRelay { status, body }) => JobOutcome::Rejected { status, body },
        Err(e) => JobOutcome::Failed(e),
    }
}

/// Runs batches of relay jobs against one relay and one chain.
pub struct Dispatcher {
    config: Config,
    reader: Arc<dyn ChainReader>,
    submitter: Arc<dyn RelaySubmitter>,
}

impl Dispatcher {
    /// Invalid configuration is rejected here, before any job runs.
    pub fn new(
        config: Config,
        reader: Arc<dyn ChainReader>,
        submitter: Arc<dyn RelaySubmitter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, reader, submitter })
    }

    /// Run a batch to completion.
    pub async fn run(
        &self,
        jobs: &[Job],
        signer: &dyn RelaySigner,
        target: Address,
    ) -> Result<BatchResult> {
        self.run_until_cancelled(jobs, signer, target, &CancellationToken::new())
            .await
    }

    /// Run a batch; cancelling `cancel` abandons it and releases every wait.
    ///
    /// Only setup failures (bad target, unreadable chain head, watcher
    /// start-up) return `Err`; everything per job lands in the report.
    pub async fn run_until_cancelled(
        &self,
        jobs: &[Job],
        signer: &dyn RelaySigner,
        target: Address,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        if target == Address::ZERO {
            return Err(RelayError::Config("target contract is the zero address".into()));
        }

        let head = self.reader.block_number().await?;
        let lead = self.config.min_deadline_lead;
        let deadline = Deadline::new(head.saturating_add(lead), head, lead)?;

        let watcher =
            ConfirmationWatcher::start(self.reader.clone(), self.config.watcher_config(), cancel)
                .await?;

        info!(
            jobs = jobs.len(),
            head,
            deadline = deadline.block(),
            sender = %signer.address(),
            %target,
            "starting relay batch"
        );

        let mut submissions = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            let submission = if cancel.is_cancelled() {
                Submission {
                    index,
                    cost: job.cost,
                    gas_limit: self.config.gas.gas_limit(job.cost),
                    identifier: None,
                    receipt: None,
                    progress: Progress::Finished(JobOutcome::Failed(RelayError::Cancelled)),
                }
            } else {
                self.submit_job(index, job, signer, target, deadline, &watcher).await
            };
            submissions.push(submission);
        }

        let total_cost: u64 = jobs.iter().map(|j| j.cost).sum();
        info!(jobs = jobs.len(), total_cost, "all jobs submitted, waiting for confirmations");

        let reports = join_all(submissions.into_iter().map(Submission::resolve)).await;
        watcher.shutdown().await;

        let result = BatchResult { deadline, jobs: reports };
        let summary = result.summary();
        info!(
            jobs = summary.jobs,
            total_cost = summary.total_cost,
            confirmed = summary.confirmed,
            timed_out = summary.timed_out,
            failed = summary.failed,
            "relay batch finished"
        );
        Ok(result)
    }

    /// Build, sign, submit and register one job.
    async fn submit_job(
        &self,
        index: usize,
        job: &Job,
        signer: &dyn RelaySigner,
        target: Address,
        deadline: Deadline,
        watcher: &ConfirmationWatcher,
    ) -> Submission {
        let gas_limit = self.config.gas.gas_limit(job.cost);
        let mut submission = Submission {
            index,
            cost: job.cost,
            gas_limit,
            identifier: None,
            receipt: None,
            progress: Progress::Finished(JobOutcome::Failed(RelayError::Cancelled)),
        };

        let request = TransactionRequest {
            from: signer.address(),
            to: target,
            gas: gas_limit,
            data: job.calldata.clone(),
            deadline_block_number: deadline.block(),
            refund: self.config.refund_wei,
            relay_contract_address: self.config.relay_contract,
        };

        let (identifier, signed) = match signer::sign_request(request, signer) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(job = index, error = %e, "cannot build relay transaction");
                submission.progress = Progress::Finished(JobOutcome::Failed(e));
                return submission;
            }
        };
        submission.identifier = Some(identifier);

        let receipt = match self.submitter.submit(signed).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    job = index,
                    %identifier,
                    retryable = e.is_retryable(),
                    error = %e,
                    "relay submission failed"
                );
                submission.progress = Progress::Finished(outcome_of(Err(e)));
                return submission;
            }
        };
        info!(job = index, %identifier, gas = gas_limit, cost = job.cost, "relay job submitted");
        self.check_receipt(index, &identifier, &receipt);
        submission.receipt = Some(receipt);

        submission.progress = match watcher.register(identifier, deadline) {
            Ok(pending) => Progress::Awaiting(pending),
            Err(e) => Progress::Finished(JobOutcome::Failed(e)),
        };
        submission
    }

    /// Warn when a receipt signature does not come from the configured signer.
    fn check_receipt(&self, index: usize, identifier: &Identifier, receipt: &SubmissionReceipt) {
        let Some(signature) = receipt.receipt_signature.as_ref() else {
            return;
        };
        let expected = self.config.receipt_signer;
        if !signer::verify_identifier_signature(identifier, signature, expected) {
            warn!(job = index, %identifier, %expected, "receipt not signed by expected relay signer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, B256, U256};
    use async_trait::async_trait;
    use relaybench_crypto::{relay_id, LocalSigner};
    use relaybench_types::SignedTransactionRequest;
    use relaybench_watch::{MemoryChain, WatcherConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const RELAY: Address = Address::repeat_byte(0x33);
    const TARGET: Address = Address::repeat_byte(0x44);

    /// Records every request; fails calls listed in `failures` by call number.
    #[derive(Default)]
    struct RecordingSubmitter {
        requests: Mutex<Vec<SignedTransactionRequest>>,
        failures: Mutex<HashMap<usize, RelayError>>,
    }

    impl RecordingSubmitter {
        fn failing(call: usize, error: RelayError) -> Self {
            let submitter = Self::default();
            submitter.failures.lock().unwrap().insert(call, error);
            submitter
        }

        fn requests(&self) -> Vec<SignedTransactionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelaySubmitter for RecordingSubmitter {
        async fn submit(&self, request: SignedTransactionRequest) -> Result<SubmissionReceipt> {
            let call = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request);
                requests.len() - 1
            };
            if let Some(err) = self.failures.lock().unwrap().remove(&call) {
                return Err(err);
            }
            Ok(SubmissionReceipt::from_body(serde_json::json!({ "call": call })))
        }
    }

    struct BrokenSigner;

    impl RelaySigner for BrokenSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0x11)
        }

        fn sign_identifier(&self, _identifier: &Identifier) -> Result<alloy_primitives::Signature> {
            Err(RelayError::Signing("hardware wallet unplugged".into()))
        }
    }

    fn config() -> Config {
        Config {
            relay_contract: RELAY,
            relay_url: "http://relay.invalid".into(),
            min_deadline_lead: 10,
            watcher: WatcherConfig {
                poll_interval_ms: 5,
                ..WatcherConfig::default()
            },
            ..Config::default()
        }
    }

    fn jobs(costs: &[u64]) -> Vec<Job> {
        costs
            .iter()
            .map(|cost| Job::new(*cost, cost.to_be_bytes().to_vec()))
            .collect()
    }

    fn executed(identifier: Identifier) -> ConfirmationRecord {
        ConfirmationRecord {
            identifier,
            success: true,
            executor: Address::repeat_byte(0x77),
            gas_used: U256::from(100_000u64),
            fee: U256::from(1u64),
            block_number: None,
            transaction_hash: Some(B256::repeat_byte(0xee)),
        }
    }

    async fn wait_for_requests(submitter: &RecordingSubmitter, count: usize) -> Vec<SignedTransactionRequest> {
        for _ in 0..400 {
            let requests = submitter.requests();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} submissions", count);
    }

    /// Once `count` requests are in, confirm those at `confirm` and move the
    /// head far enough past the deadline for it to settle.
    fn drive(
        chain: Arc<MemoryChain>,
        submitter: Arc<RecordingSubmitter>,
        count: usize,
        confirm: Vec<usize>,
    ) -> tokio::task::JoinHandle<Vec<SignedTransactionRequest>> {
        tokio::spawn(async move {
            let requests = wait_for_requests(&submitter, count).await;
            let head = chain.head();
            for index in confirm {
                let id = relay_id::compute(&requests[index].request).unwrap();
                chain.push_confirmation(RELAY, head + 1, &executed(id));
            }
            chain.set_head(head + 20);
            requests
        })
    }

    #[tokio::test]
    async fn test_three_job_scenario() {
        let chain = Arc::new(MemoryChain::new(1_000));
        let submitter = Arc::new(RecordingSubmitter::default());
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();
        let batch = jobs(&[50, 250, 5]);

        let driver = drive(chain.clone(), submitter.clone(), 3, vec![1]);
        let result = dispatcher.run(&batch, &signer, TARGET).await.unwrap();
        let requests = driver.await.unwrap();

        // Submission order, gas tiers and the shared deadline.
        assert_eq!(requests.len(), 3);
        let gas: Vec<u64> = requests.iter().map(|r| r.request.gas).collect();
        assert_eq!(gas, vec![250_000, 3_000_000, 250_000]);
        for (request, job) in requests.iter().zip(&batch) {
            assert_eq!(request.request.data, job.calldata);
            assert_eq!(request.request.deadline_block_number, 1_010);
            assert_eq!(request.request.from, signer.address());
            assert_eq!(request.request.to, TARGET);
            assert_eq!(request.request.relay_contract_address, RELAY);
        }
        assert_eq!(result.deadline.block(), 1_010);

        let ids: Vec<Identifier> = result.jobs.iter().map(|j| j.identifier.unwrap()).collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
        for (id, request) in ids.iter().zip(&requests) {
            assert!(signer::verify_identifier_signature(id, &request.signature, signer.address()));
        }

        assert!(matches!(result.jobs[0].outcome, JobOutcome::TimedOut { deadline: 1_010 }));
        match &result.jobs[1].outcome {
            JobOutcome::Confirmed(record) => assert_eq!(record.identifier, ids[1]),
            other => panic!("job 2 should confirm, got {:?}", other),
        }
        assert!(matches!(result.jobs[2].outcome, JobOutcome::TimedOut { deadline: 1_010 }));
        assert_eq!(result.total_cost(), 305);
        assert!(result.jobs.iter().all(|j| j.receipt.is_some()));
    }

    #[tokio::test]
    async fn test_identical_jobs_share_confirmation() {
        let chain = Arc::new(MemoryChain::new(1_000));
        let submitter = Arc::new(RecordingSubmitter::default());
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();

        let driver = drive(chain.clone(), submitter.clone(), 2, vec![0]);
        let result = dispatcher.run(&jobs(&[5, 5]), &signer, TARGET).await.unwrap();
        let requests = driver.await.unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(result.jobs[0].identifier, result.jobs[1].identifier);
        for job in &result.jobs {
            assert!(job.receipt.is_some());
            match &job.outcome {
                JobOutcome::Confirmed(record) => assert_eq!(Some(record.identifier), job.identifier),
                other => panic!("job {} should confirm, got {:?}", job.index, other),
            }
        }
        assert_eq!(result.summary().confirmed, 2);
    }

    #[tokio::test]
    async fn test_rejection_does_not_stop_batch() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::failing(
            0,
            RelayError::RejectedByRelay { status: 400, body: "insufficient balance".into() },
        ));
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();

        let driver = drive(chain.clone(), submitter.clone(), 3, vec![1, 2]);
        let result = dispatcher.run(&jobs(&[300, 1, 2]), &signer, TARGET).await.unwrap();
        driver.await.unwrap();

        match &result.jobs[0].outcome {
            JobOutcome::Rejected { status, body } => {
                assert_eq!(*status, 400);
                assert_eq!(body, "insufficient balance");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(result.jobs[0].identifier.is_some());
        assert!(result.jobs[0].receipt.is_none());
        assert!(result.jobs[1].outcome.is_confirmed());
        assert!(result.jobs[2].outcome.is_confirmed());
    }

    #[tokio::test]
    async fn test_transport_error_is_per_job() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::failing(
            1,
            RelayError::Transport("connection reset".into()),
        ));
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();

        let driver = drive(chain.clone(), submitter.clone(), 3, vec![0, 2]);
        let result = dispatcher.run(&jobs(&[7, 8, 9]), &signer, TARGET).await.unwrap();
        driver.await.unwrap();

        assert!(result.jobs[0].outcome.is_confirmed());
        match &result.jobs[1].outcome {
            JobOutcome::Failed(e) => assert!(e.is_retryable()),
            other => panic!("expected transport failure, got {:?}", other),
        }
        assert!(result.jobs[2].outcome.is_confirmed());
        assert_eq!(result.failed().count(), 1);
    }

    #[tokio::test]
    async fn test_encoding_error_skips_submission() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::default());
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();
        let batch = vec![Job::new(1, Bytes::new()), Job::new(2, vec![0x01])];

        let driver = drive(chain.clone(), submitter.clone(), 1, vec![0]);
        let result = dispatcher.run(&batch, &signer, TARGET).await.unwrap();
        driver.await.unwrap();

        assert!(matches!(result.jobs[0].outcome, JobOutcome::Failed(RelayError::Encoding(_))));
        assert!(result.jobs[0].identifier.is_none());
        assert!(result.jobs[1].outcome.is_confirmed());
        assert_eq!(submitter.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_signing_error_per_job() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::default());
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();

        let result = dispatcher.run(&jobs(&[1, 2]), &BrokenSigner, TARGET).await.unwrap();
        assert!(result
            .jobs
            .iter()
            .all(|j| matches!(j.outcome, JobOutcome::Failed(RelayError::Signing(_)))));
        assert!(submitter.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_releases_pending_jobs() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::default());
        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();
        let cancel = CancellationToken::new();

        let canceller = {
            let submitter = submitter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                wait_for_requests(&submitter, 2).await;
                cancel.cancel();
            })
        };
        let result = dispatcher
            .run_until_cancelled(&jobs(&[1, 2]), &signer, TARGET, &cancel)
            .await
            .unwrap();
        canceller.await.unwrap();

        assert!(result
            .jobs
            .iter()
            .all(|j| matches!(j.outcome, JobOutcome::Failed(RelayError::Cancelled))));
    }

    #[tokio::test]
    async fn test_setup_failures_fail_fast() {
        let chain = Arc::new(MemoryChain::new(500));
        let submitter = Arc::new(RecordingSubmitter::default());

        let bad = Config { min_deadline_lead: 0, ..config() };
        assert!(matches!(
            Dispatcher::new(bad, chain.clone(), submitter.clone()),
            Err(RelayError::Config(_))
        ));

        let dispatcher = Dispatcher::new(config(), chain.clone(), submitter.clone()).unwrap();
        let signer = LocalSigner::random();
        assert!(matches!(
            dispatcher.run(&jobs(&[1]), &signer, Address::ZERO).await,
            Err(RelayError::Config(_))
        ));

        chain.fail_next_reads(1);
        assert!(matches!(
            dispatcher.run(&jobs(&[1]), &signer, TARGET).await,
            Err(RelayError::Transport(_))
        ));
        assert!(submitter.requests().is_empty());
    }

    #[test]
    fn test_outcome_mapping() {
        assert!(matches!(
            outcome_of(Err(RelayError::ConfirmationTimeout { identifier: B256::ZERO, deadline: 9 })),
            JobOutcome::TimedOut { deadline: 9 }
        ));
        assert!(matches!(
            outcome_of(Err(RelayError::RejectedByRelay { status: 409, body: "duplicate".into() })),
            JobOutcome::Rejected { status: 409, .. }
        ));
        assert!(matches!(outcome_of(Err(RelayError::Cancelled)), JobOutcome::Failed(RelayError::Cancelled)));
    }
}
