//! The controller: owns the current vector set, the backend registry and the ledger.
//!
//! Every mutation of controller state goes through the methods here. Generation
//! requests are tagged with an [`Epoch`](crate::Epoch) and only the latest one is
//! committed; backend runs execute on the blocking pool and are awaited one future
//! per backend. A run's verdict is only taken once the oracle of its generation can
//! no longer change.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::Notify;
use tokio::task;

use crate::{
    encode_all, parse_input_size, reference_backends, timed, Backend, BenchmarkRunner, CaseId,
    ComparisonRecord, EncodedVectorSet, GenerationEpoch, HarnessConfig, HarnessError,
    HarnessResult, InputLabel, JsonCaseLoader, RandomScalarSampler, ResultLedger, RunEntry,
    RunTimedOut, ScalarSampler, SourceRequest, TestVectorSet, TestVectorSource, Ticket, TimedResult,
    Verdict,
};

/// A committed vector set with all of its encodings. Immutable once built.
#[derive(Debug)]
pub struct Workload {
    pub label: InputLabel,
    pub vectors: TestVectorSet,
    pub encoded: EncodedVectorSet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Generation {
    Committed {
        label: InputLabel,
        size: usize,
        digest: blake3::Hash,
    },
    /// A newer request was issued while this one was in flight; its result was dropped.
    Superseded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub record: ComparisonRecord,
    pub verdict: Verdict,
}

#[derive(Debug, Default)]
struct HarnessState {
    workload: Option<Arc<Workload>>,
    enabled: bool,
}

pub struct Harness {
    config: HarnessConfig,
    source: Arc<TestVectorSource>,
    runner: Arc<BenchmarkRunner>,
    backends: Vec<Backend>,
    ledger: ResultLedger,
    /// Woken whenever the ledger may have settled its oracle.
    settled: Notify,
    epoch: GenerationEpoch,
    state: RwLock<HarnessState>,
}

impl Harness {
    pub fn new(config: HarnessConfig, source: TestVectorSource) -> Self {
        Self {
            config,
            source: Arc::new(source),
            runner: Arc::new(BenchmarkRunner::default()),
            backends: Vec::new(),
            ledger: ResultLedger::new(),
            settled: Notify::new(),
            epoch: GenerationEpoch::default(),
            state: RwLock::new(HarnessState::default()),
        }
    }

    /// Seeded or entropy sampler, JSON cases from `case_dir`, and the reference backends.
    pub fn from_config(config: HarnessConfig) -> Self {
        let sampler: Arc<dyn ScalarSampler> = match config.scalar_seed {
            Some(seed) => Arc::new(RandomScalarSampler::from_seed(seed)),
            None => Arc::new(RandomScalarSampler::from_entropy()),
        };
        let loader = Arc::new(JsonCaseLoader::new(config.case_dir.clone()));
        let mut harness = Self::new(config, TestVectorSource::new(sampler, loader));
        for backend in reference_backends() {
            harness.register(backend);
        }
        harness
    }

    pub fn register(&mut self, backend: Backend) -> &mut Self {
        debug!("registered {:?}", backend);
        self.backends.push(backend);
        self
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ResultLedger {
        &self.ledger
    }

    fn state(&self) -> RwLockReadGuard<'_, HarnessState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, HarnessState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether benchmark submissions are currently accepted.
    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn workload(&self) -> Option<Arc<Workload>> {
        self.state().workload.clone()
    }

    /// Regenerates random inputs from a user-supplied count.
    ///
    /// Malformed or negative input is refused before anything changes.
    pub async fn set_input_size(&self, text: &str) -> HarnessResult<Generation> {
        let size = parse_input_size(text)?;
        self.resize(size).await
    }

    pub async fn resize(&self, size: usize) -> HarnessResult<Generation> {
        self.generate(SourceRequest::Synthetic(size)).await
    }

    pub async fn use_random_inputs(&self) -> HarnessResult<Generation> {
        self.resize(self.config.default_input_size).await
    }

    /// Switches to a precomputed case. Benchmarks stay disabled until it is committed.
    pub async fn load_case(&self, case: CaseId) -> HarnessResult<Generation> {
        self.state_mut().enabled = false;
        self.generate(SourceRequest::Precomputed(case)).await
    }

    async fn generate(&self, request: SourceRequest) -> HarnessResult<Generation> {
        let epoch = self.epoch.advance();
        let label = request.label();
        let source = self.source.clone();
        let built = task::spawn_blocking(move || -> HarnessResult<Workload> {
            let vectors = source.generate(request)?;
            let encoded = timed("encoding vectors", || encode_all(&vectors))?;
            Ok(Workload {
                label,
                vectors,
                encoded,
            })
        })
        .await;

        let mut state = self.state_mut();
        if !self.epoch.is_current(epoch) {
            debug!("dropping superseded vector set for {}", label);
            return Ok(Generation::Superseded);
        }

        let workload = match built.map_err(HarnessError::from).and_then(|built| built) {
            Ok(workload) => workload,
            Err(err) => {
                if let SourceRequest::Precomputed(_) = request {
                    state.enabled = false;
                }
                warn!("could not prepare vectors for {}: {}", label, err);
                return Err(err);
            }
        };

        let retain = self.config.retain_benchmarks;
        match workload.vectors.expected_result() {
            Some(expected) => self.ledger.reset_with_oracle(expected.clone(), retain),
            None => self.ledger.reset(retain),
        }
        self.settled.notify_waiters();

        let digest = workload.encoded.digest();
        info!(
            "vector set {} ready: {} vectors, digest {}",
            label,
            workload.vectors.len(),
            digest.to_hex()
        );
        let committed = Generation::Committed {
            label,
            size: workload.vectors.len(),
            digest,
        };
        state.workload = Some(Arc::new(workload));
        state.enabled = true;
        Ok(committed)
    }

    fn find(&self, name: &str) -> HarnessResult<&Backend> {
        self.backends
            .iter()
            .find(|backend| backend.name() == name)
            .ok_or_else(|| HarnessError::UnknownBackend(name.to_string()))
    }

    /// Takes tickets while holding the state lock so they match the committed workload.
    fn submit(&self, backends: &[Backend]) -> HarnessResult<(Arc<Workload>, Vec<Ticket>)> {
        let state = self.state();
        match (&state.workload, state.enabled) {
            (Some(workload), true) => {
                let tickets = backends
                    .iter()
                    .map(|backend| self.ledger.ticket(backend.is_trusted_reference()))
                    .collect();
                Ok((workload.clone(), tickets))
            }
            _ => Err(HarnessError::BenchmarksDisabled),
        }
    }

    pub async fn run_backend(&self, name: &str) -> HarnessResult<RunOutcome> {
        let backend = self.find(name)?.clone();
        let (workload, tickets) = self.submit(std::slice::from_ref(&backend))?;
        self.run_ticketed(backend, workload, tickets[0]).await
    }

    /// Runs every registered backend concurrently on the current workload.
    ///
    /// Tickets follow registration order; one backend failing does not affect the others.
    pub async fn run_all(&self) -> HarnessResult<Vec<(String, HarnessResult<RunOutcome>)>> {
        let (workload, tickets) = self.submit(&self.backends)?;
        let runs = self
            .backends
            .iter()
            .zip(tickets)
            .map(|(backend, ticket)| self.run_ticketed(backend.clone(), workload.clone(), ticket));
        let outcomes = join_all(runs).await;

        Ok(self
            .backends
            .iter()
            .map(|backend| backend.name().to_string())
            .zip(outcomes)
            .collect())
    }

    async fn execute(
        &self,
        backend: Backend,
        workload: Arc<Workload>,
    ) -> HarnessResult<TimedResult> {
        let name = backend.name().to_string();
        let runner = self.runner.clone();
        let handle = task::spawn_blocking(move || backend.run(&runner, &workload.encoded));

        let joined = match self.config.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("{} exceeded {:?}; ignoring its result", name, limit);
                    return Err(HarnessError::backend(&name, RunTimedOut(limit)));
                }
            },
            None => handle.await,
        };
        joined
            .map_err(|panic| HarnessError::backend(&name, panic))
            .and_then(|timed| timed)
    }

    /// Waits until no lower trusted run can still change the oracle, then judges `record`.
    async fn verdict(&self, ticket: Ticket, record: &ComparisonRecord) -> Verdict {
        loop {
            let settled = self.settled.notified();
            if let Some(verdict) = self.ledger.settled_verdict(ticket, record) {
                return verdict;
            }
            settled.await;
        }
    }

    async fn run_ticketed(
        &self,
        backend: Backend,
        workload: Arc<Workload>,
        ticket: Ticket,
    ) -> HarnessResult<RunOutcome> {
        let name = backend.name().to_string();
        let trusted_reference = backend.is_trusted_reference();

        let timed = match self.execute(backend, workload.clone()).await {
            Ok(timed) => timed,
            Err(err) => {
                warn!("{}", err);
                self.ledger.release(ticket);
                self.settled.notify_waiters();
                return Err(err);
            }
        };

        let entry = RunEntry {
            implementation: name.clone(),
            input_label: workload.label,
            input_size: workload.vectors.len(),
            elapsed_ms: timed.elapsed_ms(),
            result: timed.point.coordinates(),
            trusted_reference,
        };
        let recorded = self.ledger.record_ticketed(ticket, entry);
        self.settled.notify_waiters();
        let record = recorded.ok_or(HarnessError::RunSuperseded {
            implementation: name,
        })?;

        let verdict = self.verdict(ticket, &record).await;
        match verdict {
            Verdict::Incorrect => warn!(
                "{} disagrees with the oracle: got {} in {:.2} ms",
                record.implementation, record.result, record.elapsed_ms
            ),
            _ => info!(
                "{} on {}: {:.2} ms ({:?})",
                record.implementation, workload.label, record.elapsed_ms, verdict
            ),
        }
        Ok(RunOutcome { record, verdict })
    }

    /// Header plus one `[input label, implementation, elapsed ms]` row per benchmark.
    pub fn benchmark_rows(&self) -> Vec<[String; 3]> {
        let header = ["InputSize", "MSM Func", "Time (MS)"].map(String::from);
        std::iter::once(header)
            .chain(self.ledger.benchmarks().into_iter().map(|b| {
                [
                    b.input_label.to_string(),
                    b.implementation,
                    format!("{:.3}", b.elapsed_ms),
                ]
            }))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        BoxError, Coordinates, FieldElement, Point, ARKWORKS_PIPPENGER, FIXED_POINT,
        SCALAR_FIELD_MODULUS,
    };
    use num_bigint::BigUint;
    use std::time::Duration;

    struct Cases;

    impl crate::CaseLoader for Cases {
        fn load(&self, case: CaseId) -> Result<TestVectorSet, BoxError> {
            match case.exponent() {
                0 => Ok(TestVectorSet::new(
                    vec![FIXED_POINT.clone()],
                    vec![BigUint::from(1u8)],
                    Some(FIXED_POINT.coordinates()),
                )?),
                _ => Err("missing".into()),
            }
        }
    }

    struct Slow(Duration);

    impl ScalarSampler for Slow {
        fn sample_scalars(&self, count: usize) -> Vec<FieldElement> {
            std::thread::sleep(self.0);
            vec![BigUint::from(2u8); count]
        }
    }

    fn point(x: u32, y: u32) -> Point {
        Point::new(x.into(), y.into(), (x * y).into(), 1u32.into())
    }

    fn harness() -> Harness {
        let source = TestVectorSource::new(
            Arc::new(RandomScalarSampler::from_seed(1)),
            Arc::new(Cases),
        );
        Harness::new(HarnessConfig::default(), source)
    }

    #[tokio::test]
    async fn disabled_until_first_generation() {
        let harness = harness();
        assert!(!harness.is_enabled());
        assert!(matches!(
            harness.run_all().await,
            Err(HarnessError::BenchmarksDisabled)
        ));
    }

    #[tokio::test]
    async fn synthetic_generation() {
        let harness = harness();
        let generation = harness.set_input_size("3").await.unwrap();
        assert!(matches!(generation, Generation::Committed { size: 3, .. }));

        let workload = harness.workload().unwrap();
        assert_eq!(workload.label, InputLabel::Count(3));
        assert!(workload.vectors.points().iter().all(|p| p == &*FIXED_POINT));
        assert!(workload
            .vectors
            .scalars()
            .iter()
            .all(|s| s < &*SCALAR_FIELD_MODULUS));
        assert!(workload.vectors.expected_result().is_none());
        assert_eq!(harness.ledger().oracle(), None);
    }

    #[tokio::test]
    async fn invalid_size_keeps_previous_vectors() {
        let harness = harness();
        harness.use_random_inputs().await.unwrap();
        let before = harness.workload().unwrap();
        assert_eq!(before.vectors.len(), 1000);

        for bad in ["-1", "many"] {
            assert!(matches!(
                harness.set_input_size(bad).await,
                Err(HarnessError::InvalidInputSize(_))
            ));
        }
        assert!(harness.is_enabled());
        assert!(Arc::ptr_eq(&before, &harness.workload().unwrap()));
    }

    #[tokio::test]
    async fn precomputed_case_sets_oracle_immediately() {
        let harness = harness();
        harness.load_case("2^0".parse().unwrap()).await.unwrap();

        let workload = harness.workload().unwrap();
        assert_eq!(workload.vectors.len(), 1);
        assert_eq!(workload.label.to_string(), "2^0");
        assert_eq!(harness.ledger().oracle(), Some(FIXED_POINT.coordinates()));
        assert!(harness.is_enabled());
    }

    #[tokio::test]
    async fn failed_load_disables_benchmarks() {
        let mut harness = harness();
        harness.register(Backend::big_int("any", |_, _| Ok(point(1, 1))));
        harness.resize(4).await.unwrap();

        let err = harness.load_case(CaseId::new(3).unwrap()).await.unwrap_err();
        assert!(matches!(err, HarnessError::TestCaseLoadFailed { .. }));
        assert!(!harness.is_enabled());
        assert!(matches!(
            harness.run_backend("any").await,
            Err(HarnessError::BenchmarksDisabled)
        ));
        // the previous vectors are untouched, never replaced by synthetic data
        assert_eq!(harness.workload().unwrap().vectors.len(), 4);

        harness.use_random_inputs().await.unwrap();
        assert!(harness.is_enabled());
    }

    #[tokio::test]
    async fn verdicts_against_trusted_reference() {
        let mut harness = harness();
        harness
            .register(Backend::big_int("reference", |_, _| Ok(point(7, 9))).trusted_reference())
            .register(Backend::limbs("agrees", |_, _| Ok(point(7, 9))))
            .register(Backend::packed("disagrees", |_, _| Ok(point(1, 1))));
        harness.resize(2).await.unwrap();

        let reference = harness.run_backend("reference").await.unwrap();
        let agrees = harness.run_backend("agrees").await.unwrap();
        let disagrees = harness.run_backend("disagrees").await.unwrap();

        assert_eq!(reference.verdict, Verdict::Correct);
        assert_eq!(agrees.verdict, Verdict::Correct);
        assert_eq!(disagrees.verdict, Verdict::Incorrect);
        assert_eq!(harness.ledger().oracle(), Some(Coordinates::new(7u32, 9u32)));
        assert!(matches!(
            harness.run_backend("missing").await,
            Err(HarnessError::UnknownBackend(_))
        ));
    }

    #[tokio::test]
    async fn run_all_isolates_failures_and_orders_the_oracle() {
        let mut harness = harness();
        harness
            .register(Backend::big_int("broken", |_, _| Err("boom".into())))
            .register(
                Backend::big_int("slow reference", |_, _| {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(point(7, 9))
                })
                .trusted_reference(),
            )
            .register(Backend::big_int("fast reference", |_, _| Ok(point(3, 3))).trusted_reference())
            .register(Backend::packed("follower", |_, _| {
                std::thread::sleep(Duration::from_millis(100));
                Ok(point(7, 9))
            }));
        harness.resize(2).await.unwrap();

        let outcomes = harness.run_all().await.unwrap();
        let names: Vec<_> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["broken", "slow reference", "fast reference", "follower"]);

        assert!(matches!(
            outcomes[0].1,
            Err(HarnessError::BackendComputeFailed { .. })
        ));

        // the slow reference was submitted first, so it owns the oracle
        assert_eq!(harness.ledger().oracle(), Some(Coordinates::new(7u32, 9u32)));
        let verdicts: Vec<_> = outcomes[1..]
            .iter()
            .map(|(name, outcome)| {
                let outcome = outcome.as_ref().unwrap();
                // returned verdicts agree with the final oracle
                assert_eq!(
                    outcome.verdict,
                    harness.ledger().is_correct(&outcome.record),
                    "{}",
                    name
                );
                outcome.verdict
            })
            .collect();
        assert_eq!(
            verdicts,
            [Verdict::Correct, Verdict::Incorrect, Verdict::Correct]
        );
        assert_eq!(harness.ledger().comparisons().len(), 3);
        assert_eq!(harness.benchmark_rows().len(), 4);
    }

    #[tokio::test]
    async fn failed_reference_does_not_block_verdicts() {
        let mut harness = harness();
        harness
            .register(
                Backend::big_int("broken reference", |_, _| Err("boom".into())).trusted_reference(),
            )
            .register(Backend::limbs("plain", |_, _| Ok(point(7, 9))));
        harness.resize(2).await.unwrap();

        let outcomes = harness.run_all().await.unwrap();
        assert!(outcomes[0].1.is_err());
        assert_eq!(outcomes[1].1.as_ref().unwrap().verdict, Verdict::Unknown);
        assert_eq!(harness.ledger().oracle(), None);
    }

    #[tokio::test]
    async fn empty_input_completes_trivially() {
        let harness = Harness::from_config(HarnessConfig {
            scalar_seed: Some(5),
            ..HarnessConfig::default()
        });
        let generation = harness.resize(0).await.unwrap();
        assert!(matches!(generation, Generation::Committed { size: 0, .. }));
        assert!(harness.is_enabled());

        let identity = Coordinates::new(0u8, 1u8);
        for (name, outcome) in harness.run_all().await.unwrap() {
            let outcome = outcome.unwrap();
            assert_eq!(outcome.record.result, identity, "{}", name);
            assert_eq!(outcome.record.input_size, 0);
            assert_eq!(outcome.verdict, Verdict::Correct, "{}", name);
        }
        assert_eq!(harness.ledger().oracle(), Some(identity));
    }

    #[tokio::test]
    async fn new_vectors_reset_comparisons() {
        let mut harness = harness();
        harness.register(Backend::big_int("reference", |_, _| Ok(point(7, 9))).trusted_reference());
        harness.resize(2).await.unwrap();
        harness.run_backend("reference").await.unwrap();
        assert!(harness.ledger().oracle().is_some());

        harness.resize(5).await.unwrap();
        assert_eq!(harness.ledger().oracle(), None);
        assert!(harness.ledger().comparisons().is_empty());
        // the benchmark log is kept for export
        assert_eq!(harness.benchmark_rows().len(), 2);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_backend_failure() {
        let config = HarnessConfig {
            run_timeout: Some(Duration::from_millis(10)),
            ..HarnessConfig::default()
        };
        let source = TestVectorSource::new(
            Arc::new(RandomScalarSampler::from_seed(1)),
            Arc::new(Cases),
        );
        let mut harness = Harness::new(config, source);
        harness.register(Backend::big_int("stuck", |_, _| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(point(1, 1))
        }));
        harness.resize(1).await.unwrap();

        match harness.run_backend("stuck").await {
            Err(HarnessError::BackendComputeFailed { cause, .. }) => {
                assert!(cause.downcast_ref::<RunTimedOut>().is_some())
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(harness.ledger().comparisons().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_generation_is_discarded() {
        let source = TestVectorSource::new(
            Arc::new(Slow(Duration::from_millis(100))),
            Arc::new(Cases),
        );
        let harness = Harness::new(HarnessConfig::default(), source);

        let (stale, fresh) = tokio::join!(harness.resize(10), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            harness.resize(3).await
        });
        assert_eq!(stale.unwrap(), Generation::Superseded);
        assert!(matches!(fresh.unwrap(), Generation::Committed { size: 3, .. }));
        assert_eq!(harness.workload().unwrap().vectors.len(), 3);
    }

    #[tokio::test]
    async fn reference_backends_agree_end_to_end() {
        let harness = Harness::from_config(HarnessConfig {
            scalar_seed: Some(3),
            ..HarnessConfig::default()
        });
        harness.resize(8).await.unwrap();

        let outcomes = harness.run_all().await.unwrap();
        let oracle = harness.ledger().oracle().unwrap();
        for (name, outcome) in outcomes {
            let outcome = outcome.unwrap();
            assert_eq!(outcome.record.result, oracle, "{}", name);
            assert_eq!(outcome.verdict, Verdict::Correct, "{}", name);
        }
        assert!(harness.find(ARKWORKS_PIPPENGER).unwrap().is_trusted_reference());
    }
}
