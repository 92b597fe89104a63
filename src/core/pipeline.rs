// pipeline.rs - Bounded producer/worker scan pipeline with cancellation

use std::ops::Range;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::calculator::{Calculator, CodonSource, ScanSettings};
use crate::core::codon::{GeneticCode, StrainCodons};
use crate::core::results::CorrResults;
use crate::error::{McorrError, Result};

/// Key used for profiles computed over the whole strain collection.
pub const ALL_KEY: &str = "all";

/// Shared, idempotent cancellation signal.
///
/// Cancelling drops the only sender, so every clone's receiver becomes
/// disconnected and any `select!` waiting on it wakes up.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn cancel(&self) {
        let mut guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!("[Cancel] scan cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready once the token is cancelled.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One independent piece of scan work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    /// Lag in codons.
    Lag(usize),
    /// Indices of two strains.
    StrainPair(usize, usize),
    /// Bootstrap replicate: id plus the strain indices drawn for it.
    Replicate { id: String, picks: Vec<usize> },
}

/// Generator of work units for one run.
#[derive(Debug, Clone)]
pub enum WorkSource {
    Lags(Range<usize>),
    /// Every unordered pair of `num_strains` strains.
    StrainPairs { num_strains: usize },
    /// Replicate `all` followed by `replicates` resamples with replacement.
    Bootstrap {
        num_strains: usize,
        replicates: usize,
        seed: Option<u64>,
    },
    Units(Vec<WorkUnit>),
}

impl WorkSource {
    /// Lags in codons. A zero `max_lag` scans every lag the sequences allow.
    pub fn lags(min_lag: usize, max_lag: usize, num_positions: usize) -> Self {
        if max_lag == 0 {
            WorkSource::Lags(0..num_positions)
        } else {
            WorkSource::Lags(min_lag..max_lag)
        }
    }

    /// Number of units the source will produce.
    pub fn len(&self) -> usize {
        match self {
            WorkSource::Lags(range) => range.len(),
            WorkSource::StrainPairs { num_strains } => num_strains * num_strains.saturating_sub(1) / 2,
            WorkSource::Bootstrap { replicates, .. } => replicates + 1,
            WorkSource::Units(units) => units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_units(self) -> Box<dyn Iterator<Item = WorkUnit> + Send> {
        match self {
            WorkSource::Lags(range) => Box::new(range.map(WorkUnit::Lag)),
            WorkSource::StrainPairs { num_strains } => Box::new(
                (0..num_strains)
                    .flat_map(move |a| ((a + 1)..num_strains).map(move |b| WorkUnit::StrainPair(a, b))),
            ),
            WorkSource::Bootstrap {
                num_strains,
                replicates,
                seed,
            } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let all = WorkUnit::Replicate {
                    id: ALL_KEY.to_string(),
                    picks: (0..num_strains).collect(),
                };
                let boots = (0..replicates).map(move |i| WorkUnit::Replicate {
                    id: format!("boot_{}", i),
                    picks: (0..num_strains).map(|_| rng.gen_range(0..num_strains)).collect(),
                });
                Box::new(std::iter::once(all).chain(boots))
            }
            WorkSource::Units(units) => Box::new(units.into_iter()),
        }
    }
}

/// What each work unit computes.
#[derive(Clone)]
pub enum ScanVariant {
    /// Lag units; one profile row per lag over the whole collection.
    SingleClade(Arc<dyn CodonSource>),
    /// Lag units; one row per (first site, lag) with marginals.
    PerPosition(Arc<dyn CodonSource>),
    /// Lag units; strains of one clade paired with strains of the other.
    CrossClade {
        first: Arc<dyn CodonSource>,
        second: Arc<dyn CodonSource>,
    },
    /// Strain-pair units; a lag profile per pair over `0..max_lag` codons.
    AllPairs {
        strains: Arc<StrainCodons>,
        max_lag: usize,
    },
    /// Strain-pair units; lag-0 distance only.
    PairwiseKs(Arc<StrainCodons>),
    /// Replicate units; a full lag profile per resampled strain set.
    Bootstrap {
        strains: Arc<StrainCodons>,
        lags: Range<usize>,
    },
}

impl ScanVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ScanVariant::SingleClade(_) => "single-clade",
            ScanVariant::PerPosition(_) => "per-position",
            ScanVariant::CrossClade { .. } => "cross-clade",
            ScanVariant::AllPairs { .. } => "all-pairs",
            ScanVariant::PairwiseKs(_) => "pairwise-ks",
            ScanVariant::Bootstrap { .. } => "bootstrap",
        }
    }

    fn strains(&self) -> Option<&StrainCodons> {
        match self {
            ScanVariant::AllPairs { strains, .. }
            | ScanVariant::PairwiseKs(strains)
            | ScanVariant::Bootstrap { strains, .. } => Some(strains.as_ref()),
            _ => None,
        }
    }

    /// Reject work sources whose strain indices fall outside the variant's strains.
    pub fn check_source(&self, source: &WorkSource) -> Result<()> {
        let Some(strains) = self.strains() else {
            return Ok(());
        };
        let available = strains.len();
        let out_of_range = |n: usize| {
            McorrError::InvalidConfig(format!(
                "{} scan over {} strains cannot index strain {}",
                self.name(),
                available,
                n
            ))
        };
        match source {
            WorkSource::StrainPairs { num_strains } if *num_strains > available => {
                Err(out_of_range(num_strains - 1))
            }
            WorkSource::Bootstrap { num_strains, .. } if *num_strains == 0 => Err(McorrError::InvalidConfig(
                "bootstrap needs at least one strain to resample".to_string(),
            )),
            WorkSource::Bootstrap { num_strains, .. } if *num_strains > available => {
                Err(out_of_range(num_strains - 1))
            }
            WorkSource::Units(units) => {
                for unit in units {
                    let highest = match unit {
                        WorkUnit::StrainPair(a, b) => Some(*a.max(b)),
                        WorkUnit::Replicate { picks, .. } => picks.iter().max().copied(),
                        WorkUnit::Lag(_) => None,
                    };
                    if let Some(idx) = highest.filter(|&idx| idx >= available) {
                        return Err(out_of_range(idx));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Compute one unit. Units the variant does not understand yield `None`.
    pub fn compute(&self, calc: &Calculator, unit: WorkUnit) -> Option<CorrResults> {
        match (self, unit) {
            (ScanVariant::SingleClade(source), WorkUnit::Lag(lag)) => {
                let row = calc.profile_at_lag(source.as_ref(), lag).with_key(ALL_KEY);
                Some(CorrResults {
                    key: ALL_KEY.to_string(),
                    results: vec![row],
                })
            }
            (ScanVariant::PerPosition(source), WorkUnit::Lag(lag)) => Some(CorrResults {
                key: ALL_KEY.to_string(),
                results: calc.positions_at_lag(source.as_ref(), lag),
            }),
            (ScanVariant::CrossClade { first, second }, WorkUnit::Lag(lag)) => {
                let row = calc
                    .mates_at_lag(first.as_ref(), second.as_ref(), lag)
                    .with_key(ALL_KEY);
                Some(CorrResults {
                    key: ALL_KEY.to_string(),
                    results: vec![row],
                })
            }
            (ScanVariant::AllPairs { strains, max_lag }, WorkUnit::StrainPair(a, b)) => {
                Some(calc.pair_profile(strains, a, b, *max_lag))
            }
            (ScanVariant::PairwiseKs(strains), WorkUnit::StrainPair(a, b)) => {
                let row = calc.pair_ks(strains, a, b)?;
                let key = row.key.clone().unwrap_or_default();
                Some(CorrResults {
                    key,
                    results: vec![row],
                })
            }
            (ScanVariant::Bootstrap { strains, lags }, WorkUnit::Replicate { id, picks }) => {
                Some(calc.replicate_profile(strains, &id, &picks, lags.clone()))
            }
            (variant, unit) => {
                warn!("{} scan cannot process unit {:?}", variant.name(), unit);
                None
            }
        }
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Generating = 1,
    FannedOut = 2,
    Draining = 3,
    Done = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Generating,
            2 => PipelineState::FannedOut,
            3 => PipelineState::Draining,
            4 => PipelineState::Done,
            _ => PipelineState::Idle,
        }
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub units_sent: usize,
    pub results_sent: usize,
    pub cancelled: bool,
}

/// Builder for [`ScanPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    threads: usize,
    channel_capacity: usize,
    settings: ScanSettings,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            threads: 0,
            channel_capacity: 64,
            settings: ScanSettings::default(),
        }
    }
}

impl PipelineBuilder {
    /// Worker count; 0 uses all available CPUs.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn synonymous(mut self, synonymous: bool) -> Self {
        self.settings.synonymous = synonymous;
        self
    }

    /// Zero-based nucleotide within the codon; `None` compares all three.
    pub fn codon_position(mut self, codon_position: Option<usize>) -> Self {
        self.settings.codon_position = codon_position;
        self
    }

    pub fn genetic_code(mut self, code: GeneticCode) -> Self {
        self.settings.genetic_code = code;
        self
    }

    pub fn min_allele_num(mut self, min_allele_num: usize) -> Self {
        self.settings.min_allele_num = min_allele_num;
        self
    }

    pub fn build(self) -> ScanPipeline {
        let threads = if self.threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.threads
        };
        ScanPipeline {
            threads,
            channel_capacity: self.channel_capacity,
            calculator: Arc::new(Calculator::new(self.settings)),
        }
    }
}

/// Fixed worker pool fed by one producer over bounded channels.
pub struct ScanPipeline {
    threads: usize,
    channel_capacity: usize,
    calculator: Arc<Calculator>,
}

impl ScanPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn settings(&self) -> &ScanSettings {
        self.calculator.settings()
    }

    /// Start a run. Results arrive on the handle's receiver in no particular order;
    /// the channel closes once every worker has exited.
    pub fn run(&self, source: WorkSource, variant: ScanVariant, cancel: CancelToken) -> Result<ScanHandle> {
        variant.check_source(&source)?;
        let state = Arc::new(AtomicU8::new(PipelineState::Idle as u8));
        let units_sent = Arc::new(AtomicUsize::new(0));
        let results_sent = Arc::new(AtomicUsize::new(0));

        let (unit_tx, unit_rx) = bounded::<WorkUnit>(self.channel_capacity);
        let (result_tx, result_rx) = bounded::<CorrResults>(self.channel_capacity);

        info!(
            "Starting {} scan: {} units, {} workers",
            variant.name(),
            source.len(),
            self.threads
        );

        state.store(PipelineState::Generating as u8, Ordering::SeqCst);
        let producer = {
            let cancel = cancel.clone();
            let units_sent = Arc::clone(&units_sent);
            thread::Builder::new()
                .name("mcorr-producer".to_string())
                .spawn(move || produce(source, unit_tx, cancel, units_sent))?
        };

        let mut workers = Vec::with_capacity(self.threads);
        for id in 0..self.threads {
            let unit_rx = unit_rx.clone();
            let result_tx = result_tx.clone();
            let cancel_w = cancel.clone();
            let variant = variant.clone();
            let calc = Arc::clone(&self.calculator);
            let results_sent = Arc::clone(&results_sent);
            let spawned = thread::Builder::new()
                .name(format!("mcorr-worker-{}", id))
                .spawn(move || work(id, unit_rx, result_tx, cancel_w, variant, calc, results_sent));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Stop whatever already started before reporting
                    cancel.cancel();
                    return Err(McorrError::Io(e));
                }
            }
        }
        drop(unit_rx);
        drop(result_tx);

        let coordinator = {
            let state = Arc::clone(&state);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("mcorr-coordinator".to_string())
                .spawn(move || -> Result<ScanStats> {
                    let mut panicked = None;
                    if producer.join().is_err() {
                        panicked = Some("producer".to_string());
                    }
                    state.store(PipelineState::FannedOut as u8, Ordering::SeqCst);
                    for (id, worker) in workers.into_iter().enumerate() {
                        if worker.join().is_err() {
                            panicked = Some(format!("worker {}", id));
                        }
                    }
                    // Every result sender is gone now; the receiver sees the channel close
                    state.store(PipelineState::Draining as u8, Ordering::SeqCst);
                    debug!("[Coordinator] all workers joined");
                    if let Some(which) = panicked {
                        return Err(McorrError::ThreadPanicked(which));
                    }
                    Ok(ScanStats {
                        units_sent: units_sent.load(Ordering::SeqCst),
                        results_sent: results_sent.load(Ordering::SeqCst),
                        cancelled: cancel.is_cancelled(),
                    })
                })?
        };

        Ok(ScanHandle {
            results: result_rx,
            coordinator: Some(coordinator),
            state,
        })
    }
}

fn produce(source: WorkSource, units: Sender<WorkUnit>, cancel: CancelToken, sent: Arc<AtomicUsize>) {
    for unit in source.into_units() {
        if cancel.is_cancelled() {
            break;
        }
        select! {
            send(units, unit) -> res => {
                if res.is_err() {
                    break;
                }
                sent.fetch_add(1, Ordering::SeqCst);
            }
            recv(cancel.receiver()) -> _ => break,
        }
    }
    debug!("[Producer] done after {} units", sent.load(Ordering::SeqCst));
}

fn work(
    id: usize,
    units: Receiver<WorkUnit>,
    results: Sender<CorrResults>,
    cancel: CancelToken,
    variant: ScanVariant,
    calc: Arc<Calculator>,
    sent: Arc<AtomicUsize>,
) {
    #[cfg(feature = "debug-stats")]
    let mut processed = 0usize;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let unit = select! {
            recv(units) -> msg => match msg {
                Ok(unit) => unit,
                Err(_) => break,
            },
            recv(cancel.receiver()) -> _ => break,
        };
        let Some(result) = variant.compute(&calc, unit) else {
            continue;
        };
        #[cfg(feature = "debug-stats")]
        {
            processed += 1;
        }
        select! {
            send(results, result) -> res => {
                if res.is_err() {
                    break;
                }
                sent.fetch_add(1, Ordering::SeqCst);
            }
            recv(cancel.receiver()) -> _ => break,
        }
    }
    #[cfg(feature = "debug-stats")]
    debug!("[Worker {}] processed {} units", id, processed);
    #[cfg(not(feature = "debug-stats"))]
    debug!("[Worker {}] exiting", id);
}

/// Running scan: the result stream plus a join point.
pub struct ScanHandle {
    results: Receiver<CorrResults>,
    coordinator: Option<JoinHandle<Result<ScanStats>>>,
    state: Arc<AtomicU8>,
}

impl ScanHandle {
    pub fn results(&self) -> &Receiver<CorrResults> {
        &self.results
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    // Dropping the receiver unblocks workers parked on a full results channel.
    fn close_results(&mut self) {
        let (_, closed) = bounded::<CorrResults>(0);
        drop(std::mem::replace(&mut self.results, closed));
    }

    /// Wait for the producer and all workers. Results still queued are dropped.
    pub fn join(mut self) -> Result<ScanStats> {
        self.close_results();
        let stats = match self.coordinator.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| McorrError::ThreadPanicked("coordinator".to_string()))??,
            None => ScanStats::default(),
        };
        self.state.store(PipelineState::Done as u8, Ordering::SeqCst);
        Ok(stats)
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.close_results();
        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::results::ResultType;
    use std::time::{Duration, Instant};

    fn two_strains() -> Arc<StrainCodons> {
        Arc::new(StrainCodons::from_sequences(
            vec![("s1", &b"ATGAAATAA"[..]), ("s2", &b"ATGAAATAG"[..])],
            0,
        ))
    }

    #[test]
    fn test_cancel_token_idempotent() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.receiver().recv().is_err());
    }

    #[test]
    fn test_work_source_lags() {
        match WorkSource::lags(2, 0, 7) {
            WorkSource::Lags(range) => assert_eq!(range, 0..7),
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(WorkSource::lags(2, 5, 7).len(), 3);
        assert_eq!(WorkSource::StrainPairs { num_strains: 4 }.len(), 6);
    }

    #[test]
    fn test_bootstrap_source_is_seeded() {
        let source = WorkSource::Bootstrap {
            num_strains: 5,
            replicates: 3,
            seed: Some(7),
        };
        let first: Vec<WorkUnit> = source.clone().into_units().collect();
        let second: Vec<WorkUnit> = source.into_units().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(
            first[0],
            WorkUnit::Replicate {
                id: "all".to_string(),
                picks: vec![0, 1, 2, 3, 4]
            }
        );
        match &first[3] {
            WorkUnit::Replicate { id, picks } => {
                assert_eq!(id, "boot_2");
                assert_eq!(picks.len(), 5);
                assert!(picks.iter().all(|&p| p < 5));
            }
            other => panic!("unexpected unit {:?}", other),
        }
    }

    #[test]
    fn test_single_clade_run() {
        let pipeline = ScanPipeline::builder()
            .threads(2)
            .channel_capacity(1)
            .synonymous(false)
            .codon_position(Some(2))
            .build();
        let handle = pipeline
            .run(
                WorkSource::Lags(0..3),
                ScanVariant::SingleClade(two_strains()),
                CancelToken::new(),
            )
            .unwrap();

        let mut rows: Vec<_> = handle.results().iter().flat_map(|r| r.results).collect();
        let stats = handle.join().unwrap();
        rows.sort_by_key(|r| r.lag);

        assert_eq!(stats.results_sent, 3);
        assert!(!stats.cancelled);
        assert_eq!(rows.iter().map(|r| r.lag).collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(rows[0].kind, ResultType::Ks);
        assert!((rows[0].mean - 1.0 / 3.0).abs() < 1e-12);
        assert!(rows.iter().all(|r| r.key.as_deref() == Some("all")));
    }

    #[test]
    fn test_all_pairs_run() {
        let strains = Arc::new(StrainCodons::from_sequences(
            vec![("c", &b"GCTAAA"[..]), ("a", &b"GCCAAG"[..]), ("b", &b"GCTAAG"[..])],
            0,
        ));
        let pipeline = ScanPipeline::builder().threads(3).build();
        let handle = pipeline
            .run(
                WorkSource::StrainPairs { num_strains: 3 },
                ScanVariant::AllPairs { strains, max_lag: 2 },
                CancelToken::new(),
            )
            .unwrap();
        let mut keys: Vec<String> = handle.results().iter().map(|r| r.key).collect();
        handle.join().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a_vs_b", "a_vs_c", "b_vs_c"]);
    }

    #[test]
    fn test_mismatched_unit_is_skipped() {
        let pipeline = ScanPipeline::builder().threads(1).build();
        let handle = pipeline
            .run(
                WorkSource::Units(vec![WorkUnit::StrainPair(0, 1), WorkUnit::Lag(0)]),
                ScanVariant::SingleClade(two_strains()),
                CancelToken::new(),
            )
            .unwrap();
        let received: Vec<_> = handle.results().iter().collect();
        let stats = handle.join().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(stats.units_sent, 2);
    }

    #[test]
    fn test_source_outside_strains_is_invalid_config() {
        let pipeline = ScanPipeline::builder().threads(1).build();
        let pairs = pipeline.run(
            WorkSource::StrainPairs { num_strains: 3 },
            ScanVariant::PairwiseKs(two_strains()),
            CancelToken::new(),
        );
        assert!(matches!(pairs, Err(McorrError::InvalidConfig(_))));

        let empty_boot = pipeline.run(
            WorkSource::Bootstrap {
                num_strains: 0,
                replicates: 2,
                seed: Some(1),
            },
            ScanVariant::Bootstrap {
                strains: two_strains(),
                lags: 0..1,
            },
            CancelToken::new(),
        );
        assert!(matches!(empty_boot, Err(McorrError::InvalidConfig(_))));

        let bad_pick = pipeline.run(
            WorkSource::Units(vec![WorkUnit::Replicate {
                id: "r".to_string(),
                picks: vec![0, 2],
            }]),
            ScanVariant::Bootstrap {
                strains: two_strains(),
                lags: 0..1,
            },
            CancelToken::new(),
        );
        assert!(matches!(bad_pick, Err(McorrError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancel_immediately_terminates() {
        let long = "ATGAAATAAGCT".repeat(200);
        let strains = Arc::new(StrainCodons::from_sequences(
            vec![("s1", long.as_bytes()), ("s2", long.as_bytes()), ("s3", long.as_bytes())],
            0,
        ));
        let pipeline = ScanPipeline::builder().threads(2).channel_capacity(1).build();
        let cancel = CancelToken::new();
        let started = Instant::now();
        let handle = pipeline
            .run(
                WorkSource::Lags(0..10_000),
                ScanVariant::SingleClade(strains),
                cancel.clone(),
            )
            .unwrap();
        cancel.cancel();

        let delivered: Vec<CorrResults> = handle.results().iter().collect();
        let stats = handle.join().unwrap();

        assert!(stats.cancelled);
        assert!(stats.units_sent < 10_000);
        assert!(started.elapsed() < Duration::from_secs(30));
        for profile in delivered {
            assert_eq!(profile.results.len(), 1);
            assert_eq!(profile.key, "all");
        }
    }

    #[test]
    fn test_state_reaches_done() {
        let pipeline = ScanPipeline::builder().threads(1).build();
        let handle = pipeline
            .run(
                WorkSource::Lags(0..1),
                ScanVariant::SingleClade(two_strains()),
                CancelToken::new(),
            )
            .unwrap();
        assert_ne!(handle.state(), PipelineState::Idle);
        let _: Vec<_> = handle.results().iter().collect();
        let state = Arc::clone(&handle.state);
        handle.join().unwrap();
        assert_eq!(PipelineState::from_u8(state.load(Ordering::SeqCst)), PipelineState::Done);
    }
}
