use core::{fmt, str::FromStr};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use ark_ed_on_bls12_377::Fr;
use ark_std::UniformRand;
use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::{
    timed, BoxError, FieldElement, HarnessError, HarnessResult, Point, TestVectorSet,
    FIXED_POINT, MAX_CASE_EXPONENT,
};

/// Produces uniformly distributed scalars below the group order.
pub trait ScalarSampler: Send + Sync {
    fn sample_scalars(&self, count: usize) -> Vec<FieldElement>;
}

/// Loads a precomputed test case by identifier.
pub trait CaseLoader: Send + Sync {
    fn load(&self, case: CaseId) -> Result<TestVectorSet, BoxError>;
}

pub struct RandomScalarSampler {
    rng: Mutex<ChaChaRng>,
}

impl RandomScalarSampler {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaChaRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaChaRng::from_entropy()),
        }
    }
}

impl ScalarSampler for RandomScalarSampler {
    fn sample_scalars(&self, count: usize) -> Vec<FieldElement> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..count)
            .map(|_| BigUint::from(Fr::rand(&mut *rng)))
            .collect()
    }
}

/// A `2^k` test case; displayed and parsed as `"2^k"` (a bare `"k"` is also accepted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseId(u32);

impl CaseId {
    pub fn new(exponent: u32) -> HarnessResult<Self> {
        if exponent > MAX_CASE_EXPONENT {
            return Err(HarnessError::InvalidCaseId(exponent.to_string()));
        }
        Ok(Self(exponent))
    }

    pub fn exponent(self) -> u32 {
        self.0
    }

    /// Number of vectors in the case.
    pub fn size(self) -> usize {
        1 << self.0
    }
}

impl FromStr for CaseId {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let exponent = trimmed.strip_prefix("2^").unwrap_or(trimmed);
        exponent
            .parse()
            .map_err(|_| HarnessError::InvalidCaseId(s.to_string()))
            .and_then(CaseId::new)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "2^{}", self.0)
    }
}

/// Label a benchmark row is filed under: a raw count, or the case's power label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputLabel {
    Count(usize),
    Power(CaseId),
}

impl fmt::Display for InputLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputLabel::Count(n) => write!(f, "{}", n),
            InputLabel::Power(case) => write!(f, "{}", case),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRequest {
    Synthetic(usize),
    Precomputed(CaseId),
}

impl SourceRequest {
    pub fn label(self) -> InputLabel {
        match self {
            SourceRequest::Synthetic(n) => InputLabel::Count(n),
            SourceRequest::Precomputed(case) => InputLabel::Power(case),
        }
    }
}

/// Parses a user-supplied vector count. Negative or non-numeric input is rejected.
pub fn parse_input_size(text: &str) -> HarnessResult<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| HarnessError::InvalidInputSize(text.to_string()))
}

pub struct TestVectorSource {
    sampler: Arc<dyn ScalarSampler>,
    loader: Arc<dyn CaseLoader>,
    point: Point,
}

impl TestVectorSource {
    pub fn new(sampler: Arc<dyn ScalarSampler>, loader: Arc<dyn CaseLoader>) -> Self {
        Self {
            sampler,
            loader,
            point: FIXED_POINT.clone(),
        }
    }

    /// `size` copies of the fixed point and `size` fresh scalars; no expected result.
    pub fn synthetic(&self, size: usize) -> HarnessResult<TestVectorSet> {
        let scalars = timed("sampling scalars", || self.sampler.sample_scalars(size));
        TestVectorSet::new(vec![self.point.clone(); size], scalars, None)
    }

    /// Adopts the loader's vectors and expected result verbatim.
    pub fn precomputed(&self, case: CaseId) -> HarnessResult<TestVectorSet> {
        timed("loading test case", || self.loader.load(case)).map_err(|source| {
            HarnessError::TestCaseLoadFailed {
                case: case.to_string(),
                source,
            }
        })
    }

    pub fn generate(&self, request: SourceRequest) -> HarnessResult<TestVectorSet> {
        match request {
            SourceRequest::Synthetic(size) => self.synthetic(size),
            SourceRequest::Precomputed(case) => self.precomputed(case),
        }
    }
}

/// Token identifying one generation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

/// Monotonic counter of generation requests; only the latest may commit.
#[derive(Debug, Default)]
pub struct GenerationEpoch(AtomicU64);

impl GenerationEpoch {
    pub fn advance(&self) -> Epoch {
        Epoch(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.0.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}
