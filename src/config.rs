use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{HarnessError, HarnessResult, RetainBenchmarks, DEFAULT_INPUT_SIZE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Vector count used when switching back to random inputs.
    pub default_input_size: usize,
    /// Directory holding `<k>.json` precomputed cases.
    pub case_dir: PathBuf,
    /// Outer time limit applied to each backend run.
    pub run_timeout: Option<Duration>,
    /// Seed for the scalar sampler; entropy when unset.
    pub scalar_seed: Option<u64>,
    pub retain_benchmarks: RetainBenchmarks,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_input_size: DEFAULT_INPUT_SIZE,
            case_dir: PathBuf::from("./test-data"),
            run_timeout: None,
            scalar_seed: None,
            retain_benchmarks: RetainBenchmarks::Keep,
        }
    }
}

fn var<T: FromStr>(name: &'static str) -> HarnessResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarnessError::InvalidConfig { var: name, value }),
        Err(_) => Ok(None),
    }
}

impl HarnessConfig {
    /// Defaults overridden by `MSM_INPUT_SIZE`, `MSM_CASE_DIR`, `MSM_TIMEOUT_MS` and `MSM_SEED`.
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();
        if let Some(size) = var("MSM_INPUT_SIZE")? {
            config.default_input_size = size;
        }
        if let Some(dir) = var::<String>("MSM_CASE_DIR")? {
            config.case_dir = PathBuf::from(dir);
        }
        if let Some(ms) = var("MSM_TIMEOUT_MS")? {
            config.run_timeout = Some(Duration::from_millis(ms));
        }
        config.scalar_seed = var("MSM_SEED")?.or(config.scalar_seed);
        Ok(config)
    }
}
