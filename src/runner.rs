//! Timed invocation of a single backend.
//!
//! A [`Backend`] is registered together with the representation it consumes, so the
//! runner can only ever hand it the matching view of an [`EncodedVectorSet`].

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;

use crate::{
    as_millis_f64, measure, BoxError, EncodedVectorSet, HarnessError, HarnessResult, LimbPoint,
    Limbs, MalformedOutput, Point, BASE_FIELD_MODULUS,
};

pub type ComputeResult = Result<Point, BoxError>;

type BigIntFn = dyn Fn(&[Point], &[BigUint]) -> ComputeResult + Send + Sync;
type LimbFn = dyn Fn(&[LimbPoint], &[Limbs]) -> ComputeResult + Send + Sync;
type PackedFn = dyn Fn(&[u8], &[u8]) -> ComputeResult + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Representation {
    BigInt,
    Limbs,
    Packed,
}

#[derive(Clone)]
enum Compute {
    BigInt(Arc<BigIntFn>),
    Limbs(Arc<LimbFn>),
    Packed(Arc<PackedFn>),
}

/// A named MSM implementation and the input representation it accepts.
#[derive(Clone)]
pub struct Backend {
    name: String,
    trusted_reference: bool,
    compute: Compute,
}

impl Backend {
    fn with(name: impl Into<String>, compute: Compute) -> Self {
        Self {
            name: name.into(),
            trusted_reference: false,
            compute,
        }
    }

    pub fn big_int<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Point], &[BigUint]) -> ComputeResult + Send + Sync + 'static,
    {
        Self::with(name, Compute::BigInt(Arc::new(f)))
    }

    pub fn limbs<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[LimbPoint], &[Limbs]) -> ComputeResult + Send + Sync + 'static,
    {
        Self::with(name, Compute::Limbs(Arc::new(f)))
    }

    pub fn packed<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> ComputeResult + Send + Sync + 'static,
    {
        Self::with(name, Compute::Packed(Arc::new(f)))
    }

    /// Marks this backend as the one whose first result becomes the oracle.
    pub fn trusted_reference(mut self) -> Self {
        self.trusted_reference = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_trusted_reference(&self) -> bool {
        self.trusted_reference
    }

    pub fn representation(&self) -> Representation {
        match self.compute {
            Compute::BigInt(_) => Representation::BigInt,
            Compute::Limbs(_) => Representation::Limbs,
            Compute::Packed(_) => Representation::Packed,
        }
    }

    /// Runs this backend on the view of `encoded` it was registered for.
    pub fn run(
        &self,
        runner: &BenchmarkRunner,
        encoded: &EncodedVectorSet,
    ) -> HarnessResult<TimedResult> {
        match &self.compute {
            Compute::BigInt(f) => {
                let view = encoded.big_ints();
                runner.run(&self.name, &view.points[..], &view.scalars[..], |p, s| f(p, s))
            }
            Compute::Limbs(f) => {
                let view = encoded.limbs();
                runner.run(&self.name, &view.points[..], &view.scalars[..], |p, s| f(p, s))
            }
            Compute::Packed(f) => {
                let view = encoded.packed();
                runner.run(&self.name, &view.points[..], &view.scalars[..], |p, s| f(p, s))
            }
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("trusted_reference", &self.trusted_reference)
            .field("representation", &self.representation())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedResult {
    pub point: Point,
    pub elapsed: Duration,
}

impl TimedResult {
    pub fn elapsed_ms(&self) -> f64 {
        as_millis_f64(self.elapsed)
    }
}

/// Measures backend calls and rejects results that are not canonical points.
#[derive(Clone, Debug)]
pub struct BenchmarkRunner {
    modulus: BigUint,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new(BASE_FIELD_MODULUS.clone())
    }
}

impl BenchmarkRunner {
    /// `modulus` bounds the coordinates of every accepted result.
    pub fn new(modulus: BigUint) -> Self {
        Self { modulus }
    }

    /// Invokes `compute(points, scalars)` and measures the wall-clock time around it.
    ///
    /// Nothing is recorded here; a failed or malformed run yields `BackendComputeFailed`.
    pub fn run<P, S>(
        &self,
        implementation: &str,
        points: &P,
        scalars: &S,
        compute: impl FnOnce(&P, &S) -> ComputeResult,
    ) -> HarnessResult<TimedResult>
    where
        P: ?Sized,
        S: ?Sized,
    {
        let (result, elapsed) = measure(|| compute(points, scalars));
        let point = result.map_err(|cause| HarnessError::backend(implementation, cause))?;
        self.check(&point)
            .map_err(|malformed| HarnessError::backend(implementation, malformed))?;

        log::debug!("{} finished in {:?}", implementation, elapsed);
        Ok(TimedResult { point, elapsed })
    }

    fn check(&self, point: &Point) -> Result<(), MalformedOutput> {
        if point.x >= self.modulus {
            return Err(MalformedOutput { coordinate: "x" });
        }
        if point.y >= self.modulus {
            return Err(MalformedOutput { coordinate: "y" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{encode_all, TestVectorSet, FIXED_POINT};

    fn point(x: u32, y: u32) -> Point {
        Point::new(x.into(), y.into(), (x * y).into(), 1u32.into())
    }

    fn encoded() -> EncodedVectorSet {
        let set = TestVectorSet::new(
            vec![FIXED_POINT.clone(); 3],
            vec![BigUint::from(1u8), BigUint::from(2u8), BigUint::from(3u8)],
            None,
        )
        .unwrap();
        encode_all(&set).unwrap()
    }

    #[test]
    fn each_backend_sees_its_own_view() {
        let runner = BenchmarkRunner::default();
        let encoded = encoded();

        let big = Backend::big_int("big", |points, scalars| {
            assert_eq!(points.len(), 3);
            assert_eq!(scalars[2], BigUint::from(3u8));
            Ok(point(1, 2))
        });
        let limbs = Backend::limbs("limbs", |points, scalars| {
            assert_eq!(points[0], LimbPoint::encode(&FIXED_POINT).unwrap());
            assert_eq!(scalars[1][0], 2);
            Ok(point(3, 4))
        });
        let packed = Backend::packed("packed", |points, scalars| {
            assert_eq!(points.len(), 3 * 64);
            assert_eq!(scalars.len(), 3 * 32);
            assert_eq!(scalars[64], 3);
            Ok(point(5, 6))
        });

        assert_eq!(big.representation(), Representation::BigInt);
        assert_eq!(limbs.representation(), Representation::Limbs);
        assert_eq!(packed.representation(), Representation::Packed);

        assert_eq!(big.run(&runner, &encoded).unwrap().point, point(1, 2));
        assert_eq!(limbs.run(&runner, &encoded).unwrap().point, point(3, 4));
        assert_eq!(packed.run(&runner, &encoded).unwrap().point, point(5, 6));
    }

    #[test]
    fn measures_elapsed_time() {
        let runner = BenchmarkRunner::default();
        let timed = runner
            .run("slow", &[0u8][..], &[0u8][..], |_, _| {
                std::thread::sleep(Duration::from_millis(10));
                Ok(point(1, 1))
            })
            .unwrap();
        assert!(timed.elapsed_ms() >= 10.0);
    }

    #[test]
    fn backend_error_names_the_implementation() {
        let backend = Backend::big_int("broken", |_, _| Err("out of memory".into()));
        match backend.run(&BenchmarkRunner::default(), &encoded()) {
            Err(HarnessError::BackendComputeFailed {
                implementation,
                cause,
            }) => {
                assert_eq!(implementation, "broken");
                assert_eq!(cause.to_string(), "out of memory");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_output_is_a_failure() {
        let runner = BenchmarkRunner::new(BigUint::from(100u8));
        let err = runner
            .run("wide", &(), &(), |_, _| Ok(point(1, 100)))
            .unwrap_err();
        match err {
            HarnessError::BackendComputeFailed { cause, .. } => {
                assert!(cause.downcast_ref::<MalformedOutput>().is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn trusted_flag_is_explicit() {
        let plain = Backend::packed("Aleo Wasm: lookalike", |_, _| Ok(point(0, 1)));
        assert!(!plain.is_trusted_reference());
        assert!(plain.trusted_reference().is_trusted_reference());
    }
}
