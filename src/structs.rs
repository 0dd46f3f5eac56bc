//! Core data model shared by the sources, codecs, runner and ledger.
//!
//! Field elements are kept as canonical `BigUint`s; every other representation is
//! derived from these by the codecs and never stored back.

use core::fmt;

use num_bigint::BigUint;

use crate::{HarnessError, HarnessResult};

/// A non-negative integer below the modulus of the field it belongs to.
pub type FieldElement = BigUint;

/// Point in extended twisted-Edwards coordinates.
///
/// Only `x` and `y` take part in result comparison; `t` and `z` are carried for
/// backends that consume the extended form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
    pub t: FieldElement,
    pub z: FieldElement,
}

impl Point {
    pub fn new(x: FieldElement, y: FieldElement, t: FieldElement, z: FieldElement) -> Self {
        Self { x, y, t, z }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }

    /// Coordinates in traversal order: x, y, t, z.
    pub fn iter(&self) -> impl Iterator<Item = &FieldElement> {
        [&self.x, &self.y, &self.t, &self.z].into_iter()
    }
}

/// The authoritative (x, y) pair of a result point.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub x: FieldElement,
    pub y: FieldElement,
}

impl Coordinates {
    pub fn new(x: impl Into<FieldElement>, y: impl Into<FieldElement>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One unit of benchmark work: `N` points, `N` scalars and, for precomputed
/// cases, the expected result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestVectorSet {
    points: Vec<Point>,
    scalars: Vec<FieldElement>,
    expected_result: Option<Coordinates>,
}

impl TestVectorSet {
    pub fn new(
        points: Vec<Point>,
        scalars: Vec<FieldElement>,
        expected_result: Option<Coordinates>,
    ) -> HarnessResult<Self> {
        if points.len() != scalars.len() {
            return Err(HarnessError::LengthMismatch {
                points: points.len(),
                scalars: scalars.len(),
            });
        }
        Ok(Self {
            points,
            scalars,
            expected_result,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn scalars(&self) -> &[FieldElement] {
        &self.scalars
    }

    pub fn expected_result(&self) -> Option<&Coordinates> {
        self.expected_result.as_ref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
