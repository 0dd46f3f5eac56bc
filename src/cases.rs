//! Precomputed test cases stored as JSON, one file per `2^k` case.
//!
//! Field elements are written as decimal strings so the files stay readable and
//! independent of any in-memory layout.

use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    BoxError, CaseId, CaseLoader, Coordinates, HarnessError, Point, TestVectorSet,
    BASE_FIELD_MODULUS, SCALAR_FIELD_MODULUS,
};

#[derive(Debug, thiserror::Error)]
pub enum CaseFileError {
    #[error("io error")]
    IoError(#[from] std::io::Error),

    #[error("malformed case file")]
    JsonError(#[from] serde_json::Error),

    #[error("{field} is not a decimal integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("{field} is out of range for its field")]
    OutOfRange { field: &'static str },

    #[error(transparent)]
    Vectors(#[from] HarnessError),
}

#[derive(Debug, Serialize, Deserialize)]
struct PointEntry {
    x: String,
    y: String,
    t: String,
    z: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CoordinatesEntry {
    x: String,
    y: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaseFile {
    base_affine_points: Vec<PointEntry>,
    scalars: Vec<String>,
    #[serde(default)]
    expected_result: Option<CoordinatesEntry>,
}

fn parse(field: &'static str, value: &str, modulus: &BigUint) -> Result<BigUint, CaseFileError> {
    let parsed =
        BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| CaseFileError::InvalidInteger {
            field,
            value: value.to_string(),
        })?;
    if &parsed >= modulus {
        return Err(CaseFileError::OutOfRange { field });
    }
    Ok(parsed)
}

fn coordinate(field: &'static str, value: &str) -> Result<BigUint, CaseFileError> {
    parse(field, value, &BASE_FIELD_MODULUS)
}

pub fn case_path<P: AsRef<Path>>(dir: P, case: CaseId) -> PathBuf {
    dir.as_ref().join(format!("{}.json", case.exponent()))
}

pub fn read_case<P: AsRef<Path>>(path: P) -> Result<TestVectorSet, CaseFileError> {
    let file = File::open(path)?;
    let case: CaseFile = serde_json::from_reader(BufReader::new(file))?;

    let points = case
        .base_affine_points
        .iter()
        .map(|p| -> Result<Point, CaseFileError> {
            Ok(Point::new(
                coordinate("point.x", &p.x)?,
                coordinate("point.y", &p.y)?,
                coordinate("point.t", &p.t)?,
                coordinate("point.z", &p.z)?,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let scalars = case
        .scalars
        .iter()
        .map(|s| parse("scalar", s, &SCALAR_FIELD_MODULUS))
        .collect::<Result<Vec<_>, _>>()?;
    let expected = case
        .expected_result
        .map(|e| {
            Ok::<_, CaseFileError>(Coordinates {
                x: coordinate("expectedResult.x", &e.x)?,
                y: coordinate("expectedResult.y", &e.y)?,
            })
        })
        .transpose()?;

    Ok(TestVectorSet::new(points, scalars, expected)?)
}

pub fn write_case<P: AsRef<Path>>(path: P, vectors: &TestVectorSet) -> Result<(), CaseFileError> {
    if let Some(dir) = path.as_ref().parent() {
        create_dir_all(dir)?;
    }

    let case = CaseFile {
        base_affine_points: vectors
            .points()
            .iter()
            .map(|p| PointEntry {
                x: p.x.to_string(),
                y: p.y.to_string(),
                t: p.t.to_string(),
                z: p.z.to_string(),
            })
            .collect(),
        scalars: vectors.scalars().iter().map(|s| s.to_string()).collect(),
        expected_result: vectors.expected_result().map(|e| CoordinatesEntry {
            x: e.x.to_string(),
            y: e.y.to_string(),
        }),
    };
    serde_json::to_writer(BufWriter::new(File::create(path)?), &case)?;
    Ok(())
}

/// Reads `<dir>/<k>.json` for case `2^k`.
#[derive(Clone, Debug)]
pub struct JsonCaseLoader {
    dir: PathBuf,
}

impl JsonCaseLoader {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl CaseLoader for JsonCaseLoader {
    fn load(&self, case: CaseId) -> Result<TestVectorSet, BoxError> {
        let path = case_path(&self.dir, case);
        log::debug!("reading {} from {}", case, path.display());
        Ok(read_case(path)?)
    }
}
