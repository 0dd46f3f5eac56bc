//! Reference MSM backends built on arkworks, one per input representation.
//!
//! They all compute the same variable-base MSM over the twisted Edwards curve on
//! BLS12-377's scalar field, so their results must agree with each other.

use ark_ec::{CurveGroup, VariableBaseMSM};
use ark_ed_on_bls12_377::{EdwardsAffine, EdwardsProjective, Fq, Fr};
use ark_ff::{BigInt, PrimeField};
use num_bigint::BigUint;

use crate::{Backend, BoxError, LimbPoint, Limbs, Point, ELEMENT_BYTES, LIMB_COUNT};

pub const ARKWORKS_PIPPENGER: &str = "Arkworks Pippenger";
pub const ARKWORKS_LIMBS: &str = "Arkworks Pippenger: Limb Input";
pub const ARKWORKS_BUFFER: &str = "Arkworks Pippenger: Buffer Input";
pub const NAIVE_DOUBLE_AND_ADD: &str = "Naive Double-and-Add";

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{0} is not a canonical field element")]
    NonCanonical(&'static str),
    #[error("packed buffers of {points} and {scalars} bytes do not describe whole vectors")]
    MisalignedBuffers { points: usize, scalars: usize },
    #[error("msm input lengths differ at index {0}")]
    LengthMismatch(usize),
}

/// All reference backends; the big-integer one is the trusted reference.
pub fn reference_backends() -> Vec<Backend> {
    vec![
        Backend::big_int(ARKWORKS_PIPPENGER, msm_big_int).trusted_reference(),
        Backend::limbs(ARKWORKS_LIMBS, msm_limbs),
        Backend::packed(ARKWORKS_BUFFER, msm_packed),
        Backend::big_int(NAIVE_DOUBLE_AND_ADD, msm_naive),
    ]
}

fn base(x: Fq, y: Fq) -> EdwardsAffine {
    EdwardsAffine::new_unchecked(x, y)
}

fn to_point(result: EdwardsProjective) -> Point {
    let affine = result.into_affine();
    Point::new(
        affine.x.into(),
        affine.y.into(),
        (affine.x * affine.y).into(),
        BigUint::from(1u8),
    )
}

fn msm(bases: &[EdwardsAffine], scalars: &[Fr]) -> Result<Point, BoxError> {
    let result = EdwardsProjective::msm(bases, scalars).map_err(InputError::LengthMismatch)?;
    Ok(to_point(result))
}

fn big_int_inputs(
    points: &[Point],
    scalars: &[BigUint],
) -> Result<(Vec<EdwardsAffine>, Vec<Fr>), InputError> {
    let bases = points
        .iter()
        .map(|p| -> Result<_, InputError> {
            Ok(base(big_to_field(&p.x, "x")?, big_to_field(&p.y, "y")?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let scalars = scalars
        .iter()
        .map(|s| big_to_field(s, "scalar"))
        .collect::<Result<Vec<Fr>, _>>()?;
    Ok((bases, scalars))
}

pub fn msm_big_int(points: &[Point], scalars: &[BigUint]) -> Result<Point, BoxError> {
    let (bases, scalars) = big_int_inputs(points, scalars)?;
    msm(&bases, &scalars)
}

/// Sums `scalar * base` one term at a time.
pub fn msm_naive(points: &[Point], scalars: &[BigUint]) -> Result<Point, BoxError> {
    let (bases, scalars) = big_int_inputs(points, scalars)?;
    if bases.len() != scalars.len() {
        return Err(InputError::LengthMismatch(bases.len().min(scalars.len())).into());
    }
    let result: EdwardsProjective = bases
        .iter()
        .zip(&scalars)
        .map(|(base, scalar)| *base * scalar)
        .sum();
    Ok(to_point(result))
}

/// Packs pairs of 32-bit limbs into the 64-bit limbs arkworks expects.
fn limbs_to_field<F: PrimeField<BigInt = BigInt<4>>>(
    limbs: &Limbs,
    name: &'static str,
) -> Result<F, InputError> {
    let mut words = [0u64; LIMB_COUNT / 2];
    for (word, pair) in words.iter_mut().zip(limbs.chunks_exact(2)) {
        *word = pair[0] as u64 | (pair[1] as u64) << 32;
    }
    F::from_bigint(BigInt::new(words)).ok_or(InputError::NonCanonical(name))
}

pub fn msm_limbs(points: &[LimbPoint], scalars: &[Limbs]) -> Result<Point, BoxError> {
    let bases = points
        .iter()
        .map(|p| -> Result<_, InputError> {
            Ok(base(limbs_to_field(&p.x, "x")?, limbs_to_field(&p.y, "y")?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let scalars = scalars
        .iter()
        .map(|s| limbs_to_field(s, "scalar"))
        .collect::<Result<Vec<Fr>, _>>()?;
    msm(&bases, &scalars)
}

/// Rejects values at or above the field modulus instead of reducing them.
fn big_to_field<F: PrimeField>(value: &BigUint, name: &'static str) -> Result<F, InputError> {
    let modulus: BigUint = F::MODULUS.into();
    if *value >= modulus {
        return Err(InputError::NonCanonical(name));
    }
    Ok(F::from(value.clone()))
}

fn bytes_to_field<F: PrimeField>(bytes: &[u8], name: &'static str) -> Result<F, InputError> {
    big_to_field(&BigUint::from_bytes_le(bytes), name)
}

pub fn msm_packed(points: &[u8], scalars: &[u8]) -> Result<Point, BoxError> {
    let count = scalars.len() / ELEMENT_BYTES;
    if scalars.len() % ELEMENT_BYTES != 0 || points.len() != count * 2 * ELEMENT_BYTES {
        return Err(InputError::MisalignedBuffers {
            points: points.len(),
            scalars: scalars.len(),
        }
        .into());
    }

    let bases = points
        .chunks_exact(2 * ELEMENT_BYTES)
        .map(|xy| -> Result<_, InputError> {
            let (x, y) = xy.split_at(ELEMENT_BYTES);
            Ok(base(bytes_to_field(x, "x")?, bytes_to_field(y, "y")?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let scalars = scalars
        .chunks_exact(ELEMENT_BYTES)
        .map(|s| bytes_to_field(s, "scalar"))
        .collect::<Result<Vec<Fr>, _>>()?;
    msm(&bases, &scalars)
}
