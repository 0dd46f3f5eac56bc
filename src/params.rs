//! Parameters shared by every encoding and by the synthetic vector source.

use ark_ed_on_bls12_377::{Fq, Fr};
use ark_ff::PrimeField;
use num_bigint::BigUint;

use crate::Point;

/// Width every field element is encoded at, in bits.
pub const BIT_WIDTH: u32 = 256;
/// Limb width of the limb representation.
pub const LIMB_BITS: u32 = 32;
pub const LIMB_COUNT: usize = (BIT_WIDTH / LIMB_BITS) as usize;
/// Bytes per element in the packed little-endian buffers.
pub const ELEMENT_BYTES: usize = (BIT_WIDTH / 8) as usize;

/// Input size used when switching back to random inputs.
pub const DEFAULT_INPUT_SIZE: usize = 1_000;

/// Largest exponent accepted for a `2^k` test case.
pub const MAX_CASE_EXPONENT: u32 = 26;

const FIXED_X: &str =
    "2796670805570508460920584878396618987767121022598342527208237783066948667246";
const FIXED_Y: &str =
    "8134280397689638111748378379571739274369602049665521098046934931245960532166";
const FIXED_T: &str =
    "3446088593515175914550487355059397868296219355049460558182099906777968652023";

fn decimal(digits: &str) -> BigUint {
    BigUint::parse_bytes(digits.as_bytes(), 10).expect("constant is a decimal literal")
}

lazy_static::lazy_static! {
    /// Prime of the coordinate field (the BLS12-377 scalar field).
    pub static ref BASE_FIELD_MODULUS: BigUint = Fq::MODULUS.into();
    /// Order of the prime-order subgroup scalars are drawn from.
    pub static ref SCALAR_FIELD_MODULUS: BigUint = Fr::MODULUS.into();
    /// Base point replicated by synthetic vector sets, in extended coordinates with z = 1.
    pub static ref FIXED_POINT: Point = Point::new(
        decimal(FIXED_X),
        decimal(FIXED_Y),
        decimal(FIXED_T),
        BigUint::from(1u8),
    );
}
