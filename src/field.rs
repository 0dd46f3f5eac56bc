//! Fixed-width encodings of a single field element.
//!
//! All layouts are little-endian: the least-significant limb (or byte) comes first.

use num_bigint::BigUint;

use crate::{HarnessError, HarnessResult, LIMB_BITS, LIMB_COUNT};

/// Fixed-size limb array used by the limb representation.
pub type Limbs = [u32; LIMB_COUNT];

fn check_fits(value: &BigUint, width: u64) -> HarnessResult<()> {
    let bits = value.bits();
    if bits > width {
        return Err(HarnessError::EncodingOverflow { bits, width });
    }
    Ok(())
}

#[inline]
fn limb_mask(limb_bits: u32) -> u64 {
    if limb_bits == 64 {
        u64::MAX
    } else {
        (1u64 << limb_bits) - 1
    }
}

/// Splits `value` into `limb_count` limbs of `limb_bits` bits each.
///
/// Fails with `EncodingOverflow` when `value >= 2^(limb_bits * limb_count)`.
pub fn to_limbs(value: &BigUint, limb_bits: u32, limb_count: usize) -> HarnessResult<Vec<u64>> {
    if limb_bits == 0 || limb_bits > 64 {
        return Err(HarnessError::InvalidWidth(limb_bits as u64));
    }
    check_fits(value, limb_bits as u64 * limb_count as u64)?;

    let words = value.to_u64_digits();
    let mask = limb_mask(limb_bits);
    let limbs = (0..limb_count)
        .map(|i| {
            let bit = i * limb_bits as usize;
            let (word, shift) = (bit / 64, bit % 64);
            let mut limb = words.get(word).copied().unwrap_or(0) >> shift;
            if shift + limb_bits as usize > 64 {
                limb |= words.get(word + 1).copied().unwrap_or(0) << (64 - shift);
            }
            limb & mask
        })
        .collect();
    Ok(limbs)
}

/// Inverse of [`to_limbs`]. Every limb must fit in `limb_bits`.
pub fn from_limbs(limbs: &[u64], limb_bits: u32) -> HarnessResult<BigUint> {
    if limb_bits == 0 || limb_bits > 64 {
        return Err(HarnessError::InvalidWidth(limb_bits as u64));
    }
    let mask = limb_mask(limb_bits);
    let mut value = BigUint::default();
    for (i, &limb) in limbs.iter().enumerate().rev() {
        if limb & !mask != 0 {
            return Err(HarnessError::EncodingOverflow {
                bits: 64 - limb.leading_zeros() as u64,
                width: limb_bits as u64,
            });
        }
        if i + 1 < limbs.len() {
            value <<= limb_bits as usize;
        }
        value |= BigUint::from(limb);
    }
    Ok(value)
}

/// Encodes `value` as `total_bits / 8` little-endian bytes, zero-padded.
pub fn to_bytes_le(value: &BigUint, total_bits: u32) -> HarnessResult<Vec<u8>> {
    if total_bits == 0 || total_bits % 8 != 0 {
        return Err(HarnessError::InvalidWidth(total_bits as u64));
    }
    let mut bytes = vec![0u8; (total_bits / 8) as usize];
    write_bytes_le(value, &mut bytes)?;
    Ok(bytes)
}

/// Writes `value` little-endian into `out`, zero-filling the remainder.
pub fn write_bytes_le(value: &BigUint, out: &mut [u8]) -> HarnessResult<()> {
    check_fits(value, out.len() as u64 * 8)?;
    let bytes = value.to_bytes_le();
    // `to_bytes_le` of zero is `[0]`, which still fits any non-empty slot.
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
    out[len..].fill(0);
    Ok(())
}

pub fn from_bytes_le(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

/// Encodes into the fixed limb array of the limb representation.
pub fn to_limb_array(value: &BigUint) -> HarnessResult<Limbs> {
    let mut limbs = Limbs::default();
    for (out, limb) in limbs
        .iter_mut()
        .zip(to_limbs(value, LIMB_BITS, LIMB_COUNT)?)
    {
        *out = limb as u32;
    }
    Ok(limbs)
}

pub fn from_limb_array(limbs: &Limbs) -> BigUint {
    BigUint::from_slice(limbs)
}
