//! Whole-vector-set encodings consumed by the different backend families.

use num_bigint::BigUint;
use rayon::prelude::*;

use crate::{
    from_bytes_le, from_limb_array, to_limb_array, write_bytes_le, Coordinates, HarnessResult,
    Limbs, Point, TestVectorSet, ELEMENT_BYTES,
};

/// A point with every extended coordinate in limb form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LimbPoint {
    pub x: Limbs,
    pub y: Limbs,
    pub t: Limbs,
    pub z: Limbs,
}

impl LimbPoint {
    pub fn encode(point: &Point) -> HarnessResult<Self> {
        Ok(Self {
            x: to_limb_array(&point.x)?,
            y: to_limb_array(&point.y)?,
            t: to_limb_array(&point.t)?,
            z: to_limb_array(&point.z)?,
        })
    }

    pub fn decode(&self) -> Point {
        Point::new(
            from_limb_array(&self.x),
            from_limb_array(&self.y),
            from_limb_array(&self.t),
            from_limb_array(&self.z),
        )
    }
}

/// Canonical big-integer view; the source of truth for the other two.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BigIntVectors {
    pub points: Vec<Point>,
    pub scalars: Vec<BigUint>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LimbVectors {
    pub points: Vec<LimbPoint>,
    pub scalars: Vec<Limbs>,
}

/// Packed little-endian buffers, `ELEMENT_BYTES` per element.
///
/// The point buffer holds only the (x, y) pair of every point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedVectors {
    pub points: Vec<u8>,
    pub scalars: Vec<u8>,
}

const POINT_BYTES: usize = 2 * ELEMENT_BYTES;

impl PackedVectors {
    pub fn len(&self) -> usize {
        self.scalars.len() / ELEMENT_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }

    /// Whether both buffers hold whole elements for the same vector count.
    pub fn is_well_formed(&self) -> bool {
        self.scalars.len() % ELEMENT_BYTES == 0 && self.points.len() == self.len() * POINT_BYTES
    }

    pub fn point(&self, i: usize) -> Option<Coordinates> {
        let chunk = self.points.chunks_exact(POINT_BYTES).nth(i)?;
        Some(Coordinates {
            x: from_bytes_le(&chunk[..ELEMENT_BYTES]),
            y: from_bytes_le(&chunk[ELEMENT_BYTES..]),
        })
    }

    pub fn scalar(&self, i: usize) -> Option<BigUint> {
        self.scalars
            .chunks_exact(ELEMENT_BYTES)
            .nth(i)
            .map(from_bytes_le)
    }
}

/// Three lockstep views of one [`TestVectorSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedVectorSet {
    big_ints: BigIntVectors,
    limbs: LimbVectors,
    packed: PackedVectors,
}

impl EncodedVectorSet {
    pub fn big_ints(&self) -> &BigIntVectors {
        &self.big_ints
    }

    pub fn limbs(&self) -> &LimbVectors {
        &self.limbs
    }

    pub fn packed(&self) -> &PackedVectors {
        &self.packed
    }

    pub fn len(&self) -> usize {
        self.big_ints.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.big_ints.scalars.is_empty()
    }

    /// blake3 fingerprint over both packed buffers.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.len() as u64).to_le_bytes());
        hasher.update(&self.packed.points);
        hasher.update(&self.packed.scalars);
        hasher.finalize()
    }
}

fn pack_points(points: &[Point]) -> HarnessResult<Vec<u8>> {
    let mut buffer = vec![0u8; points.len() * POINT_BYTES];
    buffer
        .par_chunks_mut(POINT_BYTES)
        .zip(points.par_iter())
        .try_for_each(|(slot, point)| {
            let (x, y) = slot.split_at_mut(ELEMENT_BYTES);
            write_bytes_le(&point.x, x)?;
            write_bytes_le(&point.y, y)
        })?;
    Ok(buffer)
}

fn pack_scalars(scalars: &[BigUint]) -> HarnessResult<Vec<u8>> {
    let mut buffer = vec![0u8; scalars.len() * ELEMENT_BYTES];
    buffer
        .par_chunks_mut(ELEMENT_BYTES)
        .zip(scalars.par_iter())
        .try_for_each(|(slot, scalar)| write_bytes_le(scalar, slot))?;
    Ok(buffer)
}

/// Derives every representation of `vectors`.
///
/// Pure: equal inputs always produce byte-identical outputs. An element that does
/// not fit the encoding width aborts the whole call with `EncodingOverflow`.
pub fn encode_all(vectors: &TestVectorSet) -> HarnessResult<EncodedVectorSet> {
    let points = vectors.points();
    let scalars = vectors.scalars();

    let limbs = LimbVectors {
        points: points
            .par_iter()
            .map(LimbPoint::encode)
            .collect::<HarnessResult<_>>()?,
        scalars: scalars
            .par_iter()
            .map(to_limb_array)
            .collect::<HarnessResult<_>>()?,
    };
    let packed = PackedVectors {
        points: pack_points(points)?,
        scalars: pack_scalars(scalars)?,
    };

    Ok(EncodedVectorSet {
        big_ints: BigIntVectors {
            points: points.to_vec(),
            scalars: scalars.to_vec(),
        },
        limbs,
        packed,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{HarnessError, FIXED_POINT, SCALAR_FIELD_MODULUS};
    use num_bigint::RandBigInt;

    fn vectors(n: usize) -> TestVectorSet {
        let mut rng = ark_std::test_rng();
        let scalars = (0..n)
            .map(|_| rng.gen_biguint_below(&SCALAR_FIELD_MODULUS))
            .collect();
        TestVectorSet::new(vec![FIXED_POINT.clone(); n], scalars, None).unwrap()
    }

    #[test]
    fn views_agree_element_wise() {
        let set = vectors(17);
        let encoded = encode_all(&set).unwrap();

        assert_eq!(encoded.len(), 17);
        assert_eq!(encoded.packed().points.len(), 17 * 2 * ELEMENT_BYTES);
        assert_eq!(encoded.packed().scalars.len(), 17 * ELEMENT_BYTES);
        assert!(encoded.packed().is_well_formed());

        for i in 0..set.len() {
            let point = &set.points()[i];
            let scalar = &set.scalars()[i];
            assert_eq!(&encoded.big_ints().points[i], point);
            assert_eq!(&encoded.limbs().points[i].decode(), point);
            assert_eq!(&from_limb_array(&encoded.limbs().scalars[i]), scalar);
            assert_eq!(encoded.packed().point(i), Some(point.coordinates()));
            assert_eq!(encoded.packed().scalar(i).as_ref(), Some(scalar));
        }
        assert_eq!(encoded.packed().point(17), None);
    }

    #[test]
    fn encoding_is_idempotent() {
        let set = vectors(33);
        let first = encode_all(&set).unwrap();
        let second = encode_all(&set).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn empty_set_encodes_to_empty_views() {
        let encoded = encode_all(&TestVectorSet::default()).unwrap();
        assert!(encoded.is_empty());
        assert!(encoded.packed().is_empty());
        assert!(encoded.limbs().points.is_empty());
    }

    #[test]
    fn overflow_aborts_the_encode() {
        let mut scalars: Vec<BigUint> = vec![BigUint::from(3u8); 4];
        scalars[2] = BigUint::from(1u8) << 300;
        let set = TestVectorSet::new(vec![FIXED_POINT.clone(); 4], scalars, None).unwrap();
        assert!(matches!(
            encode_all(&set),
            Err(HarnessError::EncodingOverflow { bits: 301, .. })
        ));

        // the same input minus the bad element still encodes
        let fine = vectors(4);
        assert!(encode_all(&fine).is_ok());
    }
}
