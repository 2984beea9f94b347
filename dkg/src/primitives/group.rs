//! Group operations over BLS12-381.
//!
//! Wraps `blst` with the handful of types the protocol needs: scalars of the
//! prime-order field ([Scalar]), points on both source groups ([G1], [G2]),
//! and elements of the pairing target group ([GT]).
//!
//! # Warning
//!
//! Points decoded from untrusted input are checked to be canonical, not the
//! identity, and members of the prime-order subgroup. Points constructed in
//! memory (sums, products) are not re-checked.

use blst::{
    blst_bendian_from_fp, blst_bendian_from_scalar, blst_final_exp, blst_fp, blst_fp12,
    blst_fp12_in_group, blst_fp12_inverse, blst_fp12_is_one, blst_fp12_mul, blst_fp12_one,
    blst_fp12_sqr, blst_fp_from_bendian, blst_fr, blst_fr_add, blst_fr_cneg, blst_fr_from_scalar,
    blst_fr_from_uint64, blst_fr_inverse, blst_fr_mul, blst_fr_sub, blst_hash_to_g2,
    blst_keygen_v3, blst_miller_loop, blst_p1, blst_p1_add_or_double, blst_p1_affine,
    blst_p1_cneg, blst_p1_compress, blst_p1_from_affine, blst_p1_in_g1, blst_p1_is_inf,
    blst_p1_mult, blst_p1_to_affine, blst_p1_uncompress, blst_p2, blst_p2_add_or_double,
    blst_p2_affine, blst_p2_cneg, blst_p2_compress, blst_p2_from_affine, blst_p2_in_g2,
    blst_p2_is_inf, blst_p2_mult, blst_p2_to_affine, blst_p2_uncompress, blst_scalar,
    blst_scalar_fr_check, blst_scalar_from_bendian, blst_scalar_from_fr, BLS12_381_G1,
    BLS12_381_G2, BLST_ERROR,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_utils::hex;
use rand_core::CryptoRngCore;
use std::{fmt::Debug, ptr};
use zeroize::Zeroize;

/// An element of a group (or of the scalar field) that can be scaled by a [Scalar].
pub trait Element:
    Write + Read<Cfg = ()> + FixedSize + Copy + Clone + Eq + PartialEq + Debug + Send + Sync
{
    /// Returns the additive identity.
    fn zero() -> Self;

    /// Returns the generator (or multiplicative identity for scalars).
    fn one() -> Self;

    /// Adds to self in-place.
    fn add(&mut self, rhs: &Self);

    /// Multiplies self by a scalar in-place.
    fn mul(&mut self, rhs: &Scalar);
}

/// An element of the scalar field of BLS12-381.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct Scalar(blst_fr);

/// Length of a canonically encoded [Scalar].
pub const SCALAR_LENGTH: usize = 32;

/// Number of bits in the scalar field modulus.
///
/// Every scalar multiplication walks exactly this many bits so that timing does
/// not depend on the value of the scalar.
pub const SCALAR_BITS: usize = 255;

/// `R = 2^256 mod q` in little-endian Montgomery form which is equivalent to 1 in little-endian
/// non-Montgomery form.
///
/// mod(2^256, 0x73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001) = 0x1824b159acc5056f998c4fefecbc4ff55884b7fa0003480200000001fffffffe
// Reference: https://github.com/filecoin-project/blstrs/blob/ffbb41d1495d84e40a712583346439924603b49a/src/scalar.rs#L77-L89
const BLST_FR_ONE: Scalar = Scalar(blst_fr {
    l: [
        0x0000_0001_ffff_fffe,
        0x5884_b7fa_0003_4802,
        0x998c_4fef_ecbc_4ff5,
        0x1824_b159_acc5_056f,
    ],
});

/// A point on the G1 subgroup of BLS12-381.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct G1(blst_p1);

/// Length of a compressed [G1] point.
pub const G1_ELEMENT_BYTE_LENGTH: usize = 48;

/// A point on the G2 subgroup of BLS12-381.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct G2(blst_p2);

/// Length of a compressed [G2] point.
pub const G2_ELEMENT_BYTE_LENGTH: usize = 96;

/// An element of the pairing target group (the order `q` subgroup of `Fp12`).
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct GT(blst_fp12);

/// Length of a base field element.
const FP_LENGTH: usize = 48;

/// Length of an encoded [GT] element (twelve base field elements).
pub const GT_ELEMENT_BYTE_LENGTH: usize = 12 * FP_LENGTH;

impl Scalar {
    /// Generates a random scalar using the provided RNG.
    pub fn rand<R: CryptoRngCore>(rng: &mut R) -> Self {
        // Generate a random 64 byte buffer
        let mut ikm = [0u8; 64];
        rng.fill_bytes(&mut ikm);

        // Generate a scalar from the randomly populated buffer
        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_keygen_v3(&mut sc, ikm.as_ptr(), ikm.len(), ptr::null(), 0);
            blst_fr_from_scalar(&mut ret, &sc);
        }
        ikm.zeroize();
        Self(ret)
    }

    /// Generates a random, non-zero scalar.
    pub fn rand_nonzero<R: CryptoRngCore>(rng: &mut R) -> Self {
        loop {
            let scalar = Self::rand(rng);
            if !scalar.is_zero() {
                return scalar;
            }
        }
    }

    /// Returns the scalar corresponding to the provided integer.
    pub fn from_u64(i: u64) -> Self {
        // blst requires a buffer of 4 uint64 values. Failure to provide one will
        // result in unexpected behavior (will read past the provided buffer).
        //
        // Reference: https://github.com/supranational/blst/blob/415d4f0e2347a794091836a3065206edfd9c72f3/bindings/blst.h#L102
        let buffer = [i, 0, 0, 0];
        let mut ret = blst_fr::default();
        unsafe { blst_fr_from_uint64(&mut ret, buffer.as_ptr()) };
        Self(ret)
    }

    /// Returns the evaluation point assigned to a share index (`x = index + 1`).
    ///
    /// The point `x = 0` is never handed out because it holds the secret.
    pub fn from_index(index: u32) -> Self {
        Self::from_u64(index as u64 + 1)
    }

    /// Returns whether the scalar is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Computes the inverse of the scalar.
    pub fn inverse(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        let mut ret = blst_fr::default();
        unsafe { blst_fr_inverse(&mut ret, &self.0) };
        Some(Self(ret))
    }

    /// Subtracts the provided scalar from self in-place.
    pub fn sub(&mut self, rhs: &Self) {
        unsafe { blst_fr_sub(&mut self.0, &self.0, &rhs.0) }
    }

    /// Negates self in-place.
    pub fn neg(&mut self) {
        unsafe { blst_fr_cneg(&mut self.0, &self.0, true) }
    }

    /// Returns the little-endian, non-Montgomery representation used by `blst` multiplication.
    fn as_blst_scalar(&self) -> blst_scalar {
        let mut scalar = blst_scalar::default();
        unsafe { blst_scalar_from_fr(&mut scalar, &self.0) };
        scalar
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.l.zeroize();
    }
}

impl Debug for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Scalars are frequently secret, never print them.
        f.write_str("Scalar(..)")
    }
}

impl Element for Scalar {
    fn zero() -> Self {
        Self(blst_fr::default())
    }

    fn one() -> Self {
        BLST_FR_ONE
    }

    fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_fr_add(&mut self.0, &self.0, &rhs.0);
        }
    }

    fn mul(&mut self, rhs: &Self) {
        unsafe {
            blst_fr_mul(&mut self.0, &self.0, &rhs.0);
        }
    }
}

impl Write for Scalar {
    fn write(&self, buf: &mut impl BufMut) {
        let mut bytes = [0u8; SCALAR_LENGTH];
        let scalar = self.as_blst_scalar();
        unsafe { blst_bendian_from_scalar(bytes.as_mut_ptr(), &scalar) };
        buf.put_slice(&bytes);
    }
}

impl Read for Scalar {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; SCALAR_LENGTH]>::read(buf)?;
        let mut ret = blst_fr::default();
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_bendian(&mut scalar, bytes.as_ptr());
            if !blst_scalar_fr_check(&scalar) {
                return Err(CodecError::Invalid("Scalar", "not in field"));
            }
            blst_fr_from_scalar(&mut ret, &scalar);
        }
        Ok(Self(ret))
    }
}

impl FixedSize for Scalar {
    const SIZE: usize = SCALAR_LENGTH;
}

impl G1 {
    /// Negates self in-place.
    pub fn neg(&mut self) {
        unsafe { blst_p1_cneg(&mut self.0, true) }
    }

    /// Returns whether the point is the identity.
    pub fn is_identity(&self) -> bool {
        unsafe { blst_p1_is_inf(&self.0) }
    }

    /// Returns the affine representation expected by pairing operations.
    pub(crate) fn as_blst_p1_affine(&self) -> blst_p1_affine {
        let mut affine = blst_p1_affine::default();
        unsafe { blst_p1_to_affine(&mut affine, &self.0) };
        affine
    }
}

impl Element for G1 {
    fn zero() -> Self {
        Self(blst_p1::default())
    }

    fn one() -> Self {
        let mut ret = blst_p1::default();
        unsafe {
            blst_p1_from_affine(&mut ret, &BLS12_381_G1);
        }
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_p1_add_or_double(&mut self.0, &self.0, &rhs.0);
        }
    }

    fn mul(&mut self, rhs: &Scalar) {
        let scalar = rhs.as_blst_scalar();
        unsafe {
            blst_p1_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }
}

impl Debug for G1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bytes = Vec::with_capacity(G1_ELEMENT_BYTE_LENGTH);
        self.write(&mut bytes);
        write!(f, "G1({})", hex(&bytes))
    }
}

impl Write for G1 {
    fn write(&self, buf: &mut impl BufMut) {
        let mut bytes = [0u8; G1_ELEMENT_BYTE_LENGTH];
        unsafe {
            blst_p1_compress(bytes.as_mut_ptr(), &self.0);
        }
        buf.put_slice(&bytes);
    }
}

impl Read for G1 {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; G1_ELEMENT_BYTE_LENGTH]>::read(buf)?;
        let mut ret = blst_p1::default();
        unsafe {
            let mut affine = blst_p1_affine::default();
            if blst_p1_uncompress(&mut affine, bytes.as_ptr()) != BLST_ERROR::BLST_SUCCESS {
                return Err(CodecError::Invalid("G1", "invalid encoding"));
            }
            blst_p1_from_affine(&mut ret, &affine);

            // Verify that deserialized element isn't infinite
            if blst_p1_is_inf(&ret) {
                return Err(CodecError::Invalid("G1", "infinity"));
            }

            // Verify that the deserialized element is in G1
            if !blst_p1_in_g1(&ret) {
                return Err(CodecError::Invalid("G1", "outside G1"));
            }
        }
        Ok(Self(ret))
    }
}

impl FixedSize for G1 {
    const SIZE: usize = G1_ELEMENT_BYTE_LENGTH;
}

impl G2 {
    /// Negates self in-place.
    pub fn neg(&mut self) {
        unsafe { blst_p2_cneg(&mut self.0, true) }
    }

    /// Returns whether the point is the identity.
    pub fn is_identity(&self) -> bool {
        unsafe { blst_p2_is_inf(&self.0) }
    }

    /// Hashes the provided message to G2 under the given domain separation tag.
    pub fn hash(dst: &[u8], message: &[u8]) -> Self {
        let mut ret = blst_p2::default();
        unsafe {
            blst_hash_to_g2(
                &mut ret,
                message.as_ptr(),
                message.len(),
                dst.as_ptr(),
                dst.len(),
                ptr::null(),
                0,
            );
        }
        Self(ret)
    }

    /// Returns the affine representation expected by pairing operations.
    pub(crate) fn as_blst_p2_affine(&self) -> blst_p2_affine {
        let mut affine = blst_p2_affine::default();
        unsafe { blst_p2_to_affine(&mut affine, &self.0) };
        affine
    }
}

impl Element for G2 {
    fn zero() -> Self {
        Self(blst_p2::default())
    }

    fn one() -> Self {
        let mut ret = blst_p2::default();
        unsafe {
            blst_p2_from_affine(&mut ret, &BLS12_381_G2);
        }
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_p2_add_or_double(&mut self.0, &self.0, &rhs.0);
        }
    }

    fn mul(&mut self, rhs: &Scalar) {
        let scalar = rhs.as_blst_scalar();
        unsafe {
            blst_p2_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }
}

impl Zeroize for G2 {
    fn zeroize(&mut self) {
        for coordinate in [&mut self.0.x, &mut self.0.y, &mut self.0.z] {
            coordinate.fp.iter_mut().for_each(|fp| fp.l.zeroize());
        }
    }
}

impl Debug for G2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bytes = Vec::with_capacity(G2_ELEMENT_BYTE_LENGTH);
        self.write(&mut bytes);
        write!(f, "G2({})", hex(&bytes))
    }
}

impl Write for G2 {
    fn write(&self, buf: &mut impl BufMut) {
        let mut bytes = [0u8; G2_ELEMENT_BYTE_LENGTH];
        unsafe {
            blst_p2_compress(bytes.as_mut_ptr(), &self.0);
        }
        buf.put_slice(&bytes);
    }
}

impl Read for G2 {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; G2_ELEMENT_BYTE_LENGTH]>::read(buf)?;
        let mut ret = blst_p2::default();
        unsafe {
            let mut affine = blst_p2_affine::default();
            if blst_p2_uncompress(&mut affine, bytes.as_ptr()) != BLST_ERROR::BLST_SUCCESS {
                return Err(CodecError::Invalid("G2", "invalid encoding"));
            }
            blst_p2_from_affine(&mut ret, &affine);

            // Verify that deserialized element isn't infinite
            if blst_p2_is_inf(&ret) {
                return Err(CodecError::Invalid("G2", "infinity"));
            }

            // Verify that the deserialized element is in G2
            if !blst_p2_in_g2(&ret) {
                return Err(CodecError::Invalid("G2", "outside G2"));
            }
        }
        Ok(Self(ret))
    }
}

impl FixedSize for G2 {
    const SIZE: usize = G2_ELEMENT_BYTE_LENGTH;
}

impl GT {
    /// Returns the multiplicative identity.
    pub fn one() -> Self {
        Self(unsafe { *blst_fp12_one() })
    }

    /// Returns whether self is the multiplicative identity.
    pub fn is_one(&self) -> bool {
        unsafe { blst_fp12_is_one(&self.0) }
    }

    /// Multiplies self by `rhs` in-place.
    pub fn mul(&mut self, rhs: &Self) {
        unsafe { blst_fp12_mul(&mut self.0, &self.0, &rhs.0) }
    }

    /// Inverts self in-place.
    pub fn invert(&mut self) {
        unsafe { blst_fp12_inverse(&mut self.0, &self.0) }
    }

    /// Raises self to the power of `exponent`.
    ///
    /// Square-and-multiply over a fixed number of bits. The multiplication is
    /// skipped for zero bits, so this must only be used with public exponents
    /// (Lagrange coefficients).
    pub fn pow(&self, exponent: &Scalar) -> Self {
        let scalar = exponent.as_blst_scalar();
        let mut acc = Self::one();
        for bit in (0..SCALAR_BITS).rev() {
            unsafe { blst_fp12_sqr(&mut acc.0, &acc.0) };
            if (scalar.b[bit / 8] >> (bit % 8)) & 1 == 1 {
                acc.mul(self);
            }
        }
        acc
    }

    /// Returns the base field elements of self in encoding order.
    fn coefficients(&self) -> [&blst_fp; 12] {
        let c = &self.0.fp6;
        [
            &c[0].fp2[0].fp[0],
            &c[0].fp2[0].fp[1],
            &c[0].fp2[1].fp[0],
            &c[0].fp2[1].fp[1],
            &c[0].fp2[2].fp[0],
            &c[0].fp2[2].fp[1],
            &c[1].fp2[0].fp[0],
            &c[1].fp2[0].fp[1],
            &c[1].fp2[1].fp[0],
            &c[1].fp2[1].fp[1],
            &c[1].fp2[2].fp[0],
            &c[1].fp2[2].fp[1],
        ]
    }
}

impl Debug for GT {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Target group elements are shared secrets and decryption shares.
        f.write_str("GT(..)")
    }
}

impl Write for GT {
    fn write(&self, buf: &mut impl BufMut) {
        for fp in self.coefficients() {
            let mut bytes = [0u8; FP_LENGTH];
            unsafe { blst_bendian_from_fp(bytes.as_mut_ptr(), fp) };
            buf.put_slice(&bytes);
        }
    }
}

impl Read for GT {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let bytes = <[u8; GT_ELEMENT_BYTE_LENGTH]>::read(buf)?;
        let mut ret = blst_fp12::default();
        for (i, chunk) in bytes.chunks_exact(FP_LENGTH).enumerate() {
            let fp = &mut ret.fp6[i / 6].fp2[(i % 6) / 2].fp[i % 2];
            unsafe { blst_fp_from_bendian(fp, chunk.as_ptr()) };
        }
        let ret = Self(ret);

        // `blst_fp_from_bendian` silently reduces, so re-encode to reject non-canonical input
        let mut canonical = Vec::with_capacity(GT_ELEMENT_BYTE_LENGTH);
        ret.write(&mut canonical);
        if canonical[..] != bytes[..] {
            return Err(CodecError::Invalid("GT", "non-canonical encoding"));
        }
        if !unsafe { blst_fp12_in_group(&ret.0) } {
            return Err(CodecError::Invalid("GT", "outside GT"));
        }
        Ok(ret)
    }
}

impl FixedSize for GT {
    const SIZE: usize = GT_ELEMENT_BYTE_LENGTH;
}

/// Computes the pairing `e(p, q)`.
pub fn pairing(p: &G1, q: &G2) -> GT {
    // Reference: https://github.com/MystenLabs/fastcrypto/blob/bd4999bd3e901eab34ae3dd96dbe38b86ac646a7/fastcrypto/src/groups/bls12381.rs#L223-L234
    let pa = p.as_blst_p1_affine();
    let qa = q.as_blst_p2_affine();
    let mut res = blst_fp12::default();
    unsafe {
        blst_miller_loop(&mut res, &qa, &pa);
        blst_final_exp(&mut res, &res);
    }
    GT(res)
}

/// Returns whether `Π e(p_i, q_i) == 1`.
///
/// Miller loops are accumulated and a single final exponentiation is performed.
pub fn pairing_product_is_one(pairs: &[(G1, G2)]) -> bool {
    let mut acc = GT::one().0;
    for (p, q) in pairs {
        let pa = p.as_blst_p1_affine();
        let qa = q.as_blst_p2_affine();
        let mut ml = blst_fp12::default();
        unsafe {
            blst_miller_loop(&mut ml, &qa, &pa);
            blst_fp12_mul(&mut acc, &acc, &ml);
        }
    }
    let mut res = blst_fp12::default();
    unsafe {
        blst_final_exp(&mut res, &acc);
        blst_fp12_is_one(&res)
    }
}

/// Returns whether `e(p1, q1) == e(p2, q2)`.
pub fn pairings_equal(p1: &G1, q1: &G2, p2: &G1, q2: &G2) -> bool {
    let mut neg = *p2;
    neg.neg();
    pairing_product_is_one(&[(*p1, *q1), (neg, *q2)])
}
