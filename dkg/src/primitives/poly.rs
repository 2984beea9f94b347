//! Polynomial operations over the BLS12-381 scalar field.
//!
//! # Warning
//!
//! The security of the polynomial operations is critical for the overall
//! security of the threshold schemes. Ensure that the scalar field operations
//! are performed over the correct field and that all elements are valid.

use crate::primitives::group::{Element, Scalar, G1};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, RangeCfg, Read, Write};
use rand_core::CryptoRngCore;
use zeroize::Zeroize;

/// Secret polynomials are sampled by a dealer and never leave it.
pub type Secret = Poly<Scalar>;

/// Public polynomials commit to the coefficients of a [Secret] in G1.
pub type Public = Poly<G1>;

/// A polynomial that is using a scalar for the variable x and a generic
/// element for the coefficients.
///
/// The coefficients must be able to multiply the type of the variable,
/// which is always a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
// Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L24-L28
pub struct Poly<C>(Vec<C>);

/// Returns a new scalar polynomial of the given degree where each coefficient is
/// sampled at random from the provided RNG.
///
/// In the context of secret sharing, the threshold is the degree + 1.
pub fn new_from<R: CryptoRngCore>(degree: u32, rng: &mut R) -> Secret {
    // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L46-L52
    let coeffs = (0..=degree).map(|_| Scalar::rand(rng)).collect::<Vec<_>>();
    Poly::<Scalar>(coeffs)
}

impl<C> Poly<C> {
    /// Returns the constant term of the polynomial.
    pub fn constant(&self) -> &C {
        &self.0[0]
    }

    /// Returns the degree of the polynomial
    pub fn degree(&self) -> u32 {
        (self.0.len() - 1) as u32 // check size in deserialize, safe to cast
    }

    /// Returns the number of required shares to reconstruct the polynomial.
    ///
    /// This will be the threshold
    pub fn required(&self) -> u32 {
        self.0.len() as u32 // check size in deserialize, safe to cast
    }
}

impl<C: Element> Poly<C> {
    /// Commits the scalar polynomial to the group and returns a polynomial over
    /// the group.
    ///
    /// This is done by multiplying each coefficient of the polynomial with the
    /// group's generator.
    pub fn commit(secret: &Secret) -> Self {
        // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L322-L340
        let commits = secret
            .0
            .iter()
            .map(|c| {
                let mut commitment = C::one();
                commitment.mul(c);
                commitment
            })
            .collect::<Vec<C>>();
        Self(commits)
    }

    /// Returns a zero polynomial.
    pub fn zero() -> Self {
        Self(vec![C::zero()])
    }

    /// Performs polynomial addition in place
    pub fn add(&mut self, other: &Self) {
        // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L87-L95

        // if we have a smaller degree we should pad with zeros
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), C::zero())
        }

        self.0.iter_mut().zip(&other.0).for_each(|(a, b)| a.add(b))
    }

    /// Evaluates the polynomial at the point assigned to `index` (`x = index + 1`).
    pub fn evaluate(&self, index: u32) -> C {
        // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L111-L129

        // We add +1 because we must never evaluate the polynomial at its first point
        // otherwise it reveals the secret.
        let xi = Scalar::from_index(index);

        // Use Horner's method to evaluate the polynomial
        self.0.iter().rev().fold(C::zero(), |mut sum, coeff| {
            sum.mul(&xi);
            sum.add(coeff);
            sum
        })
    }
}

impl Zeroize for Poly<Scalar> {
    fn zeroize(&mut self) {
        self.0.iter_mut().for_each(Zeroize::zeroize);
    }
}

impl<C: Element> Write for Poly<C> {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl<C: Element> Read for Poly<C> {
    /// Bounds the number of coefficients.
    type Cfg = RangeCfg;

    fn read_cfg(buf: &mut impl Buf, range: &RangeCfg) -> Result<Self, CodecError> {
        let coeffs = Vec::<C>::read_cfg(buf, &(range.clone(), ()))?;
        if coeffs.is_empty() {
            return Err(CodecError::Invalid("Poly", "no coefficients"));
        }
        Ok(Self(coeffs))
    }
}

impl<C: Element> EncodeSize for Poly<C> {
    fn encode_size(&self) -> usize {
        self.0.encode_size()
    }
}

#[cfg(test)]
mod tests {
    // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/b0ef82ff79769d085a5a7d3f4fe690b1c8fe6dc9/crates/threshold-bls/src/poly.rs#L355-L604
    use super::*;
    use crate::primitives::group::G2;
    use commonware_codec::{Decode, Encode};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn poly_degree() {
        let mut rng = StdRng::seed_from_u64(0);
        let s = 5;
        let p = new_from(s, &mut rng);
        assert_eq!(p.degree(), s);
        assert_eq!(p.required(), s + 1);
    }

    #[test]
    fn add_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let p1 = new_from(3, &mut rng);
        let p2 = Poly::<Scalar>::zero();
        let mut res = p1.clone();
        res.add(&p2);
        assert_eq!(res, p1);

        let p1 = Poly::<Scalar>::zero();
        let p2 = new_from(3, &mut rng);
        let mut res = p1;
        res.add(&p2);
        assert_eq!(res, p2);
    }

    #[test]
    fn commit() {
        let mut rng = StdRng::seed_from_u64(1);
        let secret = new_from(5, &mut rng);
        let commitment = secret
            .0
            .iter()
            .map(|coeff| {
                let mut p = G2::one();
                p.mul(coeff);
                p
            })
            .collect::<Vec<_>>();
        assert_eq!(Poly(commitment), Poly::commit(&secret));
    }

    #[test]
    fn commitment_is_homomorphic() {
        let mut rng = StdRng::seed_from_u64(2);
        let secret = new_from(3, &mut rng);
        let public = Public::commit(&secret);
        for index in 0..5 {
            let mut expected = G1::one();
            expected.mul(&secret.evaluate(index));
            assert_eq!(public.evaluate(index), expected);
        }
    }

    fn pow(base: Scalar, pow: usize) -> Scalar {
        let mut res = Scalar::one();
        for _ in 0..pow {
            res.mul(&base)
        }
        res
    }

    #[test]
    fn evaluate() {
        let mut rng = StdRng::seed_from_u64(3);
        for d in 0..10u32 {
            let poly = new_from(d, &mut rng);
            let idx = 7;
            let x = Scalar::from_index(idx);

            let mut sum = poly.0[0];
            for (i, coeff) in poly.0.iter().enumerate().skip(1) {
                let mut term = pow(x, i);
                term.mul(coeff);
                sum.add(&term);
            }
            assert_eq!(sum, poly.evaluate(idx), "degree={d}");
        }
    }

    #[test]
    fn addition() {
        let mut rng = StdRng::seed_from_u64(4);
        for (deg1, deg2) in [(0u32, 4u32), (4, 0), (3, 3), (2, 7)] {
            let p1 = new_from(deg1, &mut rng);
            let p2 = new_from(deg2, &mut rng);
            let mut res = p1.clone();
            res.add(&p2);
            assert_eq!(res.degree(), deg1.max(deg2));
            for i in 0..5 {
                let mut expected = p1.evaluate(i);
                expected.add(&p2.evaluate(i));
                assert_eq!(res.evaluate(i), expected);
            }
        }
    }

    #[test]
    fn codec() {
        let mut rng = StdRng::seed_from_u64(5);
        let public = Public::commit(&new_from(4, &mut rng));
        let encoded = public.encode();
        assert_eq!(encoded.len(), public.encode_size());
        let decoded = Public::decode_cfg(encoded.clone(), &RangeCfg::from(1..=5)).unwrap();
        assert_eq!(public, decoded);

        // Too many coefficients for the configured bound
        assert!(Public::decode_cfg(encoded, &RangeCfg::from(1..=4)).is_err());
    }

    #[test]
    fn empty_polynomial_rejected() {
        assert!(Poly::<G1>::from(Vec::new()).is_none());
        let empty: Vec<G1> = Vec::new();
        let encoded = empty.encode();
        assert!(Public::decode_cfg(encoded, &RangeCfg::from(0..=4)).is_err());
    }
}
