//! Decryption shares and their combination into a [SharedSecret].
//!
//! A validator holding `Z_i = h^{f(x_i)}` decrypts a ciphertext with
//! commitment `U = g^r` by publishing a pairing of the two. Combining a quorum
//! of shares recovers `e(U, h^{f(0)}) = e(pk^r, h)`, the secret the encryptor
//! derived its symmetric key from.

use crate::{
    primitives::{group::GT, lagrange},
    Error,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Decode, Encode, Error as CodecError, FixedSize, Read, ReadExt, Write};
use std::collections::BTreeSet;
use tracing::debug;

/// A partial decryption `e(U, Z_i)` to be combined with Lagrange interpolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecryptionShareSimple {
    index: u32,
    share: GT,
}

/// A partial decryption `e(λ_i·U, Z_i)` that already includes its Lagrange coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecryptionSharePrecomputed {
    index: u32,
    share: GT,
}

/// The capability shared by both variants of decryption shares.
pub trait Combinable: Sized {
    /// Returns the share index of the validator that created the share.
    fn index(&self) -> u32;

    /// Returns the partial decryption.
    fn share(&self) -> &GT;

    /// Combines shares of this variant into the shared secret.
    fn combine(shares: &[Self]) -> Result<SharedSecret, Error>;
}

/// Rejects empty sets of shares and shares with repeated indices.
fn distinct_indices<S: Combinable>(shares: &[S]) -> Result<Vec<u32>, Error> {
    if shares.is_empty() {
        return Err(Error::InsufficientShares);
    }
    let mut seen = BTreeSet::new();
    for share in shares {
        if !seen.insert(share.index()) {
            return Err(Error::DuplicateShare(share.index()));
        }
    }
    Ok(shares.iter().map(Combinable::index).collect())
}

macro_rules! impl_share {
    ($name:ident) => {
        impl $name {
            pub(crate) fn new(index: u32, share: GT) -> Self {
                Self { index, share }
            }

            /// Serializes the share.
            pub fn to_bytes(&self) -> Vec<u8> {
                self.encode().to_vec()
            }

            /// Deserializes a share.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
                Ok(Self::decode_cfg(bytes, &())?)
            }
        }

        impl Write for $name {
            fn write(&self, buf: &mut impl BufMut) {
                self.index.write(buf);
                self.share.write(buf);
            }
        }

        impl Read for $name {
            type Cfg = ();

            fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
                let index = u32::read(buf)?;
                let share = GT::read(buf)?;
                Ok(Self { index, share })
            }
        }

        impl FixedSize for $name {
            const SIZE: usize = u32::SIZE + GT::SIZE;
        }
    };
}

impl_share!(DecryptionShareSimple);
impl_share!(DecryptionSharePrecomputed);

impl Combinable for DecryptionShareSimple {
    fn index(&self) -> u32 {
        self.index
    }

    fn share(&self) -> &GT {
        &self.share
    }

    fn combine(shares: &[Self]) -> Result<SharedSecret, Error> {
        combine_decryption_shares_simple(shares)
    }
}

impl Combinable for DecryptionSharePrecomputed {
    fn index(&self) -> u32 {
        self.index
    }

    fn share(&self) -> &GT {
        &self.share
    }

    fn combine(shares: &[Self]) -> Result<SharedSecret, Error> {
        combine_decryption_shares_precomputed(shares)
    }
}

/// Combines simple shares by interpolating `Π share_i^{λ_i}` over the indices supplied.
///
/// Any `security_threshold` shares recover the secret. With fewer, an
/// unrelated value is returned and decryption fails authentication.
pub fn combine_decryption_shares_simple(
    shares: &[DecryptionShareSimple],
) -> Result<SharedSecret, Error> {
    let indices = distinct_indices(shares)?;
    let coefficients = lagrange::coefficients(&indices)?;
    let mut secret = GT::one();
    for share in shares {
        let coefficient = coefficients
            .get(&share.index)
            .ok_or(Error::InsufficientShares)?;
        secret.mul(&share.share().pow(coefficient));
    }
    debug!(shares = shares.len(), "combined simple decryption shares");
    Ok(SharedSecret(secret))
}

/// Combines precomputed shares by multiplying them together.
pub fn combine_decryption_shares_precomputed(
    shares: &[DecryptionSharePrecomputed],
) -> Result<SharedSecret, Error> {
    distinct_indices(shares)?;
    let secret = shares.iter().fold(GT::one(), |mut acc, share| {
        acc.mul(share.share());
        acc
    });
    debug!(shares = shares.len(), "combined precomputed decryption shares");
    Ok(SharedSecret(secret))
}

/// A decryption share of either variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptionShare {
    Simple(DecryptionShareSimple),
    Precomputed(DecryptionSharePrecomputed),
}

impl DecryptionShare {
    /// Returns the share index of the validator that created the share.
    pub fn index(&self) -> u32 {
        match self {
            Self::Simple(share) => share.index(),
            Self::Precomputed(share) => share.index(),
        }
    }
}

impl From<DecryptionShareSimple> for DecryptionShare {
    fn from(share: DecryptionShareSimple) -> Self {
        Self::Simple(share)
    }
}

impl From<DecryptionSharePrecomputed> for DecryptionShare {
    fn from(share: DecryptionSharePrecomputed) -> Self {
        Self::Precomputed(share)
    }
}

/// Combines decryption shares, dispatching on their variant.
///
/// All shares must be of the same variant.
pub fn combine_decryption_shares(shares: &[DecryptionShare]) -> Result<SharedSecret, Error> {
    match shares.first() {
        None => Err(Error::InsufficientShares),
        Some(DecryptionShare::Simple(_)) => {
            let shares = shares
                .iter()
                .map(|share| match share {
                    DecryptionShare::Simple(share) => Ok(*share),
                    DecryptionShare::Precomputed(_) => Err(Error::MixedShareVariants),
                })
                .collect::<Result<Vec<_>, _>>()?;
            DecryptionShareSimple::combine(&shares)
        }
        Some(DecryptionShare::Precomputed(_)) => {
            let shares = shares
                .iter()
                .map(|share| match share {
                    DecryptionShare::Precomputed(share) => Ok(*share),
                    DecryptionShare::Simple(_) => Err(Error::MixedShareVariants),
                })
                .collect::<Result<Vec<_>, _>>()?;
            DecryptionSharePrecomputed::combine(&shares)
        }
    }
}

const SIMPLE: u8 = 0;
const PRECOMPUTED: u8 = 1;

impl Write for DecryptionShare {
    fn write(&self, buf: &mut impl BufMut) {
        match self {
            Self::Simple(share) => {
                SIMPLE.write(buf);
                share.write(buf);
            }
            Self::Precomputed(share) => {
                PRECOMPUTED.write(buf);
                share.write(buf);
            }
        }
    }
}

impl Read for DecryptionShare {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        match u8::read(buf)? {
            SIMPLE => Ok(Self::Simple(DecryptionShareSimple::read(buf)?)),
            PRECOMPUTED => Ok(Self::Precomputed(DecryptionSharePrecomputed::read(buf)?)),
            tag => Err(CodecError::InvalidEnum(tag)),
        }
    }
}

impl FixedSize for DecryptionShare {
    const SIZE: usize = u8::SIZE + DecryptionShareSimple::SIZE;
}

/// The combined decryption secret, `e(U, h^{f(0)})`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedSecret(GT);

impl SharedSecret {
    /// Serializes the secret.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a secret.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &())?)
    }
}

impl From<GT> for SharedSecret {
    fn from(secret: GT) -> Self {
        Self(secret)
    }
}

impl Write for SharedSecret {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for SharedSecret {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self(GT::read(buf)?))
    }
}

impl FixedSize for SharedSecret {
    const SIZE: usize = GT::SIZE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        group::{pairing, Element, Scalar, G1, G2},
        poly,
    };
    use rand::{rngs::StdRng, SeedableRng};
    use test_case::test_case;

    /// Returns `(secret, shares)` where each share is `e(U, h^{f(x_i)})`.
    fn shares(seed: u64, threshold: u32, n: u32) -> (GT, Vec<DecryptionShareSimple>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let polynomial = poly::new_from(threshold - 1, &mut rng);
        let mut u = G1::one();
        u.mul(&Scalar::rand(&mut rng));
        let mut h = G2::one();
        h.mul(polynomial.constant());
        let secret = pairing(&u, &h);
        let shares = (0..n)
            .map(|i| {
                let mut z = G2::one();
                z.mul(&polynomial.evaluate(i));
                DecryptionShareSimple::new(i, pairing(&u, &z))
            })
            .collect();
        (secret, shares)
    }

    #[test_case(&[0, 1, 2]; "prefix")]
    #[test_case(&[3, 1, 5]; "sparse unordered")]
    #[test_case(&[5, 4, 3, 2, 1, 0]; "all")]
    fn simple_recovers_secret(selected: &[usize]) {
        let (secret, shares) = shares(0, 3, 6);
        let subset = selected.iter().map(|&i| shares[i]).collect::<Vec<_>>();
        let combined = combine_decryption_shares_simple(&subset).unwrap();
        assert_eq!(combined, SharedSecret(secret));
    }

    #[test]
    fn simple_below_threshold() {
        let (secret, shares) = shares(1, 3, 6);
        let combined = combine_decryption_shares_simple(&shares[..2]).unwrap();
        assert_ne!(combined, SharedSecret(secret));
    }

    #[test]
    fn simple_rejects_duplicates() {
        let (_, shares) = shares(2, 2, 3);
        let duplicated = vec![shares[0], shares[1], shares[0]];
        assert!(matches!(
            combine_decryption_shares_simple(&duplicated),
            Err(Error::DuplicateShare(0))
        ));
        assert!(matches!(
            combine_decryption_shares_simple(&[]),
            Err(Error::InsufficientShares)
        ));
    }

    #[test]
    fn precomputed_is_product() {
        let (secret, shares) = shares(3, 4, 4);
        let indices = shares.iter().map(|s| s.index).collect::<Vec<_>>();
        let precomputed = shares
            .iter()
            .map(|s| {
                let coefficient = lagrange::coefficient(s.index, &indices).unwrap();
                DecryptionSharePrecomputed::new(s.index, s.share.pow(&coefficient))
            })
            .collect::<Vec<_>>();
        let combined = combine_decryption_shares_precomputed(&precomputed).unwrap();
        assert_eq!(combined, SharedSecret(secret));

        // Dispatch through the tagged union
        let tagged = precomputed
            .iter()
            .copied()
            .map(DecryptionShare::from)
            .collect::<Vec<_>>();
        assert_eq!(combine_decryption_shares(&tagged).unwrap(), combined);
    }

    #[test]
    fn rejects_mixed_variants() {
        let (_, shares) = shares(4, 2, 2);
        let mixed = vec![
            DecryptionShare::from(shares[0]),
            DecryptionShare::from(DecryptionSharePrecomputed::new(1, shares[1].share)),
        ];
        assert!(matches!(
            combine_decryption_shares(&mixed),
            Err(Error::MixedShareVariants)
        ));
        assert!(matches!(
            combine_decryption_shares(&[]),
            Err(Error::InsufficientShares)
        ));
    }

    #[test]
    fn codec() {
        let (secret, shares) = shares(5, 2, 2);
        let bytes = shares[1].to_bytes();
        assert_eq!(DecryptionShareSimple::from_bytes(&bytes).unwrap(), shares[1]);

        let tagged = DecryptionShare::from(shares[0]);
        let decoded = DecryptionShare::decode_cfg(tagged.encode(), &()).unwrap();
        assert_eq!(decoded, tagged);

        let secret = SharedSecret(secret);
        assert_eq!(SharedSecret::from_bytes(&secret.to_bytes()).unwrap(), secret);

        let mut invalid = tagged.encode().to_vec();
        invalid[0] = 7;
        assert!(DecryptionShare::decode_cfg(&invalid[..], &()).is_err());
    }
}
