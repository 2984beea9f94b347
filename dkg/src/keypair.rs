//! Long-term validator keys.
//!
//! A validator's decryption key `dk` is a [Scalar] and its encryption key is
//! `ek = h^dk` in G2. Dealers encrypt shares to `ek` and only the holder of
//! `dk` can unblind them.

use crate::{
    primitives::group::{Element, Scalar, G2},
    Error,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Decode, Encode, Error as CodecError, FixedSize, Read, Write};
use commonware_utils::hex;
use rand::{rngs::OsRng, rngs::StdRng, SeedableRng};
use rand_core::CryptoRngCore;
use std::{
    cmp::Ordering,
    fmt::{Debug, Formatter},
};
use zeroize::Zeroize;

/// A validator's public encryption key (`h^dk`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(G2);

impl PublicKey {
    /// Returns the underlying group element.
    pub fn as_point(&self) -> &G2 {
        &self.0
    }

    /// Serializes the public key.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a public key, rejecting points outside G2 and the identity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &())?)
    }
}

impl From<G2> for PublicKey {
    fn from(point: G2) -> Self {
        Self(point)
    }
}

impl Ord for PublicKey {
    /// Orders keys by their canonical (compressed) encoding.
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode().cmp(&other.encode())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex(&self.encode()))
    }
}

impl Write for PublicKey {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for PublicKey {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self(G2::read_cfg(buf, &())?))
    }
}

impl FixedSize for PublicKey {
    const SIZE: usize = G2::SIZE;
}

/// A validator's long-term keypair.
///
/// The private scalar is never serialized and is zeroized on drop.
#[derive(Clone)]
pub struct Keypair {
    private: Scalar,
    public: PublicKey,
}

impl Keypair {
    /// Generates a keypair from operating system randomness.
    pub fn random() -> Self {
        Self::from_rng(&mut OsRng)
    }

    /// Generates a keypair from the provided RNG.
    pub fn from_rng<R: CryptoRngCore>(rng: &mut R) -> Self {
        let private = Scalar::rand_nonzero(rng);
        let mut public = G2::one();
        public.mul(&private);
        Self {
            private,
            public: PublicKey(public),
        }
    }

    /// Deterministically generates a keypair from a seed.
    ///
    /// This is intended for testing only.
    pub fn from_seed(seed: u64) -> Self {
        Self::from_rng(&mut StdRng::seed_from_u64(seed))
    }

    /// Returns the public encryption key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Unblinds an encrypted share `Y = ek^s` into `Z = h^s`.
    pub(crate) fn unblind(&self, encrypted: &G2) -> Result<PrivateKeyShare, Error> {
        let mut inverse = self
            .private
            .inverse()
            .ok_or(Error::InvalidParameters("zero private key"))?;
        let mut share = *encrypted;
        share.mul(&inverse);
        inverse.zeroize();
        Ok(PrivateKeyShare(share))
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl Debug for Keypair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A validator's share of the DKG private key, `Z_i = h^{f(x_i)}`.
///
/// Recovered from an [crate::AggregatedTranscript] with the validator's [Keypair].
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyShare(G2);

impl PrivateKeyShare {
    pub(crate) fn as_point(&self) -> &G2 {
        &self.0
    }
}

impl Drop for PrivateKeyShare {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Debug for PrivateKeyShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeyShare(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::group::{pairings_equal, G1};

    #[test]
    fn seeded_keys_are_deterministic() {
        assert_eq!(
            Keypair::from_seed(7).public_key(),
            Keypair::from_seed(7).public_key()
        );
        assert_ne!(
            Keypair::from_seed(7).public_key(),
            Keypair::from_seed(8).public_key()
        );
    }

    #[test]
    fn public_key_codec() {
        let public = Keypair::random().public_key();
        let bytes = public.to_bytes();
        assert_eq!(bytes.len(), PublicKey::SIZE);
        assert_eq!(PublicKey::from_bytes(&bytes).unwrap(), public);

        // Trailing data is rejected
        let mut extended = bytes.clone();
        extended.push(0);
        assert!(PublicKey::from_bytes(&extended).is_err());
        assert!(PublicKey::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn public_key_ordering_follows_bytes() {
        let mut keys = (0..8)
            .map(|i| Keypair::from_seed(i).public_key())
            .collect::<Vec<_>>();
        keys.sort();
        for pair in keys.windows(2) {
            assert!(pair[0].to_bytes() < pair[1].to_bytes());
        }
    }

    #[test]
    fn public_key_debug_is_hex() {
        let public = Keypair::from_seed(3).public_key();
        let expected = format!("PublicKey({})", hex(&public.to_bytes()));
        assert_eq!(format!("{public:?}"), expected);
    }

    #[test]
    fn unblind() {
        let mut rng = StdRng::seed_from_u64(0);
        let keypair = Keypair::from_rng(&mut rng);
        let secret = Scalar::rand(&mut rng);

        // Y = ek^s
        let mut encrypted = *keypair.public_key().as_point();
        encrypted.mul(&secret);

        // e(g, Z) == e(g^s, h)
        let share = keypair.unblind(&encrypted).unwrap();
        let mut commitment = G1::one();
        commitment.mul(&secret);
        assert!(pairings_equal(
            &G1::one(),
            share.as_point(),
            &commitment,
            &G2::one()
        ));
    }

    #[test]
    fn debug_hides_secrets() {
        let keypair = Keypair::from_seed(1);
        let debug = format!("{keypair:?}");
        assert!(debug.starts_with("Keypair { public: PublicKey("));
    }
}
