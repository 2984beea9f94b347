//! Publicly verifiable secret sharing.
//!
//! A dealer samples a secret polynomial `f` of degree `threshold - 1` and
//! publishes a [Transcript] containing:
//! * `commitment`: `g^{a_k}` for every coefficient `a_k` of `f` (G1),
//! * `sigma`: `h^{a_0}`, binding the dealer to the committed secret (G2),
//! * `shares`: `ek_i^{f(x_i)}` for every recipient `i` of the registry (G2).
//!
//! Anyone can check with pairings that the encrypted shares are consistent
//! with the commitment, without learning any share.

use crate::{
    keypair::PublicKey,
    primitives::{
        group::{pairings_equal, Element, G1, G2},
        poly::{self, Public},
    },
    Error, MAX_VALIDATORS,
};
use bytes::{Buf, BufMut};
use commonware_codec::{
    Decode, Encode, EncodeSize, Error as CodecError, FixedSize, RangeCfg, Read, ReadExt, Write,
};
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::Zeroize;

/// A share encrypted to the public key of its recipient (`ek^{f(x)}`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedShare {
    pub recipient: PublicKey,
    pub value: G2,
}

impl Write for EncryptedShare {
    fn write(&self, buf: &mut impl BufMut) {
        self.recipient.write(buf);
        self.value.write(buf);
    }
}

impl Read for EncryptedShare {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let recipient = PublicKey::read(buf)?;
        let value = G2::read(buf)?;
        Ok(Self { recipient, value })
    }
}

impl FixedSize for EncryptedShare {
    const SIZE: usize = PublicKey::SIZE + G2::SIZE;
}

/// One dealer's contribution to a key generation epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    tau: u64,
    dealer: u32,
    commitment: Public,
    sigma: G2,
    shares: Vec<EncryptedShare>,
}

impl Transcript {
    /// Deals a fresh secret of the given threshold to `recipients` (in share index order).
    pub fn deal<R: CryptoRngCore>(
        rng: &mut R,
        tau: u64,
        dealer: u32,
        threshold: u32,
        recipients: &[PublicKey],
    ) -> Result<Self, Error> {
        if threshold == 0 || threshold as usize > recipients.len() {
            return Err(Error::InvalidParameters("threshold out of range"));
        }
        if dealer as usize >= recipients.len() {
            return Err(Error::UnknownValidator);
        }

        // Sample the secret polynomial and commit to it
        let mut secret = poly::new_from(threshold - 1, rng);
        let commitment = Public::commit(&secret);
        let mut sigma = G2::one();
        sigma.mul(secret.constant());

        // Encrypt one share per recipient
        let shares = recipients
            .iter()
            .enumerate()
            .map(|(i, recipient)| {
                let mut share = secret.evaluate(i as u32);
                let mut value = *recipient.as_point();
                value.mul(&share);
                share.zeroize();
                EncryptedShare {
                    recipient: *recipient,
                    value,
                }
            })
            .collect();
        secret.zeroize();

        debug!(tau, dealer, threshold, recipients = recipients.len(), "dealt transcript");
        Ok(Self {
            tau,
            dealer,
            commitment,
            sigma,
            shares,
        })
    }

    /// Returns the epoch the transcript was dealt for.
    pub fn tau(&self) -> u64 {
        self.tau
    }

    /// Returns the share index of the dealer.
    pub fn dealer(&self) -> u32 {
        self.dealer
    }

    /// Returns the commitment to the dealer's polynomial.
    pub fn commitment(&self) -> &Public {
        &self.commitment
    }

    /// Returns `h^{a_0}`.
    pub fn sigma(&self) -> &G2 {
        &self.sigma
    }

    /// Returns the encrypted shares in share index order.
    pub fn shares(&self) -> &[EncryptedShare] {
        &self.shares
    }

    /// Returns the number of shares needed to recover the dealt secret.
    pub fn threshold(&self) -> u32 {
        self.commitment.required()
    }

    /// Verifies the transcript was dealt to `recipients` with the given threshold.
    ///
    /// Checks that:
    /// * `e(commitment_0, h) == e(g, sigma)`
    /// * `e(A_i, ek_i) == e(g, Y_i)` for every recipient, where `A_i` is the commitment evaluated at `x_i`
    pub fn verify(&self, recipients: &[PublicKey], threshold: u32) -> Result<(), Error> {
        if self.shares.len() != recipients.len()
            || self
                .shares
                .iter()
                .zip(recipients)
                .any(|(share, recipient)| share.recipient != *recipient)
        {
            return Err(Error::RegistryMismatch);
        }
        if self.dealer as usize >= recipients.len() {
            return Err(Error::UnknownValidator);
        }
        if self.commitment.required() != threshold {
            return Err(Error::VerificationFailed("unexpected threshold"));
        }
        self.verify_pairings()
    }

    /// Performs the pairing checks binding the commitment, sigma and shares together.
    pub(crate) fn verify_pairings(&self) -> Result<(), Error> {
        let g = G1::one();
        let h = G2::one();
        if !pairings_equal(self.commitment.constant(), &h, &g, &self.sigma) {
            return Err(Error::VerificationFailed("sigma"));
        }
        for (i, share) in self.shares.iter().enumerate() {
            let expected = self.commitment.evaluate(i as u32);
            if !pairings_equal(&expected, share.recipient.as_point(), &g, &share.value) {
                return Err(Error::VerificationFailed("share"));
            }
        }
        Ok(())
    }

    /// Serializes the transcript.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a transcript of at most [MAX_VALIDATORS] recipients.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &MAX_VALIDATORS)?)
    }
}

impl Write for Transcript {
    fn write(&self, buf: &mut impl BufMut) {
        self.tau.write(buf);
        self.dealer.write(buf);
        self.commitment.write(buf);
        self.sigma.write(buf);
        self.shares.write(buf);
    }
}

impl Read for Transcript {
    /// The maximum number of recipients.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max: &usize) -> Result<Self, CodecError> {
        let range = RangeCfg::from(1..=*max);
        let tau = u64::read(buf)?;
        let dealer = u32::read(buf)?;
        let commitment = Public::read_cfg(buf, &range)?;
        let sigma = G2::read(buf)?;
        let shares = Vec::<EncryptedShare>::read_cfg(buf, &(range, ()))?;
        if dealer as usize >= shares.len() {
            return Err(CodecError::Invalid("Transcript", "dealer out of range"));
        }
        if commitment.required() as usize > shares.len() {
            return Err(CodecError::Invalid("Transcript", "threshold exceeds recipients"));
        }
        Ok(Self {
            tau,
            dealer,
            commitment,
            sigma,
            shares,
        })
    }
}

impl EncodeSize for Transcript {
    fn encode_size(&self) -> usize {
        u64::SIZE
            + u32::SIZE
            + self.commitment.encode_size()
            + G2::SIZE
            + self.shares.encode_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;
    use commonware_macros::test_traced;
    use rand::{rngs::StdRng, SeedableRng};

    fn recipients(n: u64) -> Vec<PublicKey> {
        let mut keys = (0..n)
            .map(|i| Keypair::from_seed(i).public_key())
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    #[test_traced]
    fn deal_and_verify() {
        let mut rng = StdRng::seed_from_u64(0);
        let recipients = recipients(5);
        let transcript = Transcript::deal(&mut rng, 1, 2, 3, &recipients).unwrap();
        assert_eq!(transcript.threshold(), 3);
        assert_eq!(transcript.shares().len(), 5);
        transcript.verify(&recipients, 3).unwrap();
    }

    #[test]
    fn wrong_threshold() {
        let mut rng = StdRng::seed_from_u64(1);
        let recipients = recipients(4);
        let transcript = Transcript::deal(&mut rng, 1, 0, 2, &recipients).unwrap();
        assert!(matches!(
            transcript.verify(&recipients, 3),
            Err(Error::VerificationFailed(_))
        ));
    }

    #[test]
    fn wrong_recipients() {
        let mut rng = StdRng::seed_from_u64(2);
        let recipients = recipients(4);
        let transcript = Transcript::deal(&mut rng, 1, 0, 2, &recipients).unwrap();
        let mut others = recipients.clone();
        others.swap(0, 1);
        assert!(matches!(
            transcript.verify(&others, 2),
            Err(Error::RegistryMismatch)
        ));
        assert!(matches!(
            transcript.verify(&recipients[..3], 2),
            Err(Error::RegistryMismatch)
        ));
    }

    #[test]
    fn tampered_share() {
        let mut rng = StdRng::seed_from_u64(3);
        let recipients = recipients(4);
        let mut transcript = Transcript::deal(&mut rng, 1, 0, 2, &recipients).unwrap();
        transcript.shares[2].value.add(&G2::one());
        assert!(matches!(
            transcript.verify(&recipients, 2),
            Err(Error::VerificationFailed("share"))
        ));
    }

    #[test]
    fn tampered_sigma() {
        let mut rng = StdRng::seed_from_u64(4);
        let recipients = recipients(4);
        let mut transcript = Transcript::deal(&mut rng, 1, 0, 2, &recipients).unwrap();
        transcript.sigma.add(&G2::one());
        assert!(matches!(
            transcript.verify(&recipients, 2),
            Err(Error::VerificationFailed("sigma"))
        ));
    }

    #[test]
    fn invalid_deal_parameters() {
        let mut rng = StdRng::seed_from_u64(5);
        let recipients = recipients(3);
        assert!(Transcript::deal(&mut rng, 1, 0, 0, &recipients).is_err());
        assert!(Transcript::deal(&mut rng, 1, 0, 4, &recipients).is_err());
        assert!(matches!(
            Transcript::deal(&mut rng, 1, 3, 2, &recipients),
            Err(Error::UnknownValidator)
        ));
    }

    #[test]
    fn codec() {
        let mut rng = StdRng::seed_from_u64(6);
        let recipients = recipients(4);
        let transcript = Transcript::deal(&mut rng, 9, 1, 3, &recipients).unwrap();
        let bytes = transcript.to_bytes();
        assert_eq!(bytes.len(), transcript.encode_size());
        assert_eq!(Transcript::from_bytes(&bytes).unwrap(), transcript);

        // Bounded by the number of recipients
        assert!(Transcript::decode_cfg(&bytes[..], &3).is_err());
        assert!(Transcript::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
