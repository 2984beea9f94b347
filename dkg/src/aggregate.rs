//! Combination of transcripts into the public output of a key generation epoch.
//!
//! Summing `security_threshold` (or more) transcripts from distinct dealers
//! yields a sharing of the sum of their secrets. Nobody knows this sum, but
//! its commitment (the constant term) is the [DkgPublicKey] and every
//! recipient can unblind its aggregated share to participate in decryption.

use crate::{
    ciphertext::{Ciphertext, CiphertextHeader, DkgPublicKey, DkgPublicParameters},
    decryption::{DecryptionSharePrecomputed, DecryptionShareSimple},
    dkg::Dkg,
    keypair::{Keypair, PrivateKeyShare, PublicKey},
    primitives::{
        group::{pairing, pairings_equal, Element, G1, G2},
        poly::Public,
    },
    pvss::{EncryptedShare, Transcript},
    Error, MAX_VALIDATORS,
};
use bytes::{Buf, BufMut};
use commonware_codec::{
    Decode, Encode, EncodeSize, Error as CodecError, FixedSize, RangeCfg, Read, ReadExt, Write,
};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// The sum of a quorum of [Transcript]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedTranscript {
    tau: u64,
    dealers: Vec<u32>,
    commitment: Public,
    sigma: G2,
    shares: Vec<EncryptedShare>,
}

impl AggregatedTranscript {
    /// Aggregates transcripts without a session.
    ///
    /// Only structural consistency is checked here (matching epoch, threshold
    /// and recipients, distinct dealers, enough transcripts). Use [Self::verify]
    /// to check the transcripts cryptographically.
    pub fn from_transcripts(transcripts: &[Transcript]) -> Result<Self, Error> {
        let first = transcripts
            .first()
            .ok_or(Error::InsufficientTranscripts(0, 1))?;
        let tau = first.tau();
        let threshold = first.threshold();
        if transcripts.len() < threshold as usize {
            return Err(Error::InsufficientTranscripts(transcripts.len(), threshold));
        }

        // Sum in dealer order
        let mut ordered = transcripts.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|t| t.dealer());

        let mut dealers = BTreeSet::new();
        let mut commitment = Public::zero();
        let mut sigma = G2::zero();
        let mut shares = first
            .shares()
            .iter()
            .map(|share| EncryptedShare {
                recipient: share.recipient,
                value: G2::zero(),
            })
            .collect::<Vec<_>>();
        for transcript in ordered {
            if transcript.tau() != tau {
                return Err(Error::TauMismatch(tau, transcript.tau()));
            }
            if transcript.threshold() != threshold {
                return Err(Error::VerificationFailed("threshold mismatch"));
            }
            if transcript.shares().len() != shares.len()
                || transcript
                    .shares()
                    .iter()
                    .zip(&shares)
                    .any(|(a, b)| a.recipient != b.recipient)
            {
                return Err(Error::RegistryMismatch);
            }
            if !dealers.insert(transcript.dealer()) {
                return Err(Error::DuplicateValidator(format!(
                    "dealer {}",
                    transcript.dealer()
                )));
            }
            commitment.add(transcript.commitment());
            sigma.add(transcript.sigma());
            for (aggregate, share) in shares.iter_mut().zip(transcript.shares()) {
                aggregate.value.add(&share.value);
            }
        }

        debug!(tau, dealers = dealers.len(), threshold, "aggregated transcripts");
        Ok(Self {
            tau,
            dealers: dealers.into_iter().collect(),
            commitment,
            sigma,
            shares,
        })
    }

    /// Verifies that `self` is the aggregate of `transcripts` and that every
    /// transcript is valid.
    ///
    /// `expected_shares_num` is the number of recipients shares must have been
    /// dealt to (the size of the validator registry). The result depends only on
    /// the inputs, so independent parties verifying the same transcripts reach
    /// the same verdict.
    pub fn verify(&self, expected_shares_num: u32, transcripts: &[Transcript]) -> bool {
        if self.shares.len() != expected_shares_num as usize {
            warn!(
                expected = expected_shares_num,
                actual = self.shares.len(),
                "unexpected number of recipients"
            );
            return false;
        }
        let recomputed = match Self::from_transcripts(transcripts) {
            Ok(recomputed) => recomputed,
            Err(err) => {
                warn!(?err, "failed to aggregate transcripts");
                return false;
            }
        };
        if recomputed != *self {
            warn!(tau = self.tau, "aggregate does not match transcripts");
            return false;
        }

        // Check every transcript independently
        let recipients = self.recipients();
        let threshold = self.threshold();
        transcripts.par_iter().all(|transcript| {
            match transcript.verify(&recipients, threshold) {
                Ok(()) => true,
                Err(err) => {
                    warn!(dealer = transcript.dealer(), ?err, "invalid transcript");
                    false
                }
            }
        })
    }

    /// Verifies the aggregate on its own, without the transcripts it was built from.
    ///
    /// Sound for the aggregated key material, but cannot attribute a failure
    /// to a dealer.
    pub fn verify_optimistic(&self) -> bool {
        let g = G1::one();
        let h = G2::one();
        if !pairings_equal(self.commitment.constant(), &h, &g, &self.sigma) {
            return false;
        }
        self.shares.par_iter().enumerate().all(|(i, share)| {
            let expected = self.commitment.evaluate(i as u32);
            pairings_equal(&expected, share.recipient.as_point(), &g, &share.value)
        })
    }

    /// Returns the epoch of the aggregated transcripts.
    pub fn tau(&self) -> u64 {
        self.tau
    }

    /// Returns the (sorted) share indices of the dealers included in the aggregate.
    pub fn dealers(&self) -> &[u32] {
        &self.dealers
    }

    /// Returns the aggregated commitment.
    pub fn commitment(&self) -> &Public {
        &self.commitment
    }

    /// Returns the number of decryption shares required to decrypt.
    pub fn threshold(&self) -> u32 {
        self.commitment.required()
    }

    /// Returns the number of recipients shares were dealt to.
    pub fn shares_num(&self) -> u32 {
        self.shares.len() as u32
    }

    /// Returns the key ciphertexts should be encrypted to.
    pub fn public_key(&self) -> DkgPublicKey {
        DkgPublicKey::from(*self.commitment.constant())
    }

    /// Returns the parameters required to decrypt ciphertexts.
    pub fn public_params(&self) -> DkgPublicParameters {
        DkgPublicParameters::new(self.tau, self.shares_num(), self.threshold())
    }

    pub(crate) fn recipients(&self) -> Vec<PublicKey> {
        self.shares.iter().map(|share| share.recipient).collect()
    }

    /// Recovers the private key share of the recipient at `index`.
    ///
    /// The recovered share is checked against the aggregated commitment.
    pub fn private_key_share(
        &self,
        index: u32,
        keypair: &Keypair,
    ) -> Result<PrivateKeyShare, Error> {
        let share = self
            .shares
            .get(index as usize)
            .ok_or(Error::UnknownValidator)?;
        if share.recipient != keypair.public_key() {
            return Err(Error::UnknownValidator);
        }
        let private = keypair.unblind(&share.value)?;

        // e(g, Z_i) == e(A_i, h)
        let expected = self.commitment.evaluate(index);
        if !pairings_equal(&G1::one(), private.as_point(), &expected, &G2::one()) {
            return Err(Error::VerificationFailed("private key share"));
        }
        Ok(private)
    }

    /// Checks that the aggregate belongs to the session and returns the share index of `keypair`.
    fn member_index(&self, dkg: &Dkg, keypair: &Keypair) -> Result<u32, Error> {
        if self.tau != dkg.tau() {
            return Err(Error::TauMismatch(dkg.tau(), self.tau));
        }
        if self.threshold() != dkg.params().security_threshold() {
            return Err(Error::VerificationFailed("threshold mismatch"));
        }
        if self.recipients() != dkg.registry().public_keys() {
            return Err(Error::RegistryMismatch);
        }
        let me = dkg.me();
        if me.public_key != keypair.public_key() {
            return Err(Error::UnknownValidator);
        }
        Ok(me.index)
    }

    /// Creates a decryption share to be combined with [crate::combine_decryption_shares_simple].
    pub fn create_decryption_share_simple(
        &self,
        dkg: &Dkg,
        header: &CiphertextHeader,
        aad: &[u8],
        keypair: &Keypair,
    ) -> Result<DecryptionShareSimple, Error> {
        let index = self.member_index(dkg, keypair)?;
        let params = self.public_params();
        if !header.check(aad, params.g1_inv()) {
            warn!(index, "ciphertext header does not match aad");
            return Err(Error::AadMismatch);
        }
        let private = self.private_key_share(index, keypair)?;
        let share = pairing(header.commitment(), private.as_point());
        Ok(DecryptionShareSimple::new(index, share))
    }

    /// Creates a decryption share to be combined with [crate::combine_decryption_shares_precomputed].
    ///
    /// Only available when `security_threshold == shares_num`, in which case
    /// the validators `0..shares_num` must all participate.
    pub fn create_decryption_share_precomputed(
        &self,
        dkg: &Dkg,
        ciphertext: &Ciphertext,
        aad: &[u8],
        keypair: &Keypair,
    ) -> Result<DecryptionSharePrecomputed, Error> {
        let params = dkg.params();
        if params.security_threshold() != params.shares_num() {
            return Err(Error::PrecomputedVariantRequiresFullThreshold(
                params.security_threshold(),
                params.shares_num(),
            ));
        }
        let index = self.member_index(dkg, keypair)?;
        let coefficient = dkg
            .precomputed_coefficient()
            .ok_or(Error::OutsidePrecomputedQuorum(index, params.shares_num()))?;
        ciphertext
            .check(aad, self.public_params().g1_inv())
            .inspect_err(|_| warn!(index, "ciphertext does not match aad"))?;
        let private = self.private_key_share(index, keypair)?;

        // e(λ_i·U, Z_i)
        let mut commitment = *ciphertext.header().commitment();
        commitment.mul(coefficient);
        let share = pairing(&commitment, private.as_point());
        Ok(DecryptionSharePrecomputed::new(index, share))
    }

    /// Serializes the aggregate.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes an aggregate of at most [MAX_VALIDATORS] recipients.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &MAX_VALIDATORS)?)
    }
}

impl Write for AggregatedTranscript {
    fn write(&self, buf: &mut impl BufMut) {
        self.tau.write(buf);
        self.dealers.write(buf);
        self.commitment.write(buf);
        self.sigma.write(buf);
        self.shares.write(buf);
    }
}

impl Read for AggregatedTranscript {
    /// The maximum number of recipients.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max: &usize) -> Result<Self, CodecError> {
        let range = RangeCfg::from(1..=*max);
        let tau = u64::read(buf)?;
        let dealers = Vec::<u32>::read_cfg(buf, &(range.clone(), ()))?;
        let commitment = Public::read_cfg(buf, &range)?;
        let sigma = G2::read(buf)?;
        let shares = Vec::<EncryptedShare>::read_cfg(buf, &(range, ()))?;
        if dealers.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CodecError::Invalid("AggregatedTranscript", "dealers not sorted"));
        }
        if dealers.iter().any(|&dealer| dealer as usize >= shares.len()) {
            return Err(CodecError::Invalid("AggregatedTranscript", "dealer out of range"));
        }
        if dealers.len() < commitment.required() as usize
            || commitment.required() as usize > shares.len()
        {
            return Err(CodecError::Invalid("AggregatedTranscript", "invalid threshold"));
        }
        Ok(Self {
            tau,
            dealers,
            commitment,
            sigma,
            shares,
        })
    }
}

impl EncodeSize for AggregatedTranscript {
    fn encode_size(&self) -> usize {
        u64::SIZE
            + self.dealers.encode_size()
            + self.commitment.encode_size()
            + G2::SIZE
            + self.shares.encode_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_macros::test_traced;
    use rand::{rngs::StdRng, SeedableRng};
    use test_case::test_case;

    fn deal(seed: u64, n: u32, t: u32, dealers: &[u32]) -> Vec<Transcript> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut recipients = (0..n as u64)
            .map(|i| Keypair::from_seed(i).public_key())
            .collect::<Vec<_>>();
        recipients.sort();
        dealers
            .iter()
            .map(|&dealer| Transcript::deal(&mut rng, 1, dealer, t, &recipients).unwrap())
            .collect()
    }

    #[test_traced]
    fn aggregate_and_verify() {
        let transcripts = deal(0, 5, 3, &[0, 2, 4]);
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        assert_eq!(aggregate.dealers(), &[0, 2, 4]);
        assert_eq!(aggregate.threshold(), 3);
        assert_eq!(aggregate.shares_num(), 5);
        assert!(aggregate.verify(5, &transcripts));
        assert!(aggregate.verify_optimistic());
    }

    #[test_case(0; "none")]
    #[test_case(1; "one")]
    #[test_case(3; "threshold")]
    #[test_case(4; "one short")]
    #[test_case(6; "one extra")]
    fn verify_rejects_unexpected_recipients(expected: u32) {
        let transcripts = deal(0, 5, 3, &[0, 2, 4]);
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        assert!(!aggregate.verify(expected, &transcripts));
    }

    #[test]
    fn public_key_is_sum_of_secrets() {
        let transcripts = deal(1, 4, 2, &[1, 3]);
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        let mut expected = *transcripts[0].commitment().constant();
        expected.add(transcripts[1].commitment().constant());
        assert_eq!(aggregate.public_key(), DkgPublicKey::from(expected));
    }

    #[test]
    fn order_independent() {
        let mut transcripts = deal(2, 4, 3, &[0, 1, 3]);
        let forward = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        transcripts.reverse();
        let reversed = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward.to_bytes(), reversed.to_bytes());
    }

    #[test]
    fn insufficient_transcripts() {
        let transcripts = deal(3, 4, 3, &[0, 1]);
        assert!(matches!(
            AggregatedTranscript::from_transcripts(&transcripts),
            Err(Error::InsufficientTranscripts(2, 3))
        ));
        assert!(matches!(
            AggregatedTranscript::from_transcripts(&[]),
            Err(Error::InsufficientTranscripts(0, _))
        ));
    }

    #[test]
    fn duplicate_dealer() {
        let transcripts = deal(4, 4, 2, &[1, 1]);
        assert!(matches!(
            AggregatedTranscript::from_transcripts(&transcripts),
            Err(Error::DuplicateValidator(_))
        ));
    }

    #[test]
    fn tau_mismatch() {
        let mut transcripts = deal(5, 4, 2, &[0]);
        let mut rng = StdRng::seed_from_u64(5);
        let recipients = transcripts[0]
            .shares()
            .iter()
            .map(|share| share.recipient)
            .collect::<Vec<_>>();
        transcripts.push(Transcript::deal(&mut rng, 2, 1, 2, &recipients).unwrap());
        assert!(matches!(
            AggregatedTranscript::from_transcripts(&transcripts),
            Err(Error::TauMismatch(1, 2))
        ));
    }

    #[test]
    fn verify_rejects_other_transcripts() {
        let transcripts = deal(6, 4, 2, &[0, 1, 2]);
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts[..2]).unwrap();
        assert!(aggregate.verify(4, &transcripts[..2]));
        assert!(!aggregate.verify(4, &transcripts[1..]));
        assert!(!aggregate.verify(4, &transcripts));
    }

    #[test_traced]
    fn verify_rejects_invalid_share() {
        let mut transcripts = deal(8, 4, 2, &[0, 1]);

        // Replace the last encrypted share of the first dealer with the generator
        let mut bytes = transcripts[0].to_bytes();
        let offset = bytes.len() - G2::SIZE;
        bytes[offset..].copy_from_slice(&G2::one().encode());
        transcripts[0] = Transcript::from_bytes(&bytes).unwrap();

        // The aggregate matches the transcripts but the pairing check fails
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        assert_eq!(
            AggregatedTranscript::from_transcripts(&transcripts).unwrap(),
            aggregate
        );
        assert!(!aggregate.verify(4, &transcripts));
        assert!(!aggregate.verify_optimistic());
    }

    #[test]
    fn codec() {
        let transcripts = deal(7, 4, 3, &[3, 0, 2]);
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts).unwrap();
        let bytes = aggregate.to_bytes();
        assert_eq!(bytes.len(), aggregate.encode_size());
        let decoded = AggregatedTranscript::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, aggregate);
        assert!(decoded.verify(4, &transcripts));
    }
}
