//! A validator's view of a key generation epoch.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> TranscriptGenerated -> AggregationReady -> Finalized
//! ```
//!
//! A session is created with immutable parameters. The validator deals its own
//! [Transcript] with [Dkg::generate_transcript] and collects transcripts from
//! others with [Dkg::deal]. Once `security_threshold` transcripts from distinct
//! dealers are held the session can [Dkg::aggregate] them. Alternatively, a
//! set of transcripts received out of band can be aggregated directly with
//! [Dkg::aggregate_transcripts] or an aggregate computed elsewhere can be
//! adopted with [Dkg::observe]. The derived key and parameters are only
//! available once the session is finalized.

use crate::{
    aggregate::AggregatedTranscript,
    ciphertext::{DkgPublicKey, DkgPublicParameters},
    primitives::{group::Scalar, lagrange},
    pvss::Transcript,
    validator::{Validator, ValidatorRegistry},
    Error,
};
use rand_core::CryptoRngCore;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Parameters of a key generation epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DkgParams {
    tau: u64,
    shares_num: u32,
    security_threshold: u32,
}

impl DkgParams {
    /// Creates new parameters, requiring `1 <= security_threshold <= shares_num`.
    pub fn new(tau: u64, shares_num: u32, security_threshold: u32) -> Result<Self, Error> {
        if security_threshold == 0 {
            return Err(Error::InvalidParameters("security_threshold must be positive"));
        }
        if security_threshold > shares_num {
            return Err(Error::InvalidParameters(
                "security_threshold exceeds shares_num",
            ));
        }
        Ok(Self {
            tau,
            shares_num,
            security_threshold,
        })
    }

    /// Returns the epoch identifier.
    pub fn tau(&self) -> u64 {
        self.tau
    }

    /// Returns the minimum number of validators (and the size of the precomputed quorum).
    pub fn shares_num(&self) -> u32 {
        self.shares_num
    }

    /// Returns the number of transcripts (and decryption shares) required.
    pub fn security_threshold(&self) -> u32 {
        self.security_threshold
    }
}

/// Progress of a [Dkg] session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No transcript has been generated or received.
    Created,
    /// This validator dealt its transcript.
    TranscriptGenerated,
    /// Enough transcripts have been dealt to aggregate.
    AggregationReady,
    /// An aggregate has been computed or observed.
    Finalized {
        public_key: DkgPublicKey,
        public_params: DkgPublicParameters,
    },
}

/// A validator's session of a key generation epoch.
#[derive(Clone, Debug)]
pub struct Dkg {
    params: DkgParams,
    registry: ValidatorRegistry,
    me: Validator,
    precomputed: Option<Scalar>,
    dealt: BTreeMap<u32, Transcript>,
    state: State,
}

impl Dkg {
    /// Creates a session for `me` over `validators`.
    ///
    /// `validators` may be supplied in any order: they are sorted into a
    /// [ValidatorRegistry] (and `me`'s index is taken from it).
    pub fn new(
        tau: u64,
        shares_num: u32,
        security_threshold: u32,
        validators: &[Validator],
        me: &Validator,
    ) -> Result<Self, Error> {
        let params = DkgParams::new(tau, shares_num, security_threshold)?;
        let registry = ValidatorRegistry::new(validators.to_vec())?;
        if registry.len() < shares_num as usize {
            return Err(Error::InvalidParameters("fewer validators than shares_num"));
        }
        let me = registry.find(me).cloned().ok_or(Error::UnknownValidator)?;

        // Full quorums always consist of the same validators, so their Lagrange
        // coefficients are fixed
        let precomputed = if security_threshold == shares_num && me.index < shares_num {
            let quorum = (0..shares_num).collect::<Vec<_>>();
            Some(lagrange::coefficient(me.index, &quorum)?)
        } else {
            None
        };

        debug!(tau, shares_num, security_threshold, index = me.index, "created session");
        Ok(Self {
            params,
            registry,
            me,
            precomputed,
            dealt: BTreeMap::new(),
            state: State::Created,
        })
    }

    /// Returns the parameters of the session.
    pub fn params(&self) -> &DkgParams {
        &self.params
    }

    /// Returns the epoch identifier.
    pub fn tau(&self) -> u64 {
        self.params.tau
    }

    /// Returns the registry of the session.
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Returns the validator running the session (with its share index).
    pub fn me(&self) -> &Validator {
        &self.me
    }

    /// Returns the state of the session.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Returns the Lagrange coefficient of this validator within the precomputed quorum.
    ///
    /// Only available when `security_threshold == shares_num` and this
    /// validator is one of the first `shares_num` validators.
    pub fn precomputed_coefficient(&self) -> Option<&Scalar> {
        self.precomputed.as_ref()
    }

    /// Deals this validator's transcript to every validator of the registry.
    pub fn generate_transcript<R: CryptoRngCore>(
        &mut self,
        rng: &mut R,
    ) -> Result<Transcript, Error> {
        if self.params.security_threshold > self.params.shares_num
            || self.registry.len() < self.params.shares_num as usize
        {
            return Err(Error::InvalidParameters("invalid session"));
        }
        let transcript = Transcript::deal(
            rng,
            self.params.tau,
            self.me.index,
            self.params.security_threshold,
            &self.registry.public_keys(),
        )?;
        if self.state == State::Created {
            self.state = State::TranscriptGenerated;
        }
        Ok(transcript)
    }

    /// Checks a transcript was dealt for this session and is cryptographically valid.
    pub fn verify_transcript(&self, transcript: &Transcript) -> Result<(), Error> {
        if transcript.tau() != self.params.tau {
            return Err(Error::TauMismatch(self.params.tau, transcript.tau()));
        }
        if self.registry.get(transcript.dealer()).is_none() {
            return Err(Error::UnknownValidator);
        }
        transcript.verify(
            &self.registry.public_keys(),
            self.params.security_threshold,
        )
    }

    /// Verifies and stores a transcript received from a dealer.
    pub fn deal(&mut self, transcript: Transcript) -> Result<(), Error> {
        if matches!(self.state, State::Finalized { .. }) {
            return Err(Error::InvalidState("session already finalized"));
        }
        let dealer = transcript.dealer();
        if self.dealt.contains_key(&dealer) {
            warn!(dealer, "duplicate transcript");
            return Err(Error::DuplicateValidator(format!("dealer {dealer}")));
        }
        self.verify_transcript(&transcript).inspect_err(|err| {
            warn!(dealer, ?err, "rejected transcript");
        })?;
        self.dealt.insert(dealer, transcript);
        debug!(dealer, dealt = self.dealt.len(), "stored transcript");
        if self.dealt.len() >= self.params.security_threshold as usize {
            self.state = State::AggregationReady;
        }
        Ok(())
    }

    /// Returns the transcripts stored with [Dkg::deal], ordered by dealer.
    pub fn transcripts(&self) -> Vec<Transcript> {
        self.dealt.values().cloned().collect()
    }

    /// Aggregates the transcripts stored with [Dkg::deal].
    pub fn aggregate(&mut self) -> Result<AggregatedTranscript, Error> {
        if self.state != State::AggregationReady {
            return Err(Error::InsufficientTranscripts(
                self.dealt.len(),
                self.params.security_threshold,
            ));
        }
        let transcripts = self.transcripts();
        let aggregate = AggregatedTranscript::from_transcripts(&transcripts)?;
        self.finalize(&aggregate)?;
        Ok(aggregate)
    }

    /// Verifies and aggregates a set of transcripts.
    ///
    /// Requires at least `security_threshold` valid transcripts of this epoch
    /// from distinct validators of the registry.
    pub fn aggregate_transcripts(
        &mut self,
        transcripts: &[Transcript],
    ) -> Result<AggregatedTranscript, Error> {
        let threshold = self.params.security_threshold;
        if transcripts.len() < threshold as usize {
            return Err(Error::InsufficientTranscripts(transcripts.len(), threshold));
        }
        let mut dealers = BTreeSet::new();
        for transcript in transcripts {
            if transcript.tau() != self.params.tau {
                return Err(Error::TauMismatch(self.params.tau, transcript.tau()));
            }
            let dealer = transcript.dealer();
            if self.registry.get(dealer).is_none() {
                return Err(Error::UnknownValidator);
            }
            if !dealers.insert(dealer) {
                return Err(Error::DuplicateValidator(format!("dealer {dealer}")));
            }
        }

        // Verify transcripts in parallel
        let recipients = self.registry.public_keys();
        transcripts
            .par_iter()
            .map(|transcript| {
                transcript.verify(&recipients, threshold).inspect_err(|err| {
                    warn!(dealer = transcript.dealer(), ?err, "invalid transcript");
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let aggregate = AggregatedTranscript::from_transcripts(transcripts)?;
        self.finalize(&aggregate)?;
        Ok(aggregate)
    }

    /// Adopts an aggregate computed elsewhere.
    ///
    /// Only the aggregate itself is verified (see [AggregatedTranscript::verify_optimistic]).
    pub fn observe(&mut self, aggregate: &AggregatedTranscript) -> Result<(), Error> {
        if aggregate.tau() != self.params.tau {
            return Err(Error::TauMismatch(self.params.tau, aggregate.tau()));
        }
        if aggregate.threshold() != self.params.security_threshold {
            return Err(Error::VerificationFailed("threshold mismatch"));
        }
        if aggregate.recipients() != self.registry.public_keys()
            || aggregate
                .dealers()
                .iter()
                .any(|&dealer| self.registry.get(dealer).is_none())
        {
            return Err(Error::RegistryMismatch);
        }
        if !aggregate.verify_optimistic() {
            return Err(Error::VerificationFailed("aggregate"));
        }
        self.finalize(aggregate)
    }

    fn finalize(&mut self, aggregate: &AggregatedTranscript) -> Result<(), Error> {
        let public_key = aggregate.public_key();
        if let State::Finalized {
            public_key: existing,
            ..
        } = &self.state
        {
            if *existing != public_key {
                return Err(Error::InvalidState("finalized with a different aggregate"));
            }
            return Ok(());
        }
        debug!(
            tau = self.params.tau,
            dealers = aggregate.dealers().len(),
            "finalized session"
        );
        self.state = State::Finalized {
            public_key,
            public_params: aggregate.public_params(),
        };
        Ok(())
    }

    /// Returns the derived public key once the session is finalized.
    pub fn final_key(&self) -> Option<DkgPublicKey> {
        match &self.state {
            State::Finalized { public_key, .. } => Some(*public_key),
            _ => None,
        }
    }

    /// Returns the public parameters once the session is finalized.
    pub fn public_params(&self) -> Option<&DkgPublicParameters> {
        match &self.state {
            State::Finalized { public_params, .. } => Some(public_params),
            _ => None,
        }
    }
}
