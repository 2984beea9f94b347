//! Jointly derive an encryption key and decrypt ciphertexts with a threshold of validators.
//!
//! Each validator deals a publicly verifiable secret sharing (PVSS) [Transcript] to every
//! participant of a [ValidatorRegistry]. Any `security_threshold` transcripts combine into an
//! [AggregatedTranscript] whose constant term is the [DkgPublicKey]. Messages are encrypted
//! to that key with [encrypt] and, later, any quorum of validators can each produce a
//! [DecryptionShare] from which the [SharedSecret] (and the plaintext) is recovered. No
//! participant ever learns the private key.
//!
//! Two decryption variants are offered:
//! * _Simple_: any `security_threshold` of the shares are combined with Lagrange
//!   interpolation in the target group.
//! * _Precomputed_: requires `security_threshold == shares_num`. Each validator folds its
//!   Lagrange coefficient into its share so that combination is a plain product.
//!
//! # Example
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use threshold_dkg::{
//!     combine_decryption_shares_simple, decrypt_with_shared_secret, encrypt, Dkg, Keypair,
//!     Validator,
//! };
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let (tau, shares_num, threshold) = (1, 3, 2);
//!
//! // Bootstrap validators
//! let keypairs = (0..shares_num).map(|_| Keypair::from_rng(&mut rng)).collect::<Vec<_>>();
//! let validators = keypairs
//!     .iter()
//!     .enumerate()
//!     .map(|(i, k)| Validator::new(format!("validator-{i}"), k.public_key(), i as u32))
//!     .collect::<Vec<_>>();
//!
//! // Every validator deals a transcript
//! let mut sessions = validators
//!     .iter()
//!     .map(|me| Dkg::new(tau, shares_num, threshold, &validators, me).unwrap())
//!     .collect::<Vec<_>>();
//! let transcripts = sessions
//!     .iter_mut()
//!     .map(|dkg| dkg.generate_transcript(&mut rng).unwrap())
//!     .collect::<Vec<_>>();
//!
//! // Aggregate and encrypt to the derived key
//! let aggregate = sessions[0].aggregate_transcripts(&transcripts).unwrap();
//! assert!(aggregate.verify(shares_num, &transcripts));
//! let ciphertext = encrypt(b"abc", b"my-aad", &aggregate.public_key(), &mut rng).unwrap();
//!
//! // Any two validators can decrypt
//! let shares = sessions[..2]
//!     .iter()
//!     .map(|dkg| {
//!         let keypair = keypairs.iter().find(|k| k.public_key() == dkg.me().public_key).unwrap();
//!         aggregate
//!             .create_decryption_share_simple(dkg, ciphertext.header(), b"my-aad", keypair)
//!             .unwrap()
//!     })
//!     .collect::<Vec<_>>();
//! let secret = combine_decryption_shares_simple(&shares).unwrap();
//! let params = sessions[0].public_params().unwrap();
//! let plaintext = decrypt_with_shared_secret(&ciphertext, b"my-aad", &secret, params).unwrap();
//! assert_eq!(plaintext, b"abc");
//! ```
//!
//! # Acknowledgements
//!
//! _The following were used as a reference when implementing this crate._
//!
//! * <https://eprint.iacr.org/2022/898>: Ferveo, threshold decryption for mempool privacy.
//! * <https://eprint.iacr.org/2022/1402>: Aggregatable PVSS over BLS12-381.

pub mod aggregate;
pub mod ciphertext;
pub mod decryption;
pub mod dkg;
pub mod keypair;
pub mod primitives;
pub mod pvss;
pub mod validator;

pub use aggregate::AggregatedTranscript;
pub use ciphertext::{
    decrypt_with_shared_secret, encrypt, Ciphertext, CiphertextHeader, DkgPublicKey,
    DkgPublicParameters,
};
pub use decryption::{
    combine_decryption_shares, combine_decryption_shares_precomputed,
    combine_decryption_shares_simple, Combinable, DecryptionShare, DecryptionSharePrecomputed,
    DecryptionShareSimple, SharedSecret,
};
pub use dkg::{Dkg, DkgParams, State};
pub use keypair::{Keypair, PrivateKeyShare, PublicKey};
pub use pvss::{EncryptedShare, Transcript};
pub use validator::{Validator, ValidatorRegistry};

use thiserror::Error;

/// Maximum number of validators accepted when decoding untrusted input.
pub const MAX_VALIDATORS: usize = u16::MAX as usize;

/// Maximum ciphertext body (and associated data) length accepted when decoding untrusted input.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while running the key generation or decryption protocols.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("insufficient transcripts: {0}/{1}")]
    InsufficientTranscripts(usize, u32),
    #[error("insufficient shares")]
    InsufficientShares,
    #[error("unknown validator")]
    UnknownValidator,
    #[error("duplicate validator: {0}")]
    DuplicateValidator(String),
    #[error("verification failed: {0}")]
    VerificationFailed(&'static str),
    #[error("precomputed variant requires security_threshold == shares_num: {0} != {1}")]
    PrecomputedVariantRequiresFullThreshold(u32, u32),
    #[error("validator index {0} is outside the precomputed quorum of {1}")]
    OutsidePrecomputedQuorum(u32, u32),
    #[error("aad mismatch")]
    AadMismatch,
    #[error("authentication failure")]
    AuthenticationFailure,
    #[error("tau mismatch: expected {0}, got {1}")]
    TauMismatch(u64, u64),
    #[error("transcript not dealt to this registry")]
    RegistryMismatch,
    #[error("duplicate share: {0}")]
    DuplicateShare(u32),
    #[error("mixed decryption share variants")]
    MixedShareVariants,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("primitives: {0}")]
    Primitives(#[from] primitives::Error),
    #[error("deserialization: {0}")]
    Deserialization(#[from] commonware_codec::Error),
}
