//! Arithmetic over BLS12-381 used by the key generation and decryption protocols.
//!
//! # Acknowledgements
//!
//! _The following crates were used as a reference when implementing this module. If code is very similar
//! to the reference, it is accompanied by a comment and link._
//!
//! * <https://github.com/celo-org/celo-threshold-bls-rs>: Polynomial operations and Lagrange interpolation.
//! * <https://github.com/filecoin-project/blstrs> + <https://github.com/MystenLabs/fastcrypto>: Implementing operations over
//!   the BLS12-381 scalar field and target group with <https://github.com/supranational/blst>.

pub mod group;
pub mod lagrange;
pub mod poly;

use thiserror::Error;

/// Errors that can occur when working with BLS12-381 primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("no evaluations provided")]
    NoEvaluations,
    #[error("no inverse")]
    NoInverse,
    #[error("duplicate polynomial evaluation point: {0}")]
    DuplicateEval(u32),
    #[error("index not in evaluation set: {0}")]
    MissingEval(u32),
}
