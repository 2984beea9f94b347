#![no_main]

use libfuzzer_sys::fuzz_target;
use threshold_dkg::{
    combine_decryption_shares_precomputed, combine_decryption_shares_simple,
    DecryptionSharePrecomputed, DecryptionShareSimple, Error,
};

const SHARE_SIZE: usize = 4 + 576;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a list of shares, skipping malformed ones
    let simple = data
        .chunks_exact(SHARE_SIZE)
        .filter_map(|chunk| DecryptionShareSimple::from_bytes(chunk).ok())
        .collect::<Vec<_>>();
    let precomputed = data
        .chunks_exact(SHARE_SIZE)
        .filter_map(|chunk| DecryptionSharePrecomputed::from_bytes(chunk).ok())
        .collect::<Vec<_>>();

    // Combination must never panic, only reject empty or duplicate input
    match combine_decryption_shares_simple(&simple) {
        Ok(_) | Err(Error::InsufficientShares) | Err(Error::DuplicateShare(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
    }
    match combine_decryption_shares_precomputed(&precomputed) {
        Ok(_) | Err(Error::InsufficientShares) | Err(Error::DuplicateShare(_)) => {}
        Err(err) => panic!("unexpected error: {err}"),
    }
});
