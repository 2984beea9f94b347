#![no_main]

use libfuzzer_sys::fuzz_target;
use threshold_dkg::{
    AggregatedTranscript, Ciphertext, CiphertextHeader, DecryptionSharePrecomputed,
    DecryptionShareSimple, DkgPublicKey, DkgPublicParameters, PublicKey, SharedSecret, Transcript,
};

/// Decodes `data` and, if successful, checks that re-encoding is exact.
macro_rules! round_trip {
    ($ty:ty, $data:expr) => {
        if let Ok(value) = <$ty>::from_bytes($data) {
            assert_eq!(value.to_bytes(), $data);
        }
    };
}

fuzz_target!(|data: &[u8]| {
    let Some((&selector, data)) = data.split_first() else {
        return;
    };
    match selector % 10 {
        0 => round_trip!(Transcript, data),
        1 => round_trip!(AggregatedTranscript, data),
        2 => round_trip!(Ciphertext, data),
        3 => round_trip!(CiphertextHeader, data),
        4 => round_trip!(DkgPublicParameters, data),
        5 => round_trip!(DkgPublicKey, data),
        6 => round_trip!(PublicKey, data),
        7 => round_trip!(DecryptionShareSimple, data),
        8 => round_trip!(DecryptionSharePrecomputed, data),
        _ => round_trip!(SharedSecret, data),
    }
});
