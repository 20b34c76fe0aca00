//! ADPCM round-trip and idempotence, exercised through the public API.

use smjpeg::adpcm::{decode, encode, AdpcmState};

fn sine_like(n: usize) -> Vec<i16> {
    (0..n)
        .map(|i| {
            let phase = (i as f64) * 0.05;
            (phase.sin() * 12000.0) as i16
        })
        .collect()
}

#[test]
fn round_trip_stays_within_adpcm_error_bound() {
    let samples = sine_like(2048);
    let mut enc_state = AdpcmState::default();
    let packed = encode(&samples, &mut enc_state).unwrap();

    let mut dec_state = AdpcmState::default();
    let decoded = decode(&packed, &mut dec_state);

    assert_eq!(decoded.len(), samples.len());
    for (orig, got) in samples.iter().zip(decoded.iter()) {
        assert!(
            (*orig as i32 - *got as i32).abs() < 2048,
            "orig={orig} got={got}"
        );
    }
}

#[test]
fn each_chunk_is_independently_decodable_from_a_snapshotted_state() {
    let samples = sine_like(1024);

    // Encode the whole thing in one shot.
    let mut whole_state = AdpcmState::default();
    let whole = encode(&samples, &mut whole_state).unwrap();

    // Encode it in two halves, snapshotting state before each half the
    // way the muxer does before writing each chunk.
    let (first_half, second_half) = samples.split_at(512);
    let mut state = AdpcmState::default();
    let prefix_before_first = state;
    let first_packed = encode(first_half, &mut state).unwrap();
    let prefix_before_second = state;
    let second_packed = encode(second_half, &mut state).unwrap();

    // Decoding each half independently, starting from its own
    // snapshotted prefix state, reproduces the same samples as decoding
    // the whole thing continuously.
    let mut dec_state = prefix_before_first;
    let first_decoded = decode(&first_packed, &mut dec_state);
    let mut dec_state2 = prefix_before_second;
    let second_decoded = decode(&second_packed, &mut dec_state2);

    let mut whole_dec_state = AdpcmState::default();
    let whole_decoded = decode(&whole, &mut whole_dec_state);

    assert_eq!(first_decoded, whole_decoded[..512]);
    assert_eq!(second_decoded, whole_decoded[512..]);
}

#[test]
fn silence_is_exact_and_state_stays_settled() {
    let samples = vec![0i16; 1000];
    let mut state = AdpcmState::default();
    let packed = encode(&samples, &mut state).unwrap();

    let mut dec_state = AdpcmState::default();
    let decoded = decode(&packed, &mut dec_state);

    assert!(decoded.iter().all(|&s| s == 0));
}

#[test]
fn fresh_state_per_chunk_matches_a_freshly_reset_decoder() {
    let samples = sine_like(512);
    let mut state = AdpcmState::default();
    let packed = encode(&samples, &mut state);
    assert!(packed.is_ok());

    // Resetting state between chunks (as every chunk boundary does) must
    // not leak predictor/index values across chunks.
    let mut a = AdpcmState::default();
    let mut b = AdpcmState::default();
    assert_eq!(a.valprev, b.valprev);
    assert_eq!(a.index, b.index);
    let _ = encode(&samples, &mut a).unwrap();
    assert_ne!(a.valprev, 0);
    assert_eq!(b.valprev, 0);
}
