//! Deterministic utilities for reproducible runs
//!
//! Every random draw in the pipeline comes from a `StdRng` seeded from the
//! configured run seed. Independent streams (one per tree) get their own
//! seed derived by hashing the run seed with the stream number, so the
//! result does not depend on the order in which streams are consumed.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mix a base seed with a stream number into an independent 64-bit seed.
///
/// xxhash64-style avalanche over the two words.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    const PRIME1: u64 = 0x9E3779B185EBCA87;
    const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
    const PRIME3: u64 = 0x165667B19E3779F9;
    const PRIME5: u64 = 0x85EBCA77C2B2AE63;

    let mut h = seed.wrapping_add(PRIME5);
    for word in [stream, stream.rotate_left(32)] {
        h = h.wrapping_add(word.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME2);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

/// Seeded generator for a given stream of the run.
pub fn stream_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(seed, stream))
}
