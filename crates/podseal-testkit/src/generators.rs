//! Proptest generators.

use proptest::prelude::*;

/// Key-server weights and a reachable threshold.
#[derive(Debug, Clone)]
pub struct QuorumShape {
    pub weights: Vec<u8>,
    pub threshold: u8,
}

impl QuorumShape {
    pub fn total_weight(&self) -> u8 {
        self.weights.iter().sum()
    }
}

/// One to four servers of weight one to three, threshold within the total.
pub fn quorum_shape() -> impl Strategy<Value = QuorumShape> {
    prop::collection::vec(1u8..=3, 1..=4).prop_flat_map(|weights| {
        let total: u8 = weights.iter().sum();
        (Just(weights), 1..=total).prop_map(|(weights, threshold)| QuorumShape { weights, threshold })
    })
}

/// Plaintext of up to `max_len` bytes, empty included.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
