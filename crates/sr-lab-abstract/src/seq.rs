use serde::{Deserialize, Serialize};

/// Sequence numbers modulo `K`.
///
/// ```text
///   0 1 2 ... base ... base+N-1 ... K-1
///             |<---- window ---->|
/// ```
///
/// Every comparison goes through [`SeqSpace::distance`], so a window that
/// straddles `K-1 -> 0` behaves exactly like one that does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqSpace {
    modulus: u32,
}

impl SeqSpace {
    /// `modulus` must be non-zero; `SrConfig::validate` guarantees `K >= 2`.
    pub fn new(modulus: u32) -> Self {
        debug_assert!(modulus > 0, "sequence space must not be empty");
        Self { modulus }
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    pub fn next(&self, seq: u32) -> u32 {
        self.add(seq, 1)
    }

    pub fn add(&self, seq: u32, n: u32) -> u32 {
        ((seq as u64 + n as u64) % self.modulus as u64) as u32
    }

    /// Forward distance from `from` to `to`, in `[0, K)`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let k = self.modulus as u64;
        ((to as u64 % k + k - from as u64 % k) % k) as u32
    }

    /// A window of `size` numbers starting at `base`.
    pub fn window(&self, base: u32, size: u32) -> SeqWindow {
        SeqWindow {
            space: *self,
            base,
            size,
        }
    }
}

/// `{(base + i) mod K : i in [0, size)}`, tested without materializing the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqWindow {
    space: SeqSpace,
    base: u32,
    size: u32,
}

impl SeqWindow {
    pub fn contains(&self, seq: u32) -> bool {
        seq < self.space.modulus && self.space.distance(self.base, seq) < self.size
    }

    /// The window's members from left edge to right edge, for logging.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.size.min(self.space.modulus)).map(move |i| self.space.add(self.base, i))
    }
}
