use rand::{RngCore, SeedableRng};

const MULTIPLIER: u64 = 9301;
const INCREMENT: u64 = 49297;
const MODULUS: u64 = 233280;

/// Linear-congruential generator behind every zone layout.
///
/// The same seed always yields the same sequence, which is what makes a
/// zone reproducible from its seed alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed % MODULUS,
        }
    }

    /// Next float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * MULTIPLIER + INCREMENT) % MODULUS;
        self.state as f64 / MODULUS as f64
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        ((self.next_f64() * len as f64) as usize).min(len.saturating_sub(1))
    }

    /// Uniform integer in `min..=max`.
    pub fn range(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        min + self.index((max - min + 1) as usize) as i32
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.index(items.len());
            items.get(idx)
        }
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }
}

impl RngCore for SeededRandom {
    fn next_u32(&mut self) -> u32 {
        (self.next_f64() * u32::MAX as f64) as u32
    }

    fn next_u64(&mut self) -> u64 {
        ((self.next_u32() as u64) << 32) | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SeededRandom {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    // The default implementation scrambles the seed; zones are keyed by the raw value.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
