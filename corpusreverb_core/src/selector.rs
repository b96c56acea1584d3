//! Randomized-without-replacement cycling over a fixed pool.

use rand::seq::SliceRandom;
use rand::Rng;

/// Cycles through a pool in a random order fixed at construction.
///
/// The pool is shuffled exactly once; every full pass afterwards visits the
/// elements in that same permutation. Drawing from the selector consumes no
/// randomness, so interleaved selectors stay independent of each other and
/// of the run's other random draws.
#[derive(Clone, Debug)]
pub struct CyclicSelector<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T> CyclicSelector<T> {
    /// Shuffle `items` with `rng` and start cycling from the front.
    ///
    /// # Panics
    ///
    /// Panics if `items` is empty.
    pub fn new<R: Rng>(mut items: Vec<T>, rng: &mut R) -> Self {
        assert!(!items.is_empty(), "cyclic selector requires a non-empty pool");
        items.shuffle(rng);
        Self { items, cursor: 0 }
    }

    /// Return the next element of the cycle.
    pub fn next(&mut self) -> &T {
        let item = &self.items[self.cursor];
        self.cursor = (self.cursor + 1) % self.items.len();
        item
    }
}
