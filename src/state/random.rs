use std::sync::{Arc, Mutex, PoisonError};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

/// Process-wide random source shared by turn assignment and question draws.
///
/// Seeded once from the OS unless a fixed seed is supplied, which makes draws and first turns
/// reproducible.
#[derive(Debug, Clone)]
pub struct SharedRng {
    inner: Arc<Mutex<StdRng>>,
}

impl SharedRng {
    /// Seed from OS entropy.
    pub fn from_os() -> Self {
        Self::wrap(StdRng::from_os_rng())
    }

    /// Deterministic generator, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::wrap(StdRng::seed_from_u64(seed))
    }

    /// Seeded generator when `seed` is set, OS-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os, Self::seeded)
    }

    fn wrap(rng: StdRng) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rng)),
        }
    }

    /// Uniformly pick one element, `None` on an empty slice.
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        items.choose(&mut *rng)
    }

    /// Fair coin flip.
    pub fn flip(&self) -> bool {
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_bool(0.5)
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_os()
    }
}
