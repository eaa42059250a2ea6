// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use rand::{rngs::OsRng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};

/// A CSPRNG that can be shared between tasks.
pub type SharedRng = Arc<Mutex<ChaCha20Rng>>;

/// Seed a shared rng from the operating system.
pub fn create_shared_rng() -> SharedRng {
    Arc::new(Mutex::new(ChaCha20Rng::from_rng(OsRng).unwrap_or_else(
        |_| ChaCha20Rng::from_seed(OsRng.gen::<[u8; 32]>()),
    )))
}

/// Deterministic shared rng. Only meant for tests and simulations.
pub fn create_shared_rng_from_u64(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed)))
}

/// Fill a fixed size array from the shared rng.
pub fn rand_array<const N: usize>(rng: &SharedRng) -> [u8; N] {
    let mut out = [0u8; N];
    with_rng(rng, |r| r.fill(&mut out[..]));
    out
}

/// Run a closure against the locked rng, recovering from a poisoned lock.
pub fn with_rng<T>(rng: &SharedRng, f: impl FnOnce(&mut ChaCha20Rng) -> T) -> T {
    let mut guard = match rng.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}
