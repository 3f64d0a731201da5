use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng, TryRngCore, rngs::OsRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which generator produced the randomness behind a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Secure,
    Deterministic,
}

impl SourceKind {
    pub fn is_secure(&self) -> bool {
        matches!(self, SourceKind::Secure)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Secure => write!(f, "secure"),
            SourceKind::Deterministic => write!(f, "deterministic"),
        }
    }
}

/// A supplier of uniformly distributed 64-bit words.
///
/// Sources take `&self` so a single instance can be shared between callers;
/// implementations with internal state serialize access themselves.
pub trait RandomSource: Send + Sync + std::fmt::Debug {
    fn next_u64(&self) -> Result<u64>;

    /// The kind of generator the next draw will come from.
    fn kind(&self) -> SourceKind;
}

/// The operating system CSPRNG. Holds no state of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureSource;

impl SecureSource {
    pub fn new() -> Self {
        SecureSource
    }

    /// Checks that the platform facility can actually produce a value.
    pub fn check_available(&self) -> Result<()> {
        self.next_u64().map(|_| ())
    }
}

impl RandomSource for SecureSource {
    fn next_u64(&self) -> Result<u64> {
        OsRng
            .try_next_u64()
            .map_err(|e| Error::RandomnessUnavailable(e.to_string()))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Secure
    }
}

/// Seedable deterministic generator behind a mutex.
#[derive(Debug)]
pub struct SeededSource {
    seed: Mutex<u64>,
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed: Mutex::new(seed),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeds from the wall clock. Only meant for the fallback path.
    pub fn from_time() -> Self {
        let now = chrono::Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
        let seed = (nanos as u64) ^ (u64::from(std::process::id()) << 32);
        Self::from_seed(seed)
    }

    pub fn seed(&self) -> u64 {
        *self.seed.lock()
    }

    /// Restarts the stream from `seed`.
    pub fn reseed(&self, seed: u64) {
        let mut rng = self.rng.lock();
        *rng = StdRng::seed_from_u64(seed);
        *self.seed.lock() = seed;
    }
}

impl RandomSource for SeededSource {
    fn next_u64(&self) -> Result<u64> {
        Ok(self.rng.lock().next_u64())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Deterministic
    }
}

/// Secure source that degrades to a [`SeededSource`] if its primary
/// generator fails. Once degraded it stays degraded.
#[derive(Debug)]
pub struct FallbackSource {
    primary: Arc<dyn RandomSource>,
    fallback: SeededSource,
    degraded: AtomicBool,
}

impl FallbackSource {
    /// The platform CSPRNG, falling back to a time-seeded generator.
    pub fn new() -> Self {
        Self::with_fallback(SeededSource::from_time())
    }

    pub fn with_fallback(fallback: SeededSource) -> Self {
        Self::with_sources(Arc::new(SecureSource), fallback)
    }

    pub fn with_sources(primary: Arc<dyn RandomSource>, fallback: SeededSource) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

impl Default for FallbackSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FallbackSource {
    fn next_u64(&self) -> Result<u64> {
        if !self.is_degraded() {
            match self.primary.next_u64() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.degraded.swap(true, Ordering::AcqRel) {
                        log::warn!("{e}; falling back to deterministic generator");
                    }
                }
            }
        }
        self.fallback.next_u64()
    }

    fn kind(&self) -> SourceKind {
        if self.is_degraded() {
            SourceKind::Deterministic
        } else {
            self.primary.kind()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Replays a fixed list of raw words, then fails.
    #[derive(Debug)]
    pub(crate) struct ScriptedSource {
        words: Mutex<VecDeque<u64>>,
        kind: SourceKind,
    }

    impl ScriptedSource {
        pub(crate) fn words(words: impl IntoIterator<Item = u64>) -> Self {
            Self {
                words: Mutex::new(words.into_iter().collect()),
                kind: SourceKind::Deterministic,
            }
        }

        /// A source whose draws map to exactly these die faces.
        pub(crate) fn faces(faces: &[u32]) -> Self {
            Self::words(faces.iter().map(|&f| u64::from(f) - 1))
        }

        pub(crate) fn with_kind(mut self, kind: SourceKind) -> Self {
            self.kind = kind;
            self
        }

        pub(crate) fn remaining(&self) -> usize {
            self.words.lock().len()
        }
    }

    impl RandomSource for ScriptedSource {
        fn next_u64(&self) -> Result<u64> {
            self.words
                .lock()
                .pop_front()
                .ok_or_else(|| Error::RandomnessUnavailable("script exhausted".to_string()))
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }
}
