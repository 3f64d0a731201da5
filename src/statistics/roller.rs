use std::sync::Arc;

use crate::{
    error::{Error, Result},
    random::{FallbackSource, RandomSource, SeededSource, SourceKind},
};

pub const MIN_SIDES: u32 = 2;
pub const MAX_SIDES: u32 = 100_000;

/// Turns raw words from a [`RandomSource`] into unbiased die faces.
#[derive(Debug, Clone)]
pub struct Roller {
    source: Arc<dyn RandomSource>,
    require_secure: bool,
}

impl Roller {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_source(Arc::new(FallbackSource::new()))
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::with_source(Arc::new(SeededSource::from_seed(seed)))
    }

    pub fn with_source(source: Arc<dyn RandomSource>) -> Self {
        Roller {
            source,
            require_secure: false,
        }
    }

    /// Refuse to roll from anything but a secure source.
    pub fn require_secure(mut self, require: bool) -> Self {
        self.require_secure = require;
        self
    }

    pub fn requires_secure(&self) -> bool {
        self.require_secure
    }

    pub fn source(&self) -> &Arc<dyn RandomSource> {
        &self.source
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Fails early when secure randomness is required but the source
    /// would hand out deterministic values.
    pub fn check_secure(&self) -> Result<()> {
        if self.require_secure && !self.source.kind().is_secure() {
            return Err(Error::RandomnessUnavailable(
                "source is not cryptographically secure".to_string(),
            ));
        }
        Ok(())
    }

    /// Rolls one die with faces `1..=sides`.
    pub fn d(&self, sides: u32) -> Result<u32> {
        if !(MIN_SIDES..=MAX_SIDES).contains(&sides) {
            return Err(Error::InvalidArgument(format!(
                "die size {sides} is outside {MIN_SIDES}..={MAX_SIDES}"
            )));
        }
        let range = u64::from(sides);
        // Words at or above `zone` fall into the trailing partial block
        // and would favour the low faces.
        let rem = (u64::MAX % range + 1) % range;
        let zone = 0u64.wrapping_sub(rem);
        loop {
            let word = self.source.next_u64()?;
            self.check_secure()?;
            if rem == 0 || word < zone {
                return Ok((word % range) as u32 + 1);
            }
        }
    }

    #[cfg(test)]
    pub fn test_rng() -> Self {
        Self::from_seed(42)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::testing::ScriptedSource;

    #[test]
    fn test_d_in_range() {
        let roller = Roller::test_rng();
        for sides in [2, 4, 6, 8, 10, 12, 20, 100, MAX_SIDES] {
            for _ in 0..1000 {
                let face = roller.d(sides).unwrap();
                assert!((1..=sides).contains(&face));
            }
        }
    }

    #[test]
    fn test_d_rejects_degenerate_sides() {
        let roller = Roller::test_rng();
        assert!(matches!(roller.d(1), Err(Error::InvalidArgument(_))));
        assert!(matches!(roller.d(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            roller.d(MAX_SIDES + 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejection_sampling_redraws_partial_block() {
        // 2^64 mod 6 == 4, so u64::MAX lies in the rejected tail.
        let source = Arc::new(ScriptedSource::words([u64::MAX, u64::MAX - 3, 2]));
        let roller = Roller::with_source(source.clone());
        assert_eq!(roller.d(6).unwrap(), 3);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_power_of_two_sides_never_rejects() {
        let source = Arc::new(ScriptedSource::words([u64::MAX]));
        let roller = Roller::with_source(source);
        assert_eq!(roller.d(8).unwrap(), 8);
    }

    #[test]
    fn test_faces_map_directly() {
        let source = Arc::new(ScriptedSource::faces(&[4, 5, 2]));
        let roller = Roller::with_source(source);
        assert_eq!(roller.d(6).unwrap(), 4);
        assert_eq!(roller.d(6).unwrap(), 5);
        assert_eq!(roller.d(6).unwrap(), 2);
    }

    #[test]
    fn test_require_secure_rejects_deterministic_source() {
        let roller = Roller::test_rng().require_secure(true);
        assert!(matches!(
            roller.d(20),
            Err(Error::RandomnessUnavailable(_))
        ));
        assert!(roller.check_secure().is_err());
    }

    #[test]
    fn test_require_secure_accepts_secure_source() {
        let source = Arc::new(ScriptedSource::faces(&[20]).with_kind(SourceKind::Secure));
        let roller = Roller::with_source(source).require_secure(true);
        assert_eq!(roller.d(20).unwrap(), 20);
    }
}
