use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    error::{Error, Result},
    statistics::roller::{MAX_SIDES, MIN_SIDES, Roller},
};

pub const SIGNIFICANCE: f64 = 0.05;

/// Outcome of a chi-square goodness-of-fit run against a fair die.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub sides: u32,
    pub sample_size: u64,
    pub observed: Vec<u64>,
    pub expected: f64,
    pub degrees_of_freedom: u32,
    pub chi_square: f64,
    pub p_value: f64,
    pub pass: bool,
}

impl ValidationReport {
    pub fn pretty_print(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        writeln!(
            f,
            "d{} x {}: chi^2 = {:.3} (df {}), p = {:.4} => {}",
            self.sides,
            self.sample_size,
            self.chi_square,
            self.degrees_of_freedom,
            self.p_value,
            if self.pass { "PASS" } else { "FAIL" }
        )?;
        for (face, count) in self.observed.iter().enumerate() {
            writeln!(f, "  {:>6}: {}", face + 1, count)?;
        }
        Ok(())
    }
}

/// Pearson's statistic for `observed` bins against equal expected counts.
pub fn chi_square(observed: &[u64]) -> f64 {
    let total: u64 = observed.iter().sum();
    if observed.is_empty() || total == 0 {
        return 0.0;
    }
    let expected = total as f64 / observed.len() as f64;
    observed
        .iter()
        .map(|&o| {
            let diff = o as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

/// Upper-tail probability of `statistic` under a chi-square distribution.
pub fn p_value(statistic: f64, degrees_of_freedom: u32) -> Result<f64> {
    let dist = ChiSquared::new(f64::from(degrees_of_freedom))
        .map_err(|e| Error::Statistics(e.to_string()))?;
    Ok(dist.sf(statistic))
}

/// Rolls `sample_size` single dice and tests the face counts for uniformity.
pub fn validate(sides: u32, sample_size: u64, roller: &Roller) -> Result<ValidationReport> {
    if sample_size == 0 {
        return Err(Error::InvalidArgument(
            "sample size must be positive".to_string(),
        ));
    }
    if !(MIN_SIDES..=MAX_SIDES).contains(&sides) {
        return Err(Error::InvalidArgument(format!(
            "die size {sides} is outside {MIN_SIDES}..={MAX_SIDES}"
        )));
    }

    let mut observed = vec![0u64; sides as usize];
    for _ in 0..sample_size {
        let face = roller.d(sides)?;
        observed[(face - 1) as usize] += 1;
    }

    let degrees_of_freedom = sides - 1;
    let chi_square = chi_square(&observed);
    let p_value = p_value(chi_square, degrees_of_freedom)?;

    log::debug!(
        "validated d{sides} over {sample_size} rolls: chi^2 {chi_square:.3}, p {p_value:.4}"
    );

    Ok(ValidationReport {
        sides,
        sample_size,
        expected: sample_size as f64 / f64::from(sides),
        observed,
        degrees_of_freedom,
        chi_square,
        p_value,
        pass: p_value > SIGNIFICANCE,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use statrs::assert_almost_eq;

    use super::*;
    use crate::random::testing::ScriptedSource;

    #[test]
    fn test_chi_square_known_value() {
        let chi = chi_square(&[10, 20, 30]);
        assert_almost_eq!(chi, 10.0, 1e-12);
        // df = 2 has sf(x) = exp(-x / 2)
        let p = p_value(chi, 2).unwrap();
        assert_almost_eq!(p, (-5.0f64).exp(), 1e-9);
    }

    #[test]
    fn test_perfectly_uniform_counts_pass() {
        let words = (0..2000u64).map(|i| i % 20);
        let roller = Roller::with_source(Arc::new(ScriptedSource::words(words)));
        let report = validate(20, 2000, &roller).unwrap();
        assert_eq!(report.observed, vec![100; 20]);
        assert_almost_eq!(report.chi_square, 0.0, 1e-12);
        assert_almost_eq!(report.p_value, 1.0, 1e-9);
        assert!(report.pass);
    }

    #[test]
    fn test_biased_source_fails() {
        // Faces 1..=10 only: half the d20 bins stay empty.
        let words = (0..2000u64).map(|i| i % 10);
        let roller = Roller::with_source(Arc::new(ScriptedSource::words(words)));
        let report = validate(20, 2000, &roller).unwrap();
        assert!(report.p_value < 1e-6);
        assert!(!report.pass);
    }

    #[test]
    fn test_d20_uniformity_across_seeds() {
        let passes = (0..10u64)
            .filter(|&seed| {
                let roller = Roller::from_seed(seed);
                validate(20, 10_000, &roller).unwrap().pass
            })
            .count();
        assert!(passes >= 7, "only {passes}/10 seeds passed");
    }

    #[test]
    fn test_zero_samples_rejected() {
        let roller = Roller::test_rng();
        assert!(matches!(
            validate(6, 0, &roller),
            Err(Error::InvalidArgument(_))
        ));
    }
}
