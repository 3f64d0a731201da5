use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    config::EngineConfig,
    error::Result,
    history::{HistoryEntry, HistoryQuery, HistoryView, RollHistory},
    random::{FallbackSource, RandomSource, SecureSource, SeededSource},
    roll_parser,
    rules::{
        dice::{Expression, RollResult},
        evaluator::Evaluator,
    },
    statistics::{
        roller::Roller,
        validator::{self, ValidationReport},
    },
};

/// Parse, roll and record in one place.
///
/// Every successful roll is appended to the engine's history; failed rolls
/// leave it untouched. The engine is `Sync` and meant to be shared.
#[derive(Debug)]
pub struct DiceEngine {
    config: EngineConfig,
    roller: Roller,
    evaluator: Evaluator,
    history: RollHistory,
    cache: Mutex<FxHashMap<String, Arc<Expression>>>,
}

impl DiceEngine {
    /// Uses the platform CSPRNG. Without `require_secure_randomness` the
    /// engine falls back to a time-seeded generator if the CSPRNG fails.
    pub fn new(config: EngineConfig) -> Self {
        let source: Arc<dyn RandomSource> = if config.require_secure_randomness {
            Arc::new(SecureSource::new())
        } else {
            Arc::new(FallbackSource::new())
        };
        Self::with_source(config, source)
    }

    /// Deterministic engine, reproducible for a given seed.
    pub fn seeded(config: EngineConfig, seed: u64) -> Self {
        Self::with_source(config, Arc::new(SeededSource::from_seed(seed)))
    }

    pub fn with_source(config: EngineConfig, source: Arc<dyn RandomSource>) -> Self {
        let roller = Roller::with_source(source).require_secure(config.require_secure_randomness);
        let evaluator = Evaluator::new().explode_cap(config.explode_cap);
        let history = RollHistory::new(config.history_capacity, config.history_byte_budget);
        Self {
            config,
            roller,
            evaluator,
            history,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn roller(&self) -> &Roller {
        &self.roller
    }

    pub fn history(&self) -> &RollHistory {
        &self.history
    }

    /// Parses `input`, reusing an earlier parse of the same text.
    pub fn parse(&self, input: &str) -> Result<Arc<Expression>> {
        if let Some(expression) = self.cache.lock().get(input) {
            log::trace!("parse cache hit for {input:?}");
            return Ok(expression.clone());
        }

        let expression = Arc::new(roll_parser::parse(input)?);

        let capacity = self.config.parse_cache_capacity;
        if capacity > 0 {
            let mut cache = self.cache.lock();
            if cache.len() >= capacity {
                cache.clear();
            }
            cache.insert(input.to_string(), expression.clone());
        }
        Ok(expression)
    }

    /// Rolls an already parsed expression and records it.
    pub fn evaluate(&self, expression: &Expression) -> Result<RollResult> {
        let result = self.evaluator.evaluate(expression, &self.roller)?;
        self.history.append(&result);
        Ok(result)
    }

    pub fn roll(&self, input: &str) -> Result<RollResult> {
        let expression = self.parse(input)?;
        self.evaluate(&expression)
    }

    /// `times` independent rolls of the same expression, parsed once.
    pub fn roll_many(&self, input: &str, times: usize) -> Result<Vec<RollResult>> {
        let expression = self.parse(input)?;
        (0..times).map(|_| self.evaluate(&expression)).collect()
    }

    pub fn query_history(&self, query: HistoryQuery) -> HistoryView {
        self.history.query(query)
    }

    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.query(HistoryQuery::recent(limit)).to_vec()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Chi-square check of this engine's dice. Not recorded in history.
    pub fn validate(&self, sides: u32, sample_size: u64) -> Result<ValidationReport> {
        validator::validate(sides, sample_size, &self.roller)
    }
}

impl Default for DiceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
