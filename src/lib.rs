pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod random;
pub mod roll_parser;
pub mod rules;
pub mod statistics;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        config::EngineConfig,
        engine::DiceEngine,
        error::{Error, Result, SyntaxReason},
        history::{
            HistoryEntry, HistoryQuery, HistoryStats, HistoryView, Order, RollHistory, SequenceId,
        },
        random::{FallbackSource, RandomSource, SecureSource, SeededSource, SourceKind},
        roll_parser::parse,
        rules::{
            dice::{
                BinaryOperator, Bounds, DiceGroup, Expression, GroupResult, Modifier, ModifierKind,
                Node, RollResult,
            },
            evaluator::{Evaluator, evaluate},
        },
        statistics::{
            roller::Roller,
            validator::{ValidationReport, validate},
        },
    };
}
