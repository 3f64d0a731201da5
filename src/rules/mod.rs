pub mod dice;
pub mod evaluator;
