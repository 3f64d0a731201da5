use crate::rules::dice::ModifierKind;

/// Why an expression failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxReason {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),

    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),

    #[error("number does not fit in 32 bits")]
    NumberTooLarge,

    #[error("zero is not a valid count here")]
    ZeroValue,

    #[error("missing die size after 'd'")]
    MissingDieSize,

    #[error("die size {0} is outside 2..=100000")]
    DieSizeOutOfRange(u32),

    #[error("{0} dice in a single group exceeds the limit")]
    TooManyDice(u32),

    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,

    #[error("parentheses nested too deeply")]
    NestingTooDeep,

    #[error("too many terms in one expression")]
    TooManyTerms,

    #[error("expected a term, found {0}")]
    ExpectedTerm(String),

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("unexpected trailing input {0}")]
    TrailingInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error at position {position}: {reason}")]
    Syntax { position: usize, reason: SyntaxReason },

    #[error("modifier {modifier}{n} at position {position} must be smaller than the die count {count}")]
    ModifierOutOfRange {
        position: usize,
        modifier: ModifierKind,
        n: u32,
        count: u32,
    },

    #[error("secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    #[error("total out of range: {0}")]
    Range(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("statistics error: {0}")]
    Statistics(String),
}

impl Error {
    pub(crate) fn syntax(position: usize, reason: SyntaxReason) -> Self {
        Error::Syntax { position, reason }
    }

    /// Byte offset into the expression for errors raised while parsing.
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::Syntax { position, .. } | Error::ModifierOutOfRange { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }

    /// True for errors detected before any randomness was consumed.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::ModifierOutOfRange { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
