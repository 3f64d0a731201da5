use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{alpha1, digit1, multispace0, one_of},
    combinator::map,
};

use crate::{
    error::{Error, Result, SyntaxReason},
    rules::dice::ModifierKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Number(u32),
    Die,
    Modifier(ModifierKind),
    Explode,
    Plus,
    Minus,
    LeftParen,
    RightParen,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Die => write!(f, "'d'"),
            TokenKind::Modifier(kind) => write!(f, "modifier '{kind}'"),
            TokenKind::Explode => write!(f, "'!'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme<'a> {
    Digits(&'a str),
    Word(&'a str),
    Symbol(char),
}

fn lexeme(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        map(digit1, Lexeme::Digits),
        map(alpha1, Lexeme::Word),
        map(one_of("+-()!"), Lexeme::Symbol),
    ))
    .parse(input)
}

fn whitespace(input: &str) -> &str {
    multispace0::<_, nom::error::Error<&str>>(input)
        .map(|(rest, _)| rest)
        .unwrap_or(input)
}

fn classify(lexeme: Lexeme<'_>, position: usize) -> Result<TokenKind> {
    match lexeme {
        Lexeme::Digits(digits) => digits
            .parse::<u32>()
            .map(TokenKind::Number)
            .map_err(|_| Error::syntax(position, SyntaxReason::NumberTooLarge)),
        Lexeme::Word(word) => match word.to_ascii_lowercase().as_str() {
            "d" => Ok(TokenKind::Die),
            "dl" => Ok(TokenKind::Modifier(ModifierKind::DropLowest)),
            "dh" => Ok(TokenKind::Modifier(ModifierKind::DropHighest)),
            "kh" => Ok(TokenKind::Modifier(ModifierKind::KeepHighest)),
            "kl" => Ok(TokenKind::Modifier(ModifierKind::KeepLowest)),
            _ => Err(Error::syntax(
                position,
                SyntaxReason::UnknownModifier(word.to_string()),
            )),
        },
        Lexeme::Symbol(symbol) => Ok(match symbol {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            _ => TokenKind::Explode,
        }),
    }
}

/// Splits `source` into tokens, recording each token's byte offset.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = whitespace(source);

    while !rest.is_empty() {
        let position = source.len() - rest.len();
        match lexeme(rest) {
            Ok((after, lexeme)) => {
                let kind = classify(lexeme, position)?;
                tokens.push(Token { kind, position });
                rest = whitespace(after);
            }
            Err(_) => {
                let ch = rest.chars().next().unwrap_or_default();
                return Err(Error::syntax(position, SyntaxReason::UnexpectedCharacter(ch)));
            }
        }
    }

    Ok(tokens)
}
