//! Dice notation parser.
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := '(' expression ')' | dice | integer
//! dice       := integer? 'd' integer (modifier | '!')*    at most one of each
//! modifier   := ('dl' | 'dh' | 'kh' | 'kl') integer?
//! ```
//!
//! Letters are case-insensitive, so `4D6DL1` and `4d6dl1` are the same.
//!
//! Parsing is pure: the same text always yields the same [`Expression`] or
//! the same error, and no randomness is touched.

mod lexer;

use lexer::{Token, TokenKind, tokenize};

use crate::{
    error::{Error, Result, SyntaxReason},
    rules::dice::{BinaryOperator, DiceGroup, Expression, Modifier, Node},
    statistics::roller::{MAX_SIDES, MIN_SIDES},
};

pub const MAX_DICE_PER_GROUP: u32 = 10_000;
pub const MAX_NESTING: usize = 64;
/// Dice groups plus literals across the whole expression. Also bounds the
/// depth of the tree, since each operator joins two terms.
pub const MAX_TERMS: usize = 1_000;

pub fn parse(input: &str) -> Result<Expression> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::syntax(0, SyntaxReason::Empty));
    }

    let mut parser = TokenStream {
        tokens: &tokens,
        cursor: 0,
        end: input.len(),
        depth: 0,
        terms: 0,
    };
    let root = parser.expression()?;

    if let Some(token) = parser.peek() {
        let reason = match token.kind {
            TokenKind::RightParen => SyntaxReason::UnbalancedParenthesis,
            kind => SyntaxReason::TrailingInput(kind.to_string()),
        };
        return Err(Error::syntax(token.position, reason));
    }

    Ok(Expression::new(input, root))
}

struct TokenStream<'a> {
    tokens: &'a [Token],
    cursor: usize,
    end: usize,
    depth: usize,
    terms: usize,
}

impl TokenStream<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Offset of the next token, or the end of input.
    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn expression(&mut self) -> Result<Node> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            node = Node::Binary {
                op,
                left: Box::new(node),
                right: Box::new(right),
            };
        }
        Ok(node)
    }

    fn count_term(&mut self, position: usize) -> Result<()> {
        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(Error::syntax(position, SyntaxReason::TooManyTerms));
        }
        Ok(())
    }

    fn term(&mut self) -> Result<Node> {
        let position = self.position();
        match self.peek_kind() {
            Some(TokenKind::LeftParen) => {
                if self.depth >= MAX_NESTING {
                    return Err(Error::syntax(position, SyntaxReason::NestingTooDeep));
                }
                self.advance();
                self.depth += 1;
                let inner = self.expression()?;
                self.depth -= 1;
                match self.peek_kind() {
                    Some(TokenKind::RightParen) => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(Error::syntax(
                        self.position(),
                        SyntaxReason::UnbalancedParenthesis,
                    )),
                }
            }
            Some(TokenKind::Number(n)) => {
                self.count_term(position)?;
                self.advance();
                if self.peek_kind() == Some(TokenKind::Die) {
                    if n == 0 {
                        return Err(Error::syntax(position, SyntaxReason::ZeroValue));
                    }
                    self.dice(n, position)
                } else {
                    Ok(Node::Literal(n))
                }
            }
            Some(TokenKind::Die) => {
                self.count_term(position)?;
                self.dice(1, position)
            }
            Some(kind) => Err(Error::syntax(
                position,
                SyntaxReason::ExpectedTerm(kind.to_string()),
            )),
            None => Err(Error::syntax(
                position,
                SyntaxReason::ExpectedTerm("end of input".to_string()),
            )),
        }
    }

    /// Parses from the `d` marker onwards; `count` has already been consumed.
    fn dice(&mut self, count: u32, count_position: usize) -> Result<Node> {
        if count > MAX_DICE_PER_GROUP {
            return Err(Error::syntax(count_position, SyntaxReason::TooManyDice(count)));
        }
        self.advance();

        let sides_position = self.position();
        let sides = match self.peek_kind() {
            Some(TokenKind::Number(sides)) => {
                self.advance();
                sides
            }
            _ => return Err(Error::syntax(sides_position, SyntaxReason::MissingDieSize)),
        };
        if !(MIN_SIDES..=MAX_SIDES).contains(&sides) {
            return Err(Error::syntax(
                sides_position,
                SyntaxReason::DieSizeOutOfRange(sides),
            ));
        }

        let mut group = DiceGroup {
            count,
            sides,
            modifier: None,
            explode: false,
        };

        loop {
            let position = self.position();
            match self.peek_kind() {
                Some(TokenKind::Explode) => {
                    if group.explode {
                        return Err(Error::syntax(position, SyntaxReason::Duplicate("explosion")));
                    }
                    self.advance();
                    group.explode = true;
                }
                Some(TokenKind::Modifier(kind)) => {
                    if group.modifier.is_some() {
                        return Err(Error::syntax(position, SyntaxReason::Duplicate("modifier")));
                    }
                    self.advance();
                    let n = match self.peek() {
                        Some(Token {
                            kind: TokenKind::Number(n),
                            position: n_position,
                        }) => {
                            if n == 0 {
                                return Err(Error::syntax(n_position, SyntaxReason::ZeroValue));
                            }
                            self.advance();
                            n
                        }
                        _ => 1,
                    };
                    if n >= count {
                        return Err(Error::ModifierOutOfRange {
                            position,
                            modifier: kind,
                            n,
                            count,
                        });
                    }
                    group.modifier = Some(Modifier { kind, n });
                }
                _ => break,
            }
        }

        Ok(Node::Dice(group))
    }
}
