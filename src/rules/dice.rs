use serde::{Deserialize, Serialize};

use crate::{error::Result, random::SourceKind, roll_parser};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierKind {
    DropLowest,
    DropHighest,
    KeepHighest,
    KeepLowest,
}

impl ModifierKind {
    pub fn notation(&self) -> &'static str {
        match self {
            ModifierKind::DropLowest => "dl",
            ModifierKind::DropHighest => "dh",
            ModifierKind::KeepHighest => "kh",
            ModifierKind::KeepLowest => "kl",
        }
    }
}

impl std::fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.notation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub n: u32,
}

impl Modifier {
    /// How many of `rolled` dice survive this modifier.
    pub fn kept_count(&self, rolled: u32) -> u32 {
        match self.kind {
            ModifierKind::DropLowest | ModifierKind::DropHighest => rolled.saturating_sub(self.n),
            ModifierKind::KeepHighest | ModifierKind::KeepLowest => self.n.min(rolled),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceGroup {
    pub count: u32,
    pub sides: u32,
    pub modifier: Option<Modifier>,
    pub explode: bool,
}

impl DiceGroup {
    pub fn bounds(&self, explode_cap: u32) -> Bounds {
        let most_rolled = if self.explode {
            self.count.saturating_add(explode_cap)
        } else {
            self.count
        };
        let (fewest_kept, most_kept) = match self.modifier {
            Some(modifier) => (
                modifier.kept_count(self.count),
                modifier.kept_count(most_rolled),
            ),
            None => (self.count, most_rolled),
        };
        Bounds {
            min: i64::from(fewest_kept),
            max: i64::from(most_kept) * i64::from(self.sides),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
}

impl BinaryOperator {
    pub fn symbol(&self) -> char {
        match self {
            BinaryOperator::Add => '+',
            BinaryOperator::Subtract => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    Dice(DiceGroup),
    Literal(u32),
    Binary {
        op: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn bounds(&self, explode_cap: u32) -> Bounds {
        match self {
            Node::Dice(group) => group.bounds(explode_cap),
            Node::Literal(value) => Bounds {
                min: i64::from(*value),
                max: i64::from(*value),
            },
            Node::Binary { op, left, right } => {
                let l = left.bounds(explode_cap);
                let r = right.bounds(explode_cap);
                match op {
                    BinaryOperator::Add => Bounds {
                        min: l.min + r.min,
                        max: l.max + r.max,
                    },
                    BinaryOperator::Subtract => Bounds {
                        min: l.min - r.max,
                        max: l.max - r.min,
                    },
                }
            }
        }
    }

    /// Dice groups in evaluation (left to right) order.
    pub fn dice_groups(&self) -> Vec<&DiceGroup> {
        let mut groups = Vec::new();
        self.collect_groups(&mut groups);
        groups
    }

    fn collect_groups<'a>(&'a self, out: &mut Vec<&'a DiceGroup>) {
        match self {
            Node::Dice(group) => out.push(group),
            Node::Literal(_) => {}
            Node::Binary { left, right, .. } => {
                left.collect_groups(out);
                right.collect_groups(out);
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Dice(group) => {
                write!(f, "{}d{}", group.count, group.sides)?;
                if let Some(modifier) = group.modifier {
                    write!(f, "{}{}", modifier.kind, modifier.n)?;
                }
                if group.explode {
                    write!(f, "!")?;
                }
                Ok(())
            }
            Node::Literal(value) => write!(f, "{value}"),
            Node::Binary { op, left, right } => {
                write!(f, "{left}{}", op.symbol())?;
                // Left-associative: only a binary right operand needs grouping.
                if matches!(**right, Node::Binary { .. }) {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}

/// Inclusive range of totals an expression can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl Bounds {
    pub fn contains(&self, total: i64) -> bool {
        (self.min..=self.max).contains(&total)
    }
}

/// A parsed dice expression together with the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub(crate) fn new(source: &str, root: Node) -> Self {
        Self {
            source: source.to_string(),
            root,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        roll_parser::parse(input)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn bounds(&self, explode_cap: u32) -> Bounds {
        self.root.bounds(explode_cap)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

impl std::str::FromStr for Expression {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub sides: u32,
    pub raw_rolls: Vec<u32>,
    pub kept_rolls: Vec<u32>,
    pub dropped_rolls: Vec<u32>,
    pub exploded_count: u32,
}

impl GroupResult {
    pub fn kept_sum(&self) -> i64 {
        self.kept_rolls.iter().map(|&r| i64::from(r)).sum()
    }

    pub fn pretty_print(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(f, "d{} [", self.sides)?;
        for (i, roll) in self.raw_rolls.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{roll}")?;
        }
        write!(f, "]")?;
        if !self.dropped_rolls.is_empty() {
            write!(f, " dropped {:?}", self.dropped_rolls)?;
        }
        if self.exploded_count > 0 {
            write!(f, " ({} exploded)", self.exploded_count)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub expression: String,
    pub total: i32,
    pub groups: Vec<GroupResult>,
    pub timestamp_utc: Timestamp,
    pub source: SourceKind,
}

impl RollResult {
    pub fn pretty_print(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(f, "Rolled {}: ", self.expression)?;
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            group.pretty_print(f)?;
        }
        write!(f, " = {}", self.total)?;
        if !self.source.is_secure() {
            write!(f, " ({})", self.source)?;
        }
        Ok(())
    }
}
