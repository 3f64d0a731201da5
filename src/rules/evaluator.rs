use std::cmp::Reverse;

use crate::{
    error::{Error, Result},
    rules::dice::{
        BinaryOperator, DiceGroup, Expression, GroupResult, Modifier, ModifierKind, Node,
        RollResult,
    },
    roll_parser::MAX_DICE_PER_GROUP,
    statistics::roller::Roller,
};

pub const DEFAULT_EXPLODE_CAP: u32 = 100;
/// Largest accepted explode cap.
pub const MAX_EXPLODE_CAP: u32 = MAX_DICE_PER_GROUP;

/// Walks an [`Expression`] and rolls it.
///
/// Evaluation only consumes randomness; recording the result anywhere is
/// up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    explode_cap: u32,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            explode_cap: DEFAULT_EXPLODE_CAP,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum extra dice a single group may gain from explosions.
    pub fn explode_cap(mut self, cap: u32) -> Self {
        self.explode_cap = cap;
        self
    }

    pub fn evaluate(&self, expression: &Expression, roller: &Roller) -> Result<RollResult> {
        check_explode_cap(self.explode_cap)?;
        roller.check_secure()?;

        let mut groups = Vec::new();
        let total = self.eval_node(expression.root(), roller, &mut groups)?;
        let total = i32::try_from(total)
            .map_err(|_| Error::Range(format!("{total} does not fit in 32 bits")))?;

        let result = RollResult {
            expression: expression.source().to_string(),
            total,
            groups,
            timestamp_utc: chrono::Utc::now(),
            source: roller.source_kind(),
        };
        log::debug!(
            "rolled {} = {} ({})",
            result.expression,
            result.total,
            result.source
        );
        Ok(result)
    }

    fn eval_node(
        &self,
        node: &Node,
        roller: &Roller,
        groups: &mut Vec<GroupResult>,
    ) -> Result<i64> {
        match node {
            Node::Literal(value) => checked(i64::from(*value)),
            Node::Dice(group) => {
                let result = self.roll_group(group, roller)?;
                let sum = result.kept_sum();
                groups.push(result);
                checked(sum)
            }
            Node::Binary { op, left, right } => {
                let l = self.eval_node(left, roller, groups)?;
                let r = self.eval_node(right, roller, groups)?;
                match op {
                    BinaryOperator::Add => checked(l + r),
                    BinaryOperator::Subtract => checked(l - r),
                }
            }
        }
    }

    fn roll_group(&self, group: &DiceGroup, roller: &Roller) -> Result<GroupResult> {
        let mut raw_rolls = Vec::with_capacity(group.count as usize);
        for _ in 0..group.count {
            raw_rolls.push(roller.d(group.sides)?);
        }

        let mut exploded_count = 0;
        if group.explode {
            // Appended dice are visited too, so chains keep going until a
            // non-maximal face or the cap.
            let mut i = 0;
            while i < raw_rolls.len() && exploded_count < self.explode_cap {
                if raw_rolls[i] == group.sides {
                    raw_rolls.push(roller.d(group.sides)?);
                    exploded_count += 1;
                }
                i += 1;
            }
            if exploded_count == self.explode_cap && exploded_count > 0 {
                log::trace!("d{} explosions stopped at cap {}", group.sides, self.explode_cap);
            }
        }

        let (kept_rolls, dropped_rolls) = match group.modifier {
            Some(modifier) => partition(&raw_rolls, modifier),
            None => (raw_rolls.clone(), Vec::new()),
        };

        Ok(GroupResult {
            sides: group.sides,
            raw_rolls,
            kept_rolls,
            dropped_rolls,
            exploded_count,
        })
    }
}

pub fn evaluate(expression: &Expression, roller: &Roller) -> Result<RollResult> {
    Evaluator::default().evaluate(expression, roller)
}

pub(crate) fn check_explode_cap(cap: u32) -> Result<()> {
    if cap > MAX_EXPLODE_CAP {
        return Err(Error::InvalidArgument(format!(
            "explode cap {cap} exceeds {MAX_EXPLODE_CAP}"
        )));
    }
    Ok(())
}

fn checked(value: i64) -> Result<i64> {
    if i32::try_from(value).is_ok() {
        Ok(value)
    } else {
        Err(Error::Range(format!("{value} does not fit in 32 bits")))
    }
}

/// Splits `rolls` into (kept, dropped), both in roll order.
///
/// Selection uses a stable sort of indices, so equal faces are picked in
/// the order they were rolled.
fn partition(rolls: &[u32], modifier: Modifier) -> (Vec<u32>, Vec<u32>) {
    let mut order: Vec<usize> = (0..rolls.len()).collect();
    match modifier.kind {
        ModifierKind::DropLowest | ModifierKind::KeepLowest => {
            order.sort_by_key(|&i| rolls[i]);
        }
        ModifierKind::DropHighest | ModifierKind::KeepHighest => {
            order.sort_by_key(|&i| Reverse(rolls[i]));
        }
    }

    let n = (modifier.n as usize).min(rolls.len());
    let selected_are_kept = matches!(
        modifier.kind,
        ModifierKind::KeepHighest | ModifierKind::KeepLowest
    );
    let mut selected = vec![false; rolls.len()];
    for &i in &order[..n] {
        selected[i] = true;
    }

    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for (&roll, &is_selected) in rolls.iter().zip(&selected) {
        if is_selected == selected_are_kept {
            kept.push(roll);
        } else {
            dropped.push(roll);
        }
    }
    (kept, dropped)
}
