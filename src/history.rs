use std::{collections::VecDeque, sync::Arc};

use derive_more::{Display, From, Into};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::rules::dice::RollResult;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_HISTORY_BYTE_BUDGET: usize = 256 * 1024;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

/// A roll as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: SequenceId,
    #[serde(flatten)]
    pub result: RollResult,
}

impl HistoryEntry {
    /// Rough heap + inline footprint, used for the byte budget.
    pub fn approx_bytes(&self) -> usize {
        let rolls: usize = self
            .result
            .groups
            .iter()
            .map(|g| {
                (g.raw_rolls.len() + g.kept_rolls.len() + g.dropped_rolls.len())
                    * std::mem::size_of::<u32>()
            })
            .sum();
        std::mem::size_of::<Self>()
            + self.result.expression.len()
            + self.result.groups.len() * std::mem::size_of::<crate::rules::dice::GroupResult>()
            + rolls
    }

    pub fn pretty_print(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(
            f,
            "#{} {} ",
            self.sequence,
            self.result.timestamp_utc.format("%H:%M:%S%.3f")
        )?;
        self.result.pretty_print(f)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Ascending,
    /// Most recent first.
    Descending,
}

/// Selects entries from a [`RollHistory`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub order: Order,
    /// Only entries with a sequence id strictly greater than this.
    pub after: Option<SequenceId>,
    /// Only entries whose expression text matches exactly.
    pub expression: Option<String>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(limit: usize) -> Self {
        Self::new().order(Order::Descending).limit(limit)
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn after(mut self, sequence: SequenceId) -> Self {
        self.after = Some(sequence);
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &HistoryEntry) -> bool {
        self.after.is_none_or(|after| entry.sequence > after)
            && self
                .expression
                .as_deref()
                .is_none_or(|e| e == entry.result.expression)
    }
}

/// Snapshot of the ledger taken by [`RollHistory::query`].
///
/// Filtering happens lazily while iterating, and the view can be
/// iterated again from the start as many times as needed.
#[derive(Debug, Clone)]
pub struct HistoryView {
    entries: Vec<Arc<HistoryEntry>>,
    query: HistoryQuery,
}

impl HistoryView {
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        let forward = self.entries.iter();
        let ordered: Box<dyn Iterator<Item = &Arc<HistoryEntry>> + '_> = match self.query.order {
            Order::Ascending => Box::new(forward),
            Order::Descending => Box::new(forward.rev()),
        };
        ordered
            .map(|entry| entry.as_ref())
            .filter(|entry| self.query.matches(entry))
            .take(self.query.limit.unwrap_or(usize::MAX))
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a HistoryView {
    type Item = &'a HistoryEntry;
    type IntoIter = Box<dyn Iterator<Item = &'a HistoryEntry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub entries: usize,
    pub bytes: usize,
    pub evicted: u64,
    pub next_sequence: SequenceId,
}

#[derive(Debug)]
struct Ledger {
    entries: VecDeque<Arc<HistoryEntry>>,
    bytes: usize,
    evicted: u64,
    next_sequence: u64,
}

/// Bounded FIFO record of evaluated rolls, safe to share between threads.
#[derive(Debug)]
pub struct RollHistory {
    capacity: usize,
    byte_budget: usize,
    ledger: Mutex<Ledger>,
}

impl Default for RollHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_BYTE_BUDGET)
    }
}

impl RollHistory {
    /// A capacity of zero keeps nothing; sequence ids are still issued.
    pub fn new(capacity: usize, byte_budget: usize) -> Self {
        Self {
            capacity,
            byte_budget,
            ledger: Mutex::new(Ledger {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
                bytes: 0,
                evicted: 0,
                next_sequence: 1,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn byte_budget(&self) -> usize {
        self.byte_budget
    }

    /// Records a copy of `result` and evicts the oldest entries until both
    /// limits hold again. The newest entry is always kept.
    pub fn append(&self, result: &RollResult) -> Arc<HistoryEntry> {
        let mut ledger = self.ledger.lock();
        let sequence = SequenceId(ledger.next_sequence);
        ledger.next_sequence += 1;

        let entry = Arc::new(HistoryEntry {
            sequence,
            result: result.clone(),
        });
        if self.capacity == 0 {
            return entry;
        }

        ledger.bytes += entry.approx_bytes();
        ledger.entries.push_back(entry.clone());

        while ledger.entries.len() > self.capacity
            || (ledger.bytes > self.byte_budget && ledger.entries.len() > 1)
        {
            let Some(oldest) = ledger.entries.pop_front() else {
                break;
            };
            ledger.bytes -= oldest.approx_bytes();
            ledger.evicted += 1;
            log::trace!("evicted roll #{} from history", oldest.sequence);
        }

        entry
    }

    pub fn query(&self, query: HistoryQuery) -> HistoryView {
        let entries = self.ledger.lock().entries.iter().cloned().collect();
        HistoryView { entries, query }
    }

    pub fn latest(&self) -> Option<Arc<HistoryEntry>> {
        self.ledger.lock().entries.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Sequence ids keep increasing afterwards.
    pub fn clear(&self) {
        let mut ledger = self.ledger.lock();
        ledger.entries.clear();
        ledger.bytes = 0;
    }

    pub fn stats(&self) -> HistoryStats {
        let ledger = self.ledger.lock();
        HistoryStats {
            entries: ledger.entries.len(),
            bytes: ledger.bytes,
            evicted: ledger.evicted,
            next_sequence: SequenceId(ledger.next_sequence),
        }
    }

    /// Writes the retained entries, oldest first, as a JSON array.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let entries = self.query(HistoryQuery::new()).to_vec();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &entries)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        random::SourceKind,
        rules::dice::GroupResult,
    };

    fn result(expression: &str, total: i32) -> RollResult {
        RollResult {
            expression: expression.to_string(),
            total,
            groups: vec![GroupResult {
                sides: 6,
                raw_rolls: vec![total as u32],
                kept_rolls: vec![total as u32],
                dropped_rolls: vec![],
                exploded_count: 0,
            }],
            timestamp_utc: chrono::Utc::now(),
            source: SourceKind::Deterministic,
        }
    }

    #[test]
    fn test_append_assigns_increasing_sequence() {
        let history = RollHistory::default();
        let a = history.append(&result("1d6", 3));
        let b = history.append(&result("1d6", 4));
        assert_eq!(a.sequence, SequenceId(1));
        assert_eq!(b.sequence, SequenceId(2));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let history = RollHistory::new(3, usize::MAX);
        for total in 1..=5 {
            history.append(&result("1d6", total));
        }
        assert_eq!(history.len(), 3);
        let totals: Vec<i32> = history
            .query(HistoryQuery::new())
            .iter()
            .map(|e| e.result.total)
            .collect();
        assert_eq!(totals, vec![3, 4, 5]);
        assert_eq!(history.stats().evicted, 2);
    }

    #[test]
    fn test_byte_budget_evicts() {
        let one = HistoryEntry {
            sequence: SequenceId(1),
            result: result("1d6", 1),
        }
        .approx_bytes();
        let history = RollHistory::new(100, one * 2);
        for total in 1..=5 {
            history.append(&result("1d6", total));
        }
        assert_eq!(history.len(), 2);
        assert!(history.stats().bytes <= one * 2);
    }

    #[test]
    fn test_oversized_entry_is_still_kept() {
        let history = RollHistory::new(10, 1);
        history.append(&result("1d6", 1));
        history.append(&result("1d6", 2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().result.total, 2);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let history = RollHistory::new(0, usize::MAX);
        let entry = history.append(&result("1d6", 1));
        assert_eq!(entry.sequence, SequenceId(1));
        assert!(history.is_empty());
    }

    #[test]
    fn test_query_order_filter_and_limit() {
        let history = RollHistory::default();
        history.append(&result("1d6", 1));
        history.append(&result("2d6", 2));
        history.append(&result("1d6", 3));
        history.append(&result("1d6", 4));

        let view = history.query(HistoryQuery::recent(2).expression("1d6"));
        let totals: Vec<i32> = view.iter().map(|e| e.result.total).collect();
        assert_eq!(totals, vec![4, 3]);

        // Views can be walked again from the start.
        let again: Vec<i32> = (&view).into_iter().map(|e| e.result.total).collect();
        assert_eq!(again, totals);

        let after: Vec<u64> = history
            .query(HistoryQuery::new().after(SequenceId(2)))
            .iter()
            .map(|e| e.sequence.into())
            .collect();
        assert_eq!(after, vec![3, 4]);
    }

    #[test]
    fn test_view_is_a_snapshot() {
        let history = RollHistory::default();
        history.append(&result("1d6", 1));
        let view = history.query(HistoryQuery::new());
        history.append(&result("1d6", 2));
        assert_eq!(view.iter().count(), 1);
    }

    #[test]
    fn test_clear_keeps_sequence_running() {
        let history = RollHistory::default();
        history.append(&result("1d6", 1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stats().bytes, 0);
        let entry = history.append(&result("1d6", 2));
        assert_eq!(entry.sequence, SequenceId(2));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let history = RollHistory::default();
        let entry = history.append(&result("1d6", 5));
        let json = serde_json::to_value(entry.as_ref()).unwrap();
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["expression"], "1d6");
        assert_eq!(json["total"], 5);
        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(&back, entry.as_ref());
    }
}
