//! Move detection over alignment opcodes.

use std::collections::HashMap;
use std::ops::Range;

use super::align::Opcode;
use super::options::MovePolicy;
use crate::model::Classification;

/// Occurrence counts of normalized texts.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn from_texts<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = HashMap::new();
        for text in texts {
            *counts.entry(text.to_string()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, text: &str) -> usize {
        self.counts.get(text).copied().unwrap_or(0)
    }

    /// Take one instance of `text` out of the table, if any is left.
    fn take(&mut self, text: &str) -> bool {
        match self.counts.get_mut(text) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Per-token classes of one aligned scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeClasses {
    /// One entry per source token: unchanged, deleted or moved
    pub source: Vec<Classification>,
    /// One entry per target token: unchanged, added or moved
    pub target: Vec<Classification>,
}

/// Reclassifies non-matching tokens as moved when their text exists on the
/// other side.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveClassifier {
    policy: MovePolicy,
}

impl MoveClassifier {
    pub fn new(policy: MovePolicy) -> Self {
        Self { policy }
    }

    /// Classify every token of both sequences of one scope.
    pub fn classify(&self, source: &[&str], target: &[&str], opcodes: &[Opcode]) -> ScopeClasses {
        let mut classes = ScopeClasses {
            source: vec![Classification::Unchanged; source.len()],
            target: vec![Classification::Unchanged; target.len()],
        };

        let (mut source_pool, mut target_pool) = match self.policy {
            MovePolicy::Presence => (
                FrequencyTable::from_texts(source.iter().copied()),
                FrequencyTable::from_texts(target.iter().copied()),
            ),
            MovePolicy::Consume => (
                unmatched_counts(source, opcodes, Opcode::a),
                unmatched_counts(target, opcodes, Opcode::b),
            ),
        };

        for op in opcodes.iter().filter(|op| !op.is_equal()) {
            for i in op.a() {
                classes.source[i] = if self.counterpart(&mut target_pool, source[i]) {
                    Classification::Moved
                } else {
                    Classification::Deleted
                };
            }
            for j in op.b() {
                classes.target[j] = if self.counterpart(&mut source_pool, target[j]) {
                    Classification::Moved
                } else {
                    Classification::Added
                };
            }
        }

        classes
    }

    fn counterpart(&self, pool: &mut FrequencyTable, text: &str) -> bool {
        match self.policy {
            MovePolicy::Presence => pool.count(text) > 0,
            MovePolicy::Consume => pool.take(text),
        }
    }
}

/// Counts of the texts outside equal spans on one side.
fn unmatched_counts(seq: &[&str], opcodes: &[Opcode], span: fn(&Opcode) -> Range<usize>) -> FrequencyTable {
    FrequencyTable::from_texts(
        opcodes
            .iter()
            .filter(|op| !op.is_equal())
            .flat_map(|op| span(op))
            .map(|i| seq[i]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::align::align;
    use Classification::*;

    fn classify(policy: MovePolicy, a: &[&str], b: &[&str]) -> ScopeClasses {
        MoveClassifier::new(policy).classify(a, b, &align(a, b))
    }

    #[test]
    fn test_replace_is_added_and_deleted() {
        let c = classify(MovePolicy::Presence, &["brun", "200ml"], &["tes", "200ml"]);
        assert_eq!(c.source, vec![Deleted, Unchanged]);
        assert_eq!(c.target, vec![Added, Unchanged]);
    }

    #[test]
    fn test_relocated_word_is_moved_on_both_sides() {
        let a = ["miel", "pot", "fleurs", "100g", "x", "lot", "bio", "sucre"];
        let b = ["miel", "pot", "fleurs", "100g", "y", "bio", "sucre", "z", "w", "lot"];
        let c = classify(MovePolicy::Presence, &a, &b);
        assert_eq!(c.source[5], Moved);
        assert_eq!(c.target[9], Moved);
        assert_eq!(c.source[4], Deleted);
        assert_eq!(c.target[4], Added);
    }

    #[test]
    fn test_presence_counts_equal_spans() {
        // The extra "lot" in b has a counterpart only inside the equal span.
        let c = classify(MovePolicy::Presence, &["lot", "a"], &["lot", "a", "lot"]);
        assert_eq!(c.target, vec![Unchanged, Unchanged, Moved]);

        let c = classify(MovePolicy::Consume, &["lot", "a"], &["lot", "a", "lot"]);
        assert_eq!(c.target, vec![Unchanged, Unchanged, Added]);
    }

    #[test]
    fn test_consume_matches_one_to_one() {
        let a = ["k", "lot", "m"];
        let b = ["lot", "lot", "k", "q"];
        let presence = classify(MovePolicy::Presence, &a, &b);
        let consume = classify(MovePolicy::Consume, &a, &b);

        let moved = |v: &[Classification]| v.iter().filter(|c| **c == Moved).count();
        assert_eq!(moved(&presence.target), 2);
        assert_eq!(moved(&consume.target), 1);
    }

    #[test]
    fn test_frequency_table() {
        let mut table = FrequencyTable::from_texts(["a", "b", "a"]);
        assert_eq!(table.count("a"), 2);
        assert_eq!(table.count("z"), 0);
        assert!(table.take("b"));
        assert!(!table.take("b"));
    }
}
