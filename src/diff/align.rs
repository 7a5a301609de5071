//! Sequence alignment.
//!
//! Longest-matching-block alignment: find the longest common run, recurse on
//! the parts left and right of it, then turn the matching blocks into a gapless
//! list of opcodes. There is no junk heuristic; every element takes part in
//! matching. On equal lengths the block starting earliest in `a` wins, then the
//! one starting earliest in `b`.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

use serde::Serialize;

/// Kind of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpTag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// One step of an alignment: `a[a_range]` relates to `b[b_range]` as `tag`.
///
/// Opcodes are only produced by [`align`], so their spans always partition
/// both input sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opcode {
    tag: OpTag,
    a: Range<usize>,
    b: Range<usize>,
}

impl Opcode {
    pub fn tag(&self) -> OpTag {
        self.tag
    }

    /// Span in the first sequence.
    pub fn a(&self) -> Range<usize> {
        self.a.clone()
    }

    /// Span in the second sequence.
    pub fn b(&self) -> Range<usize> {
        self.b.clone()
    }

    pub fn is_equal(&self) -> bool {
        self.tag == OpTag::Equal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Block {
    a: usize,
    b: usize,
    len: usize,
}

/// Align two sequences and return the opcodes transforming `a` into `b`.
pub fn align<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let blocks = matching_blocks(a, b);
    let opcodes = opcodes_from_blocks(&blocks);
    debug_assert!(is_partition(&opcodes, a.len(), b.len()));
    opcodes
}

/// Check that opcodes cover `0..len_a` and `0..len_b` contiguously.
pub fn is_partition(opcodes: &[Opcode], len_a: usize, len_b: usize) -> bool {
    let mut i = 0;
    let mut j = 0;
    for op in opcodes {
        if op.a.start != i || op.b.start != j {
            return false;
        }
        let ok = match op.tag {
            OpTag::Equal => op.a.len() == op.b.len() && !op.a.is_empty(),
            OpTag::Delete => !op.a.is_empty() && op.b.is_empty(),
            OpTag::Insert => op.a.is_empty() && !op.b.is_empty(),
            OpTag::Replace => !op.a.is_empty() && !op.b.is_empty(),
        };
        if !ok {
            return false;
        }
        i = op.a.end;
        j = op.b.end;
    }
    i == len_a && j == len_b
}

fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Block> {
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }

    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut found = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let block = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if block.len == 0 {
            continue;
        }
        if alo < block.a && blo < block.b {
            pending.push((alo, block.a, blo, block.b));
        }
        if block.a + block.len < ahi && block.b + block.len < bhi {
            pending.push((block.a + block.len, ahi, block.b + block.len, bhi));
        }
        found.push(block);
    }
    found.sort();

    // Coalesce blocks that touch in both sequences.
    let mut blocks: Vec<Block> = Vec::with_capacity(found.len() + 1);
    for block in found {
        match blocks.last_mut() {
            Some(last) if last.a + last.len == block.a && last.b + last.len == block.b => {
                last.len += block.len;
            }
            _ => blocks.push(block),
        }
    }
    blocks.push(Block {
        a: a.len(),
        b: b.len(),
        len: 0,
    });
    blocks
}

fn longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> Block {
    let mut best = Block {
        a: alo,
        b: blo,
        len: 0,
    };
    // Length of the match ending at (i - 1, j), keyed by j.
    let mut run_len: HashMap<usize, usize> = HashMap::new();

    for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_len = HashMap::new();
        if let Some(positions) = b2j.get(item) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| run_len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_len.insert(j, k);
                if k > best.len {
                    best = Block {
                        a: i + 1 - k,
                        b: j + 1 - k,
                        len: k,
                    };
                }
            }
        }
        run_len = next_len;
    }
    best
}

fn opcodes_from_blocks(blocks: &[Block]) -> Vec<Opcode> {
    let mut opcodes = Vec::new();
    let mut i = 0;
    let mut j = 0;

    for block in blocks {
        let tag = match (i < block.a, j < block.b) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            opcodes.push(Opcode {
                tag,
                a: i..block.a,
                b: j..block.b,
            });
        }
        i = block.a + block.len;
        j = block.b + block.len;
        if block.len > 0 {
            opcodes.push(Opcode {
                tag: OpTag::Equal,
                a: block.a..i,
                b: block.b..j,
            });
        }
    }
    opcodes
}
