//! Line-based sequence similarity and unified diffs
//!
//! Implements the longest-matching-block algorithm (Ratcliff/Obershelp):
//! find the longest common contiguous run, then recurse on both sides of it.
//! The similarity ratio is `2·M / T`, where `M` is the number of matched
//! elements and `T` the combined length of both sequences.
//!
//! No elements are treated as junk and there is no popularity heuristic,
//! so results depend only on the two inputs.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;

/// A run of equal elements: `a[a_start..a_start+len] == b[b_start..b_start+len]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

/// Edit operation kind between two sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[a_start..a_end]` becomes `b[b_start..b_end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

/// Compares two sequences of hashable elements
pub struct SequenceMatcher<'a, T: Eq + Hash> {
    a: &'a [T],
    b: &'a [T],
    b_index: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b_index: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b_index.entry(item).or_default().push(j);
        }
        Self { a, b, b_index }
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`
    ///
    /// Ties are broken by the earliest start in `a`, then in `b`.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let mut best = Match {
            a_start: alo,
            b_start: blo,
            len: 0,
        };
        // j2len[j] = length of the match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best.len {
                        best = Match {
                            a_start: i + 1 - k,
                            b_start: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            j2len = next;
        }

        best
    }

    /// All matching blocks in order, adjacent blocks merged
    pub fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut pending = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.len == 0 {
                continue;
            }
            if alo < m.a_start && blo < m.b_start {
                pending.push((alo, m.a_start, blo, m.b_start));
            }
            if m.a_start + m.len < ahi && m.b_start + m.len < bhi {
                pending.push((m.a_start + m.len, ahi, m.b_start + m.len, bhi));
            }
            blocks.push(m);
        }
        blocks.sort_by_key(|m| (m.a_start, m.b_start));

        let mut merged: Vec<Match> = Vec::with_capacity(blocks.len());
        for m in blocks {
            match merged.last_mut() {
                Some(last)
                    if last.a_start + last.len == m.a_start
                        && last.b_start + last.len == m.b_start =>
                {
                    last.len += m.len;
                }
                _ => merged.push(m),
            }
        }
        merged
    }

    /// Similarity in `[0, 1]`; `1.0` when both sequences are empty
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matched: usize = self.matching_blocks().iter().map(|m| m.len).sum();
        2.0 * matched as f64 / total as f64
    }

    /// Edit script turning `a` into `b`
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut ops = Vec::new();
        let (mut i, mut j) = (0, 0);
        let sentinel = Match {
            a_start: self.a.len(),
            b_start: self.b.len(),
            len: 0,
        };

        for m in self.matching_blocks().into_iter().chain(std::iter::once(sentinel)) {
            let tag = match (i < m.a_start, j < m.b_start) {
                (true, true) => Some(OpTag::Replace),
                (true, false) => Some(OpTag::Delete),
                (false, true) => Some(OpTag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                ops.push(Opcode {
                    tag,
                    a_start: i,
                    a_end: m.a_start,
                    b_start: j,
                    b_end: m.b_start,
                });
            }
            i = m.a_start + m.len;
            j = m.b_start + m.len;
            if m.len > 0 {
                ops.push(Opcode {
                    tag: OpTag::Equal,
                    a_start: m.a_start,
                    a_end: i,
                    b_start: m.b_start,
                    b_end: j,
                });
            }
        }
        ops
    }

    /// Opcodes grouped into hunks with `context` equal elements around changes
    pub fn grouped_opcodes(&self, context: usize) -> Vec<Vec<Opcode>> {
        let mut codes = self.opcodes();
        if codes.is_empty() {
            codes.push(Opcode {
                tag: OpTag::Equal,
                a_start: 0,
                a_end: 1,
                b_start: 0,
                b_end: 1,
            });
        }

        if let Some(first) = codes.first_mut() {
            if first.tag == OpTag::Equal {
                first.a_start = first.a_start.max(first.a_end.saturating_sub(context));
                first.b_start = first.b_start.max(first.b_end.saturating_sub(context));
            }
        }
        if let Some(last) = codes.last_mut() {
            if last.tag == OpTag::Equal {
                last.a_end = last.a_end.min(last.a_start + context);
                last.b_end = last.b_end.min(last.b_start + context);
            }
        }

        let mut groups = Vec::new();
        let mut group = Vec::new();
        for mut op in codes {
            if op.tag == OpTag::Equal && op.a_end - op.a_start > context * 2 {
                group.push(Opcode {
                    a_end: op.a_end.min(op.a_start + context),
                    b_end: op.b_end.min(op.b_start + context),
                    ..op
                });
                groups.push(std::mem::take(&mut group));
                op.a_start = op.a_start.max(op.a_end.saturating_sub(context));
                op.b_start = op.b_start.max(op.b_end.saturating_sub(context));
            }
            group.push(op);
        }
        if !(group.is_empty() || (group.len() == 1 && group[0].tag == OpTag::Equal)) {
            groups.push(group);
        }
        groups
    }
}

/// Line similarity ratio between two texts
pub fn line_ratio(old: &[&str], new: &[&str]) -> f64 {
    SequenceMatcher::new(old, new).ratio()
}

fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = start + 1;
    match length {
        0 => format!("{},0", beginning - 1),
        1 => format!("{beginning}"),
        _ => format!("{beginning},{length}"),
    }
}

/// Unified diff of two line sequences; empty when they are equal
pub fn unified_diff(
    old: &[&str],
    new: &[&str],
    from_label: &str,
    to_label: &str,
    context: usize,
) -> String {
    let matcher = SequenceMatcher::new(old, new);
    let mut out = String::new();

    for (index, group) in matcher.grouped_opcodes(context).iter().enumerate() {
        if index == 0 {
            let _ = writeln!(out, "--- {from_label}");
            let _ = writeln!(out, "+++ {to_label}");
        }
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            format_range(first.a_start, last.a_end),
            format_range(first.b_start, last.b_end)
        );

        for op in group {
            if op.tag == OpTag::Equal {
                for line in &old[op.a_start..op.a_end] {
                    let _ = writeln!(out, " {line}");
                }
                continue;
            }
            if matches!(op.tag, OpTag::Replace | OpTag::Delete) {
                for line in &old[op.a_start..op.a_end] {
                    let _ = writeln!(out, "-{line}");
                }
            }
            if matches!(op.tag, OpTag::Replace | OpTag::Insert) {
                for line in &new[op.b_start..op.b_end] {
                    let _ = writeln!(out, "+{line}");
                }
            }
        }
    }

    if out.ends_with('\n') {
        out.pop();
    }
    out
}
