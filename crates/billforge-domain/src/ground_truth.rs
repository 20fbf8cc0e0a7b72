//! Ground truth - the authoritative record of what was injected and where
//!
//! Offending lines are tracked by index. Indices are never trusted across a
//! mutation boundary: any step that deletes or reorders line items must hand
//! back an [`IndexRemap`] and the ground truth is rewritten through it.
//! Duplicate codes make value-based re-matching ambiguous, so there is no
//! fallback that guesses indices from line contents.

use crate::scenario::Irregularity;
use serde::{Deserialize, Serialize};

/// A reference to an offending line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OffendingLine {
    /// The line at this index in the current artifact
    Line {
        /// Current index
        index: usize,
    },
    /// The line was removed by a later step
    Deleted {
        /// Index the line had before it was removed
        original: usize,
    },
}

impl OffendingLine {
    /// Reference to a live line
    pub fn line(index: usize) -> Self {
        OffendingLine::Line { index }
    }

    /// Current index, if the line still exists
    pub fn index(&self) -> Option<usize> {
        match self {
            OffendingLine::Line { index } => Some(*index),
            OffendingLine::Deleted { .. } => None,
        }
    }
}

/// Explicit old-index → new-index map produced by a filtering or reordering step
///
/// # Examples
///
/// ```
/// use billforge_domain::IndexRemap;
///
/// // Lines 0..4, line 1 removed.
/// let remap = IndexRemap::from_retained(&[true, false, true, true]);
/// assert_eq!(remap.get(0), Some(0));
/// assert_eq!(remap.get(1), None);
/// assert_eq!(remap.get(3), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexRemap {
    map: Vec<Option<usize>>,
}

impl IndexRemap {
    /// Map that leaves `len` indices untouched
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..len).map(Some).collect(),
        }
    }

    /// Map for a stable filter: `retained[i]` says whether old line `i` survives
    pub fn from_retained(retained: &[bool]) -> Self {
        let mut next = 0;
        let map = retained
            .iter()
            .map(|keep| {
                if *keep {
                    next += 1;
                    Some(next - 1)
                } else {
                    None
                }
            })
            .collect();
        Self { map }
    }

    /// Map for an arbitrary filter-and-reorder
    ///
    /// `new_order[j]` is the old index of the line now at position `j`.
    /// Old indices absent from `new_order` are treated as removed.
    pub fn from_order(new_order: &[usize], old_len: usize) -> Self {
        let mut map = vec![None; old_len];
        for (new_index, old_index) in new_order.iter().enumerate() {
            if let Some(slot) = map.get_mut(*old_index) {
                *slot = Some(new_index);
            }
        }
        Self { map }
    }

    /// New index for an old index, or `None` if the line was removed
    pub fn get(&self, old: usize) -> Option<usize> {
        self.map.get(old).copied().flatten()
    }

    /// Number of old indices covered
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map covers no indices
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of old lines that were removed
    pub fn removed_count(&self) -> usize {
        self.map.iter().filter(|slot| slot.is_none()).count()
    }

    /// Whether the map changes nothing
    pub fn is_identity(&self) -> bool {
        self.map
            .iter()
            .enumerate()
            .all(|(old, new)| *new == Some(old))
    }

    /// Chain this map with a later one: `self` then `next`
    pub fn then(&self, next: &IndexRemap) -> IndexRemap {
        IndexRemap {
            map: self
                .map
                .iter()
                .map(|slot| slot.and_then(|mid| next.get(mid)))
                .collect(),
        }
    }
}

/// Where and what anomaly the artifact carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Injected irregularity
    pub irregularity: Irregularity,
    /// Offending line references
    #[serde(default)]
    pub offending: Vec<OffendingLine>,
    /// Why the artifact is irregular
    #[serde(default)]
    pub explanation: String,
    /// Expected value versus what the bill shows
    #[serde(default)]
    pub expected_vs_actual: String,
}

impl GroundTruth {
    /// Ground truth for a clean bill
    pub fn clean() -> Self {
        Self::new(Irregularity::None, "No irregularity was injected.")
    }

    /// Ground truth with no offending lines yet
    pub fn new(irregularity: Irregularity, explanation: impl Into<String>) -> Self {
        Self {
            irregularity,
            offending: Vec::new(),
            explanation: explanation.into(),
            expected_vs_actual: String::new(),
        }
    }

    /// Record an offending line (ignored if already present)
    pub fn mark_line(&mut self, index: usize) {
        let reference = OffendingLine::line(index);
        if !self.offending.contains(&reference) {
            self.offending.push(reference);
        }
    }

    /// Indices of offending lines that still exist
    pub fn line_indices(&self) -> Vec<usize> {
        self.offending.iter().filter_map(OffendingLine::index).collect()
    }

    /// Whether any offending line was removed along the way
    pub fn has_deleted_lines(&self) -> bool {
        self.offending
            .iter()
            .any(|o| matches!(o, OffendingLine::Deleted { .. }))
    }

    /// Rewrite offending indices through a remap
    ///
    /// Lines the remap drops become [`OffendingLine::Deleted`] carrying the
    /// index they had before this step.
    pub fn resync(&mut self, remap: &IndexRemap) {
        for reference in &mut self.offending {
            if let OffendingLine::Line { index } = *reference {
                *reference = match remap.get(index) {
                    Some(new_index) => OffendingLine::Line { index: new_index },
                    None => OffendingLine::Deleted { original: index },
                };
            }
        }
    }
}

impl Default for GroundTruth {
    fn default() -> Self {
        Self::clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let remap = IndexRemap::identity(3);
        assert!(remap.is_identity());
        assert_eq!(remap.removed_count(), 0);
    }

    #[test]
    fn test_from_order_reorders() {
        // Old lines [a, b, c] become [c, a]; b removed.
        let remap = IndexRemap::from_order(&[2, 0], 3);
        assert_eq!(remap.get(0), Some(1));
        assert_eq!(remap.get(1), None);
        assert_eq!(remap.get(2), Some(0));
        assert!(!remap.is_identity());
    }

    #[test]
    fn test_then_composes() {
        let first = IndexRemap::from_retained(&[true, false, true, true]);
        let second = IndexRemap::from_retained(&[false, true, true]);
        let chained = first.then(&second);
        assert_eq!(chained.get(0), None);
        assert_eq!(chained.get(1), None);
        assert_eq!(chained.get(2), Some(0));
        assert_eq!(chained.get(3), Some(1));
    }

    #[test]
    fn test_resync_marks_deleted() {
        let mut truth = GroundTruth::new(Irregularity::Duplicate, "dup");
        truth.mark_line(1);
        truth.mark_line(3);
        truth.resync(&IndexRemap::from_retained(&[true, false, true, true]));

        assert_eq!(
            truth.offending,
            vec![
                OffendingLine::Deleted { original: 1 },
                OffendingLine::Line { index: 2 },
            ]
        );
        assert_eq!(truth.line_indices(), vec![2]);
        assert!(truth.has_deleted_lines());
    }

    #[test]
    fn test_resync_leaves_deleted_markers_alone() {
        let mut truth = GroundTruth::new(Irregularity::Duplicate, "dup");
        truth.offending.push(OffendingLine::Deleted { original: 0 });
        truth.resync(&IndexRemap::identity(1));
        assert_eq!(truth.offending, vec![OffendingLine::Deleted { original: 0 }]);
    }

    #[test]
    fn test_out_of_range_index_becomes_deleted() {
        let mut truth = GroundTruth::new(Irregularity::MathError, "math");
        truth.mark_line(7);
        truth.resync(&IndexRemap::identity(2));
        assert_eq!(truth.offending, vec![OffendingLine::Deleted { original: 7 }]);
    }

    #[test]
    fn test_mark_line_is_idempotent() {
        let mut truth = GroundTruth::new(Irregularity::Duplicate, "dup");
        truth.mark_line(0);
        truth.mark_line(0);
        assert_eq!(truth.offending.len(), 1);
    }
}
