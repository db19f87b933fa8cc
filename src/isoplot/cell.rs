use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Identifies one stamped primitive. Allocated in strictly increasing order starting at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuilderId(u32);

impl BuilderId {
    pub const FIRST: BuilderId = BuilderId(1);

    pub fn value(&self) -> u32 {
        self.0
    }

    pub(crate) fn next(&self) -> BuilderId {
        BuilderId(self.0 + 1)
    }

    pub(crate) fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl Display for BuilderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a builder id occupies a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsageTag {
    /// Isolation boundary drawn under dark polarity.
    NormalEdge,
    /// Erase boundary, clear polarity and holes.
    InvertEdge,
    /// Zero-width region boundary.
    ContourEdge,
    /// Interior of a shape that adds copper.
    BackgroundFill,
    /// Interior of a shape that removes copper.
    EraseFill,
}

impl UsageTag {
    pub fn is_edge(&self) -> bool {
        matches!(self, UsageTag::NormalEdge | UsageTag::InvertEdge | UsageTag::ContourEdge)
    }

    pub fn is_fill(&self) -> bool {
        !self.is_edge()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillMode {
    /// Flood the interior as copper.
    Background,
    /// Flood the interior as removed copper.
    Erase,
    /// Boundary only.
    None,
}

impl FillMode {
    pub fn fill_tag(&self) -> Option<UsageTag> {
        match self {
            FillMode::Background => Some(UsageTag::BackgroundFill),
            FillMode::Erase => Some(UsageTag::EraseFill),
            FillMode::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Usage {
    pub id: BuilderId,
    pub tag: UsageTag,
}

impl Usage {
    pub fn new(id: BuilderId, tag: UsageTag) -> Self {
        Self {
            id,
            tag,
        }
    }
}

/// A grid cell, most cells are touched by at most one object so the single pair is stored inline and the overlay list
/// is only allocated when a second object claims the cell. The list is boxed to keep the cell at 16 bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Single(Usage),
    Overlay(Box<Vec<Usage>>),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_overlay(&self) -> bool {
        matches!(self, Cell::Overlay(_))
    }

    /// Usages in the order they were stamped.
    pub fn usages(&self) -> &[Usage] {
        match self {
            Cell::Empty => &[],
            Cell::Single(usage) => std::slice::from_ref(usage),
            Cell::Overlay(usages) => usages.as_slice(),
        }
    }

    pub fn contains(&self, id: BuilderId) -> bool {
        self.usage_of(id).is_some()
    }

    pub fn usage_of(&self, id: BuilderId) -> Option<Usage> {
        self.usages()
            .iter()
            .find(|usage| usage.id == id)
            .copied()
    }

    pub fn has_edge(&self) -> bool {
        self.usages()
            .iter()
            .any(|usage| usage.tag.is_edge())
    }

    /// Adds a usage unless the id already occupies the cell, an edge is never downgraded by a later fill of the same id.
    ///
    /// Returns `true` if the cell changed.
    pub fn add(&mut self, usage: Usage) -> bool {
        if self.contains(usage.id) {
            return false;
        }
        match self {
            Cell::Empty => *self = Cell::Single(usage),
            Cell::Single(existing) => *self = Cell::Overlay(Box::new(vec![*existing, usage])),
            Cell::Overlay(usages) => usages.push(usage),
        }
        true
    }

    /// Removes every usage for which `predicate` returns true, collapsing the overlay when one usage remains.
    ///
    /// Returns `true` if the cell changed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> bool
    where
        F: FnMut(&Usage) -> bool,
    {
        match self {
            Cell::Empty => false,
            Cell::Single(usage) => {
                if predicate(usage) {
                    *self = Cell::Empty;
                    true
                } else {
                    false
                }
            }
            Cell::Overlay(usages) => {
                let before = usages.len();
                usages.retain(|usage| !predicate(usage));
                let changed = usages.len() != before;
                match usages.len() {
                    0 => *self = Cell::Empty,
                    1 => *self = Cell::Single(usages[0]),
                    _ => {}
                }
                changed
            }
        }
    }
}

/// A set of builder ids used as erase targets.
#[derive(Debug, Clone, PartialEq)]
pub enum IdSet {
    /// Every id in the range, typically all objects stamped before an eraser.
    Range(Range<BuilderId>),
    /// Explicit ids, e.g. the ids owned by one flash.
    Ids(Vec<BuilderId>),
}

impl IdSet {
    pub fn contains(&self, id: BuilderId) -> bool {
        match self {
            IdSet::Range(range) => range.contains(&id),
            IdSet::Ids(ids) => ids.contains(&id),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            IdSet::Range(range) => range.is_empty(),
            IdSet::Ids(ids) => ids.is_empty(),
        }
    }
}

#[cfg(test)]
mod cell_tests {
    use super::*;

    fn usage(id: u32, tag: UsageTag) -> Usage {
        Usage::new(BuilderId(id), tag)
    }

    #[test]
    fn test_second_object_creates_overlay_in_stamp_order() {
        // given
        let mut cell = Cell::default();

        // when
        cell.add(usage(1, UsageTag::NormalEdge));
        assert!(matches!(cell, Cell::Single(_)));
        cell.add(usage(2, UsageTag::BackgroundFill));

        // then
        assert_eq!(cell.usages(), &[
            usage(1, UsageTag::NormalEdge),
            usage(2, UsageTag::BackgroundFill)
        ]);
        assert!(cell.is_overlay());
    }

    #[test]
    fn test_same_id_is_not_added_twice() {
        let mut cell = Cell::default();
        assert!(cell.add(usage(1, UsageTag::NormalEdge)));
        assert!(!cell.add(usage(1, UsageTag::BackgroundFill)));
        assert_eq!(cell, Cell::Single(usage(1, UsageTag::NormalEdge)));
    }

    #[test]
    fn test_remove_collapses_overlay() {
        // given
        let mut cell = Cell::default();
        cell.add(usage(1, UsageTag::NormalEdge));
        cell.add(usage(2, UsageTag::InvertEdge));
        cell.add(usage(3, UsageTag::EraseFill));

        // when
        let changed = cell.remove_where(|usage| usage.id != BuilderId(2));

        // then
        assert!(changed);
        assert_eq!(cell, Cell::Single(usage(2, UsageTag::InvertEdge)));

        // and
        assert!(cell.remove_where(|_| true));
        assert!(cell.is_empty());
    }

    #[test]
    fn test_cell_stays_small() {
        assert_eq!(std::mem::size_of::<Usage>(), 8);
        assert!(std::mem::size_of::<Cell>() <= 16);
    }

    #[test]
    fn test_id_set() {
        let range = IdSet::Range(BuilderId(2)..BuilderId(5));
        assert!(!range.contains(BuilderId(1)));
        assert!(range.contains(BuilderId(4)));
        assert!(!range.contains(BuilderId(5)));

        let ids = IdSet::Ids(vec![BuilderId(7)]);
        assert!(ids.contains(BuilderId(7)));
        assert!(IdSet::Ids(vec![]).is_empty());
    }
}
