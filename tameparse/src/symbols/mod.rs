//! # Symbol universe
//! The lexer construction engine operates on an alphabet of *symbols*: non-negative 32-bit
//! integers, in practice Unicode codepoints. Regular expressions describe [sets](SymbolSet) of
//! symbols as sequences of half-open [ranges](SymbolRange). Because a lexer typically contains
//! many overlapping sets (`[a-z]`, `[a-zA-Z0-9_]`, `"i"`, ...), the transition tables are not
//! keyed by symbol but by *atom*: the [`Partition`] type splits an arbitrary collection of
//! possibly-overlapping sets into disjoint atoms such that every original set is a union of whole
//! atoms, and the [`SymbolTranslator`] maps an input symbol to the atom containing it in
//! `O(log atoms)`.
//!
//! ## Example
//! ```
//! use tameparse::symbols::{SymbolSet, Partition};
//!
//! let lower = SymbolSet::range('a' as u32, 'z' as u32 + 1);
//! let letter_i = SymbolSet::single('i' as u32);
//! let partition = Partition::new(&[lower.clone(), letter_i.clone()]);
//!
//! // 'i' overlaps [a-z]. The symbols in [a-z] but not 'i' all belong to the same
//! // input sets, so they share one (two-range) atom; 'i' itself is the other.
//! assert_eq!(partition.atom_count(), 2);
//! assert_eq!(partition.members(0).len(), 2);
//! assert_eq!(partition.members(1).len(), 1);
//!
//! let translator = partition.translator();
//! assert_eq!(translator.lookup('i' as u32), Some(partition.members(1)[0]));
//! assert_eq!(translator.lookup('!' as u32), None);
//! ```

mod partition;
mod translator;

pub use partition::{AtomId, Partition};
pub use translator::SymbolTranslator;

use std::fmt;

/// One past the largest symbol in the universe. Symbols are Unicode codepoints, so the
/// universe is `0..0x110000`; the `.` regex item and set complements are taken relative
/// to this bound.
pub const SYMBOL_MAX: u32 = 0x110000;

/// A half-open range `[lo, hi)` of symbols. Empty ranges (`lo >= hi`) are never stored
/// in a [SymbolSet].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolRange {
    pub lo: u32,
    pub hi: u32,
}

impl SymbolRange {
    /// Creates the range `[lo, hi)`
    pub fn new(lo: u32, hi: u32) -> Self {
        SymbolRange { lo, hi }
    }

    /// Checks if this range contains the given symbol
    pub fn contains(&self, symbol: u32) -> bool {
        self.lo <= symbol && symbol < self.hi
    }

    /// The number of symbols in this range
    pub fn len(&self) -> u32 {
        self.hi.saturating_sub(self.lo)
    }

    /// Checks if this range is empty
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }
}

impl fmt::Display for SymbolRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo + 1 == self.hi {
            write!(f, "{:#x}", self.lo)
        } else {
            write!(f, "[{:#x}, {:#x})", self.lo, self.hi)
        }
    }
}

/// A set of symbols, stored as a canonical sequence of disjoint, non-adjacent ranges in
/// ascending order. Two sets denote the same language iff they compare equal, so sets can
/// be deduplicated structurally (which the NDFA transition table relies on).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolSet {
    ranges: Vec<SymbolRange>,
}

impl SymbolSet {
    /// Creates an empty symbol set
    pub fn empty() -> Self {
        SymbolSet { ranges: Vec::new() }
    }

    /// Creates a set containing the single range `[lo, hi)`
    pub fn range(lo: u32, hi: u32) -> Self {
        let mut set = SymbolSet::empty();
        if lo < hi {
            set.ranges.push(SymbolRange::new(lo, hi));
        }
        set
    }

    /// Creates a set containing a single symbol
    pub fn single(symbol: u32) -> Self {
        SymbolSet::range(symbol, symbol + 1)
    }

    /// Creates the set of all symbols, `[0, SYMBOL_MAX)`
    pub fn all() -> Self {
        SymbolSet::range(0, SYMBOL_MAX)
    }

    /// Builds a canonical set from an arbitrary list of ranges (overlapping and unordered
    /// ranges are allowed; empty ranges are discarded)
    pub fn from_ranges(ranges: impl IntoIterator<Item = SymbolRange>) -> Self {
        let mut ranges: Vec<SymbolRange> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort();

        let mut canonical: Vec<SymbolRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match canonical.last_mut() {
                // Merge ranges that overlap or touch the previous one
                Some(last) if range.lo <= last.hi => last.hi = last.hi.max(range.hi),
                _ => canonical.push(range),
            }
        }
        SymbolSet { ranges: canonical }
    }

    /// Checks if the specified symbol is a member of this set
    pub fn contains(&self, symbol: u32) -> bool {
        self.ranges
            .binary_search_by(|range| {
                use std::cmp::Ordering;
                if symbol < range.lo {
                    Ordering::Greater
                } else if symbol >= range.hi {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Checks if this set is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The ranges making up this set, disjoint and in ascending order
    pub fn ranges(&self) -> &[SymbolRange] {
        &self.ranges
    }

    /// The total number of symbols in this set
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(|r| r.len() as u64).sum()
    }

    /// The smallest symbol in this set, if any
    pub fn first_symbol(&self) -> Option<u32> {
        self.ranges.first().map(|r| r.lo)
    }

    /// Returns the union of this set and another
    pub fn union(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet::from_ranges(self.ranges.iter().chain(&other.ranges).copied())
    }

    /// Returns the intersection of this set and another
    pub fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo < hi {
                result.push(SymbolRange::new(lo, hi));
            }
            // Advance whichever range ends first
            if a.hi <= b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        // Built in order and already disjoint
        SymbolSet { ranges: result }
    }

    /// Returns the complement of this set relative to the symbol universe `[0, SYMBOL_MAX)`
    pub fn complement(&self) -> SymbolSet {
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for range in &self.ranges {
            if next < range.lo {
                result.push(SymbolRange::new(next, range.lo));
            }
            next = range.hi;
        }
        if next < SYMBOL_MAX {
            result.push(SymbolRange::new(next, SYMBOL_MAX));
        }
        SymbolSet { ranges: result }
    }

    /// Returns the symbols in this set that are not in `other`
    pub fn difference(&self, other: &SymbolSet) -> SymbolSet {
        self.intersect(&other.complement())
    }
}

impl From<SymbolRange> for SymbolSet {
    fn from(range: SymbolRange) -> Self {
        SymbolSet::from_ranges([range])
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, range) in self.ranges.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "}}")
    }
}
