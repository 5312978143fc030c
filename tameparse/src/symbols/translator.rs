use crate::symbols::{AtomId, Partition, SymbolRange};

/// An immutable map from symbol to atom id, built once per compiled lexer.
///
/// Internally a sorted list of `(range, atom)` pairs; lookup is a binary search over the
/// ranges, so a translated symbol costs `O(log atoms)`. Symbols outside every atom return
/// `None` (the "no atom" value, encoded as `0xffffffff` in the binary tables).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolTranslator {
    entries: Vec<(SymbolRange, AtomId)>,
}

impl SymbolTranslator {
    pub(crate) fn new(partition: &Partition) -> Self {
        let mut entries: Vec<(SymbolRange, AtomId)> = Vec::new();
        for (atom, set) in partition.atoms().iter().enumerate() {
            for &range in set.ranges() {
                entries.push((range, atom));
            }
        }
        // Atoms are disjoint, so ordering by range orders the whole table
        entries.sort_by_key(|(range, _)| range.lo);
        SymbolTranslator { entries }
    }

    /// Returns the atom containing the given symbol, or `None` if the symbol is outside
    /// every atom of the partition
    pub fn lookup(&self, symbol: u32) -> Option<AtomId> {
        let idx = self
            .entries
            .partition_point(|(range, _)| range.hi <= symbol);
        match self.entries.get(idx) {
            Some((range, atom)) if range.contains(symbol) => Some(*atom),
            _ => None,
        }
    }

    /// The `(range, atom)` pairs of this translator in ascending range order
    pub fn entries(&self) -> &[(SymbolRange, AtomId)] {
        &self.entries
    }
}
