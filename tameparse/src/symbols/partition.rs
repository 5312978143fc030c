use crate::symbols::{SymbolRange, SymbolSet, SymbolTranslator};
use std::collections::HashMap;

/// Identifier of an atom within a [Partition]. Atom ids are small dense integers assigned
/// in ascending order of the atom's lowest symbol.
pub type AtomId = usize;

/// A partition of a collection of (possibly overlapping) symbol sets into disjoint *atoms*.
///
/// Every original set is the union of whole atoms, so a transition on a set can be rewritten
/// into one transition per member atom without changing the recognised language. Atoms are
/// themselves symbol sets: all elementary intervals that lie in exactly the same subset of the
/// input sets share one atom, which is what keeps lexer transition tables narrow.
#[derive(Clone, Debug)]
pub struct Partition {
    /// The symbols covered by each atom, indexed by atom id
    atoms: Vec<SymbolSet>,
    /// For each input set, the ids of the atoms whose union is that set
    members: Vec<Vec<AtomId>>,
}

impl Partition {
    /// Partitions the supplied sets. Atom ids are assigned during a single ascending sweep
    /// over the range endpoints, so the numbering depends only on the sets' contents and
    /// their order of appearance; repeated runs produce identical partitions.
    pub fn new(sets: &[SymbolSet]) -> Self {
        // Collect every range endpoint across all input sets
        let mut endpoints: Vec<u32> = Vec::new();
        for set in sets {
            for range in set.ranges() {
                endpoints.push(range.lo);
                endpoints.push(range.hi);
            }
        }
        endpoints.sort_unstable();
        endpoints.dedup();

        let mut atoms: Vec<SymbolSet> = Vec::new();
        let mut atom_ranges: Vec<Vec<SymbolRange>> = Vec::new();
        let mut members: Vec<Vec<AtomId>> = vec![Vec::new(); sets.len()];
        // Membership bitmask over the input sets -> atom id
        let mut atom_for_mask: HashMap<Vec<u64>, AtomId> = HashMap::new();

        for window in endpoints.windows(2) {
            let (lo, hi) = (window[0], window[1]);

            // Which input sets contain this elementary interval?
            let mut mask = vec![0u64; (sets.len() + 63) / 64];
            let mut any = false;
            for (idx, set) in sets.iter().enumerate() {
                if set.contains(lo) {
                    mask[idx / 64] |= 1 << (idx % 64);
                    any = true;
                }
            }
            // Symbols outside every set do not get an atom
            if !any {
                continue;
            }

            let atom = *atom_for_mask.entry(mask.clone()).or_insert_with(|| {
                let id = atom_ranges.len();
                atom_ranges.push(Vec::new());
                for (idx, set_members) in members.iter_mut().enumerate() {
                    if mask[idx / 64] & (1 << (idx % 64)) != 0 {
                        set_members.push(id);
                    }
                }
                id
            });
            atom_ranges[atom].push(SymbolRange::new(lo, hi));
        }

        for ranges in atom_ranges {
            atoms.push(SymbolSet::from_ranges(ranges));
        }

        Partition { atoms, members }
    }

    /// The number of atoms in this partition
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// The symbols covered by the atom with the specified id
    pub fn atom(&self, id: AtomId) -> &SymbolSet {
        &self.atoms[id]
    }

    /// The atoms making up each atom id, in ascending id order
    pub fn atoms(&self) -> &[SymbolSet] {
        &self.atoms
    }

    /// The ids of the atoms whose union is the input set with the specified index
    pub fn members(&self, set_index: usize) -> &[AtomId] {
        &self.members[set_index]
    }

    /// Builds the immutable symbol-to-atom lookup table for this partition
    pub fn translator(&self) -> SymbolTranslator {
        SymbolTranslator::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: &[(u32, u32)]) -> SymbolSet {
        SymbolSet::from_ranges(ranges.iter().map(|&(lo, hi)| SymbolRange::new(lo, hi)))
    }

    #[test]
    fn disjoint_sets_get_one_atom_each() {
        let partition = Partition::new(&[set(&[(0, 10)]), set(&[(20, 30)])]);
        assert_eq!(partition.atom_count(), 2);
        assert_eq!(partition.members(0), &[0]);
        assert_eq!(partition.members(1), &[1]);
    }

    #[test]
    fn overlapping_sets_split_into_atoms() {
        let partition = Partition::new(&[set(&[(0, 20)]), set(&[(10, 30)])]);
        // [0,10) only in the first set, [10,20) in both, [20,30) only in the second
        assert_eq!(partition.atom_count(), 3);
        assert_eq!(partition.members(0), &[0, 1]);
        assert_eq!(partition.members(1), &[1, 2]);
    }

    #[test]
    fn identical_membership_shares_an_atom() {
        // Two elementary intervals, both only inside the one input set: a single atom
        let partition = Partition::new(&[set(&[(0, 10), (20, 30)])]);
        assert_eq!(partition.atom_count(), 1);
        assert_eq!(partition.atom(0), &set(&[(0, 10), (20, 30)]));
    }

    #[test]
    fn every_set_is_a_union_of_whole_atoms() {
        let sets = [set(&[(0, 50)]), set(&[(10, 20), (40, 60)]), set(&[(15, 45)])];
        let partition = Partition::new(&sets);
        for (idx, original) in sets.iter().enumerate() {
            let mut union = SymbolSet::empty();
            for &atom in partition.members(idx) {
                // Atoms never straddle a set boundary
                assert!(partition.atom(atom).intersect(original) == *partition.atom(atom));
                union = union.union(partition.atom(atom));
            }
            assert_eq!(&union, original);
        }
    }
}
