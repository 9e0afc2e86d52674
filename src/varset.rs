//! A set of variable indices drawn from `[0, n)`.
//!
//! A word-packed bitset sized to the run's variable count, exposed behind a trait so a
//! reference implementation can stand in for it in tests. [`BitVarSet`] is the production
//! container; [`TreeVarSet`] is the reference one.

use std::collections::BTreeSet;
use std::fmt;

/// Minimal container interface the learning drivers and the orienter need from a variable set.
pub trait VarSet: Clone + PartialEq + Eq + fmt::Debug {
    fn with_capacity(n: usize) -> Self;
    fn insert(&mut self, v: usize) -> bool;
    fn erase(&mut self, v: usize) -> bool;
    fn contains(&self, v: usize) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_>;
    fn union(&self, other: &Self) -> Self;
    fn intersection(&self, other: &Self) -> Self;
    fn difference(&self, other: &Self) -> Self;
    fn is_subset_of(&self, other: &Self) -> bool;
    fn from_iter_usize<I: IntoIterator<Item = usize>>(n: usize, it: I) -> Self {
        let mut s = Self::with_capacity(n);
        for v in it {
            s.insert(v);
        }
        s
    }
}

/// A 64-bit word-packed bitset over `[0, n)`.
#[derive(Clone, PartialEq, Eq)]
pub struct BitVarSet {
    words: Vec<u64>,
    n: usize,
}

const WORD_BITS: usize = 64;

impl BitVarSet {
    fn word_count(n: usize) -> usize {
        (n + WORD_BITS - 1) / WORD_BITS
    }

    pub fn capacity(&self) -> usize {
        self.n
    }

    /// Iterate all subsets of `self` of the given cardinality, in ascending lexicographic order.
    ///
    /// This is the "next combination" enumeration the CI oracle's compound predicates rely on:
    /// subsets are produced smallest-first-element-first, so callers can early-exit a scan
    /// deterministically.
    pub fn subsets(&self, k: usize) -> SubsetIter {
        let elems: Vec<usize> = self.iter().collect();
        SubsetIter::new(elems, k)
    }
}

impl fmt::Debug for BitVarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl VarSet for BitVarSet {
    fn with_capacity(n: usize) -> Self {
        BitVarSet {
            words: vec![0u64; Self::word_count(n)],
            n,
        }
    }

    fn insert(&mut self, v: usize) -> bool {
        debug_assert!(v < self.n, "variable index {v} out of range for {}", self.n);
        let (w, b) = (v / WORD_BITS, v % WORD_BITS);
        let mask = 1u64 << b;
        let was_set = self.words[w] & mask != 0;
        self.words[w] |= mask;
        !was_set
    }

    fn erase(&mut self, v: usize) -> bool {
        if v >= self.n {
            return false;
        }
        let (w, b) = (v / WORD_BITS, v % WORD_BITS);
        let mask = 1u64 << b;
        let was_set = self.words[w] & mask != 0;
        self.words[w] &= !mask;
        was_set
    }

    fn contains(&self, v: usize) -> bool {
        if v >= self.n {
            return false;
        }
        let (w, b) = (v / WORD_BITS, v % WORD_BITS);
        self.words[w] & (1u64 << b) != 0
    }

    fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..WORD_BITS)
                .filter(move |b| word & (1u64 << b) != 0)
                .map(move |b| wi * WORD_BITS + b)
        }))
    }

    fn union(&self, other: &Self) -> Self {
        let n = self.n.max(other.n);
        let mut out = BitVarSet::with_capacity(n);
        for (i, w) in out.words.iter_mut().enumerate() {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            *w = a | b;
        }
        out
    }

    fn intersection(&self, other: &Self) -> Self {
        let n = self.n.max(other.n);
        let mut out = BitVarSet::with_capacity(n);
        for (i, w) in out.words.iter_mut().enumerate() {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            *w = a & b;
        }
        out
    }

    fn difference(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (i, w) in out.words.iter_mut().enumerate() {
            let b = other.words.get(i).copied().unwrap_or(0);
            *w &= !b;
        }
        out
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        self.words.iter().enumerate().all(|(i, &w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & !o == 0
        })
    }
}

/// Reference set implementation (ordered tree set) kept so unit tests can substitute it for
/// [`BitVarSet`] without touching the algorithms under test.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TreeVarSet {
    elems: BTreeSet<usize>,
    n: usize,
}

impl VarSet for TreeVarSet {
    fn with_capacity(n: usize) -> Self {
        TreeVarSet {
            elems: BTreeSet::new(),
            n,
        }
    }

    fn insert(&mut self, v: usize) -> bool {
        self.elems.insert(v)
    }

    fn erase(&mut self, v: usize) -> bool {
        self.elems.remove(&v)
    }

    fn contains(&self, v: usize) -> bool {
        self.elems.contains(&v)
    }

    fn len(&self) -> usize {
        self.elems.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.elems.iter().copied())
    }

    fn union(&self, other: &Self) -> Self {
        TreeVarSet {
            elems: self.elems.union(&other.elems).copied().collect(),
            n: self.n.max(other.n),
        }
    }

    fn intersection(&self, other: &Self) -> Self {
        TreeVarSet {
            elems: self.elems.intersection(&other.elems).copied().collect(),
            n: self.n.max(other.n),
        }
    }

    fn difference(&self, other: &Self) -> Self {
        TreeVarSet {
            elems: self.elems.difference(&other.elems).copied().collect(),
            n: self.n,
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        self.elems.is_subset(&other.elems)
    }
}

/// Enumerates size-`k` subsets of a fixed element list in ascending lexicographic order.
///
/// A "next combination" iterator over index positions: restartable, finite, and cheap to
/// advance one step at a time, which is what the CI oracle's subset scans need.
pub struct SubsetIter {
    elems: Vec<usize>,
    k: usize,
    indices: Vec<usize>,
    done: bool,
}

/// Enumerate size-`k` subsets of an arbitrary element list, independent of which [`VarSet`]
/// impl produced it. Used by the CI oracle's compound predicates, which only need the
/// enumeration order, not a particular container.
pub fn subsets_of(elems: Vec<usize>, k: usize) -> SubsetIter {
    SubsetIter::new(elems, k)
}

impl SubsetIter {
    fn new(elems: Vec<usize>, k: usize) -> Self {
        let done = k > elems.len();
        let indices: Vec<usize> = (0..k).collect();
        SubsetIter {
            elems,
            k,
            indices,
            done,
        }
    }
}

impl Iterator for SubsetIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        if self.k == 0 {
            self.done = true;
            return Some(Vec::new());
        }
        let current: Vec<usize> = self.indices.iter().map(|&i| self.elems[i]).collect();

        // Advance to the next combination of indices, or mark exhausted.
        let n = self.elems.len();
        let mut i = self.k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] != i + n - self.k {
                self.indices[i] += 1;
                for j in (i + 1)..self.k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_basic_ops() {
        let mut s: BitVarSet = VarSet::with_capacity(10);
        assert!(s.insert(3));
        assert!(!s.insert(3));
        assert!(s.contains(3));
        assert_eq!(s.len(), 1);
        assert!(s.erase(3));
        assert!(!s.contains(3));
    }

    #[test]
    fn bitset_spans_multiple_words() {
        let mut s: BitVarSet = VarSet::with_capacity(200);
        s.insert(0);
        s.insert(63);
        s.insert(64);
        s.insert(199);
        let mut v: Vec<usize> = s.iter().collect();
        v.sort();
        assert_eq!(v, vec![0, 63, 64, 199]);
    }

    #[test]
    fn set_algebra() {
        let a = BitVarSet::from_iter_usize(10, [1, 2, 3]);
        let b = BitVarSet::from_iter_usize(10, [2, 3, 4]);
        assert_eq!(a.union(&b).iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![1]);
        assert!(BitVarSet::from_iter_usize(10, [2, 3]).is_subset_of(&a));
    }

    #[test]
    fn subset_iter_enumerates_in_lex_order() {
        let s = BitVarSet::from_iter_usize(10, [1, 2, 3, 4]);
        let subsets: Vec<Vec<usize>> = s.subsets(2).collect();
        assert_eq!(
            subsets,
            vec![
                vec![1, 2],
                vec![1, 3],
                vec![1, 4],
                vec![2, 3],
                vec![2, 4],
                vec![3, 4],
            ]
        );
    }

    #[test]
    fn subset_iter_size_zero_yields_empty_set_once() {
        let s = BitVarSet::from_iter_usize(10, [1, 2]);
        let subsets: Vec<Vec<usize>> = s.subsets(0).collect();
        assert_eq!(subsets, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn subset_iter_size_larger_than_set_is_empty() {
        let s = BitVarSet::from_iter_usize(10, [1, 2]);
        assert_eq!(s.subsets(3).count(), 0);
    }
}
