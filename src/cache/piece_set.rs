/// A fixed-capacity set of piece indices.
///
/// Bits are numbered from the high bit of the first byte, like a peer
/// bitfield. Used for the reader-interest and reserved sets, which are
/// always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSet {
    bits: Vec<u8>,
    capacity: usize,
}

impl PieceSet {
    /// Creates an empty set able to hold indices `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(8)],
            capacity,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        let bit_index = 7 - (index % 8);
        (self.bits[index / 8] >> bit_index) & 1 == 1
    }

    /// Adds `index`. Returns false if it was already present or does not fit.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.capacity || self.contains(index) {
            return false;
        }
        let bit_index = 7 - (index % 8);
        self.bits[index / 8] |= 1 << bit_index;
        true
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = 0);
    }

    /// Replaces the contents with `indices`.
    ///
    /// Indices past the capacity are skipped and returned.
    pub fn replace<I>(&mut self, indices: I) -> Vec<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        self.clear();
        let mut rejected = Vec::new();
        for index in indices {
            if index >= self.capacity {
                rejected.push(index);
                continue;
            }
            self.insert(index);
        }
        rejected
    }

    /// Number of indices in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(|&i| self.contains(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut set = PieceSet::new(20);
        assert!(set.is_empty());
        assert!(set.insert(0));
        assert!(set.insert(19));
        assert!(!set.insert(19));
        assert!(set.contains(0));
        assert!(set.contains(19));
        assert!(!set.contains(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_out_of_range() {
        let mut set = PieceSet::new(10);
        assert!(!set.insert(10));
        assert!(!set.contains(10));
        assert!(!set.contains(usize::MAX));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut set = PieceSet::new(16);
        set.replace([1, 2, 3]);
        let rejected = set.replace([5, 5, 40]);

        assert_eq!(rejected, vec![40]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![5]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut set = PieceSet::new(9);
        set.replace([0, 8]);
        set.clear();
        assert!(set.is_empty());
    }
}
