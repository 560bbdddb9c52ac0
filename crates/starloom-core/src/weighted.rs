//! [`WeightedList<T>`]: random choice in proportion to positive weights.

use rand::Rng;

/// Values with positive integer weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedList<T> {
    items: Vec<(T, u64)>,
    total: u64,
}

impl<T> Default for WeightedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

impl<T> WeightedList<T> {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` with `weight`. Weights of zero or less are ignored.
    pub fn push(&mut self, value: T, weight: i64) {
        let Ok(weight) = u64::try_from(weight) else {
            return;
        };
        if weight == 0 {
            return;
        }
        self.total = self.total.saturating_add(weight);
        self.items.push((value, weight));
    }

    /// Sum of all weights.
    pub const fn total_weight(&self) -> u64 {
        self.total
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there is nothing to pick.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Values and weights in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, u64)> {
        self.items.iter().map(|(v, w)| (v, *w))
    }

    /// Mutable access to the values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().map(|(v, _)| v)
    }

    /// Pick one value with probability proportional to its weight, or
    /// `None` if the list is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        if self.total == 0 {
            return None;
        }
        let mut roll = rng.random_range(0..self.total);
        for (value, weight) in &self.items {
            if roll < *weight {
                return Some(value);
            }
            roll = roll.saturating_sub(*weight);
        }
        self.items.last().map(|(v, _)| v)
    }

    /// Remove every value matching `predicate`. Returns how many went.
    pub fn erase_if<F: FnMut(&T) -> bool>(&mut self, mut predicate: F) -> usize {
        let before = self.items.len();
        self.items.retain(|(v, _)| !predicate(v));
        self.total = self.items.iter().fold(0u64, |sum, (_, w)| sum.saturating_add(*w));
        before.saturating_sub(self.items.len())
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn ignores_non_positive_weights() {
        let mut list = WeightedList::new();
        list.push("a", 0);
        list.push("b", -3);
        list.push("c", 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list.total_weight(), 2);
    }

    #[test]
    fn empty_pick_is_none() {
        let list: WeightedList<u8> = WeightedList::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(list.pick(&mut rng).is_none());
    }

    #[test]
    fn picks_follow_weights() {
        let mut list = WeightedList::new();
        list.push("rare", 1);
        list.push("common", 99);
        let mut rng = StdRng::seed_from_u64(7);
        let common = (0..1000)
            .filter(|_| list.pick(&mut rng) == Some(&"common"))
            .count();
        assert!(common > 900, "common picked {common} times");
    }

    #[test]
    fn same_seed_same_picks() {
        let mut list = WeightedList::new();
        for (i, w) in [3, 1, 4, 1, 5].into_iter().enumerate() {
            list.push(i, w);
        }
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20).map(|_| *list.pick(&mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn erase_if_updates_total() {
        let mut list = WeightedList::new();
        list.push(1, 5);
        list.push(2, 7);
        assert_eq!(list.erase_if(|v| *v == 1), 1);
        assert_eq!(list.total_weight(), 7);
    }
}
