//! Weighted random selection over pull sources.

use rand::Rng;

/// A non-empty weighted list; `pick` draws one value per call with
/// probability proportional to its weight.
#[derive(Debug, Clone)]
pub struct WeightedSelection<T> {
    items: Vec<(f64, T)>,
    total: f64,
}

impl<T: Copy> WeightedSelection<T> {
    /// Returns `None` for an empty list, a negative weight, or a zero total.
    /// Degenerate weight maps are normalized upstream by configuration
    /// loading, so hitting `None` here is a programming error.
    pub fn new(items: Vec<(f64, T)>) -> Option<Self> {
        if items.is_empty() || items.iter().any(|(w, _)| *w < 0.0) {
            return None;
        }
        let total: f64 = items.iter().map(|(w, _)| w).sum();
        if total <= 0.0 {
            return None;
        }
        Some(WeightedSelection { items, total })
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> T {
        let mut rnd = rng.gen::<f64>() * self.total;
        for (weight, value) in &self.items {
            if rnd < *weight {
                return *value;
            }
            rnd -= weight;
        }
        // float edge: rnd landed exactly on total
        self.items[0].1
    }

    /// Weight assigned to `value`, 0.0 when absent.
    pub fn weight_of(&self, value: T) -> f64
    where
        T: PartialEq,
    {
        self.items
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(w, _)| *w)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(WeightedSelection::<u8>::new(vec![]).is_none());
        assert!(WeightedSelection::new(vec![(0.0, 1u8)]).is_none());
        assert!(WeightedSelection::new(vec![(-1.0, 1u8), (2.0, 2u8)]).is_none());
    }

    #[test]
    fn test_single_winner() {
        let sel = WeightedSelection::new(vec![(0.0, 'a'), (100.0, 'b')]).expect("selection");
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sel.pick(&mut rng), 'b');
        }
    }

    #[test]
    fn test_rough_proportions() {
        let sel = WeightedSelection::new(vec![(75.0, 'a'), (25.0, 'b')]).expect("selection");
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let n = 10_000;
        let hits_a = (0..n).filter(|_| sel.pick(&mut rng) == 'a').count();
        assert!(hits_a > n * 70 / 100, "a drawn {hits_a} of {n}");
        assert!(hits_a < n * 80 / 100, "a drawn {hits_a} of {n}");
    }

    #[test]
    fn test_weight_of() {
        let sel = WeightedSelection::new(vec![(60.0, 'a'), (40.0, 'b')]).expect("selection");
        assert_eq!(sel.weight_of('a'), 60.0);
        assert_eq!(sel.weight_of('z'), 0.0);
    }
}
