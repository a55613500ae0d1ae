//! Candidate generation strategies.

use hb_types::{Configuration, SearchSpace};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A strategy proposes configurations one at a time.
pub trait SearchStrategy: Send {
    /// Next candidate, or `None` once the strategy has nothing left to propose.
    fn suggest(&mut self, rng: &mut ChaCha8Rng) -> Option<Configuration>;

    /// Feed back the observed loss of a configuration.
    fn report(&mut self, _config: &Configuration, _loss: f64) {}

    fn name(&self) -> &str;
}

/// Serializable choice of strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Random,
    Grid { steps: usize },
}

impl StrategyKind {
    pub fn build(&self, space: &SearchSpace) -> Box<dyn SearchStrategy> {
        match self {
            Self::Random => Box::new(RandomSearch::new(space.clone())),
            Self::Grid { steps } => Box::new(GridSearch::new(space, *steps)),
        }
    }
}

// ---- Grid search ----

/// Exhaustive enumeration of a discretised search space.
#[derive(Debug, Clone)]
pub struct GridSearch {
    cursor: usize,
    combos: Vec<Configuration>,
}

impl GridSearch {
    pub fn new(space: &SearchSpace, float_steps: usize) -> Self {
        Self {
            cursor: 0,
            combos: space.grid(float_steps),
        }
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, _rng: &mut ChaCha8Rng) -> Option<Configuration> {
        let combo = self.combos.get(self.cursor).cloned();
        self.cursor += 1;
        combo
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
}

impl RandomSearch {
    pub fn new(space: SearchSpace) -> Self {
        Self { space }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, rng: &mut ChaCha8Rng) -> Option<Configuration> {
        Some(self.space.sample(rng))
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_int("a", 1, 3, 1)
            .add_int("b", 10, 11, 10)
            .add_float("c", 0.0, 1.0, 0.5)
    }

    #[test]
    fn test_grid_search_is_exhaustive_then_stops() {
        let space = SearchSpace::new().add_int("a", 1, 3, 1).add_int("b", 10, 11, 10);
        let mut grid = GridSearch::new(&space, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(grid.len(), 6);

        let mut seen = Vec::new();
        while let Some(config) = grid.suggest(&mut rng) {
            seen.push(config);
        }
        assert_eq!(seen.len(), 6);
        assert!(grid.suggest(&mut rng).is_none());
    }

    #[test]
    fn test_random_search_is_seeded() {
        let space = sample_space();
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut strategy = RandomSearch::new(space.clone());
            (0..5)
                .map(|_| strategy.suggest(&mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
        assert_ne!(draw(3), draw(4));
        for config in draw(5) {
            space.validate(&config).unwrap();
        }
    }

    #[test]
    fn test_strategy_kind_from_json() {
        let kind: StrategyKind = serde_json::from_str(r#"{"kind": "grid", "steps": 3}"#).unwrap();
        assert_eq!(kind, StrategyKind::Grid { steps: 3 });
        assert_eq!(kind.build(&sample_space()).name(), "grid");
        assert_eq!(StrategyKind::default().build(&sample_space()).name(), "random");
    }
}
