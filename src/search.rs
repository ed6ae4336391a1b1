//! Grid and random hyperparameter search over cross-validated scores.
//!
//! A search owns a parameter space and an enumeration strategy; the caller
//! supplies a mapping from a [`Candidate`] to a [`ModelConfig`]. Candidates
//! whose mapping or evaluation fails with a hyperparameter error keep
//! their trial entry with no score, so a grid mixing valid and invalid
//! combinations still completes and the caller can see what was skipped.
//! Data errors propagate.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, warn};

use crate::cv::{cross_validate, FoldScores, StratifiedKFold};
use crate::dataset::Dataset;
use crate::error::ThicketError;
use crate::metrics::Metric;
use crate::model::ModelConfig;

/// One hyperparameter value.
///
/// Equality and hashing treat floats bitwise, so a candidate's identity is
/// its exact value tuple and candidates can key a map.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ParamValue {
    /// An integer value (tree counts, depths, node sizes).
    Int(i64),
    /// A floating-point value (pruning strengths).
    Float(f64),
    /// A named choice (mtry policies, criteria).
    Text(String),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl std::hash::Hash for ParamValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParamValue::Int(v) => v.hash(state),
            ParamValue::Float(v) => v.to_bits().hash(state),
            ParamValue::Text(v) => v.hash(state),
        }
    }
}

impl ParamValue {
    /// Return the integer payload, if this is an [`ParamValue::Int`].
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Return the value as `f64`. Integers coerce; text does not.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    /// Return the text payload, if this is a [`ParamValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One named parameter assignment, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    values: Vec<(String, ParamValue)>,
}

impl Candidate {
    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Return all assignments in declaration order.
    #[must_use]
    pub fn values(&self) -> &[(String, ParamValue)] {
        &self.values
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// An exhaustive grid: every combination of the declared value lists.
///
/// Enumeration is deterministic: the first-declared parameter varies
/// slowest, the last-declared fastest.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    /// Create an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its candidate values.
    #[must_use]
    pub fn add(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.params.push((name.into(), values));
        self
    }

    /// Enumerate every combination.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::EmptySearchSpace`] when no parameter was
    /// declared, and [`ThicketError::EmptyDomain`] when a parameter has no
    /// values.
    pub fn candidates(&self) -> Result<Vec<Candidate>, ThicketError> {
        if self.params.is_empty() {
            return Err(ThicketError::EmptySearchSpace);
        }
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(ThicketError::EmptyDomain { name: name.clone() });
            }
        }

        let total: usize = self.params.iter().map(|(_, v)| v.len()).product();
        let mut out = Vec::with_capacity(total);
        let mut cursor = vec![0usize; self.params.len()];
        loop {
            let values: Vec<(String, ParamValue)> = self
                .params
                .iter()
                .zip(&cursor)
                .map(|((name, vals), &i)| (name.clone(), vals[i].clone()))
                .collect();
            out.push(Candidate { values });

            // Odometer increment, last-declared parameter fastest.
            let mut pos = self.params.len();
            loop {
                if pos == 0 {
                    return Ok(out);
                }
                pos -= 1;
                cursor[pos] += 1;
                if cursor[pos] < self.params[pos].1.len() {
                    break;
                }
                cursor[pos] = 0;
            }
        }
    }
}

/// The domain a random search samples one parameter from.
#[derive(Debug, Clone)]
pub enum ParamDomain {
    /// Uniform choice among explicit values.
    Values(Vec<ParamValue>),
    /// Uniform integer in `[low, high]` inclusive.
    IntRange {
        /// Lower bound, inclusive.
        low: i64,
        /// Upper bound, inclusive.
        high: i64,
    },
    /// Uniform float in `[low, high)`.
    FloatRange {
        /// Lower bound, inclusive.
        low: f64,
        /// Upper bound, exclusive.
        high: f64,
    },
}

/// A sampling space for random search.
#[derive(Debug, Clone, Default)]
pub struct RandomSpace {
    params: Vec<(String, ParamDomain)>,
}

impl RandomSpace {
    /// Create an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its sampling domain.
    #[must_use]
    pub fn add(mut self, name: impl Into<String>, domain: ParamDomain) -> Self {
        self.params.push((name.into(), domain));
        self
    }

    /// Draw `n_trials` candidates. Duplicates are allowed; every draw is an
    /// independent sample of each parameter in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::EmptySearchSpace`] when no parameter was
    /// declared, and [`ThicketError::EmptyDomain`] when a domain holds no
    /// values or its bounds are inverted or non-finite.
    pub fn sample(&self, n_trials: usize, seed: u64) -> Result<Vec<Candidate>, ThicketError> {
        if self.params.is_empty() {
            return Err(ThicketError::EmptySearchSpace);
        }
        for (name, domain) in &self.params {
            let empty = match domain {
                ParamDomain::Values(values) => values.is_empty(),
                ParamDomain::IntRange { low, high } => low > high,
                ParamDomain::FloatRange { low, high } => {
                    !(low.is_finite() && high.is_finite()) || low >= high
                }
            };
            if empty {
                return Err(ThicketError::EmptyDomain { name: name.clone() });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut out = Vec::with_capacity(n_trials);
        for _ in 0..n_trials {
            let values: Vec<(String, ParamValue)> = self
                .params
                .iter()
                .map(|(name, domain)| {
                    let value = match domain {
                        ParamDomain::Values(values) => {
                            values[rng.gen_range(0..values.len())].clone()
                        }
                        ParamDomain::IntRange { low, high } => {
                            ParamValue::Int(rng.gen_range(*low..=*high))
                        }
                        ParamDomain::FloatRange { low, high } => {
                            ParamValue::Float(rng.gen_range(*low..*high))
                        }
                    };
                    (name.clone(), value)
                })
                .collect();
            out.push(Candidate { values });
        }
        Ok(out)
    }
}

/// One candidate and its search outcome.
#[derive(Debug, Clone)]
pub struct Trial {
    /// The parameter assignment.
    pub candidate: Candidate,
    /// Its cross-validated fold scores; `None` when the candidate was
    /// skipped because its configuration was rejected.
    pub scores: Option<FoldScores>,
}

/// The outcome of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// One trial per candidate, in enumeration order. Skipped candidates
    /// keep their trial entry with `scores: None`.
    pub trials: Vec<Trial>,
    /// Number of candidates skipped because their configuration was
    /// rejected.
    pub n_skipped: usize,
}

impl SearchResult {
    /// Return the scored trial with the highest mean score, ignoring
    /// skipped candidates.
    ///
    /// Ties resolve to the earliest-enumerated trial, so results are
    /// reproducible across runs.
    #[must_use]
    pub fn best(&self) -> Option<&Trial> {
        let mut best: Option<(&Trial, f64)> = None;
        for trial in &self.trials {
            let Some(scores) = &trial.scores else {
                continue;
            };
            let mean = scores.mean();
            let better = match best {
                None => true,
                Some((_, best_mean)) => mean > best_mean,
            };
            if better {
                best = Some((trial, mean));
            }
        }
        best.map(|(trial, _)| trial)
    }
}

/// Exhaustive grid search.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
}

impl GridSearch {
    /// Create a grid search over the given grid.
    #[must_use]
    pub fn new(grid: ParamGrid) -> Self {
        Self { grid }
    }

    /// Cross-validate every grid combination.
    ///
    /// `map` turns a candidate into a concrete [`ModelConfig`]. Candidates
    /// whose mapping or training fails a hyperparameter check are recorded
    /// scoreless; other errors abort the search.
    ///
    /// # Errors
    ///
    /// Returns grid-enumeration errors and any non-hyperparameter error
    /// raised during evaluation.
    #[instrument(skip_all, fields(n_samples = data.n_samples()))]
    pub fn run<F>(
        &self,
        data: &Dataset,
        folds: &StratifiedKFold,
        metric: Metric,
        map: F,
    ) -> Result<SearchResult, ThicketError>
    where
        F: Fn(&Candidate) -> Result<ModelConfig, ThicketError>,
    {
        let candidates = self.grid.candidates()?;
        info!(n_candidates = candidates.len(), %metric, "grid search started");
        run_candidates(data, folds, metric, &candidates, map)
    }
}

/// Seeded random search.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: RandomSpace,
    n_trials: usize,
    seed: u64,
}

impl RandomSearch {
    /// Create a random search drawing `n_trials` candidates from `space`.
    #[must_use]
    pub fn new(space: RandomSpace, n_trials: usize) -> Self {
        Self {
            space,
            n_trials,
            seed: 42,
        }
    }

    /// Set the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cross-validate `n_trials` sampled candidates.
    ///
    /// # Errors
    ///
    /// As [`GridSearch::run`], plus domain-validation errors from sampling.
    #[instrument(skip_all, fields(n_trials = self.n_trials, n_samples = data.n_samples()))]
    pub fn run<F>(
        &self,
        data: &Dataset,
        folds: &StratifiedKFold,
        metric: Metric,
        map: F,
    ) -> Result<SearchResult, ThicketError>
    where
        F: Fn(&Candidate) -> Result<ModelConfig, ThicketError>,
    {
        let candidates = self.space.sample(self.n_trials, self.seed)?;
        info!(n_candidates = candidates.len(), %metric, "random search started");
        run_candidates(data, folds, metric, &candidates, map)
    }
}

fn run_candidates<F>(
    data: &Dataset,
    folds: &StratifiedKFold,
    metric: Metric,
    candidates: &[Candidate],
    map: F,
) -> Result<SearchResult, ThicketError>
where
    F: Fn(&Candidate) -> Result<ModelConfig, ThicketError>,
{
    let mut trials = Vec::with_capacity(candidates.len());
    let mut n_skipped = 0usize;

    for candidate in candidates {
        let outcome = map(candidate)
            .and_then(|config| cross_validate(data, folds, &config, metric));
        let scores = match outcome {
            Ok(scores) => Some(scores),
            Err(err) if err.is_hyperparameter() => {
                // Recorded as missing, not dropped: callers can see which
                // configurations never produced a score.
                warn!(%candidate, %err, "candidate skipped");
                n_skipped += 1;
                None
            }
            Err(err) => return Err(err),
        };

        if let Some(scores) = &scores {
            debug!(%candidate, mean = scores.mean(), "candidate evaluated");
        }
        trials.push(Trial {
            candidate: candidate.clone(),
            scores,
        });
    }

    info!(
        n_trials = trials.len(),
        n_skipped,
        best = trials_best_mean(&trials),
        "search complete"
    );
    Ok(SearchResult { trials, n_skipped })
}

fn trials_best_mean(trials: &[Trial]) -> Option<f64> {
    trials
        .iter()
        .filter_map(|t| t.scores.as_ref().map(FoldScores::mean))
        .fold(None, |acc, m| match acc {
            Some(best) if best >= m => Some(best),
            _ => Some(m),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{Mtry, RandomForestConfig};
    use crate::tree::DecisionTreeConfig;

    fn make_separable_data() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..25 {
            rows.push(vec![i as f64 * 0.1, 0.5]);
            labels.push(0);
        }
        for i in 0..25 {
            rows.push(vec![10.0 + i as f64 * 0.1, 0.5]);
            labels.push(1);
        }
        Dataset::new(rows, labels).unwrap()
    }

    fn tree_from_candidate(c: &Candidate) -> Result<ModelConfig, ThicketError> {
        let mut config = DecisionTreeConfig::new().with_seed(42);
        if let Some(v) = c.get("max_depth").and_then(ParamValue::as_i64) {
            config = config.with_max_depth(Some(v as usize));
        }
        if let Some(v) = c.get("min_node_size").and_then(ParamValue::as_i64) {
            config = config.with_min_node_size(v as usize);
        }
        if let Some(v) = c.get("alpha").and_then(ParamValue::as_f64) {
            config = config.with_cost_complexity_alpha(v);
        }
        Ok(ModelConfig::Tree(config))
    }

    #[test]
    fn grid_enumeration_order_and_count() {
        let grid = ParamGrid::new()
            .add("a", vec![ParamValue::Int(1), ParamValue::Int(2)])
            .add("b", vec![ParamValue::Int(10), ParamValue::Int(20)])
            .add("c", vec![ParamValue::Int(100), ParamValue::Int(200)]);
        let candidates = grid.candidates().unwrap();
        assert_eq!(candidates.len(), 8);
        // First-declared varies slowest, last-declared fastest.
        assert_eq!(candidates[0].get("a").unwrap().as_i64(), Some(1));
        assert_eq!(candidates[0].get("c").unwrap().as_i64(), Some(100));
        assert_eq!(candidates[1].get("c").unwrap().as_i64(), Some(200));
        assert_eq!(candidates[1].get("a").unwrap().as_i64(), Some(1));
        assert_eq!(candidates[4].get("a").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(matches!(
            ParamGrid::new().candidates().unwrap_err(),
            ThicketError::EmptySearchSpace
        ));
        let err = ParamGrid::new().add("a", vec![]).candidates().unwrap_err();
        assert!(matches!(err, ThicketError::EmptyDomain { .. }));
    }

    #[test]
    fn random_space_sample_size_and_determinism() {
        let space = RandomSpace::new()
            .add("n_trees", ParamDomain::IntRange { low: 5, high: 50 })
            .add(
                "alpha",
                ParamDomain::FloatRange {
                    low: 0.0,
                    high: 0.1,
                },
            )
            .add(
                "mtry",
                ParamDomain::Values(vec![
                    ParamValue::Text("sqrt".to_string()),
                    ParamValue::Text("all".to_string()),
                ]),
            );
        let a = space.sample(10, 42).unwrap();
        let b = space.sample(10, 42).unwrap();
        assert_eq!(a.len(), 10);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(format!("{x}"), format!("{y}"));
        }
        for c in &a {
            let n = c.get("n_trees").unwrap().as_i64().unwrap();
            assert!((5..=50).contains(&n));
            let alpha = c.get("alpha").unwrap().as_f64().unwrap();
            assert!((0.0..0.1).contains(&alpha));
            assert!(matches!(c.get("mtry").unwrap().as_str(), Some("sqrt" | "all")));
        }
    }

    #[test]
    fn random_space_invalid_domains_rejected() {
        assert!(matches!(
            RandomSpace::new().sample(5, 1).unwrap_err(),
            ThicketError::EmptySearchSpace
        ));
        let err = RandomSpace::new()
            .add("a", ParamDomain::IntRange { low: 5, high: 4 })
            .sample(5, 1)
            .unwrap_err();
        assert!(matches!(err, ThicketError::EmptyDomain { .. }));
        let err = RandomSpace::new()
            .add(
                "b",
                ParamDomain::FloatRange {
                    low: 1.0,
                    high: 1.0,
                },
            )
            .sample(5, 1)
            .unwrap_err();
        assert!(matches!(err, ThicketError::EmptyDomain { .. }));
    }

    #[test]
    fn grid_search_evaluates_every_combination() {
        let data = make_separable_data();
        let folds = StratifiedKFold::new(3).unwrap().with_seed(42);
        let grid = ParamGrid::new()
            .add("max_depth", vec![ParamValue::Int(2), ParamValue::Int(4)])
            .add(
                "min_node_size",
                vec![ParamValue::Int(1), ParamValue::Int(3)],
            );
        let result = GridSearch::new(grid)
            .run(&data, &folds, Metric::Accuracy, tree_from_candidate)
            .unwrap();
        assert_eq!(result.trials.len(), 4);
        assert_eq!(result.n_skipped, 0);
        let best = result.best().unwrap();
        let mean = best.scores.as_ref().unwrap().mean();
        assert!(mean > 0.9, "best = {mean}");
    }

    #[test]
    fn invalid_candidates_skipped_not_fatal() {
        let data = make_separable_data();
        let folds = StratifiedKFold::new(3).unwrap().with_seed(42);
        // min_node_size 0 fails the tree's hyperparameter check.
        let grid = ParamGrid::new().add(
            "min_node_size",
            vec![ParamValue::Int(0), ParamValue::Int(1)],
        );
        let result = GridSearch::new(grid)
            .run(&data, &folds, Metric::Accuracy, tree_from_candidate)
            .unwrap();
        // The skipped candidate keeps its trial entry, scoreless, so the
        // caller can see which configurations never produced a score.
        assert_eq!(result.trials.len(), 2);
        assert_eq!(result.n_skipped, 1);
        assert_eq!(
            result.trials[0].candidate.get("min_node_size").unwrap().as_i64(),
            Some(0)
        );
        assert!(result.trials[0].scores.is_none());
        assert!(result.trials[1].scores.is_some());
        // best() ignores the scoreless trial.
        let best = result.best().unwrap();
        assert_eq!(best.candidate.get("min_node_size").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn best_tie_resolves_to_first_enumerated() {
        let data = make_separable_data();
        let folds = StratifiedKFold::new(3).unwrap().with_seed(42);
        // Both depths separate the data perfectly, so scores tie.
        let grid = ParamGrid::new().add("max_depth", vec![ParamValue::Int(3), ParamValue::Int(5)]);
        let result = GridSearch::new(grid)
            .run(&data, &folds, Metric::Accuracy, tree_from_candidate)
            .unwrap();
        let best = result.best().unwrap();
        assert_eq!(best.candidate.get("max_depth").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn random_search_runs_requested_trials() {
        let data = make_separable_data();
        let folds = StratifiedKFold::new(3).unwrap().with_seed(42);
        let space = RandomSpace::new()
            .add("n_trees", ParamDomain::IntRange { low: 3, high: 10 })
            .add(
                "mtry",
                ParamDomain::Values(vec![
                    ParamValue::Text("sqrt".to_string()),
                    ParamValue::Text("all".to_string()),
                ]),
            );
        let result = RandomSearch::new(space, 5)
            .with_seed(7)
            .run(&data, &folds, Metric::RocAuc, |c| {
                let n_trees = c
                    .get("n_trees")
                    .and_then(ParamValue::as_i64)
                    .unwrap_or(10) as usize;
                let mtry = match c.get("mtry").and_then(ParamValue::as_str) {
                    Some("all") => Mtry::All,
                    _ => Mtry::Sqrt,
                };
                Ok(ModelConfig::Forest(
                    RandomForestConfig::new(n_trees)?
                        .with_mtry(mtry)
                        .with_seed(42),
                ))
            })
            .unwrap();
        assert_eq!(result.trials.len(), 5);
        assert!(result.best().unwrap().scores.as_ref().unwrap().mean() > 0.9);
    }

    #[test]
    fn data_errors_propagate() {
        let data = make_separable_data();
        let folds = StratifiedKFold::new(3).unwrap();
        let grid = ParamGrid::new().add("max_depth", vec![ParamValue::Int(2)]);
        let err = GridSearch::new(grid)
            .run(&data, &folds, Metric::Accuracy, |_| {
                Err(ThicketError::EmptyDataset)
            })
            .unwrap_err();
        assert!(matches!(err, ThicketError::EmptyDataset));
    }

    #[test]
    fn candidate_identity_is_the_value_tuple() {
        let grid = ParamGrid::new()
            .add("a", vec![ParamValue::Int(1), ParamValue::Int(1)])
            .add("b", vec![ParamValue::Float(0.5)]);
        let candidates = grid.candidates().unwrap();
        assert_eq!(candidates[0], candidates[1]);

        let mut seen = std::collections::HashSet::new();
        seen.insert(candidates[0].clone());
        assert!(seen.contains(&candidates[1]));
    }

    #[test]
    fn candidate_display_lists_parameters() {
        let grid = ParamGrid::new()
            .add("a", vec![ParamValue::Int(1)])
            .add("b", vec![ParamValue::Text("x".to_string())]);
        let candidates = grid.candidates().unwrap();
        assert_eq!(format!("{}", candidates[0]), "a=1, b=x");
    }
}
