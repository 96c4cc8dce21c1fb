//! Gradient boosting over regression trees.
//!
//! Trees are fitted sequentially to the residuals of the running prediction,
//! each contributing `learning_rate` times its output. Row subsampling
//! (bagging) is optional and driven by a seeded generator so fits are
//! reproducible.

use crate::error::{ForecastError, Result};
use crate::model::tree::RegressionTree;
use crate::report::ProgressObserver;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

/// Loss minimized by the boosting rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Squared error. Residuals are the raw prediction errors.
    L2,
    /// Absolute error. Residuals are the signs of the prediction errors.
    L1,
}

impl Objective {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "l2" | "mse" | "regression" => Ok(Self::L2),
            "l1" | "mae" | "regression_l1" => Ok(Self::L1),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown objective: {other}"
            ))),
        }
    }
}

/// Metric reported on the evaluation sets during fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMetric {
    Rmse,
    Mae,
    Mse,
}

impl EvalMetric {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rmse" => Ok(Self::Rmse),
            "mae" | "l1" => Ok(Self::Mae),
            "mse" | "l2" => Ok(Self::Mse),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown metric: {other}"
            ))),
        }
    }

    /// Evaluate the metric over paired actual/predicted values.
    pub fn compute(self, actual: &[f64], predicted: &[f64]) -> f64 {
        if actual.is_empty() {
            return f64::NAN;
        }
        let n = actual.len() as f64;
        match self {
            Self::Rmse => {
                let mse = actual
                    .iter()
                    .zip(predicted)
                    .map(|(a, p)| (a - p) * (a - p))
                    .sum::<f64>()
                    / n;
                mse.sqrt()
            }
            Self::Mse => {
                actual
                    .iter()
                    .zip(predicted)
                    .map(|(a, p)| (a - p) * (a - p))
                    .sum::<f64>()
                    / n
            }
            Self::Mae => {
                actual
                    .iter()
                    .zip(predicted)
                    .map(|(a, p)| (a - p).abs())
                    .sum::<f64>()
                    / n
            }
        }
    }
}

/// Boosting hyperparameters.
#[derive(Debug, Clone)]
pub struct GbmParams {
    pub objective: Objective,
    pub metric: EvalMetric,
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub num_leaves: usize,
    pub min_data_in_leaf: usize,
    /// Resample the training rows every this many rounds. Zero disables
    /// bagging entirely.
    pub bagging_freq: usize,
    pub bagging_fraction: f64,
    pub seed: u64,
    /// Report eval metrics every this many rounds. Zero silences reporting.
    pub eval_period: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            objective: Objective::L2,
            metric: EvalMetric::Rmse,
            learning_rate: 0.1,
            n_estimators: 100,
            num_leaves: 128,
            min_data_in_leaf: 20,
            bagging_freq: 0,
            bagging_fraction: 1.0,
            seed: 0,
            eval_period: 20,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.num_leaves < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "num_leaves must be at least 2, got {}",
                self.num_leaves
            )));
        }
        if self.bagging_fraction <= 0.0 || self.bagging_fraction > 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "bagging_fraction must be in (0, 1], got {}",
                self.bagging_fraction
            )));
        }
        Ok(())
    }
}

/// A named held-out set scored during fitting.
pub struct EvalSet<'a> {
    pub name: &'a str,
    pub x: &'a Array2<f64>,
    pub y: &'a [f64],
}

/// Gradient-boosted regression ensemble.
#[derive(Debug, Clone)]
pub struct GbmRegressor {
    params: GbmParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    fitted: bool,
}

impl GbmRegressor {
    pub fn new(params: GbmParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            fitted: false,
        })
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    /// Fit the ensemble on `x`/`y`, scoring `evals` every `eval_period`
    /// rounds through the observer.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        categorical: &[bool],
        evals: &[EvalSet<'_>],
        observer: &dyn ProgressObserver,
    ) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(ForecastError::EmptyData);
        }
        if y.len() != n {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if categorical.len() != x.ncols() {
            return Err(ForecastError::DimensionMismatch {
                expected: x.ncols(),
                got: categorical.len(),
            });
        }

        self.base_score = match self.params.objective {
            Objective::L2 => y.iter().sum::<f64>() / n as f64,
            Objective::L1 => median(y),
        };
        self.trees = Vec::with_capacity(self.params.n_estimators);

        let mut train_pred = vec![self.base_score; n];
        let mut eval_preds: Vec<Vec<f64>> = evals
            .iter()
            .map(|set| vec![self.base_score; set.y.len()])
            .collect();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let all_rows: Vec<usize> = (0..n).collect();
        let mut bag = all_rows.clone();
        let mut residuals = vec![0.0; n];

        for round in 0..self.params.n_estimators {
            if self.params.bagging_freq > 0
                && self.params.bagging_fraction < 1.0
                && round % self.params.bagging_freq == 0
            {
                bag = sample_rows(&all_rows, self.params.bagging_fraction, &mut rng);
            }

            for i in 0..n {
                residuals[i] = match self.params.objective {
                    Objective::L2 => y[i] - train_pred[i],
                    Objective::L1 => (y[i] - train_pred[i]).signum(),
                };
            }

            let tree = RegressionTree::fit(
                x,
                &residuals,
                &bag,
                categorical,
                self.params.num_leaves,
                self.params.min_data_in_leaf,
            );

            for i in 0..n {
                train_pred[i] += self.params.learning_rate * tree.predict_row(x.row(i));
            }
            for (set, preds) in evals.iter().zip(eval_preds.iter_mut()) {
                for (i, pred) in preds.iter_mut().enumerate() {
                    *pred += self.params.learning_rate * tree.predict_row(set.x.row(i));
                }
            }
            self.trees.push(tree);

            let iteration = round + 1;
            if !evals.is_empty()
                && self.params.eval_period > 0
                && iteration % self.params.eval_period == 0
            {
                let scores: Vec<(&str, f64)> = evals
                    .iter()
                    .zip(&eval_preds)
                    .map(|(set, preds)| (set.name, self.params.metric.compute(set.y, preds)))
                    .collect();
                observer.round(iteration, &scores);
            }
        }

        self.fitted = true;
        Ok(())
    }

    /// Predict each row of `x` with the fitted ensemble.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(ForecastError::FitRequired);
        }
        let mut out = vec![self.base_score; x.nrows()];
        for tree in &self.trees {
            for (i, value) in out.iter_mut().enumerate() {
                *value += self.params.learning_rate * tree.predict_row(x.row(i));
            }
        }
        Ok(out)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

fn sample_rows(rows: &[usize], fraction: f64, rng: &mut impl Rng) -> Vec<usize> {
    let take = ((rows.len() as f64 * fraction).ceil() as usize).max(1);
    let mut shuffled = rows.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(take);
    shuffled.sort_unstable();
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullObserver;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::sync::Mutex;

    fn learnable_data() -> (Array2<f64>, Vec<f64>) {
        // Piecewise target over one numeric feature.
        let n = 80;
        let mut x = Array2::zeros((n, 1));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let v = i as f64;
            x[[i, 0]] = v;
            y.push(if v < 40.0 { 2.0 } else { 10.0 });
        }
        (x, y)
    }

    fn small_params() -> GbmParams {
        GbmParams {
            n_estimators: 30,
            num_leaves: 4,
            min_data_in_leaf: 5,
            ..GbmParams::default()
        }
    }

    #[test]
    fn boosting_reduces_error_below_variance() {
        let (x, y) = learnable_data();
        let mut model = GbmRegressor::new(small_params()).unwrap();
        model.fit(&x, &y, &[false], &[], &NullObserver).unwrap();

        let preds = model.predict(&x).unwrap();
        let mse = EvalMetric::Mse.compute(&y, &preds);
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let variance = y.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / y.len() as f64;
        assert!(mse < variance / 10.0, "mse {mse} vs variance {variance}");
    }

    #[test]
    fn fits_are_deterministic_under_bagging() {
        let (x, y) = learnable_data();
        let params = GbmParams {
            bagging_freq: 1,
            bagging_fraction: 0.7,
            seed: 42,
            ..small_params()
        };

        let mut first = GbmRegressor::new(params.clone()).unwrap();
        first.fit(&x, &y, &[false], &[], &NullObserver).unwrap();
        let mut second = GbmRegressor::new(params).unwrap();
        second.fit(&x, &y, &[false], &[], &NullObserver).unwrap();

        let a = first.predict(&x).unwrap();
        let b = second.predict(&x).unwrap();
        for (p, q) in a.iter().zip(&b) {
            assert_relative_eq!(p, q, epsilon = 1e-12);
        }
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let model = GbmRegressor::new(GbmParams::default()).unwrap();
        let x = Array2::zeros((1, 1));
        assert!(matches!(
            model.predict(&x),
            Err(ForecastError::FitRequired)
        ));
    }

    #[test]
    fn categorical_feature_drives_predictions() {
        // Target depends only on the dictionary code, not its ordering.
        let n = 60;
        let mut x = Array2::zeros((n, 1));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let code = (i % 3) as f64;
            x[[i, 0]] = code;
            y.push(if code == 1.0 { 9.0 } else { 1.0 });
        }

        let mut model = GbmRegressor::new(small_params()).unwrap();
        model.fit(&x, &y, &[true], &[], &NullObserver).unwrap();

        let preds = model.predict(&x).unwrap();
        assert_relative_eq!(preds[1], 9.0, epsilon = 0.5);
        assert_relative_eq!(preds[0], 1.0, epsilon = 0.5);
    }

    #[test]
    fn eval_sets_are_reported_on_schedule() {
        #[derive(Default)]
        struct Recorder {
            rounds: Mutex<Vec<usize>>,
        }
        impl crate::report::ProgressObserver for Recorder {
            fn round(&self, iteration: usize, evals: &[(&str, f64)]) {
                assert_eq!(evals.len(), 1);
                assert_eq!(evals[0].0, "valid");
                assert!(evals[0].1.is_finite());
                self.rounds.lock().unwrap().push(iteration);
            }
        }

        let (x, y) = learnable_data();
        let params = GbmParams {
            n_estimators: 40,
            eval_period: 20,
            ..small_params()
        };
        let recorder = Recorder::default();
        let mut model = GbmRegressor::new(params).unwrap();
        let evals = [EvalSet {
            name: "valid",
            x: &x,
            y: &y,
        }];
        model.fit(&x, &y, &[false], &evals, &recorder).unwrap();

        assert_eq!(*recorder.rounds.lock().unwrap(), vec![20, 40]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let params = GbmParams {
            num_leaves: 1,
            ..GbmParams::default()
        };
        assert!(GbmRegressor::new(params).is_err());

        let params = GbmParams {
            bagging_fraction: 0.0,
            ..GbmParams::default()
        };
        assert!(GbmRegressor::new(params).is_err());
    }

    #[test]
    fn objective_and_metric_names_parse() {
        assert_eq!(Objective::parse("l2").unwrap(), Objective::L2);
        assert_eq!(Objective::parse("L1").unwrap(), Objective::L1);
        assert!(Objective::parse("huber").is_err());
        assert_eq!(EvalMetric::parse("rmse").unwrap(), EvalMetric::Rmse);
        assert!(EvalMetric::parse("poisson").is_err());
    }
}
