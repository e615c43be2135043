//! Multi-layer perceptron classifier
//!
//! One hidden layer with ReLU activation and a softmax output, trained by
//! mini-batch Adam on the cross-entropy loss with an L2 penalty. When early
//! stopping is enabled a slice of the training data is held out and training
//! ends once the validation accuracy stops improving; the weights of the
//! best validation epoch are kept. On datasets too small to carve out a
//! validation slice, training simply runs to the epoch cap.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::{Fit, ParamGuard, Predict};

/// The set of hyperparameters for MLP training.
#[derive(Clone, Debug, PartialEq)]
pub struct MlpValidParams {
    hidden_width: usize,
    n_classes: Option<usize>,
    alpha: f64,
    batch_size: usize,
    learning_rate: f64,
    max_epochs: usize,
    early_stopping: bool,
    validation_fraction: f64,
    patience: usize,
    tol: f64,
    rng: Xoshiro256Plus,
}

impl MlpValidParams {
    pub fn hidden_width(&self) -> usize {
        self.hidden_width
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Builder for a valid set of MLP hyperparameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MlpParams(MlpValidParams);

impl MlpParams {
    fn new(hidden_width: usize, rng: Xoshiro256Plus) -> Self {
        Self(MlpValidParams {
            hidden_width,
            n_classes: None,
            alpha: 1e-5,
            batch_size: 256,
            learning_rate: 1e-3,
            max_epochs: 200,
            early_stopping: true,
            validation_fraction: 0.1,
            patience: 10,
            tol: 1e-4,
            rng,
        })
    }

    /// Fix the number of output classes; inferred from the labels if unset
    pub fn classes(mut self, n_classes: usize) -> Self {
        self.0.n_classes = Some(n_classes);
        self
    }

    /// L2 penalty strength
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.0.alpha = alpha;
        self
    }

    /// Mini-batch size, clipped to the training-set size during fitting
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.0.batch_size = batch_size;
        self
    }

    /// Adam step size
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.0.learning_rate = learning_rate;
        self
    }

    /// Epoch cap
    pub fn max_epochs(mut self, max_epochs: usize) -> Self {
        self.0.max_epochs = max_epochs;
        self
    }

    /// Stop training once the held-out validation accuracy stalls
    pub fn early_stopping(mut self, early_stopping: bool) -> Self {
        self.0.early_stopping = early_stopping;
        self
    }

    /// Fraction of the training data held out for early stopping
    pub fn validation_fraction(mut self, validation_fraction: f64) -> Self {
        self.0.validation_fraction = validation_fraction;
        self
    }

    /// Number of stalled epochs tolerated before stopping
    pub fn patience(mut self, patience: usize) -> Self {
        self.0.patience = patience;
        self
    }

    /// Minimum validation improvement that counts as progress
    pub fn tol(mut self, tol: f64) -> Self {
        self.0.tol = tol;
        self
    }
}

impl ParamGuard for MlpParams {
    type Checked = MlpValidParams;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.hidden_width == 0 {
            Err(Error::InvalidParams(
                "hidden layer width must be at least 1".to_string(),
            ))
        } else if !p.alpha.is_finite() || p.alpha < 0. {
            Err(Error::InvalidParams(
                "L2 penalty must be non-negative and finite".to_string(),
            ))
        } else if p.batch_size == 0 {
            Err(Error::InvalidParams(
                "batch size must be at least 1".to_string(),
            ))
        } else if p.learning_rate <= 0. {
            Err(Error::InvalidParams(
                "learning rate must be positive".to_string(),
            ))
        } else if p.max_epochs == 0 {
            Err(Error::InvalidParams(
                "epoch cap must be at least 1".to_string(),
            ))
        } else if !(0. ..1.).contains(&p.validation_fraction) || p.validation_fraction <= 0. {
            Err(Error::InvalidParams(
                "validation fraction must lie in (0, 1)".to_string(),
            ))
        } else if p.patience == 0 {
            Err(Error::InvalidParams(
                "patience must be at least 1".to_string(),
            ))
        } else if p.tol <= 0. {
            Err(Error::InvalidParams("tolerance must be positive".to_string()))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Fitted multi-layer perceptron.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mlp {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    n_classes: usize,
}

impl Mlp {
    /// Create a default parameter set with a deterministic seed
    pub fn params(hidden_width: usize) -> MlpParams {
        MlpParams::new(hidden_width, Xoshiro256Plus::seed_from_u64(42))
    }

    /// Create a default parameter set with the given generator
    pub fn params_with_rng(hidden_width: usize, rng: Xoshiro256Plus) -> MlpParams {
        MlpParams::new(hidden_width, rng)
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn hidden_width(&self) -> usize {
        self.w1.ncols()
    }

    /// Class membership probabilities, shape `(nsamples, n_classes)`.
    pub fn predict_probabilities(&self, x: &Array2<f64>) -> Array2<f64> {
        forward(x, &self.w1, &self.b1, &self.w2, &self.b2)
    }
}

impl Predict<&Array2<f64>, Array1<usize>> for Mlp {
    /// Most probable class per observation.
    fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        assert_eq!(
            x.ncols(),
            self.w1.nrows(),
            "Number of data features must match the number of features the model was trained with."
        );
        argmax_rows(&self.predict_probabilities(x))
    }
}

impl Fit<Array2<f64>, Array1<usize>> for MlpValidParams {
    type Object = Mlp;

    /// Fit the network on `records` (shape `(n_samples, n_features)`) and
    /// class ids `targets` (length `n_samples`).
    fn fit(&self, records: &Array2<f64>, targets: &Array1<usize>) -> Result<Mlp> {
        let n_samples = records.nrows();
        if n_samples == 0 {
            return Err(Error::NotEnoughSamples);
        }
        if n_samples != targets.len() {
            return Err(Error::InvalidParams(format!(
                "{} records for {} targets",
                n_samples,
                targets.len()
            )));
        }

        let max_label = *targets.iter().max().unwrap();
        let n_classes = match self.n_classes {
            Some(n) if max_label >= n => {
                return Err(Error::InvalidParams(format!(
                    "class label {} out of range 0..{}",
                    max_label, n
                )))
            }
            Some(n) => n,
            None => max_label + 1,
        };

        let mut rng = self.rng.clone();
        let n_features = records.ncols();

        // Glorot-uniform initialization
        let bound1 = (6. / (n_features + self.hidden_width) as f64).sqrt();
        let bound2 = (6. / (self.hidden_width + n_classes) as f64).sqrt();
        let mut w1 =
            Array2::random_using((n_features, self.hidden_width), Uniform::new(-bound1, bound1), &mut rng);
        let mut b1 = Array1::zeros(self.hidden_width);
        let mut w2 =
            Array2::random_using((self.hidden_width, n_classes), Uniform::new(-bound2, bound2), &mut rng);
        let mut b2 = Array1::zeros(n_classes);

        // hold out the validation slice used to decide when to stop
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut rng);
        let n_validation = if self.early_stopping {
            (n_samples as f64 * self.validation_fraction).floor() as usize
        } else {
            0
        };
        let stop_early = n_validation >= 1 && n_samples - n_validation >= 1;
        let (validation_idx, train_idx) = indices.split_at(if stop_early { n_validation } else { 0 });

        let x_val = records.select(Axis(0), validation_idx);
        let y_val: Array1<usize> = validation_idx.iter().map(|&i| targets[i]).collect();

        let mut train_idx: Vec<usize> = train_idx.to_vec();
        let batch_size = self.batch_size.min(train_idx.len());

        let mut adam_w1 = Adam::like(&w1);
        let mut adam_b1 = Adam::like(&b1);
        let mut adam_w2 = Adam::like(&w2);
        let mut adam_b2 = Adam::like(&b2);
        let mut step = 0;

        let mut best_score = f64::NEG_INFINITY;
        let mut best_weights = None;
        let mut stalled = 0;

        for epoch in 0..self.max_epochs {
            train_idx.shuffle(&mut rng);

            for chunk in train_idx.chunks(batch_size) {
                let xb = records.select(Axis(0), chunk);
                let m = chunk.len() as f64;

                // forward pass
                let z1 = xb.dot(&w1) + &b1;
                let a1 = z1.mapv(|v| v.max(0.));
                let mut probs = a1.dot(&w2) + &b2;
                softmax_inplace(&mut probs);

                // backward pass; the L2 penalty joins the weight gradients
                let mut delta2 = probs;
                for (mut row, &i) in delta2.rows_mut().into_iter().zip(chunk.iter()) {
                    row[targets[i]] -= 1.;
                }
                let gw2 = (a1.t().dot(&delta2) + self.alpha * &w2) / m;
                let gb2 = delta2.sum_axis(Axis(0)) / m;

                let mut delta1 = delta2.dot(&w2.t());
                Zip::from(&mut delta1).and(&a1).for_each(|d, &a| {
                    if a <= 0. {
                        *d = 0.;
                    }
                });
                let gw1 = (xb.t().dot(&delta1) + self.alpha * &w1) / m;
                let gb1 = delta1.sum_axis(Axis(0)) / m;

                step += 1;
                adam_w1.update(&mut w1, &gw1, self.learning_rate, step);
                adam_b1.update(&mut b1, &gb1, self.learning_rate, step);
                adam_w2.update(&mut w2, &gw2, self.learning_rate, step);
                adam_b2.update(&mut b2, &gb2, self.learning_rate, step);
            }

            if stop_early {
                let probs = forward(&x_val, &w1, &b1, &w2, &b2);
                let prediction = argmax_rows(&probs);
                let score = crate::metrics::accuracy(&y_val.view(), &prediction.view());
                log::debug!("epoch {}: validation accuracy {:.4}", epoch, score);

                if score > best_score {
                    best_weights = Some((w1.clone(), b1.clone(), w2.clone(), b2.clone()));
                }
                if score > best_score + self.tol {
                    stalled = 0;
                } else {
                    stalled += 1;
                    if stalled >= self.patience {
                        log::debug!("validation accuracy stalled, stopping at epoch {}", epoch);
                        break;
                    }
                }
                best_score = best_score.max(score);
            }
        }

        if let Some((bw1, bb1, bw2, bb2)) = best_weights {
            w1 = bw1;
            b1 = bb1;
            w2 = bw2;
            b2 = bb2;
        }

        Ok(Mlp {
            w1,
            b1,
            w2,
            b2,
            n_classes,
        })
    }
}

fn forward(
    x: &Array2<f64>,
    w1: &Array2<f64>,
    b1: &Array1<f64>,
    w2: &Array2<f64>,
    b2: &Array1<f64>,
) -> Array2<f64> {
    let a1 = (x.dot(w1) + b1).mapv(|v| v.max(0.));
    let mut probs = a1.dot(w2) + b2;
    softmax_inplace(&mut probs);
    probs
}

fn softmax_inplace(z: &mut Array2<f64>) {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

fn argmax_rows(probs: &Array2<f64>) -> Array1<usize> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Adam optimizer state for one parameter tensor.
struct Adam<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Adam<D> {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPS: f64 = 1e-8;

    fn like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn update(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, lr: f64, step: i32) {
        Zip::from(&mut self.m)
            .and(grad)
            .for_each(|m, &g| *m = Self::BETA1 * *m + (1. - Self::BETA1) * g);
        Zip::from(&mut self.v)
            .and(grad)
            .for_each(|v, &g| *v = Self::BETA2 * *v + (1. - Self::BETA2) * g * g);

        let c1 = 1. - Self::BETA1.powi(step);
        let c2 = 1. - Self::BETA2.powi(step);
        Zip::from(param)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| {
                *p -= lr * (m / c1) / ((v / c2).sqrt() + Self::EPS);
            });
    }
}
