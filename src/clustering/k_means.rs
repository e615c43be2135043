//! K-means clustering
//!
//! Partitions unlabeled observations into clusters where each observation
//! belongs to the cluster with the nearest centroid. This is the standard
//! iterative algorithm (Lloyd's), with a modified update step (m_k-means)
//! that treats the previous centroid as an extra member of its cluster and
//! thereby avoids degenerate empty-cluster updates. Initialisation is
//! k-means++ by default; the whole procedure is restarted `n_runs` times and
//! the centroids with minimal inertia win.
//!
//! The assignment step runs serially; at the data sizes this pipeline sees
//! a single core keeps the run deterministic and fast enough.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::{Fit, ParamGuard, Predict};

/// Initialization strategies for the centroids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KMeansInit {
    /// Pick random observations as initial centroids
    Random,
    /// Spread initial centroids out proportionally to their squared distance
    /// from the already chosen ones
    KMeansPlusPlus,
}

impl KMeansInit {
    fn run(
        &self,
        n_clusters: usize,
        observations: &ArrayView2<f64>,
        rng: &mut impl Rng,
    ) -> Array2<f64> {
        match self {
            Self::Random => random_init(n_clusters, observations, rng),
            Self::KMeansPlusPlus => k_means_pp(n_clusters, observations, rng),
        }
    }
}

fn random_init(
    n_clusters: usize,
    observations: &ArrayView2<f64>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let indices = rand::seq::index::sample(rng, observations.nrows(), n_clusters).into_vec();
    observations.select(Axis(0), &indices)
}

fn k_means_pp(
    n_clusters: usize,
    observations: &ArrayView2<f64>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let (n_samples, n_features) = observations.dim();
    let mut centroids = Array2::zeros((n_clusters, n_features));
    let first = rng.gen_range(0..n_samples);
    centroids.row_mut(0).assign(&observations.row(first));

    let mut dists = Array1::zeros(n_samples);
    for c_cnt in 1..n_clusters {
        update_min_dists(
            &centroids.slice(ndarray::s![0..c_cnt, ..]).view(),
            observations,
            &mut dists,
        );
        let centroid_idx = match WeightedIndex::new(dists.iter()) {
            Ok(weights) => weights.sample(rng),
            // all remaining points coincide with a chosen centroid
            Err(_) => rng.gen_range(0..n_samples),
        };
        centroids
            .row_mut(c_cnt)
            .assign(&observations.row(centroid_idx));
    }
    centroids
}

/// The set of hyperparameters for a K-means run.
#[derive(Clone, Debug, PartialEq)]
pub struct KMeansValidParams {
    n_runs: usize,
    tolerance: f64,
    max_n_iterations: u64,
    n_clusters: usize,
    init: KMeansInit,
    rng: Xoshiro256Plus,
}

impl KMeansValidParams {
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_n_iterations(&self) -> u64 {
        self.max_n_iterations
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn init_method(&self) -> KMeansInit {
        self.init
    }
}

/// Helper struct used to construct a set of valid hyperparameters
/// (builder pattern).
#[derive(Clone, Debug, PartialEq)]
pub struct KMeansParams(KMeansValidParams);

impl KMeansParams {
    fn new(n_clusters: usize, rng: Xoshiro256Plus) -> Self {
        Self(KMeansValidParams {
            n_runs: 10,
            tolerance: 1e-4,
            max_n_iterations: 300,
            n_clusters,
            init: KMeansInit::KMeansPlusPlus,
            rng,
        })
    }

    /// Number of restarts; the run with minimal inertia wins
    pub fn n_runs(mut self, n_runs: usize) -> Self {
        self.0.n_runs = n_runs;
        self
    }

    /// Training is complete once the centroids move less than `tolerance`
    /// between iterations
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.0.tolerance = tolerance;
        self
    }

    /// Iteration cap per run, applied even when `tolerance` was not reached
    pub fn max_n_iterations(mut self, max_n_iterations: u64) -> Self {
        self.0.max_n_iterations = max_n_iterations;
        self
    }

    /// Centroid initialization strategy
    pub fn init_method(mut self, init: KMeansInit) -> Self {
        self.0.init = init;
        self
    }
}

impl ParamGuard for KMeansParams {
    type Checked = KMeansValidParams;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.n_clusters == 0 {
            Err(Error::InvalidParams(
                "number of clusters must be at least 1".to_string(),
            ))
        } else if self.0.n_runs == 0 {
            Err(Error::InvalidParams(
                "number of runs must be at least 1".to_string(),
            ))
        } else if self.0.tolerance <= 0. {
            Err(Error::InvalidParams(
                "tolerance must be positive".to_string(),
            ))
        } else if self.0.max_n_iterations == 0 {
            Err(Error::InvalidParams(
                "iteration cap must be at least 1".to_string(),
            ))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Fitted K-means model: the centroids plus per-cluster member counts and
/// the final inertia of the winning run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KMeans {
    centroids: Array2<f64>,
    cluster_count: Array1<usize>,
    inertia: f64,
}

impl KMeans {
    /// Configure K-means for `n_clusters` with a deterministic default seed
    pub fn params(n_clusters: usize) -> KMeansParams {
        KMeansParams::new(n_clusters, Xoshiro256Plus::seed_from_u64(42))
    }

    /// Configure K-means for `n_clusters` with the given generator
    pub fn params_with_rng(n_clusters: usize, rng: Xoshiro256Plus) -> KMeansParams {
        KMeansParams::new(n_clusters, rng)
    }

    /// The set of centroids, shape `(n_centroids, n_features)`
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Number of training points belonging to each cluster
    pub fn cluster_count(&self) -> &Array1<usize> {
        &self.cluster_count
    }

    /// Mean squared distance between each training point and its closest
    /// centroid
    pub fn inertia(&self) -> f64 {
        self.inertia
    }
}

impl Fit<Array2<f64>, ()> for KMeansValidParams {
    type Object = KMeans;

    /// Identify `n_clusters` centroids in `records`, shape
    /// `(n_observations, n_features)`.
    fn fit(&self, records: &Array2<f64>, _targets: &()) -> Result<KMeans> {
        let observations = records.view();
        let n_samples = records.nrows();
        if n_samples < self.n_clusters {
            return Err(Error::InvalidParams(format!(
                "cannot split {} observations into {} clusters",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = self.rng.clone();
        let mut min_inertia = f64::INFINITY;
        let mut best_centroids = None;
        let mut converged = false;
        let mut memberships = Array1::zeros(n_samples);
        let mut dists = Array1::zeros(n_samples);

        for _ in 0..self.n_runs {
            let mut inertia = min_inertia;
            let mut centroids = self.init.run(self.n_clusters, &observations, &mut rng);
            let mut run_converged = false;
            for _ in 0..self.max_n_iterations {
                update_memberships_and_dists(
                    &centroids.view(),
                    &observations,
                    &mut memberships,
                    &mut dists,
                );
                let new_centroids = compute_centroids(&centroids, &observations, &memberships);
                inertia = dists.sum();
                let distance = sq_distance(&centroids.view(), &new_centroids.view());
                centroids = new_centroids;
                if distance < self.tolerance {
                    run_converged = true;
                    break;
                }
            }

            // keep the centroids which minimize the inertia (sum of squared
            // distances to the closest centroid) over all runs
            if inertia < min_inertia {
                min_inertia = inertia;
                best_centroids = Some(centroids);
                converged = run_converged;
            }
        }

        match (converged, best_centroids) {
            (true, Some(centroids)) => {
                update_memberships_and_dists(
                    &centroids.view(),
                    &observations,
                    &mut memberships,
                    &mut dists,
                );
                let mut cluster_count = Array1::zeros(self.n_clusters);
                memberships.iter().for_each(|&c| cluster_count[c] += 1);
                Ok(KMeans {
                    centroids,
                    cluster_count,
                    inertia: min_inertia / n_samples as f64,
                })
            }
            _ => Err(Error::NotConverged),
        }
    }
}

impl Predict<&Array2<f64>, Array1<usize>> for KMeans {
    /// For each observation return the index of its closest centroid.
    fn predict(&self, observations: &Array2<f64>) -> Array1<usize> {
        let mut memberships = Array1::zeros(observations.nrows());
        let mut dists = Array1::zeros(observations.nrows());
        update_memberships_and_dists(
            &self.centroids.view(),
            &observations.view(),
            &mut memberships,
            &mut dists,
        );
        memberships
    }
}

/// `compute_centroids` returns a 2-dimensional array where the i-th row
/// corresponds to the i-th cluster.
fn compute_centroids(
    old_centroids: &Array2<f64>,
    observations: &ArrayView2<f64>,
    cluster_memberships: &Array1<usize>,
) -> Array2<f64> {
    let n_clusters = old_centroids.nrows();
    let mut counts: Array1<usize> = Array1::ones(n_clusters);
    let mut centroids = Array2::zeros((n_clusters, observations.ncols()));

    Zip::from(observations.rows())
        .and(cluster_memberships)
        .for_each(|observation, &membership| {
            let mut centroid = centroids.row_mut(membership);
            centroid += &observation;
            counts[membership] += 1;
        });
    // m_k-means: treat the old centroid like another point in the cluster
    centroids += old_centroids;

    Zip::from(centroids.rows_mut())
        .and(&counts)
        .for_each(|mut centroid, &cnt| centroid /= cnt as f64);
    centroids
}

fn update_memberships_and_dists(
    centroids: &ArrayView2<f64>,
    observations: &ArrayView2<f64>,
    memberships: &mut Array1<usize>,
    dists: &mut Array1<f64>,
) {
    Zip::from(observations.rows())
        .and(memberships)
        .and(dists)
        .for_each(|observation, membership, dist| {
            let (m, d) = closest_centroid(centroids, &observation);
            *membership = m;
            *dist = d;
        });
}

fn update_min_dists(
    centroids: &ArrayView2<f64>,
    observations: &ArrayView2<f64>,
    dists: &mut Array1<f64>,
) {
    Zip::from(observations.rows())
        .and(dists)
        .for_each(|observation, dist| *dist = closest_centroid(centroids, &observation).1);
}

/// Index and squared distance of the centroid closest to `observation`.
fn closest_centroid(centroids: &ArrayView2<f64>, observation: &ArrayView1<f64>) -> (usize, f64) {
    let mut closest_index = 0;
    let mut minimum_distance = f64::INFINITY;

    for (centroid_index, centroid) in centroids.rows().into_iter().enumerate() {
        let distance = sq_l2(&centroid, observation);
        if distance < minimum_distance {
            closest_index = centroid_index;
            minimum_distance = distance;
        }
    }
    (closest_index, minimum_distance)
}

fn sq_l2(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

fn sq_distance(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
