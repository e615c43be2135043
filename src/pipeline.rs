//! The end-to-end expression-recognition pipeline
//!
//! Chains the stages in a fixed order: load and partition the table, reshape
//! the pixel strings, standardize on training statistics, reduce with
//! whitened PCA, cluster the reconstructed training images for the
//! unsupervised diagnostic, then train the classifier on the reduced
//! features and score it on the combined test split. Optionally renders
//! image grids of the originals, the reconstructions and the cluster
//! centroids along the way.

use std::path::PathBuf;

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::clustering::{apply_vote, majority_vote, KMeans};
use crate::dataset::{self, ImageStack, IMAGE_SIDE, N_CLASSES};
use crate::error::Result;
use crate::metrics::{accuracy, ConfusionMatrix};
use crate::neural::Mlp;
use crate::persist::{self, ResultBundle};
use crate::preprocessing::StandardScaler;
use crate::reduction::Pca;
use crate::traits::{Fit, Predict, Transformer};
use crate::viz;

/// Everything a run needs to know, injectable so tests can scale the
/// stages down to toy sizes.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// FER2013-format input table
    pub input_path: PathBuf,
    /// Where the result bundle is written
    pub bundle_path: PathBuf,
    /// Directory for the PNG grids; `None` skips rendering
    pub plot_dir: Option<PathBuf>,
    /// Retained principal components
    pub n_components: usize,
    /// Clusters for the unsupervised diagnostic
    pub n_clusters: usize,
    /// Hidden layer width of the classifier
    pub hidden_width: usize,
    /// Mini-batch size of the classifier
    pub batch_size: usize,
    /// Seed for every randomized stage
    pub seed: u64,
}

impl PipelineConfig {
    /// The configuration used for the full dataset.
    pub fn new(input_path: PathBuf, bundle_path: PathBuf) -> Self {
        Self {
            input_path,
            bundle_path,
            plot_dir: None,
            n_components: 48,
            n_clusters: 7,
            hidden_width: 1024,
            batch_size: 256,
            seed: 42,
        }
    }
}

/// The figures a run reports back.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Input rows discarded for an unrecognized split tag
    pub rows_dropped: usize,
    /// Agreement between majority-vote cluster labels and the true training
    /// labels
    pub cluster_agreement: f64,
    /// Classifier accuracy on the combined test split
    pub test_accuracy: f64,
}

/// Execute the full pipeline described by `config`.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    log::info!("loading {}", config.input_path.display());
    let table = dataset::load_csv(&config.input_path)?;
    if table.rows_dropped > 0 {
        log::warn!(
            "dropped {} rows with unrecognized split tags",
            table.rows_dropped
        );
    }
    log::info!(
        "{} training, {} public test, {} private test samples",
        table.train.len(),
        table.public_test.len(),
        table.private_test.len()
    );

    let train_stack = ImageStack::from_pixel_rows(&table.train.pixels, IMAGE_SIDE)?;
    let public_stack = ImageStack::from_pixel_rows(&table.public_test.pixels, IMAGE_SIDE)?;
    let private_stack = ImageStack::from_pixel_rows(&table.private_test.pixels, IMAGE_SIDE)?;

    let y_train = Array1::from(table.train.labels.clone());
    let mut test_labels = table.public_test.labels.clone();
    test_labels.extend_from_slice(&table.private_test.labels);
    let y_test = Array1::from(test_labels);

    // public rows first, then private, matching the label order above
    let x_test_raw = concatenate(
        Axis(0),
        &[public_stack.matrix().view(), private_stack.matrix().view()],
    )?;

    log::info!("standardizing on training statistics");
    let scaler = StandardScaler::new().fit(train_stack.matrix(), &())?;
    let x_train = scaler.transform(train_stack.matrix().clone());
    let x_test = scaler.transform(x_test_raw);

    log::info!(
        "reducing to {} whitened principal components",
        config.n_components
    );
    let pca = Pca::params(config.n_components)
        .whiten(true)
        .fit(&x_train, &())?;
    log::info!(
        "retained components explain {:.1}% of the variance",
        pca.explained_variance_ratio().sum() * 100.
    );
    let x_train_pca = pca.transform(&x_train);
    let x_test_pca = pca.transform(&x_test);
    let x_train_restored = pca.inverse_transform(&x_train_pca);

    if let Some(plot_dir) = &config.plot_dir {
        std::fs::create_dir_all(plot_dir)?;
        viz::save_grid(&train_stack, 8, 8, &plot_dir.join("originals.png"))?;
        let restored_stack = ImageStack::from_matrix(x_train_restored.clone(), IMAGE_SIDE)?;
        viz::save_grid(&restored_stack, 8, 8, &plot_dir.join("reconstructions.png"))?;
    }

    log::info!(
        "clustering the reconstructed training images into {} groups",
        config.n_clusters
    );
    let kmeans = KMeans::params_with_rng(
        config.n_clusters,
        Xoshiro256Plus::seed_from_u64(config.seed),
    )
    .fit(&x_train_restored, &())?;
    let assignments = kmeans.predict(&x_train_restored);

    let vote = majority_vote(
        &assignments.view(),
        &y_train.view(),
        config.n_clusters,
        N_CLASSES,
    )?;
    let derived = apply_vote(&assignments.view(), &vote.view());
    let cluster_agreement = accuracy(&y_train.view(), &derived.view());
    log::info!(
        "majority-vote cluster labels agree with the truth on {:.1}% of samples",
        cluster_agreement * 100.
    );

    if let Some(plot_dir) = &config.plot_dir {
        if kmeans.centroids().ncols() == IMAGE_SIDE * IMAGE_SIDE {
            let centroid_stack = ImageStack::from_matrix(kmeans.centroids().clone(), IMAGE_SIDE)?;
            viz::save_grid(
                &centroid_stack,
                1,
                config.n_clusters,
                &plot_dir.join("centroids.png"),
            )?;
        }
    }

    log::info!(
        "training the classifier ({} hidden units, batches of {})",
        config.hidden_width,
        config.batch_size
    );
    let classifier = Mlp::params_with_rng(
        config.hidden_width,
        Xoshiro256Plus::seed_from_u64(config.seed),
    )
    .classes(N_CLASSES)
    .batch_size(config.batch_size)
    .fit(&x_train_pca, &y_train)?;

    let prediction = classifier.predict(&x_test_pca);
    let test_accuracy = accuracy(&y_test.view(), &prediction.view());
    log::info!("test accuracy {:.4}", test_accuracy);
    if log::log_enabled!(log::Level::Debug) {
        let cm = ConfusionMatrix::new(&y_test.view(), &prediction.view(), N_CLASSES)?;
        log::debug!("confusion matrix:\n{:?}", cm);
    }

    log::info!("writing results to {}", config.bundle_path.display());
    let bundle = ResultBundle {
        classifier,
        train_features: x_train,
        train_labels: table.train.labels,
        test_accuracy,
    };
    persist::save(&bundle, &config.bundle_path)?;

    Ok(RunReport {
        rows_dropped: table.rows_dropped,
        cluster_agreement,
        test_accuracy,
    })
}
