use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use facexp::{run, PipelineConfig};

/// Facial-expression recognition on the FER2013 dataset.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// FER2013-format CSV file
    #[arg(long, default_value = "fer2013.csv")]
    input: PathBuf,

    /// Output path for the result bundle
    #[arg(long, default_value = "results.json")]
    output: PathBuf,

    /// Directory for diagnostic image grids
    #[arg(long)]
    plots: Option<PathBuf>,

    /// Number of retained principal components
    #[arg(long, default_value_t = 48)]
    components: usize,

    /// Number of clusters for the unsupervised diagnostic
    #[arg(long, default_value_t = 7)]
    clusters: usize,

    /// Hidden layer width of the classifier
    #[arg(long, default_value_t = 1024)]
    hidden: usize,

    /// Mini-batch size of the classifier
    #[arg(long, default_value_t = 256)]
    batch_size: usize,

    /// Seed for every randomized stage
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = PipelineConfig {
        input_path: cli.input,
        bundle_path: cli.output,
        plot_dir: cli.plots,
        n_components: cli.components,
        n_clusters: cli.clusters,
        hidden_width: cli.hidden,
        batch_size: cli.batch_size,
        seed: cli.seed,
    };

    match run(&config) {
        Ok(report) => {
            if report.rows_dropped > 0 {
                println!("dropped rows: {}", report.rows_dropped);
            }
            println!("cluster agreement: {:.4}", report.cluster_agreement);
            println!("test accuracy:     {:.4}", report.test_accuracy);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            exit(1);
        }
    }
}
