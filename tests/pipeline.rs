//! End-to-end runs of the pipeline on tiny synthetic tables.

use std::fmt::Write as _;
use std::path::PathBuf;

use facexp::dataset::IMAGE_PIXELS;
use facexp::{persist, pipeline, Error, PipelineConfig};

/// Deterministic pixel string for row `i` of class `class`: one half of the
/// image is bright, which half depends on the class, plus mild per-row
/// variation so no feature column is degenerate.
fn pixel_row(i: usize, class: usize) -> String {
    let mut s = String::with_capacity(IMAGE_PIXELS * 4);
    for j in 0..IMAGE_PIXELS {
        let left_half = j % 48 < 24;
        let bright = left_half == (class == 0);
        let value = if bright {
            180 + (i * 13 + j * 7) % 40
        } else {
            10 + (i * 11 + j * 5) % 40
        };
        if j > 0 {
            s.push(' ');
        }
        write!(s, "{}", value).unwrap();
    }
    s
}

fn write_table(name: &str, rows: &[(usize, String, &str)]) -> PathBuf {
    let mut content = String::from("emotion,pixels,Usage\n");
    for (label, pixels, tag) in rows {
        writeln!(content, "{},{},{}", label, pixels, tag).unwrap();
    }
    let dir = std::env::temp_dir().join("facexp-pipeline-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn tiny_config(input: PathBuf, stem: &str) -> PipelineConfig {
    let dir = std::env::temp_dir().join("facexp-pipeline-tests");
    PipelineConfig {
        input_path: input,
        bundle_path: dir.join(format!("{}-bundle.json", stem)),
        plot_dir: Some(dir.join(format!("{}-plots", stem))),
        n_components: 2,
        n_clusters: 2,
        hidden_width: 8,
        batch_size: 4,
        seed: 42,
    }
}

#[test]
fn tiny_table_runs_end_to_end() {
    let rows = vec![
        (0, pixel_row(0, 0), "Training"),
        (0, pixel_row(1, 0), "Training"),
        (1, pixel_row(2, 1), "Training"),
        (1, pixel_row(3, 1), "Training"),
        (0, pixel_row(4, 0), "PublicTest"),
        (1, pixel_row(5, 1), "PublicTest"),
        (0, pixel_row(6, 0), "PublicTest"),
        (1, pixel_row(7, 1), "PrivateTest"),
        (0, pixel_row(8, 0), "PrivateTest"),
        (1, pixel_row(9, 1), "PrivateTest"),
        (2, pixel_row(10, 0), "NotASplit"),
    ];
    let input = write_table("tiny.csv", &rows);
    let config = tiny_config(input, "tiny");

    let report = pipeline::run(&config).unwrap();

    assert_eq!(report.rows_dropped, 1);
    assert!((0. ..=1.).contains(&report.cluster_agreement));
    assert!((0. ..=1.).contains(&report.test_accuracy));

    // the bundle holds the standardized but unreduced training matrix
    let bundle = persist::load(&config.bundle_path).unwrap();
    assert_eq!(bundle.train_features.dim(), (4, IMAGE_PIXELS));
    assert_eq!(bundle.train_labels, vec![0, 0, 1, 1]);
    assert_eq!(bundle.test_accuracy, report.test_accuracy);

    // two cleanly separated pixel patterns: both diagnostics should be easy
    assert_eq!(report.cluster_agreement, 1.0);

    let plots = config.plot_dir.unwrap();
    assert!(plots.join("originals.png").exists());
    assert!(plots.join("reconstructions.png").exists());
    assert!(plots.join("centroids.png").exists());
}

#[test]
fn malformed_pixel_row_aborts_before_any_fitting() {
    let rows = vec![
        (0, pixel_row(0, 0), "Training"),
        (1, String::from("1 2 3"), "Training"),
        (0, pixel_row(1, 0), "PublicTest"),
    ];
    let input = write_table("malformed.csv", &rows);
    let config = tiny_config(input, "malformed");

    match pipeline::run(&config) {
        Err(Error::PixelCount { row, expected, found }) => {
            assert_eq!(row, 1);
            assert_eq!(expected, IMAGE_PIXELS);
            assert_eq!(found, 3);
        }
        other => panic!("expected a pixel-count error, got {:?}", other.map(|_| ())),
    }

    // nothing was written
    assert!(!config.bundle_path.exists());
}
