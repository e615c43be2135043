//! Loading of the FER2013 expression table
//!
//! The input is a comma-delimited text table with a header row and three
//! columns: the emotion class (an integer in `0..7`), the pixel string
//! (2304 space-separated intensities) and the split tag. Rows are bucketed
//! by an exact match on the split tag; rows carrying any other tag are
//! dropped, but counted, so the caller can surface the loss.

use std::path::Path;

use csv::ReaderBuilder;

use crate::error::{Error, Result};

mod images;

pub use images::{ImageStack, IMAGE_SIDE, IMAGE_PIXELS};

/// Emotion names, indexed by class id.
pub const EMOTIONS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Joy", "Sad", "Surprise", "Neutral",
];

/// Number of emotion classes.
pub const N_CLASSES: usize = 7;

const HEADER: [&str; 3] = ["emotion", "pixels", "Usage"];

/// The three recognized dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Training,
    PublicTest,
    PrivateTest,
}

impl Split {
    /// Map a split tag onto its partition, `None` for unrecognized tags.
    pub fn from_tag(tag: &str) -> Option<Split> {
        match tag {
            "Training" => Some(Split::Training),
            "PublicTest" => Some(Split::PublicTest),
            "PrivateTest" => Some(Split::PrivateTest),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Split::Training => "Training",
            Split::PublicTest => "PublicTest",
            Split::PrivateTest => "PrivateTest",
        }
    }
}

/// Pixel strings and class labels of one partition, in file order.
#[derive(Debug, Default)]
pub struct SplitRecords {
    pub pixels: Vec<String>,
    pub labels: Vec<usize>,
}

impl SplitRecords {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The full table, partitioned into the three splits.
#[derive(Debug)]
pub struct FerTable {
    pub train: SplitRecords,
    pub public_test: SplitRecords,
    pub private_test: SplitRecords,
    /// Rows whose split tag matched none of the three recognized literals.
    pub rows_dropped: usize,
}

impl FerTable {
    fn bucket(&mut self, split: Split) -> &mut SplitRecords {
        match split {
            Split::Training => &mut self.train,
            Split::PublicTest => &mut self.public_test,
            Split::PrivateTest => &mut self.private_test,
        }
    }
}

/// Read a FER2013-format table and partition it by split tag.
///
/// Row order within each split follows the file. A header or column-count
/// mismatch, an unparseable class label, or a label outside `0..7` aborts
/// with [`Error::DataFormat`].
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<FerTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .from_path(path.as_ref())?;

    let headers = reader.headers()?;
    if headers.len() != HEADER.len() || headers.iter().zip(HEADER.iter()).any(|(a, &b)| a != b) {
        return Err(Error::DataFormat(format!(
            "expected header {:?}, found {:?}",
            HEADER.join(","),
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut table = FerTable {
        train: SplitRecords::default(),
        public_test: SplitRecords::default(),
        private_test: SplitRecords::default(),
        rows_dropped: 0,
    };

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != HEADER.len() {
            return Err(Error::DataFormat(format!(
                "row {}: expected {} columns, found {}",
                row,
                HEADER.len(),
                record.len()
            )));
        }

        let split = match Split::from_tag(&record[2]) {
            Some(split) => split,
            None => {
                table.rows_dropped += 1;
                continue;
            }
        };

        let label: usize = record[0]
            .parse()
            .map_err(|_| Error::DataFormat(format!("row {}: bad class label {:?}", row, &record[0])))?;
        if label >= N_CLASSES {
            return Err(Error::DataFormat(format!(
                "row {}: class label {} out of range 0..{}",
                row, label, N_CLASSES
            )));
        }

        let bucket = table.bucket(split);
        bucket.labels.push(label);
        bucket.pixels.push(record[1].to_string());
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn rows_partition_into_three_buckets() {
        let path = write_table(
            "facexp_loader_partition.csv",
            "emotion,pixels,Usage\n\
             0,1 2,Training\n\
             1,3 4,PublicTest\n\
             2,5 6,PrivateTest\n\
             3,7 8,Training\n",
        );
        let table = load_csv(&path).unwrap();

        assert_eq!(table.train.len(), 2);
        assert_eq!(table.public_test.len(), 1);
        assert_eq!(table.private_test.len(), 1);
        assert_eq!(table.rows_dropped, 0);

        // order preserved within each split
        assert_eq!(table.train.labels, vec![0, 3]);
        assert_eq!(table.train.pixels, vec!["1 2", "7 8"]);
        assert_eq!(table.public_test.labels, vec![1]);
        assert_eq!(table.private_test.labels, vec![2]);
    }

    #[test]
    fn unrecognized_split_tags_are_dropped_and_counted() {
        let path = write_table(
            "facexp_loader_dropped.csv",
            "emotion,pixels,Usage\n\
             0,1 2,Training\n\
             1,3 4,Validation\n\
             2,5 6,\n",
        );
        let table = load_csv(&path).unwrap();

        assert_eq!(table.train.len(), 1);
        assert_eq!(table.rows_dropped, 2);
    }

    #[test]
    fn header_mismatch_is_fatal() {
        let path = write_table(
            "facexp_loader_header.csv",
            "label,data,split\n0,1 2,Training\n",
        );
        assert!(matches!(load_csv(&path), Err(Error::DataFormat(_))));
    }

    #[test]
    fn out_of_range_label_is_fatal() {
        let path = write_table(
            "facexp_loader_label.csv",
            "emotion,pixels,Usage\n9,1 2,Training\n",
        );
        assert!(matches!(load_csv(&path), Err(Error::DataFormat(_))));
    }
}
