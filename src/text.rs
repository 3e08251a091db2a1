//! Text (utterance) corpus reader.
//!
//! Reads one CSV per split with a `text,label` header, where `label` is a
//! canonical class id in `0..7`. The per-split file names live in an
//! overridable map so tests can point a split at an arbitrary file:
//!
//! ```text
//! <folder>/
//!   text_train.csv
//!   text_val.csv
//!   text_test.csv
//! ```
//!
//! Features are the raw utterance strings; tokenisation belongs to the
//! downstream classifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ReaderConfig;
use crate::emotion::{Taxonomy, NUM_EMOTIONS, NUM_THREE};
use crate::error::{DatasetError, ReaderResult};
use crate::set::Set;
use crate::stream::{
    remap_three, BatchIter, Batcher, ReservoirShuffle, SampleIter, SHUFFLE_BUFFER,
};

/// Column holding the utterance.
pub const TEXT_COLUMN: &str = "text";

/// Column holding the canonical class id.
pub const LABEL_COLUMN: &str = "label";

/// Reader for the text corpus.
pub struct TextDataReader {
    folder: PathBuf,
    file_map: HashMap<Set, String>,
    epoch: u64,
}

impl TextDataReader {
    /// Create a reader over `folder` with the default per-split file names
    /// (`text_train.csv`, `text_val.csv`, `text_test.csv`).
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let mut file_map = HashMap::new();
        for set in Set::SPLITS {
            file_map.insert(set, format!("text_{}.csv", set.folder_name()));
        }
        TextDataReader { folder: folder.into(), file_map, epoch: 0 }
    }

    /// The corpus folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Point `which_set` at `file_name` (relative to the corpus folder).
    pub fn set_file(&mut self, which_set: Set, file_name: impl Into<String>) {
        self.file_map.insert(which_set, file_name.into());
    }

    fn split_path(&self, which_set: Set) -> Result<PathBuf, DatasetError> {
        let name = self.file_map.get(&which_set).ok_or_else(|| {
            DatasetError::not_found(
                &self.folder,
                format!("no file mapped for the `{}` split", which_set.folder_name()),
            )
        })?;
        Ok(self.folder.join(name))
    }

    fn seven_samples(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<SampleIter<String>> {
        let path = self.split_path(which_set)?;
        let rows = read_text_csv(&path)?;
        info!("Text corpus `{}`: {} utterances", which_set.folder_name(), rows.len());
        let samples: SampleIter<String> = Box::new(rows.into_iter());
        if cfg.shuffle_for(which_set) {
            let seed = self.next_stream_seed(cfg.seed);
            Ok(Box::new(ReservoirShuffle::new(samples, SHUFFLE_BUFFER, seed)))
        } else {
            Ok(samples)
        }
    }

    /// Batched `(utterances, one_hot[7])` stream.
    pub fn get_seven_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<String>> {
        let samples = self.seven_samples(which_set, cfg)?;
        Ok(Box::new(Batcher::new(samples, batch_size, NUM_EMOTIONS)))
    }

    /// Batched `(utterances, one_hot[3])` stream.
    pub fn get_three_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<String>> {
        let samples = remap_three(self.seven_samples(which_set, cfg)?);
        Ok(Box::new(Batcher::new(samples, batch_size, NUM_THREE)))
    }

    /// String-taxonomy entry point.
    pub fn get_emotion_data(
        &mut self,
        taxonomy: &str,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<String>> {
        match Taxonomy::parse(taxonomy)? {
            Taxonomy::NeutralEkman => self.get_seven_emotion_data(which_set, batch_size, cfg),
            Taxonomy::Three => self.get_three_emotion_data(which_set, batch_size, cfg),
        }
    }

    /// Materialise the split's label vector from the unshuffled stream
    /// (batch size 100).
    pub fn get_labels(&mut self, which_set: Set, cfg: &ReaderConfig) -> ReaderResult<Vec<u8>> {
        let unshuffled = ReaderConfig { shuffle: Some(false), ..cfg.clone() };
        let batches = self.get_seven_emotion_data(which_set, 100, &unshuffled)?;
        Ok(crate::stream::collect_labels(batches))
    }

    fn next_stream_seed(&mut self, seed: u64) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        seed ^ self.epoch.wrapping_mul(0x9E3779B97F4A7C15)
    }
}

/// Read `(utterance, class id)` rows from a `text,label` CSV.
fn read_text_csv(path: &Path) -> Result<Vec<(String, u8)>, DatasetError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let headers = reader
        .headers()
        .map_err(|source| DatasetError::Csv { path: path.to_path_buf(), source })?
        .clone();
    let column_index = |name: &str| -> Result<usize, DatasetError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let text_index = column_index(TEXT_COLUMN)?;
    let label_index = column_index(LABEL_COLUMN)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let text = record.get(text_index).unwrap_or("").to_string();
        let label_cell = record.get(label_index).unwrap_or("").trim();
        let label: u8 = label_cell.parse().map_err(|_| {
            DatasetError::invalid_format(path, format!("non-integer label `{label_cell}`"))
        })?;
        if label as usize >= NUM_EMOTIONS {
            return Err(DatasetError::invalid_format(
                path,
                format!("label {label} outside the seven-emotion range"),
            ));
        }
        rows.push((text, label));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a 30-row corpus cycling through the seven classes.
    pub(crate) fn write_text_csv(path: &Path, rows: usize) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "{TEXT_COLUMN},{LABEL_COLUMN}").unwrap();
        for i in 0..rows {
            writeln!(
                f,
                "\"this is utterance number {i} of the corpus\",{}",
                i % NUM_EMOTIONS
            )
            .unwrap();
        }
    }

    fn corpus(rows: usize) -> (TempDir, TextDataReader) {
        let tmp = TempDir::new().unwrap();
        write_text_csv(&tmp.path().join("text_test.csv"), rows);
        let mut reader = TextDataReader::new(tmp.path());
        reader.set_file(Set::Train, "text_test.csv");
        (tmp, reader)
    }

    #[test]
    fn default_file_map_covers_every_split() {
        let reader = TextDataReader::new("data/train/text");
        for set in Set::SPLITS {
            assert!(reader.file_map.contains_key(&set));
        }
        assert_eq!(reader.file_map[&Set::Test], "text_test.csv");
    }

    #[test]
    fn utterances_and_labels_come_back_paired() {
        let (_tmp, mut reader) = corpus(14);
        let cfg = ReaderConfig { shuffle: Some(false), ..ReaderConfig::default() };
        let batches: Vec<_> = reader
            .get_seven_emotion_data(Set::Train, 7, &cfg)
            .unwrap()
            .collect();
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.len(), 7);
            assert_eq!(batch.label_ids(), vec![0, 1, 2, 3, 4, 5, 6]);
            for text in &batch.features {
                assert!(text.len() > 5);
            }
        }
    }

    #[test]
    fn missing_label_column_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.csv");
        std::fs::write(&path, "text,sentiment\nhello there,0\n").unwrap();
        let err = read_text_csv(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { ref column, .. } if column == "label"));
    }

    #[test]
    fn out_of_range_label_is_a_format_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad_label.csv");
        std::fs::write(&path, "text,label\nhello there friend,9\n").unwrap();
        assert!(read_text_csv(&path).is_err());
    }

    #[test]
    fn get_labels_preserves_file_order() {
        let (_tmp, mut reader) = corpus(10);
        let labels = reader.get_labels(Set::Train, &ReaderConfig::default()).unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5, 6, 0, 1, 2]);
    }

    #[test]
    fn unknown_taxonomy_is_rejected() {
        let (_tmp, mut reader) = corpus(10);
        assert!(reader
            .get_emotion_data("wrong", Set::Train, 5, &ReaderConfig::default())
            .is_err());
    }
}
