//! Watch (wearable) experiment reader.
//!
//! Reads the per-participant Happimeter CSV exports, slices them into fixed
//! windows with a hop, labels every window from the resolved ground truth,
//! and exposes the corpus as lazy batched streams plus materialised label
//! vectors.
//!
//! # Directory layout
//!
//! ```text
//! <folder>/
//!   angry/
//!     027_watch.csv      # columns: Heartrate, AccelerometerX/Y/Z,
//!     031_watch.csv      #          Accelerometer, their *Norm variants,
//!     ...                #          and Second
//!   surprise/
//!     ...
//! <folder>/../ground_truth/
//!   027_emotions.json    # face-API traces, one per participant
//! ```
//!
//! Windows are emitted in `(participant, emotion, time)` order, never cross
//! a file boundary, and windows whose reconciled label is a disagreement are
//! dropped before the corpus is materialised. The raw corpus is built on
//! first access and cached on the reader; a call with different window
//! geometry or label mode rebuilds it.

use ndarray::{s, Array2, Array3, Axis};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{LabelMode, ReaderConfig};
use crate::emotion::{Label, Taxonomy, EMOTIONS, NUM_EMOTIONS, NUM_THREE};
use crate::error::{DatasetError, ReaderResult};
use crate::ground_truth::{find_by_prefix, GroundTruthResolver, EXPECTED_TRACE_COUNT};
use crate::kfold::cross_validation_indices;
use crate::set::Set;
use crate::stream::{
    remap_three, BatchIter, Batcher, ReservoirShuffle, SampleIter, SHUFFLE_BUFFER,
};

/// Number of sensor channels per window.
pub const WATCH_CHANNELS: usize = 5;

/// Raw sensor column names; `normalize` selects their `*Norm` variants.
pub const SENSOR_COLUMNS: [&str; WATCH_CHANNELS] = [
    "Heartrate",
    "AccelerometerX",
    "AccelerometerY",
    "AccelerometerZ",
    "Accelerometer",
];

/// Column carrying the wall-clock second within the session.
pub const SECOND_COLUMN: &str = "Second";

/// The materialised watch corpus: all windows and their class ids.
#[derive(Debug)]
pub struct WatchCorpus {
    /// Window tensor of shape `[n, window, WATCH_CHANNELS]`.
    pub data: Array3<f32>,
    /// Class id per window, parallel to `data`.
    pub labels: Vec<u8>,
}

impl WatchCorpus {
    /// Number of windows in the corpus.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` when no windows survived materialisation.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Cache key: the parameters that shape the raw corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CorpusKey {
    window: usize,
    hop: usize,
    normalize: bool,
    label_mode: LabelMode,
}

impl CorpusKey {
    fn of(cfg: &ReaderConfig) -> Self {
        CorpusKey {
            window: cfg.window,
            hop: cfg.hop,
            normalize: cfg.normalize,
            label_mode: cfg.label_mode,
        }
    }
}

/// Reader for the watch experiment data.
///
/// One reader instance owns one cached corpus; instantiate one reader per
/// logical experiment.
pub struct WatchExperimentReader {
    folder: PathBuf,
    gt_folder: PathBuf,
    participants: Option<Vec<u32>>,
    cached: Option<(CorpusKey, Arc<WatchCorpus>)>,
    epoch: u64,
}

impl WatchExperimentReader {
    /// Create a reader over `folder` (the `data/watch` layout).
    ///
    /// The ground-truth folder defaults to `ground_truth` next to `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        let gt_folder = folder
            .parent()
            .map(|p| p.join("ground_truth"))
            .unwrap_or_else(|| PathBuf::from("ground_truth"));
        WatchExperimentReader {
            folder,
            gt_folder,
            participants: None,
            cached: None,
            epoch: 0,
        }
    }

    /// Override the ground-truth trace folder.
    pub fn with_ground_truth_folder(mut self, gt_folder: impl Into<PathBuf>) -> Self {
        self.gt_folder = gt_folder.into();
        self
    }

    /// Restrict the reader to an explicit participant list instead of
    /// discovering ids from the watch folder.
    pub fn with_participants(mut self, participants: Vec<u32>) -> Self {
        self.participants = Some(participants);
        self
    }

    /// The watch data folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Participant ids in corpus row order: the explicit list when given,
    /// otherwise the sorted union of 3-digit file prefixes found under the
    /// emotion subfolders.
    pub fn participants(&self) -> Vec<u32> {
        if let Some(p) = &self.participants {
            return p.clone();
        }
        let mut ids = BTreeSet::new();
        for emotion in EMOTIONS {
            let dir = self.folder.join(emotion.name());
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                // get() keeps a multibyte-named stray file from splitting a
                // char boundary.
                if let Some(prefix) = name.get(..3) {
                    if let Ok(id) = prefix.parse::<u32>() {
                        ids.insert(id);
                    }
                }
            }
        }
        ids.into_iter().collect()
    }

    /// Build (or fetch from cache) the windowed corpus for `cfg`.
    ///
    /// # Errors
    ///
    /// Ground-truth resolution errors surface here; missing per-participant
    /// CSVs only warn and skip.
    pub fn get_raw_data(&mut self, cfg: &ReaderConfig) -> ReaderResult<Arc<WatchCorpus>> {
        cfg.validate()?;
        let key = CorpusKey::of(cfg);
        if let Some((cached_key, corpus)) = &self.cached {
            if *cached_key == key {
                return Ok(Arc::clone(corpus));
            }
        }

        if matches!(cfg.label_mode, LabelMode::FaceApi | LabelMode::Both) {
            self.census_ground_truth();
        }

        let participants = self.participants();
        let grid = GroundTruthResolver::new(&self.gt_folder, participants.clone())
            .resolve(cfg.label_mode)?;

        let columns: Vec<String> = SENSOR_COLUMNS
            .iter()
            .map(|c| {
                if cfg.normalize {
                    format!("{c}Norm")
                } else {
                    (*c).to_string()
                }
            })
            .collect();

        let mut windows: Vec<Array2<f32>> = Vec::new();
        let mut labels: Vec<u8> = Vec::new();
        for (row, &pid) in participants.iter().enumerate() {
            for emotion in EMOTIONS {
                let dir = self.folder.join(emotion.name());
                let Some(path) = find_by_prefix(&dir, &format!("{pid:03}")) else {
                    warn!(
                        "Watch data file for participant {pid:03} and emotion {} not found",
                        emotion.name()
                    );
                    continue;
                };
                let (features, seconds) = read_sensor_csv(&path, &columns)?;
                for second in (cfg.window..features.nrows()).step_by(cfg.hop) {
                    let session_second = seconds[second];
                    if session_second >= grid.ncols() {
                        debug!(
                            "Second {session_second} in {} is past the session end",
                            path.display()
                        );
                        continue;
                    }
                    match grid[[row, session_second]] {
                        Label::Known(e) => {
                            windows.push(
                                features.slice(s![second - cfg.window..second, ..]).to_owned(),
                            );
                            labels.push(e.id());
                        }
                        Label::Disagreement => {}
                    }
                }
            }
        }

        let mut data = Array3::zeros((windows.len(), cfg.window, WATCH_CHANNELS));
        for (i, window) in windows.iter().enumerate() {
            data.slice_mut(s![i, .., ..]).assign(window);
        }
        info!(
            "Watch corpus: {} windows from {} participants (window={}, hop={})",
            labels.len(),
            participants.len(),
            cfg.window,
            cfg.hop
        );

        let corpus = Arc::new(WatchCorpus { data, labels });
        self.cached = Some((key, Arc::clone(&corpus)));
        Ok(corpus)
    }

    /// Stratified cross-validation indices into the raw corpus for
    /// `which_set` under `cfg`.
    pub fn get_cross_validation_indices(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<Vec<usize>> {
        let corpus = self.get_raw_data(cfg)?;
        Ok(cross_validation_indices(
            &corpus.labels,
            which_set,
            cfg.cv_splits,
            cfg.cv_index,
        ))
    }

    /// Lazy sample stream for `which_set`, shuffled per `cfg`.
    fn seven_samples(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<SampleIter<Array2<f32>>> {
        let corpus = self.get_raw_data(cfg)?;
        let indices =
            cross_validation_indices(&corpus.labels, which_set, cfg.cv_splits, cfg.cv_index);
        let samples: SampleIter<Array2<f32>> = Box::new(indices.into_iter().map(move |i| {
            (
                corpus.data.index_axis(Axis(0), i).to_owned(),
                corpus.labels[i],
            )
        }));
        if cfg.shuffle_for(which_set) {
            let seed = self.next_stream_seed(cfg.seed);
            Ok(Box::new(ReservoirShuffle::new(samples, SHUFFLE_BUFFER, seed)))
        } else {
            Ok(samples)
        }
    }

    /// Batched `(window, one_hot[7])` stream for `which_set`.
    pub fn get_seven_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<Array2<f32>>> {
        let samples = self.seven_samples(which_set, cfg)?;
        Ok(Box::new(Batcher::new(samples, batch_size, NUM_EMOTIONS)))
    }

    /// Batched `(window, one_hot[3])` stream: the seven-class stream with
    /// labels remapped through the frozen conversion, features verbatim.
    pub fn get_three_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<Array2<f32>>> {
        let samples = remap_three(self.seven_samples(which_set, cfg)?);
        Ok(Box::new(Batcher::new(samples, batch_size, NUM_THREE)))
    }

    /// String-taxonomy entry point.
    ///
    /// # Errors
    ///
    /// [`DatasetError::InvalidTaxonomy`] for an unknown taxonomy name.
    pub fn get_emotion_data(
        &mut self,
        taxonomy: &str,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<Array2<f32>>> {
        match Taxonomy::parse(taxonomy)? {
            Taxonomy::NeutralEkman => self.get_seven_emotion_data(which_set, batch_size, cfg),
            Taxonomy::Three => self.get_three_emotion_data(which_set, batch_size, cfg),
        }
    }

    /// Materialise the split's label vector by iterating the unshuffled
    /// stream (batch size 100) and concatenating argmaxes.
    pub fn get_labels(&mut self, which_set: Set, cfg: &ReaderConfig) -> ReaderResult<Vec<u8>> {
        let unshuffled = ReaderConfig { shuffle: Some(false), ..cfg.clone() };
        let batches = self.get_seven_emotion_data(which_set, 100, &unshuffled)?;
        Ok(crate::stream::collect_labels(batches))
    }

    /// Shape of one preprocessed sample under `cfg`.
    pub fn get_input_shape(cfg: &ReaderConfig) -> (usize, usize) {
        (cfg.window, WATCH_CHANNELS)
    }

    /// Log the ground-truth trace census; a complete experiment ships
    /// [`EXPECTED_TRACE_COUNT`] traces and preparing missing ones is outside
    /// this crate.
    fn census_ground_truth(&self) {
        let found = std::fs::read_dir(&self.gt_folder)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str()) == Some("json")
                    })
                    .count()
            })
            .unwrap_or(0);
        if found != EXPECTED_TRACE_COUNT {
            warn!(
                "Found {found} ground-truth traces in {}, expected {EXPECTED_TRACE_COUNT}; \
                 missing traces must be prepared externally",
                self.gt_folder.display()
            );
        }
    }

    /// Per-stream seed: the config seed perturbed by an epoch counter so
    /// repeated iterations reshuffle.
    fn next_stream_seed(&mut self, seed: u64) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        seed ^ self.epoch.wrapping_mul(0x9E3779B97F4A7C15)
    }
}

/// Read the selected feature columns and the `Second` column from one
/// sensor CSV.
///
/// Unparsable feature cells become `NaN` (sensor glitches are tolerated);
/// an unparsable `Second` cell is a format error because labelling depends
/// on it.
fn read_sensor_csv(
    path: &Path,
    feature_columns: &[String],
) -> Result<(Array2<f32>, Vec<usize>), DatasetError> {
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
    let feature_indices: Vec<usize> = feature_columns
        .iter()
        .map(|c| column_index(c))
        .collect::<Result<_, _>>()?;
    let second_index = column_index(SECOND_COLUMN)?;

    let mut values: Vec<f32> = Vec::new();
    let mut seconds: Vec<usize> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        for &idx in &feature_indices {
            let cell = record.get(idx).unwrap_or("");
            values.push(cell.trim().parse::<f32>().unwrap_or(f32::NAN));
        }
        let second_cell = record.get(second_index).unwrap_or("").trim();
        let second = second_cell.parse::<f64>().map_err(|_| {
            DatasetError::invalid_format(
                path,
                format!("non-numeric `{SECOND_COLUMN}` value `{second_cell}`"),
            )
        })?;
        seconds.push(second as usize);
    }

    let rows = seconds.len();
    let features = Array2::from_shape_vec((rows, feature_columns.len()), values)
        .map_err(|e| DatasetError::invalid_format(path, e.to_string()))?;
    Ok((features, seconds))
}
