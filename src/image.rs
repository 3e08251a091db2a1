//! Facial-expression image reader.
//!
//! Reads a directory-per-split, directory-per-emotion corpus of 48x48
//! grayscale face crops:
//!
//! ```text
//! <folder>/
//!   train/
//!     angry/*.jpeg
//!     disgust/*.jpeg
//!     ...
//!   val/...
//!   test/...
//! ```
//!
//! Emotion subfolders are visited in alphabetical order and files within a
//! folder in sorted name order, so the unshuffled stream order is a pure
//! function of the corpus contents. Images are decoded lazily while the
//! stream is pulled; files that fail to decode warn and are skipped.
//!
//! The balanced sampler draws classes uniformly at random from per-class
//! cyclic file streams, so heavily skewed corpora still yield a roughly
//! class-uniform empirical distribution. It exists for the seven-emotion
//! taxonomy only.

use ndarray::Array3;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::augment::augment_batch;
use crate::config::ReaderConfig;
use crate::emotion::{Emotion, Taxonomy, NUM_EMOTIONS, NUM_THREE};
use crate::error::{DatasetError, ReaderResult};
use crate::set::Set;
use crate::stream::{
    remap_three, BatchIter, Batcher, ReservoirShuffle, SampleIter, Xorshift64, SHUFFLE_BUFFER,
};

/// Side length of the square face crops.
pub const IMAGE_SIZE: usize = 48;

/// Reader for the facial-expression image corpus.
pub struct ImageDataReader {
    folder: PathBuf,
    epoch: u64,
}

impl ImageDataReader {
    /// Create a reader over `folder` (the directory containing the
    /// `train`/`val`/`test` split folders).
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        ImageDataReader { folder: folder.into(), epoch: 0 }
    }

    /// The corpus root folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Enumerate `(path, class id)` pairs for one split, emotion folders in
    /// alphabetical order and files in sorted name order.
    ///
    /// # Errors
    ///
    /// [`DatasetError::DataNotFound`] when the split folder does not exist;
    /// unknown subfolder names are skipped with a warning.
    fn scan(&self, which_set: Set) -> Result<Vec<(PathBuf, u8)>, DatasetError> {
        let split_dir = self.folder.join(which_set.folder_name());
        if !split_dir.is_dir() {
            return Err(DatasetError::not_found(
                &split_dir,
                format!("no `{}` split in image corpus", which_set.folder_name()),
            ));
        }
        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(&split_dir)
            .map_err(|source| DatasetError::Io { path: split_dir.clone(), source })?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();

        let mut files = Vec::new();
        for dir in subdirs {
            let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let Some(emotion) = Emotion::from_name(name) else {
                warn!("Skipping unknown emotion folder {}", dir.display());
                continue;
            };
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
                .map_err(|source| DatasetError::Io { path: dir.clone(), source })?
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries.into_iter().map(|p| (p, emotion.id())));
        }
        Ok(files)
    }

    /// Unbalanced lazy sample stream: scan order, decoded on pull, shuffled
    /// per `cfg`.
    fn plain_samples(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<SampleIter<Array3<f32>>> {
        let files = self.scan(which_set)?;
        info!(
            "Image corpus `{}`: {} files",
            which_set.folder_name(),
            files.len()
        );
        let samples: SampleIter<Array3<f32>> = Box::new(
            files
                .into_iter()
                .filter_map(|(path, label)| match load_image(&path) {
                    Ok(image) => Some((image, label)),
                    Err(e) => {
                        warn!("Skipping undecodable image {}: {e}", path.display());
                        None
                    }
                }),
        );
        if cfg.shuffle_for(which_set) {
            let seed = self.next_stream_seed(cfg.seed);
            Ok(Box::new(ReservoirShuffle::new(samples, SHUFFLE_BUFFER, seed)))
        } else {
            Ok(samples)
        }
    }

    /// Class-uniform lazy sample stream over per-class cyclic file streams.
    ///
    /// Stream length equals the total file count of the split, so one full
    /// iteration sees as many samples as the plain stream would, with the
    /// per-class counts concentrated near `total / 7`.
    fn balanced_samples(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<SampleIter<Array3<f32>>> {
        let files = self.scan(which_set)?;
        let total = files.len();
        let seed = self.next_stream_seed(cfg.seed);

        let mut per_class: Vec<Vec<PathBuf>> = vec![Vec::new(); NUM_EMOTIONS];
        for (path, label) in files {
            per_class[label as usize].push(path);
        }
        let mut rng = Xorshift64::new(seed);
        for paths in &mut per_class {
            rng.shuffle(paths);
        }
        let classes: Vec<u8> = (0..NUM_EMOTIONS as u8)
            .filter(|&c| !per_class[c as usize].is_empty())
            .collect();
        if classes.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        info!(
            "Balanced sampler over {} classes, {total} draws",
            classes.len()
        );

        let mut cursors = vec![0usize; NUM_EMOTIONS];
        let samples = (0..total).filter_map(move |_| {
            let class = classes[rng.next_below(classes.len())];
            let paths = &per_class[class as usize];
            let cursor = &mut cursors[class as usize];
            let path = &paths[*cursor % paths.len()];
            *cursor += 1;
            match load_image(path) {
                Ok(image) => Some((image, class)),
                Err(e) => {
                    warn!("Skipping undecodable image {}: {e}", path.display());
                    None
                }
            }
        });
        Ok(Box::new(samples))
    }

    fn seven_samples(
        &mut self,
        which_set: Set,
        cfg: &ReaderConfig,
    ) -> ReaderResult<SampleIter<Array3<f32>>> {
        if cfg.balanced {
            self.balanced_samples(which_set, cfg)
        } else {
            self.plain_samples(which_set, cfg)
        }
    }

    /// Batched `(images, one_hot[7])` stream, augmented when `cfg.augment`.
    pub fn get_seven_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<Array3<f32>>> {
        let samples = self.seven_samples(which_set, cfg)?;
        let batches = Batcher::new(samples, batch_size, NUM_EMOTIONS);
        if cfg.augment {
            // Batch b is augmented with the seed pair (2b, 2b + 1).
            Ok(Box::new(batches.enumerate().map(|(b, batch)| {
                augment_batch(&batch, 2 * b as u64, 2 * b as u64 + 1)
            })))
        } else {
            Ok(Box::new(batches))
        }
    }

    /// Batched `(images, one_hot[3])` stream.
    ///
    /// # Errors
    ///
    /// [`DatasetError::NotImplemented`] when `cfg.balanced` is set; the
    /// balanced sampler only exists for the seven-emotion taxonomy.
    pub fn get_three_emotion_data(
        &mut self,
        which_set: Set,
        batch_size: usize,
        cfg: &ReaderConfig,
    ) -> ReaderResult<BatchIter<Array3<f32>>> {
        if cfg.balanced {
            return Err(DatasetError::not_implemented(
                "balanced sampling is only supported for the seven-emotion taxonomy",
            )
            .into());
        }
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
    ) -> ReaderResult<BatchIter<Array3<f32>>> {
        match Taxonomy::parse(taxonomy)? {
            Taxonomy::NeutralEkman => self.get_seven_emotion_data(which_set, batch_size, cfg),
            Taxonomy::Three => self.get_three_emotion_data(which_set, batch_size, cfg),
        }
    }

    /// Materialise the split's label vector from the unshuffled, unbalanced,
    /// unaugmented stream (batch size 100).
    pub fn get_labels(&mut self, which_set: Set, cfg: &ReaderConfig) -> ReaderResult<Vec<u8>> {
        let plain = ReaderConfig {
            shuffle: Some(false),
            balanced: false,
            augment: false,
            ..cfg.clone()
        };
        let batches = self.get_seven_emotion_data(which_set, 100, &plain)?;
        Ok(crate::stream::collect_labels(batches))
    }

    /// Shape of one preprocessed sample.
    pub fn get_input_shape() -> (usize, usize, usize) {
        (IMAGE_SIZE, IMAGE_SIZE, 1)
    }

    fn next_stream_seed(&mut self, seed: u64) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        seed ^ self.epoch.wrapping_mul(0x9E3779B97F4A7C15)
    }
}

/// Decode one face crop into a `[48, 48, 1]` f32 tensor with intensities in
/// `0..=255`, resizing when the source dimensions differ.
fn load_image(path: &Path) -> Result<Array3<f32>, DatasetError> {
    let decoded = image::open(path).map_err(|e| {
        DatasetError::invalid_format(path, format!("image decode failed: {e}"))
    })?;
    let gray = decoded
        .resize_exact(
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            image::imageops::FilterType::Triangle,
        )
        .to_luma8();
    Ok(Array3::from_shape_fn((IMAGE_SIZE, IMAGE_SIZE, 1), |(y, x, _)| {
        gray.get_pixel(x as u32, y as u32).0[0] as f32
    }))
}
