//! # Emotion Experiment Data Readers
//!
//! This crate is the data-ingestion and cross-validation layer of a
//! multi-modal emotion-recognition research system. It reads the watch
//! (wearable sensor), facial-expression image, and text corpora of the
//! experiments and exposes them as lazy batched `(features, one-hot label)`
//! streams plus materialised label vectors, ready for an external training
//! loop.
//!
//! ## Architecture
//!
//! ```text
//! ReaderConfig ──► WatchExperimentReader ──► stream::Batcher
//!       │               │                        ▲
//!       │         GroundTruthResolver            │
//!       │               │                 kfold::cross_validation_indices
//!       │         (expected | faceapi | both)
//!       │
//!       ├──► ImageDataReader ──► BalancedSampler / augment_batch
//!       └──► TextDataReader
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emotion_exp_reader::config::ReaderConfig;
//! use emotion_exp_reader::set::Set;
//! use emotion_exp_reader::watch::WatchExperimentReader;
//!
//! let cfg = ReaderConfig::default();
//! cfg.validate().expect("config is valid");
//!
//! let mut reader = WatchExperimentReader::new("data/watch");
//! let batches = reader
//!     .get_emotion_data("neutral_ekman", Set::Train, 64, &cfg)
//!     .expect("watch corpus loads");
//! for batch in batches {
//!     println!("batch of {} windows", batch.len());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod augment;
pub mod config;
pub mod emotion;
pub mod error;
pub mod ground_truth;
pub mod image;
pub mod kfold;
pub mod set;
pub mod stream;
pub mod text;
pub mod watch;

// Convenient re-exports at the crate root.
pub use config::{LabelMode, ReaderConfig};
pub use emotion::{Emotion, Label, Taxonomy, EMOTIONS, NUM_EMOTIONS, NUM_THREE};
pub use error::{ConfigError, DatasetError, ReaderError, ReaderResult};
pub use image::ImageDataReader;
pub use kfold::cross_validation_indices;
pub use set::Set;
pub use stream::{Batch, BatchIter, SampleIter};
pub use text::TextDataReader;
pub use watch::{WatchCorpus, WatchExperimentReader};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
