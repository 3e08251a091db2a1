//! Reader configuration.
//!
//! [`ReaderConfig`] is the explicit options record shared by all experiment
//! data readers: window geometry, label reconciliation mode, cross-validation
//! selection, shuffling, balancing, augmentation, and the reproducibility
//! seed. It is serializable via [`serde`] so experiment settings can be
//! stored alongside results.
//!
//! # Example
//!
//! ```rust
//! use emotion_exp_reader::config::ReaderConfig;
//!
//! let cfg = ReaderConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.window, 20);
//! assert_eq!(cfg.cv_splits, 5);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::set::Set;

/// Ground-truth source used to label watch windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    /// Label each second with the emotion the experiment schedule intended.
    Expected,
    /// Label each second with the face-API argmax observation.
    FaceApi,
    /// Keep only seconds where both sources agree; the rest become
    /// disagreements and their windows are dropped.
    Both,
}

/// Options recognised by the experiment data readers.
///
/// Fields that only apply to one reader family are documented as such and
/// ignored elsewhere (except where the combination is an explicit error,
/// e.g. `balanced` together with the three-class taxonomy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Window length in seconds (watch data). Default: **20**.
    pub window: usize,

    /// Stride between successive windows in seconds. Default: **5**.
    pub hop: usize,

    /// Select the `*Norm` sensor columns instead of the raw ones.
    /// Default: **true**.
    pub normalize: bool,

    /// Ground-truth source for watch labels. Default: [`LabelMode::Expected`].
    pub label_mode: LabelMode,

    /// Number of cross-validation splits. Default: **5**.
    pub cv_splits: usize,

    /// Which cross-validation split to use, in `0..cv_splits`. Default: **0**.
    pub cv_index: usize,

    /// Shuffle override. `None` keeps the per-split default: shuffle the
    /// training split, leave the others in corpus order.
    pub shuffle: Option<bool>,

    /// Class-uniform sampling over the image corpus (image only, seven-class
    /// only). Default: **false**.
    pub balanced: bool,

    /// Apply the deterministic augmentation pipeline to image batches.
    /// Default: **false**.
    pub augment: bool,

    /// Seed for all stochastic behaviour (reservoir shuffle, balanced
    /// draws). Default: **42**.
    pub seed: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            window: 20,
            hop: 5,
            normalize: true,
            label_mode: LabelMode::Expected,
            cv_splits: 5,
            cv_index: 0,
            shuffle: None,
            balanced: false,
            augment: false,
            seed: 42,
        }
    }
}

impl ReaderConfig {
    /// Load a [`ReaderConfig`] from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileAccess`] if the file cannot be opened,
    /// [`ConfigError::Parse`] if the JSON is malformed, and any validation
    /// error from [`ReaderConfig::validate`].
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ReaderConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON at `path`,
    /// creating parent directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileAccess {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Whether a stream for `which_set` should be shuffled.
    ///
    /// The explicit override wins; otherwise only the training split is
    /// shuffled.
    pub fn shuffle_for(&self, which_set: Set) -> bool {
        self.shuffle.unwrap_or(which_set == Set::Train)
    }

    /// Validate all fields, returning the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `window` and `hop` must be at least 1.
    /// - `cv_splits` must be at least 2.
    /// - `cv_index` must be in `0..cv_splits`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::invalid_value("window", "must be > 0"));
        }
        if self.hop == 0 {
            return Err(ConfigError::invalid_value("hop", "must be > 0"));
        }
        if self.cv_splits < 2 {
            return Err(ConfigError::invalid_value("cv_splits", "must be >= 2"));
        }
        if self.cv_index >= self.cv_splits {
            return Err(ConfigError::invalid_value(
                "cv_index",
                format!("must be < cv_splits ({})", self.cv_splits),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let cfg = ReaderConfig::default();
        cfg.validate().expect("default config should be valid");
    }

    #[test]
    fn default_fields_match_documented_values() {
        let cfg = ReaderConfig::default();
        assert_eq!(cfg.window, 20);
        assert_eq!(cfg.hop, 5);
        assert!(cfg.normalize);
        assert_eq!(cfg.label_mode, LabelMode::Expected);
        assert_eq!(cfg.cv_splits, 5);
        assert_eq!(cfg.cv_index, 0);
        assert_eq!(cfg.shuffle, None);
        assert!(!cfg.balanced);
        assert!(!cfg.augment);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn shuffle_defaults_to_train_only() {
        let cfg = ReaderConfig::default();
        assert!(cfg.shuffle_for(Set::Train));
        assert!(!cfg.shuffle_for(Set::Val));
        assert!(!cfg.shuffle_for(Set::Test));
        assert!(!cfg.shuffle_for(Set::All));

        let forced = ReaderConfig { shuffle: Some(true), ..ReaderConfig::default() };
        assert!(forced.shuffle_for(Set::Test));
        let off = ReaderConfig { shuffle: Some(false), ..ReaderConfig::default() };
        assert!(!off.shuffle_for(Set::Train));
    }

    #[test]
    fn zero_window_is_invalid() {
        let cfg = ReaderConfig { window: 0, ..ReaderConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_hop_is_invalid() {
        let cfg = ReaderConfig { hop: 0, ..ReaderConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cv_index_must_be_below_cv_splits() {
        let cfg = ReaderConfig { cv_index: 5, cv_splits: 5, ..ReaderConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("reader.json");

        let mut original = ReaderConfig::default();
        original.label_mode = LabelMode::Both;
        original.hop = 3;
        original.to_json(&path).expect("serialization should succeed");

        let loaded = ReaderConfig::from_json(&path).expect("deserialization should succeed");
        assert_eq!(loaded, original);
    }
}
