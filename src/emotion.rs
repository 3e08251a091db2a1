//! Canonical emotion taxonomies.
//!
//! Every label in the crate flows through the tables defined here:
//!
//! - the canonical seven-emotion ordering (`angry..neutral`, ids 0..6),
//! - the frozen seven→three conversion map,
//! - the face-API probability sort order (its emotion names differ from the
//!   canonical folder names, e.g. `surprised` vs `surprise`),
//! - the [`Label`] variant that replaces the historical `-1` disagreement
//!   sentinel with a tagged value.

use crate::error::DatasetError;

/// One of the seven canonical emotions.
///
/// The discriminants are the canonical class ids used everywhere: corpus
/// label vectors, one-hot rows, and stratified fold selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Emotion {
    /// Class id 0.
    Angry = 0,
    /// Class id 1.
    Surprise = 1,
    /// Class id 2.
    Disgust = 2,
    /// Class id 3.
    Happy = 3,
    /// Class id 4.
    Fear = 4,
    /// Class id 5.
    Sad = 5,
    /// Class id 6.
    Neutral = 6,
}

/// The seven emotions in canonical id order.
pub const EMOTIONS: [Emotion; 7] = [
    Emotion::Angry,
    Emotion::Surprise,
    Emotion::Disgust,
    Emotion::Happy,
    Emotion::Fear,
    Emotion::Sad,
    Emotion::Neutral,
];

/// Number of classes in the seven-emotion taxonomy.
pub const NUM_EMOTIONS: usize = 7;

/// Number of classes in the coarse three-emotion taxonomy.
pub const NUM_THREE: usize = 3;

/// Frozen seven→three conversion map, indexed by canonical id.
///
/// Three-class ids: 0 = positive, 1 = neutral, 2 = negative.
pub const THREE_CLASS_MAP: [u8; 7] = [2, 0, 2, 0, 2, 2, 1];

/// Emotion names in the fixed face-API probability sort order.
///
/// The argmax over probabilities listed in this order yields the canonical
/// class id, because the order mirrors [`EMOTIONS`].
pub const FACEAPI_ORDER: [&str; 7] = [
    "angry",
    "surprised",
    "disgusted",
    "happy",
    "fearful",
    "sad",
    "neutral",
];

impl Emotion {
    /// Canonical class id in `0..7`.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Emotion for a canonical class id.
    pub fn from_id(id: u8) -> Option<Emotion> {
        EMOTIONS.get(id as usize).copied()
    }

    /// Coarse three-class id under the frozen conversion map.
    #[inline]
    pub fn three_class_id(self) -> u8 {
        THREE_CLASS_MAP[self as usize]
    }

    /// Canonical lower-case name, as used for corpus folder names.
    pub fn name(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Happy => "happy",
            Emotion::Fear => "fear",
            Emotion::Sad => "sad",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a canonical folder name back into an emotion.
    pub fn from_name(name: &str) -> Option<Emotion> {
        EMOTIONS.iter().copied().find(|e| e.name() == name)
    }
}

/// Per-second ground-truth label after reconciliation.
///
/// `Disagreement` marks seconds where the expected-schedule label and the
/// face-API label differ under `both` mode; windows carrying it are dropped
/// before the corpus is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Both ground-truth sources agree (or only one was requested).
    Known(Emotion),
    /// The two ground-truth sources disagree at this second.
    Disagreement,
}

impl Label {
    /// The canonical class id, or `None` for a disagreement.
    #[inline]
    pub fn id(self) -> Option<u8> {
        match self {
            Label::Known(e) => Some(e.id()),
            Label::Disagreement => None,
        }
    }
}

/// Requested label taxonomy for a dataset call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    /// The canonical seven-emotion (neutral + Ekman six) taxonomy.
    NeutralEkman,
    /// The coarse three-class taxonomy.
    Three,
}

impl Taxonomy {
    /// Parse the caller-facing taxonomy name.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidTaxonomy`] for anything other than
    /// `"neutral_ekman"` or `"three"`.
    pub fn parse(name: &str) -> Result<Taxonomy, DatasetError> {
        match name {
            "neutral_ekman" => Ok(Taxonomy::NeutralEkman),
            "three" => Ok(Taxonomy::Three),
            other => Err(DatasetError::InvalidTaxonomy {
                requested: other.to_string(),
            }),
        }
    }
}
