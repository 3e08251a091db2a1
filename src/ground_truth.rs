//! Per-second ground-truth labels for the watch experiments.
//!
//! Two label sources exist for every experiment session:
//!
//! - the **expected schedule**: the emotion each stimulus video was meant to
//!   elicit, as a fixed timetable over the session;
//! - the **face-API trace**: per-second argmax observations of an external
//!   facial-expression classifier, stored as one JSON file per participant.
//!
//! [`GroundTruthResolver`] turns either source (or their reconciliation)
//! into a `(participants × seconds)` grid of [`Label`]s that the watch
//! loader indexes by `(participant, second)`.

use ndarray::{s, Array2};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::LabelMode;
use crate::emotion::{Emotion, Label, FACEAPI_ORDER};
use crate::error::DatasetError;

/// Effective session length in seconds; the raw grid is truncated to this.
pub const SESSION_SECONDS: usize = 614;

/// Width of the raw label grid before truncation.
pub const RAW_GRID_SECONDS: usize = 690;

/// Number of ground-truth trace files a complete experiment produces.
pub const EXPECTED_TRACE_COUNT: usize = 54;

/// The experiment timetable: seven stimulus segments in canonical emotion
/// order, 88 seconds each. `start` is exclusive (the transition second keeps
/// the previous label) except at 0; `end` is exclusive.
pub const EMOTION_SCHEDULE: [(Emotion, usize, usize); 7] = [
    (Emotion::Angry, 0, 88),
    (Emotion::Surprise, 88, 176),
    (Emotion::Disgust, 176, 264),
    (Emotion::Happy, 264, 352),
    (Emotion::Fear, 352, 440),
    (Emotion::Sad, 440, 528),
    (Emotion::Neutral, 528, 616),
];

/// Locate the single file in `dir` whose name starts with `prefix`.
///
/// Mirrors the `NNN_*.csv` / `NNN_*.json` naming convention of the
/// experiment exports. Returns the lexicographically first match when
/// several exist.
pub(crate) fn find_by_prefix(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Produces per-`(participant, second)` labels from the expected schedule,
/// the face-API traces, or their reconciliation.
#[derive(Debug, Clone)]
pub struct GroundTruthResolver {
    gt_folder: PathBuf,
    participants: Vec<u32>,
}

impl GroundTruthResolver {
    /// Create a resolver over `gt_folder` for the given participant ids.
    ///
    /// The participant order fixes the row order of every grid this
    /// resolver produces.
    pub fn new(gt_folder: impl Into<PathBuf>, participants: Vec<u32>) -> Self {
        GroundTruthResolver { gt_folder: gt_folder.into(), participants }
    }

    /// The participant ids, in grid row order.
    pub fn participants(&self) -> &[u32] {
        &self.participants
    }

    /// Resolve the label grid for `mode`, truncated to
    /// `[.., ..SESSION_SECONDS]`.
    ///
    /// # Errors
    ///
    /// Face-API modes fail with [`DatasetError::DataNotFound`] when a
    /// participant's trace file is missing and [`DatasetError::Json`] /
    /// [`DatasetError::InvalidFormat`] when a trace is malformed.
    pub fn resolve(&self, mode: LabelMode) -> Result<Array2<Label>, DatasetError> {
        let grid = match mode {
            LabelMode::Expected => self.expected_grid(),
            LabelMode::FaceApi => self.faceapi_grid()?,
            LabelMode::Both => {
                let expected = self.expected_grid();
                let faceapi = self.faceapi_grid()?;
                let mut reconciled = expected;
                ndarray::Zip::from(&mut reconciled).and(&faceapi).for_each(|e, &f| {
                    if *e != f {
                        *e = Label::Disagreement;
                    }
                });
                reconciled
            }
        };
        Ok(grid.slice(s![.., ..SESSION_SECONDS]).to_owned())
    }

    /// Fill the raw grid from the stimulus timetable, identically for every
    /// participant.
    fn expected_grid(&self) -> Array2<Label> {
        let mut grid = Array2::from_elem(
            (self.participants.len(), RAW_GRID_SECONDS),
            Label::Known(Emotion::Angry),
        );
        for &(emotion, start, end) in &EMOTION_SCHEDULE {
            let from = if start == 0 { 0 } else { start + 1 };
            let to = end.min(RAW_GRID_SECONDS);
            grid.slice_mut(s![.., from..to]).fill(Label::Known(emotion));
        }
        grid
    }

    /// Fill the raw grid from each participant's face-API trace.
    fn faceapi_grid(&self) -> Result<Array2<Label>, DatasetError> {
        let mut grid = Array2::from_elem(
            (self.participants.len(), RAW_GRID_SECONDS),
            Label::Known(Emotion::Angry),
        );
        for (row, &pid) in self.participants.iter().enumerate() {
            let path = find_by_prefix(&self.gt_folder, &format!("{pid:03}")).ok_or_else(|| {
                DatasetError::not_found(
                    &self.gt_folder,
                    format!("no ground-truth trace for participant {pid:03}"),
                )
            })?;
            debug!("Reading face-API trace {}", path.display());
            let trace = self.read_trace(&path)?;
            let mut previous: Option<Emotion> = None;
            for (time, observed) in trace {
                let label = observed.or(previous);
                previous = label;
                let second = time.floor() as i64 - 1;
                if !(0..RAW_GRID_SECONDS as i64).contains(&second) {
                    continue;
                }
                if let Some(emotion) = label {
                    grid[[row, second as usize]] = Label::Known(emotion);
                }
            }
        }
        Ok(grid)
    }

    /// Parse one trace file into `(time, observation)` pairs, where `None`
    /// stands for the literal `["undefined"]` entry.
    fn read_trace(&self, path: &Path) -> Result<Vec<(f64, Option<Emotion>)>, DatasetError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| {
            DatasetError::Json { path: path.to_path_buf(), source }
        })?;
        let entries = value
            .as_array()
            .ok_or_else(|| DatasetError::invalid_format(path, "trace root is not a list"))?;

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = entry.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                DatasetError::invalid_format(path, "trace entry is not a [time, probs] pair")
            })?;
            let time = parse_time(&pair[0]).ok_or_else(|| {
                DatasetError::invalid_format(path, "trace entry has a non-numeric time")
            })?;
            out.push((time, parse_observation(&pair[1], path)?));
        }
        Ok(out)
    }
}

fn parse_time(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode a `probs` element: `["undefined"]` → `None`, `[{name: prob}]` →
/// the argmax over the fixed face-API sort order.
fn parse_observation(value: &Value, path: &Path) -> Result<Option<Emotion>, DatasetError> {
    let list = value
        .as_array()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| DatasetError::invalid_format(path, "probs is not a non-empty list"))?;
    if list[0].as_str() == Some("undefined") {
        return Ok(None);
    }
    let probs = list[0]
        .as_object()
        .ok_or_else(|| DatasetError::invalid_format(path, "probs entry is not a mapping"))?;
    let mut best = 0usize;
    let mut best_prob = f64::NEG_INFINITY;
    for (i, name) in FACEAPI_ORDER.iter().enumerate() {
        let p = probs.get(*name).and_then(|v| v.as_f64()).unwrap_or(0.0);
        if p > best_prob {
            best_prob = p;
            best = i;
        }
    }
    Ok(Emotion::from_id(best as u8))
}
