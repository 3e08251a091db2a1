//! Integration tests for [`emotion_exp_reader::watch`].
//!
//! Every test builds its corpus in a [`tempfile::TempDir`]: per-emotion CSV
//! exports spanning the full session, plus face-API JSON traces for the
//! reconciled (`both`) label mode.

use std::io::Write;
use std::path::Path;

use emotion_exp_reader::config::{LabelMode, ReaderConfig};
use emotion_exp_reader::ground_truth::{EMOTION_SCHEDULE, SESSION_SECONDS};
use emotion_exp_reader::set::Set;
use emotion_exp_reader::watch::{WatchExperimentReader, SECOND_COLUMN, SENSOR_COLUMNS};
use emotion_exp_reader::Emotion;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

/// The schedule label at session second `s`, with the transition second
/// keeping the previous segment's label.
fn schedule_label(s: usize) -> Emotion {
    let mut label = Emotion::Angry;
    for &(emotion, start, end) in &EMOTION_SCHEDULE {
        let from = if start == 0 { 0 } else { start + 1 };
        if s >= from && s < end {
            label = emotion;
        }
    }
    label
}

/// Write one full-session CSV (`Second` 0..SESSION_SECONDS) for `pid`.
fn write_session_csv(dir: &Path, pid: u32) {
    std::fs::create_dir_all(dir).unwrap();
    let mut f = std::fs::File::create(dir.join(format!("{pid:03}_watch.csv"))).unwrap();
    let mut header = Vec::new();
    for c in SENSOR_COLUMNS {
        header.push(c.to_string());
        header.push(format!("{c}Norm"));
    }
    header.push(SECOND_COLUMN.to_string());
    writeln!(f, "{}", header.join(",")).unwrap();
    for s in 0..SESSION_SECONDS {
        let mut cells = Vec::new();
        for _ in SENSOR_COLUMNS {
            cells.push(format!("{}", s as f32));
            cells.push(format!("{}", s as f32 / 614.0));
        }
        cells.push(format!("{s}"));
        writeln!(f, "{}", cells.join(",")).unwrap();
    }
}

/// Write a face-API trace that follows the schedule except over
/// `disagree`, where it claims `happy` instead.
fn write_trace(dir: &Path, pid: u32, disagree: std::ops::Range<usize>) {
    std::fs::create_dir_all(dir).unwrap();
    let mut entries = Vec::new();
    for s in 0..SESSION_SECONDS {
        let observed = if disagree.contains(&s) {
            Emotion::Happy
        } else {
            schedule_label(s)
        };
        let names = ["angry", "surprised", "disgusted", "happy", "fearful", "sad", "neutral"];
        let probs: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let p = if i == observed.id() as usize { 1.0 } else { 0.0 };
                format!("\"{n}\": {p}")
            })
            .collect();
        // Trace time t maps to session second floor(t) - 1.
        entries.push(format!("[{}, [{{{}}}]]", s + 1, probs.join(", ")));
    }
    let body = format!("[{}]", entries.join(",\n"));
    std::fs::write(dir.join(format!("{pid:03}_emotions.json")), body).unwrap();
}

/// Full-session corpus: one CSV per emotion folder for each participant,
/// plus traces disagreeing over seconds 600..614.
fn session_corpus(participants: &[u32]) -> (TempDir, WatchExperimentReader) {
    let tmp = TempDir::new().unwrap();
    let watch = tmp.path().join("watch");
    for emotion in emotion_exp_reader::EMOTIONS {
        for &pid in participants {
            write_session_csv(&watch.join(emotion.name()), pid);
        }
    }
    for &pid in participants {
        write_trace(&tmp.path().join("ground_truth"), pid, 600..SESSION_SECONDS);
    }
    (tmp, WatchExperimentReader::new(watch))
}

fn both_cfg() -> ReaderConfig {
    ReaderConfig { label_mode: LabelMode::Both, ..ReaderConfig::default() }
}

/// Windows per full-session file before filtering: seconds 20..614 step 5.
const WINDOWS_PER_FILE: usize = (SESSION_SECONDS - 20).div_ceil(5);

// ---------------------------------------------------------------------------
// Corpus materialisation under `both` mode
// ---------------------------------------------------------------------------

/// Windows whose reconciled label is a disagreement never reach the corpus,
/// and every surviving label is a valid seven-class id.
#[test]
fn both_mode_filters_disagreements() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let corpus = reader.get_raw_data(&both_cfg()).unwrap();

    // Disagreements cover seconds 600..614; window seconds 600, 605 and 610
    // fall inside, so each file loses exactly 3 windows.
    assert_eq!(corpus.len(), 7 * (WINDOWS_PER_FILE - 3));
    assert!(corpus.labels.iter().all(|&l| l < 7), "labels must be seven-class ids");
}

/// Without disagreements (expected mode) every window survives.
#[test]
fn expected_mode_keeps_every_window() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let cfg = ReaderConfig::default();
    let corpus = reader.get_raw_data(&cfg).unwrap();
    assert_eq!(corpus.len(), 7 * WINDOWS_PER_FILE);
}

/// A full-session file visits every schedule segment, so all seven classes
/// appear in the corpus.
#[test]
fn full_session_corpus_covers_all_classes() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let corpus = reader.get_raw_data(&both_cfg()).unwrap();
    for class in 0..7u8 {
        assert!(
            corpus.labels.contains(&class),
            "class {class} missing from the full-session corpus"
        );
    }
}

// ---------------------------------------------------------------------------
// Cross-validation over the reconciled corpus
// ---------------------------------------------------------------------------

/// Iterating `cv_index` 0..cv_splits, the TEST folds partition the whole
/// reconciled corpus.
#[test]
fn test_folds_partition_reconciled_corpus() {
    let (_tmp, mut reader) = session_corpus(&[1, 2]);
    let cfg = both_cfg();
    let corpus_len = reader.get_raw_data(&cfg).unwrap().len();

    let mut seen = std::collections::HashSet::new();
    for cv_index in 0..cfg.cv_splits {
        let fold_cfg = ReaderConfig { cv_index, ..cfg.clone() };
        for idx in reader.get_cross_validation_indices(Set::Test, &fold_cfg).unwrap() {
            assert!(seen.insert(idx), "index {idx} appears in two test folds");
        }
    }
    assert_eq!(seen.len(), corpus_len, "test folds must cover the whole corpus");
}

/// `Set::All` selects the full corpus.
#[test]
fn all_split_selects_every_window() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let cfg = both_cfg();
    let corpus_len = reader.get_raw_data(&cfg).unwrap().len();
    let labels = reader.get_labels(Set::All, &cfg).unwrap();
    assert_eq!(labels.len(), corpus_len);
}

// ---------------------------------------------------------------------------
// Stream / label agreement
// ---------------------------------------------------------------------------

/// The unshuffled stream's argmax sequence equals `get_labels` for every
/// split and every cv_index.
#[test]
fn unshuffled_stream_matches_get_labels() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    for cv_index in 0..5 {
        for &set in &[Set::Train, Set::Val, Set::Test] {
            let cfg = ReaderConfig {
                label_mode: LabelMode::Both,
                cv_index,
                shuffle: Some(false),
                ..ReaderConfig::default()
            };
            let streamed: Vec<u8> = reader
                .get_seven_emotion_data(set, 32, &cfg)
                .unwrap()
                .flat_map(|b| b.label_ids())
                .collect();
            let labels = reader.get_labels(set, &cfg).unwrap();
            assert_eq!(streamed, labels, "split {set:?} at cv_index {cv_index}");
        }
    }
}

/// Batched output geometry: features stack to `[len, window, 5]` and one-hot
/// rows sum to 1.
#[test]
fn batch_geometry_and_one_hot() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let cfg = ReaderConfig { shuffle: Some(false), ..ReaderConfig::default() };
    let mut batches = reader.get_seven_emotion_data(Set::Train, 16, &cfg).unwrap();
    let batch = batches.next().expect("train split is non-empty");
    assert_eq!(batch.stacked().dim(), (16, 20, 5));
    assert_eq!(batch.labels.dim(), (16, 7));
    for row in batch.labels.rows() {
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}

/// The three-class stream carries the same features with remapped labels.
#[test]
fn three_class_stream_applies_frozen_conversion() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let cfg = ReaderConfig { shuffle: Some(false), ..ReaderConfig::default() };
    let seven: Vec<u8> = reader
        .get_seven_emotion_data(Set::Test, 32, &cfg)
        .unwrap()
        .flat_map(|b| b.label_ids())
        .collect();
    let three: Vec<u8> = reader
        .get_three_emotion_data(Set::Test, 32, &cfg)
        .unwrap()
        .flat_map(|b| b.label_ids())
        .collect();
    let conversion = [2u8, 0, 2, 0, 2, 2, 1];
    let expected: Vec<u8> = seven.iter().map(|&l| conversion[l as usize]).collect();
    assert_eq!(three, expected);
}

/// Shuffled training streams reorder but preserve the label multiset.
#[test]
fn shuffle_preserves_label_multiset() {
    let (_tmp, mut reader) = session_corpus(&[1]);
    let cfg = ReaderConfig::default();
    let mut shuffled: Vec<u8> = reader
        .get_seven_emotion_data(Set::Train, 32, &cfg)
        .unwrap()
        .flat_map(|b| b.label_ids())
        .collect();
    let mut plain = reader.get_labels(Set::Train, &cfg).unwrap();
    shuffled.sort_unstable();
    plain.sort_unstable();
    assert_eq!(shuffled, plain);
}
