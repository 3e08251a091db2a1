//! Data partition tags.

use serde::{Deserialize, Serialize};

/// Identifies which partition of an experiment corpus a caller wants.
///
/// [`Set::All`] is the union of the test partitions across every
/// cross-validation index and is mainly useful for corpus-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Set {
    /// Training partition.
    Train,
    /// Validation partition.
    Val,
    /// Test partition.
    Test,
    /// Union of the test partitions over all cross-validation indices.
    All,
}

impl Set {
    /// The three concrete partitions (excludes [`Set::All`]).
    pub const SPLITS: [Set; 3] = [Set::Train, Set::Val, Set::Test];

    /// Lower-case folder name used by directory-per-split corpora.
    pub fn folder_name(self) -> &'static str {
        match self {
            Set::Train => "train",
            Set::Val => "val",
            Set::Test => "test",
            Set::All => "all",
        }
    }
}
