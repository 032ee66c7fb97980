//! Group uploaded read files into forward/reverse pairs
//!
//! Files are matched by the `_R1_` / `_R2_` read-index markers in their names. A pair is only
//! accepted when the two names are exactly one edit apart, which rules out pairings that are an
//! accident of sort order on unrelated samples.

use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::distance::edit_distance;

static FORWARD_MARKER: &str = "_R1_";
static REVERSE_MARKER: &str = "_R2_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("found {forward} forward and {reverse} reverse read files")]
    CountMismatch { forward: usize, reverse: usize },

    #[error("{forward} and {reverse} do not differ by a single read index")]
    NameMismatch { forward: String, reverse: String },
}

/// A read file as seen by the resolver: display name for matching, storage path for output
#[derive(Clone, Debug)]
pub struct ReadFile {
    pub name: String,
    pub path: PathBuf,
}

/// Forward and reverse storage paths of one sample, serialised as a two element array
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadPair(pub PathBuf, pub PathBuf);

/// Pair every forward read file with its reverse counterpart
///
/// Files carrying neither marker are left out. Forward and reverse lists are sorted by name
/// independently and zipped, so the output is in name order.
pub fn resolve_pairs(files: &[ReadFile]) -> Result<Vec<ReadPair>, PairingError> {
    let mut sorted: Vec<&ReadFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut forward: Vec<&ReadFile> = Vec::new();
    let mut reverse: Vec<&ReadFile> = Vec::new();
    for file in sorted {
        if file.name.contains(FORWARD_MARKER) {
            forward.push(file);
        } else if file.name.contains(REVERSE_MARKER) {
            reverse.push(file);
        } else {
            warn!("{} has no read index marker, not pairing it", file.name);
        }
    }

    if forward.len() != reverse.len() {
        return Err(PairingError::CountMismatch {
            forward: forward.len(),
            reverse: reverse.len(),
        });
    }

    forward
        .into_iter()
        .zip(reverse)
        .map(|(r1, r2)| {
            if edit_distance(&r1.name, &r2.name) != 1 {
                return Err(PairingError::NameMismatch {
                    forward: r1.name.clone(),
                    reverse: r2.name.clone(),
                });
            }
            info!("Paired {} with {}", r1.name, r2.name);
            Ok(ReadPair(r1.path.clone(), r2.path.clone()))
        })
        .collect()
}
