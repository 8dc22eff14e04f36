#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pipeline stage reached by a `detect` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectStage {
    #[default]
    Idle,
    Scoring,
    Reducing,
    Extracting,
    /// No candidate passed the threshold
    EmptyExit,
    Sorting,
    Suppressing,
    Done,
}

/// Diagnostics of one `detect` call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectStats {
    /// Global maximum of the cornerness map
    pub max_score: f64,
    /// `max_score * quality_level`
    pub threshold: f64,
    /// Candidates stored by the extractor
    pub candidates: usize,
    /// Candidate buffer size for this image
    pub capacity: usize,
    /// More candidates qualified than the buffer could hold
    pub overflowed: bool,
    /// Points returned to the caller
    pub corners: usize,
    pub stage: DetectStage,
}
