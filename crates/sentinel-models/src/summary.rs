//! Display-ready result summaries.
//!
//! A summary is the running aggregate of everything the engine has reported
//! for a job. Summaries are only ever produced by the accumulator fold;
//! consumers read them from session snapshots.

use serde::{Deserialize, Serialize};

use crate::feature::Feature;
use crate::sample::MaskPerson;

/// People counting totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountSummary {
    pub entering: u32,
    pub exiting: u32,
    /// Always `entering + exiting`
    pub total: u32,
}

impl CountSummary {
    pub fn new(entering: u32, exiting: u32) -> Self {
        Self {
            entering,
            exiting,
            total: entering.saturating_add(exiting),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.entering.saturating_add(self.exiting)
    }
}

/// Mask detection aggregate for the latest frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskSummary {
    pub total_people: u32,
    pub with_mask: u32,
    pub without_mask: u32,
    pub people: Vec<MaskPerson>,
    /// Most recent annotated frame as a data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

impl MaskSummary {
    pub fn is_consistent(&self) -> bool {
        self.total_people == self.with_mask + self.without_mask
            && self.total_people as usize == self.people.len()
    }
}

/// A plate ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateEntry {
    pub text: String,
    pub confidence: f64,
    /// Plate crop as a data URI; `None` when the engine sent an undecodable image
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// License plate aggregate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlateSummary {
    pub total_plates: u32,
    pub plates: Vec<PlateEntry>,
    /// Most recent annotated frame as a data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

impl PlateSummary {
    pub fn is_consistent(&self) -> bool {
        self.total_plates as usize == self.plates.len()
    }
}

/// Feature-tagged result summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum ResultSummary {
    Mask(MaskSummary),
    PeopleCount(CountSummary),
    Plate(PlateSummary),
}

impl ResultSummary {
    /// An empty summary for a fresh job.
    pub fn empty(feature: Feature) -> Self {
        match feature {
            Feature::Mask => ResultSummary::Mask(MaskSummary::default()),
            Feature::PeopleCount => ResultSummary::PeopleCount(CountSummary::default()),
            Feature::Plate => ResultSummary::Plate(PlateSummary::default()),
        }
    }

    pub fn feature(&self) -> Feature {
        match self {
            ResultSummary::Mask(_) => Feature::Mask,
            ResultSummary::PeopleCount(_) => Feature::PeopleCount,
            ResultSummary::Plate(_) => Feature::Plate,
        }
    }

    /// Check the aggregate invariants of the summary.
    pub fn is_consistent(&self) -> bool {
        match self {
            ResultSummary::Mask(s) => s.is_consistent(),
            ResultSummary::PeopleCount(s) => s.is_consistent(),
            ResultSummary::Plate(s) => s.is_consistent(),
        }
    }

    /// Latest annotated frame, if the feature streams frames.
    pub fn frame(&self) -> Option<&str> {
        match self {
            ResultSummary::Mask(s) => s.frame.as_deref(),
            ResultSummary::Plate(s) => s.frame.as_deref(),
            ResultSummary::PeopleCount(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summaries_are_consistent() {
        for feature in Feature::ALL {
            let summary = ResultSummary::empty(feature);
            assert_eq!(summary.feature(), feature);
            assert!(summary.is_consistent());
            assert!(summary.frame().is_none());
        }
    }

    #[test]
    fn test_count_summary_total() {
        let summary = CountSummary::new(3, 1);
        assert_eq!(summary.total, 4);
        assert!(summary.is_consistent());

        let broken = CountSummary {
            entering: 3,
            exiting: 1,
            total: 5,
        };
        assert!(!broken.is_consistent());
    }
}
