//! Analysis features offered by the engine.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// One of the analysis flows the remote engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Face mask detection with a live annotated frame
    Mask,
    /// People entering/exiting counter
    PeopleCount,
    /// License plate detection and OCR
    Plate,
}

impl Feature {
    /// All features, in display order.
    pub const ALL: [Feature; 3] = [Feature::Mask, Feature::PeopleCount, Feature::Plate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Mask => "mask",
            Feature::PeopleCount => "people_count",
            Feature::Plate => "plate",
        }
    }

    /// Human-readable name used in notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Mask => "Mask Detection",
            Feature::PeopleCount => "People Counting",
            Feature::Plate => "License Plate Detection",
        }
    }

    /// Path of the multipart endpoint that starts a job.
    pub fn start_path(&self) -> &'static str {
        match self {
            Feature::Mask => "/api/start-mask-detection",
            Feature::PeopleCount => "/api/start-counting",
            Feature::Plate => "/api/start-plate-detection",
        }
    }

    /// Path polled for incremental results.
    pub fn data_path(&self) -> &'static str {
        match self {
            Feature::Mask => "/api/mask-data",
            Feature::PeopleCount => "/api/count-data",
            Feature::Plate => "/api/plate-data",
        }
    }

    /// Path that asks the engine to release the job.
    pub fn stop_path(&self) -> &'static str {
        match self {
            Feature::Mask => "/api/stop-mask-detection",
            Feature::PeopleCount => "/api/stop-counting",
            Feature::Plate => "/api/stop-plate-detection",
        }
    }

    /// Default poll period.
    ///
    /// Frame-heavy features poll fast for a smooth live preview; the counter
    /// only carries two integers and polls once a second.
    pub fn default_poll_interval(&self) -> Duration {
        match self {
            Feature::Mask => Duration::from_millis(200),
            Feature::PeopleCount => Duration::from_millis(1000),
            Feature::Plate => Duration::from_millis(100),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Feature {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mask" | "mask_detection" | "mask-detection" => Ok(Feature::Mask),
            "people" | "people_count" | "people-count" | "counting" => Ok(Feature::PeopleCount),
            "plate" | "plates" | "plate_detection" | "plate-detection" => Ok(Feature::Plate),
            other => Err(ModelError::UnknownFeature(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_feature_specific() {
        assert_eq!(Feature::PeopleCount.start_path(), "/api/start-counting");
        assert_eq!(Feature::PeopleCount.data_path(), "/api/count-data");
        assert_eq!(Feature::PeopleCount.stop_path(), "/api/stop-counting");
        assert_eq!(Feature::Mask.data_path(), "/api/mask-data");
        assert_eq!(Feature::Plate.stop_path(), "/api/stop-plate-detection");
    }

    #[test]
    fn test_parse_feature_aliases() {
        assert_eq!("Mask".parse::<Feature>().unwrap(), Feature::Mask);
        assert_eq!("counting".parse::<Feature>().unwrap(), Feature::PeopleCount);
        assert_eq!("plates".parse::<Feature>().unwrap(), Feature::Plate);
        assert!("faces".parse::<Feature>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Feature::PeopleCount).unwrap();
        assert_eq!(json, "\"people_count\"");
    }
}
