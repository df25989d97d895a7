//! Poll payloads returned by the analysis engine.
//!
//! The engine answers every poll with a feature-specific JSON document.
//! Each shape gets its own struct, and [`PollSample`] tags them so a
//! session never has to guess a payload's feature from its fields.

use serde::{Deserialize, Serialize};

use crate::feature::Feature;

/// A person detected in the current mask-detection frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskPerson {
    /// Per-frame index assigned by the engine
    pub id: u32,
    /// Whether the person is wearing a mask
    pub has_mask: bool,
    /// Bounding box `[x1, y1, x2, y2]` in frame pixels
    #[serde(default, rename = "box", skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

/// Payload of `GET /api/mask-data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskSample {
    #[serde(default)]
    pub people: Vec<MaskPerson>,
    /// Annotated frame as bare base64 JPEG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_base64: Option<String>,
    /// False once the engine has finished the video
    #[serde(default)]
    pub is_processing: bool,
    /// Engine wall-clock time of the frame (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Payload of `GET /api/count-data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountSample {
    #[serde(default)]
    pub entering: u32,
    #[serde(default)]
    pub exiting: u32,
    #[serde(default)]
    pub processing_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

/// A recognized license plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateDetection {
    pub text: String,
    pub confidence: f64,
    /// Plate crop, either a data URI or a hex-encoded JPEG
    #[serde(default)]
    pub image: String,
    /// Seconds into the video at which the plate was read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Payload of `GET /api/plate-data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlateSample {
    #[serde(default)]
    pub plates: Vec<PlateDetection>,
    /// Annotated frame as a data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<String>,
    #[serde(default)]
    pub processing_complete: bool,
}

/// One poll response, tagged with the feature it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum PollSample {
    Mask(MaskSample),
    PeopleCount(CountSample),
    Plate(PlateSample),
}

impl PollSample {
    /// Decode a raw engine payload for the given feature.
    pub fn from_json(feature: Feature, body: &[u8]) -> serde_json::Result<Self> {
        Ok(match feature {
            Feature::Mask => PollSample::Mask(serde_json::from_slice(body)?),
            Feature::PeopleCount => PollSample::PeopleCount(serde_json::from_slice(body)?),
            Feature::Plate => PollSample::Plate(serde_json::from_slice(body)?),
        })
    }

    pub fn feature(&self) -> Feature {
        match self {
            PollSample::Mask(_) => Feature::Mask,
            PollSample::PeopleCount(_) => Feature::PeopleCount,
            PollSample::Plate(_) => Feature::Plate,
        }
    }

    /// Whether the engine reports the job as finished.
    pub fn is_complete(&self) -> bool {
        match self {
            PollSample::Mask(s) => !s.is_processing,
            PollSample::PeopleCount(s) => s.processing_complete,
            PollSample::Plate(s) => s.processing_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mask_payload() {
        let body = br#"{
            "timestamp": 1717171717.5,
            "people": [
                {"id": 0, "has_mask": true, "box": [10, 20, 110, 220]},
                {"id": 1, "has_mask": false}
            ],
            "frame_base64": "/9j/4AAQ",
            "is_processing": true
        }"#;

        let sample = PollSample::from_json(Feature::Mask, body).unwrap();
        let PollSample::Mask(mask) = &sample else {
            panic!("expected mask sample");
        };
        assert_eq!(mask.people.len(), 2);
        assert_eq!(mask.people[0].bbox, Some([10.0, 20.0, 110.0, 220.0]));
        assert!(mask.people[1].bbox.is_none());
        assert!(!sample.is_complete());
    }

    #[test]
    fn test_decode_count_payload_with_extra_fields() {
        let body = br#"{"entering": 3, "exiting": 1, "last_updated": 12.0, "processing_complete": true}"#;

        let sample = PollSample::from_json(Feature::PeopleCount, body).unwrap();
        assert_eq!(sample.feature(), Feature::PeopleCount);
        assert!(sample.is_complete());
    }

    #[test]
    fn test_decode_plate_payload_defaults() {
        let body = br#"{"plates": [{"text": "KA01AB1234", "confidence": 0.91, "image": "ffd8"}]}"#;

        let sample = PollSample::from_json(Feature::Plate, body).unwrap();
        let PollSample::Plate(plate) = &sample else {
            panic!("expected plate sample");
        };
        assert_eq!(plate.plates[0].text, "KA01AB1234");
        assert!(plate.current_frame.is_none());
        assert!(!sample.is_complete());
    }

    #[test]
    fn test_mask_completion_is_inverted_flag() {
        let sample = PollSample::Mask(MaskSample {
            is_processing: false,
            ..Default::default()
        });
        assert!(sample.is_complete());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let body = br#"{"entering": "three"}"#;
        assert!(PollSample::from_json(Feature::PeopleCount, body).is_err());
    }
}
