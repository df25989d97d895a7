//! Folding poll samples into result summaries.
//!
//! The engine is authoritative for every feature: counting totals and the
//! per-frame entity lists are replaced wholesale on each poll. The fold only
//! derives the scalar aggregates and keeps the latest frame, so applying the
//! same sample twice, or samples slightly out of order, never breaks the
//! summary invariants.

use sentinel_models::image::{frame_data_uri, plate_image_data_uri};
use sentinel_models::{
    CountSample, CountSummary, Feature, MaskSample, MaskSummary, ModelError, ModelResult,
    PlateEntry, PlateSample, PlateSummary, PollSample, ResultSummary,
};
use tracing::debug;

/// Feature-specific reducer over poll samples.
#[derive(Debug, Clone, Copy)]
pub struct ResultAccumulator {
    feature: Feature,
}

impl ResultAccumulator {
    pub fn new(feature: Feature) -> Self {
        Self { feature }
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Empty summary for a fresh job.
    pub fn empty(&self) -> ResultSummary {
        ResultSummary::empty(self.feature)
    }

    /// Fold a sample into the previous summary.
    ///
    /// Fails only when the sample or the summary belongs to another feature.
    pub fn fold(&self, previous: &ResultSummary, sample: &PollSample) -> ModelResult<ResultSummary> {
        if sample.feature() != self.feature || previous.feature() != self.feature {
            return Err(ModelError::FeatureMismatch {
                summary: previous.feature().as_str(),
                sample: sample.feature().as_str(),
            });
        }

        let summary = match (previous, sample) {
            (_, PollSample::PeopleCount(s)) => ResultSummary::PeopleCount(fold_count(s)),
            (ResultSummary::Mask(prev), PollSample::Mask(s)) => ResultSummary::Mask(fold_mask(prev, s)),
            (ResultSummary::Plate(prev), PollSample::Plate(s)) => {
                ResultSummary::Plate(fold_plate(prev, s))
            }
            // Features were checked above
            _ => {
                return Err(ModelError::FeatureMismatch {
                    summary: previous.feature().as_str(),
                    sample: sample.feature().as_str(),
                })
            }
        };

        Ok(summary)
    }
}

fn fold_count(sample: &CountSample) -> CountSummary {
    CountSummary::new(sample.entering, sample.exiting)
}

fn fold_mask(previous: &MaskSummary, sample: &MaskSample) -> MaskSummary {
    let with_mask = sample.people.iter().filter(|p| p.has_mask).count() as u32;
    let total_people = sample.people.len() as u32;

    MaskSummary {
        total_people,
        with_mask,
        without_mask: total_people - with_mask,
        people: sample.people.clone(),
        frame: sample
            .frame_base64
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(frame_data_uri)
            .or_else(|| previous.frame.clone()),
    }
}

fn fold_plate(previous: &PlateSummary, sample: &PlateSample) -> PlateSummary {
    let plates: Vec<PlateEntry> = sample
        .plates
        .iter()
        .map(|p| PlateEntry {
            text: p.text.clone(),
            confidence: p.confidence,
            image: decode_plate_image(&p.text, &p.image),
            timestamp: p.timestamp,
        })
        .collect();

    PlateSummary {
        total_plates: plates.len() as u32,
        plates,
        frame: sample
            .current_frame
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(frame_data_uri)
            .or_else(|| previous.frame.clone()),
    }
}

fn decode_plate_image(text: &str, raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    match plate_image_data_uri(raw) {
        Ok(uri) => Some(uri),
        Err(e) => {
            debug!("Dropping undecodable image for plate {}: {}", text, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_models::{MaskPerson, PlateDetection};

    fn person(id: u32, has_mask: bool) -> MaskPerson {
        MaskPerson {
            id,
            has_mask,
            bbox: None,
        }
    }

    fn mask_sample(people: Vec<MaskPerson>, frame: Option<&str>) -> PollSample {
        PollSample::Mask(MaskSample {
            people,
            frame_base64: frame.map(str::to_string),
            is_processing: true,
            timestamp: None,
        })
    }

    #[test]
    fn test_count_fold_is_direct_replace() {
        let acc = ResultAccumulator::new(Feature::PeopleCount);
        let first = acc
            .fold(
                &acc.empty(),
                &PollSample::PeopleCount(CountSample {
                    entering: 3,
                    exiting: 1,
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(first, ResultSummary::PeopleCount(CountSummary::new(3, 1)));

        // Engine totals win even if they go down
        let second = acc
            .fold(
                &first,
                &PollSample::PeopleCount(CountSample {
                    entering: 2,
                    exiting: 0,
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(second, ResultSummary::PeopleCount(CountSummary::new(2, 0)));
    }

    #[test]
    fn test_mask_fold_derives_counts() {
        let acc = ResultAccumulator::new(Feature::Mask);
        let sample = mask_sample(vec![person(0, true), person(1, false), person(2, true)], Some("AAAA"));

        let summary = acc.fold(&acc.empty(), &sample).unwrap();
        let ResultSummary::Mask(mask) = &summary else {
            panic!("expected mask summary");
        };
        assert_eq!(mask.total_people, 3);
        assert_eq!(mask.with_mask, 2);
        assert_eq!(mask.without_mask, 1);
        assert_eq!(mask.frame.as_deref(), Some("data:image/jpeg;base64,AAAA"));
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_mask_fold_replaces_list_and_keeps_last_frame() {
        let acc = ResultAccumulator::new(Feature::Mask);
        let first = acc
            .fold(&acc.empty(), &mask_sample(vec![person(0, true)], Some("AAAA")))
            .unwrap();
        let second = acc.fold(&first, &mask_sample(vec![], None)).unwrap();

        let ResultSummary::Mask(mask) = &second else {
            panic!("expected mask summary");
        };
        assert_eq!(mask.total_people, 0);
        assert!(mask.people.is_empty());
        assert_eq!(mask.frame.as_deref(), Some("data:image/jpeg;base64,AAAA"));
    }

    #[test]
    fn test_fold_is_idempotent() {
        let acc = ResultAccumulator::new(Feature::Mask);
        let sample = mask_sample(vec![person(0, false), person(1, true)], Some("BBBB"));

        let once = acc.fold(&acc.empty(), &sample).unwrap();
        let twice = acc.fold(&once, &sample).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_plate_fold_is_idempotent() {
        let acc = ResultAccumulator::new(Feature::Plate);
        let sample = PollSample::Plate(PlateSample {
            plates: vec![PlateDetection {
                text: "DL3CAF0001".into(),
                confidence: 0.88,
                image: "ffd8ffe0".into(),
                timestamp: Some(1.0),
            }],
            current_frame: None,
            processing_complete: false,
        });

        let once = acc.fold(&acc.empty(), &sample).unwrap();
        let twice = acc.fold(&once, &sample).unwrap();
        assert_eq!(once, twice);
        assert!(twice.is_consistent());
    }

    #[test]
    fn test_plate_fold_decodes_images() {
        let acc = ResultAccumulator::new(Feature::Plate);
        let sample = PollSample::Plate(PlateSample {
            plates: vec![
                PlateDetection {
                    text: "KA01AB1234".into(),
                    confidence: 0.93,
                    image: "ffd8ffe0".into(),
                    timestamp: Some(4.5),
                },
                PlateDetection {
                    text: "MH12XY9876".into(),
                    confidence: 0.71,
                    image: "zz".into(),
                    timestamp: None,
                },
            ],
            current_frame: Some("data:image/jpeg;base64,CCCC".into()),
            processing_complete: false,
        });

        let summary = acc.fold(&acc.empty(), &sample).unwrap();
        let ResultSummary::Plate(plates) = &summary else {
            panic!("expected plate summary");
        };
        assert_eq!(plates.total_plates, 2);
        assert_eq!(
            plates.plates[0].image.as_deref(),
            Some("data:image/jpeg;base64,/9j/4A==")
        );
        assert_eq!(plates.plates[0].timestamp, Some(4.5));
        assert!(plates.plates[1].image.is_none());
        assert_eq!(plates.frame.as_deref(), Some("data:image/jpeg;base64,CCCC"));
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_feature_mismatch_rejected() {
        let acc = ResultAccumulator::new(Feature::PeopleCount);
        let err = acc
            .fold(&acc.empty(), &mask_sample(vec![], None))
            .unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { .. }));
    }
}
