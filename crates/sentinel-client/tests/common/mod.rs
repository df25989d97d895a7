//! Shared fixtures for session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sentinel_client::models::{
    CountSample, Feature, MaskPerson, MaskSample, PlateDetection, PlateSample, PollSample,
};
use sentinel_client::{
    AnalysisEngine, EngineError, EngineResult, JobSession, SessionOptions, UploadCandidate,
    UploadPayload,
};
use sentinel_client::notify::NoopSink;

/// A call the session made to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(Feature, String),
    Fetch(Feature),
    Stop(Feature),
}

/// What the next poll returns.
#[derive(Debug, Clone)]
pub enum Step {
    Sample(PollSample),
    Fail(String),
    /// Sample delivered after a delay
    Delayed(Duration, PollSample),
}

/// In-memory engine that plays back a script of poll responses.
///
/// Once the script runs out the last step repeats.
#[derive(Default)]
pub struct ScriptedEngine {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    start_rejection: Mutex<Option<String>>,
    start_delay: Mutex<Duration>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    /// Make every start request fail with a structured rejection.
    pub fn reject_start(&self, message: &str) {
        *self.start_rejection.lock().unwrap() = Some(message.to_string());
    }

    pub fn delay_start(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Fetch(_)))
            .count()
    }

    pub fn stop_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Stop(_)))
            .count()
    }

    fn next_step(&self) -> Option<Step> {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = script.pop_front() {
            *last = Some(step);
        }
        last.clone()
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    async fn start_job(&self, feature: Feature, upload: &UploadPayload) -> EngineResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Start(feature, upload.file_name.clone()));

        let delay = *self.start_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let rejection = self.start_rejection.lock().unwrap().clone();
        match rejection {
            Some(message) => Err(EngineError::Rejected {
                status: 400,
                message,
            }),
            None => Ok(()),
        }
    }

    async fn fetch_sample(&self, feature: Feature) -> EngineResult<PollSample> {
        self.calls.lock().unwrap().push(Call::Fetch(feature));

        match self.next_step() {
            Some(Step::Sample(sample)) => Ok(sample),
            Some(Step::Fail(message)) => Err(EngineError::Status {
                status: 503,
                body: message,
            }),
            Some(Step::Delayed(delay, sample)) => {
                tokio::time::sleep(delay).await;
                Ok(sample)
            }
            None => Err(EngineError::InvalidResponse("script is empty".into())),
        }
    }

    async fn stop_job(&self, feature: Feature) -> EngineResult<()> {
        self.calls.lock().unwrap().push(Call::Stop(feature));
        Ok(())
    }
}

pub fn count(entering: u32, exiting: u32, done: bool) -> Step {
    Step::Sample(PollSample::PeopleCount(CountSample {
        entering,
        exiting,
        processing_complete: done,
        last_updated: None,
    }))
}

pub fn mask(masks: &[bool], frame: Option<&str>, processing: bool) -> Step {
    Step::Sample(PollSample::Mask(MaskSample {
        people: masks
            .iter()
            .enumerate()
            .map(|(i, has_mask)| MaskPerson {
                id: i as u32,
                has_mask: *has_mask,
                bbox: Some([0.0, 0.0, 10.0, 10.0]),
            })
            .collect(),
        frame_base64: frame.map(str::to_string),
        is_processing: processing,
        timestamp: None,
    }))
}

pub fn plates(entries: &[(&str, &str)], done: bool) -> Step {
    Step::Sample(PollSample::Plate(PlateSample {
        plates: entries
            .iter()
            .map(|(text, image)| PlateDetection {
                text: text.to_string(),
                confidence: 0.9,
                image: image.to_string(),
                timestamp: None,
            })
            .collect(),
        current_frame: Some("data:image/jpeg;base64,FRAME".into()),
        processing_complete: done,
    }))
}

pub fn video() -> UploadCandidate {
    UploadCandidate::from_bytes("entrance.mp4", "video/mp4", vec![1u8; 128])
}

/// Session over a scripted engine with a one second poll and a failure
/// threshold of three.
pub fn session(feature: Feature, engine: &Arc<ScriptedEngine>) -> JobSession {
    let options = SessionOptions::for_feature(feature)
        .with_poll_interval(Duration::from_secs(1))
        .with_failure_threshold(3);

    JobSession::new(feature, engine.clone(), Arc::new(NoopSink), options)
}
