//! Shared test doubles for the judge integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codepad_core::job::JobStatus;
use codepad_core::language::{Flavor, Language};
use codepad_core::types::LanguageId;
use codepad_events::{ExecutionEvent, ExecutionObserver};
use codepad_judge::api::{
    ExecutionApi, JudgeApiError, SubmissionBody, SubmissionDetails, SubmissionReceipt,
};
use codepad_judge::poller::Scheduler;

// ---------------------------------------------------------------------------
// Scripted execution service
// ---------------------------------------------------------------------------

/// One scripted answer to a status request.
#[derive(Clone)]
pub enum PollReply {
    Details(SubmissionDetails),
    Error { status: u16, body: String },
}

/// A status reply with the given id and optional encoded stdout.
pub fn status(id: u32, description: &str, stdout: Option<&str>) -> PollReply {
    PollReply::Details(SubmissionDetails {
        status: JobStatus::new(id, description),
        stdout: stdout.map(str::to_string),
        compile_output: None,
        time: if id > 2 { Some("0.012".into()) } else { None },
        memory: if id > 2 { Some(3264) } else { None },
    })
}

/// In-memory [`ExecutionApi`] that answers from a script and records calls.
///
/// Status replies are consumed in order; the last one repeats forever.
#[derive(Default)]
pub struct MockApi {
    token: String,
    region: Option<String>,
    submit_error: Option<(u16, String)>,
    polls: Mutex<VecDeque<PollReply>>,
    bundle: Option<String>,
    bundle_error: Mutex<Option<(u16, String)>>,
    languages: HashMap<Flavor, Vec<Language>>,
    language_errors: Vec<Flavor>,

    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub bundle_fetches: AtomicUsize,
    pub language_lookups: AtomicUsize,
    pub bodies: Mutex<Vec<SubmissionBody>>,
    pub poll_regions: Mutex<Vec<Option<String>>>,
    pub poll_tokens: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            token: "abc".into(),
            ..Default::default()
        }
    }

    pub fn with_receipt(mut self, token: &str, region: Option<&str>) -> Self {
        self.token = token.into();
        self.region = region.map(str::to_string);
        self
    }

    pub fn with_polls(self, replies: Vec<PollReply>) -> Self {
        *self.polls.lock().unwrap() = replies.into();
        self
    }

    pub fn with_submit_error(mut self, status: u16, body: &str) -> Self {
        self.submit_error = Some((status, body.into()));
        self
    }

    pub fn with_bundle(mut self, payload: &str) -> Self {
        self.bundle = Some(payload.into());
        self
    }

    /// The next bundle download fails once with the given status.
    pub fn with_bundle_error(self, status: u16, body: &str) -> Self {
        *self.bundle_error.lock().unwrap() = Some((status, body.into()));
        self
    }

    pub fn with_languages(mut self, flavor: Flavor, languages: &[(LanguageId, &str)]) -> Self {
        self.languages.insert(
            flavor,
            languages
                .iter()
                .map(|(id, name)| Language {
                    id: *id,
                    name: name.to_string(),
                    source_file: None,
                })
                .collect(),
        );
        self
    }

    pub fn with_language_error(mut self, flavor: Flavor) -> Self {
        self.language_errors.push(flavor);
        self
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.bundle_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionApi for MockApi {
    async fn create_submission(
        &self,
        _flavor: Flavor,
        body: &SubmissionBody,
    ) -> Result<SubmissionReceipt, JudgeApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.clone());

        if let Some((status, body)) = &self.submit_error {
            return Err(JudgeApiError::ApiError {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(SubmissionReceipt {
            token: self.token.clone(),
            region: self.region.clone(),
        })
    }

    async fn get_submission(
        &self,
        _flavor: Flavor,
        token: &str,
        region: Option<&str>,
    ) -> Result<SubmissionDetails, JudgeApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.poll_regions
            .lock()
            .unwrap()
            .push(region.map(str::to_string));
        self.poll_tokens.lock().unwrap().push(token.to_string());

        let reply = {
            let mut polls = self.polls.lock().unwrap();
            if polls.len() > 1 {
                polls.pop_front()
            } else {
                polls.front().cloned()
            }
        };

        match reply.expect("no status replies scripted") {
            PollReply::Details(details) => Ok(details),
            PollReply::Error { status, body } => Err(JudgeApiError::ApiError { status, body }),
        }
    }

    async fn list_languages(&self, flavor: Flavor) -> Result<Vec<Language>, JudgeApiError> {
        if self.language_errors.contains(&flavor) {
            return Err(JudgeApiError::ApiError {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.languages.get(&flavor).cloned().unwrap_or_default())
    }

    async fn get_language(
        &self,
        flavor: Flavor,
        language_id: LanguageId,
    ) -> Result<Language, JudgeApiError> {
        self.language_lookups.fetch_add(1, Ordering::SeqCst);
        self.languages
            .get(&flavor)
            .and_then(|all| all.iter().find(|l| l.id == language_id))
            .cloned()
            .map(|mut l| {
                l.source_file = Some(format!("main.{language_id}"));
                l
            })
            .ok_or(JudgeApiError::ApiError {
                status: 404,
                body: "not found".into(),
            })
    }

    async fn fetch_bundled_files(&self) -> Result<String, JudgeApiError> {
        self.bundle_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some((status, body)) = self.bundle_error.lock().unwrap().take() {
            return Err(JudgeApiError::ApiError { status, body });
        }
        Ok(self.bundle.clone().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Scheduler and observer doubles
// ---------------------------------------------------------------------------

/// Scheduler that returns immediately and records every requested delay.
#[derive(Default)]
pub struct RecordingScheduler {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Observer closure collecting every event, plus the shared log.
pub fn recorder() -> (Arc<Mutex<Vec<ExecutionEvent>>>, Arc<dyn ExecutionObserver>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer: Arc<dyn ExecutionObserver> = Arc::new(move |event: &ExecutionEvent| {
        sink.lock().unwrap().push(event.clone());
    });
    (events, observer)
}

/// Names of the recorded events, in order.
pub fn names(events: &Mutex<Vec<ExecutionEvent>>) -> Vec<&'static str> {
    events.lock().unwrap().iter().map(|e| e.name()).collect()
}
