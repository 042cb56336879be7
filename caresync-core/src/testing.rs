//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, ReachabilityProbe, RemoteApi};

type PostHook = Box<dyn Fn(usize) + Send + Sync>;

/// Remote API fake that records every POST and answers from a script.
#[derive(Default)]
pub struct FakeApi {
    reads: Mutex<HashMap<String, Result<Value, ApiError>>>,
    post_script: Mutex<VecDeque<Result<(), ApiError>>>,
    posts: Mutex<Vec<(String, Value)>>,
    post_hook: Option<PostHook>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for every GET of `path`.
    pub fn with_read(self, path: &str, body: Result<Value, ApiError>) -> Self {
        self.reads.lock().unwrap().insert(path.to_string(), body);
        self
    }

    /// Answers successive POSTs in order; unscripted POSTs succeed.
    pub fn with_post_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = Result<(), ApiError>>,
    {
        self.post_script.lock().unwrap().extend(results);
        self
    }

    /// Runs `hook` with the 1-based POST count after each POST.
    pub fn with_post_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.post_hook = Some(Box::new(hook));
        self
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

pub fn server_error(path: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        path: path.to_string(),
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        self.reads
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| {
                Err(ApiError::Status {
                    status: 404,
                    path: path.to_string(),
                })
            })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        let count = {
            let mut posts = self.posts.lock().unwrap();
            posts.push((path.to_string(), body.clone()));
            posts.len()
        };
        let result = self.post_script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if let Some(hook) = &self.post_hook {
            hook(count);
        }
        result
    }
}

/// Probe that replays a fixed sequence of readings, then repeats the last.
pub struct ScriptedProbe {
    readings: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new<I: IntoIterator<Item = bool>>(readings: I) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn check(&self) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings
            .get(n)
            .or_else(|| self.readings.last())
            .copied()
            .unwrap_or(false)
    }
}
