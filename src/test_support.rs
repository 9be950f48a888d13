//! Shared test doubles

use crate::cache::Clock;
use crate::error::SettingsError;
use crate::source::DataSource;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Data source returning a canned payload or error, counting calls
pub struct MockSource {
    response: Mutex<Result<Value, String>>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn ok(payload: Value) -> Self {
        Self {
            response: Mutex::new(Ok(payload)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.response.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn fetch(&self) -> Result<Value, SettingsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(SettingsError::Upstream)
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
