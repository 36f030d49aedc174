//! Keyed polling engine for long-running remote jobs
//!
//! A `PollRegistry` owns at most one registration per key. Each registration
//! is a tokio task that waits one interval, runs the poll function, and asks
//! the returned `PollDirective` whether to go on. The decision to stop lives
//! in the domain handler, not here.
//!
//! # States
//!
//! - **Idle**: no registration for the key
//! - **Polling**: registered, waiting for the next tick
//! - **InFlight**: a status request is outstanding
//!
//! # Guarantees
//!
//! - `start` on a registered key cancels the previous registration first
//! - `stop` (or a superseding `start`) aborts the task, and every registration
//!   carries a token that is checked before re-arming, so a late response can
//!   never resurrect a cancelled poll
//! - A failed tick is absorbed: it is logged, counted, and the next tick runs
//!   on schedule

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::Result;

/// Outcome of one poll tick, consumed by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDirective {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    Idle,
    Polling,
    InFlight,
}

type PollFn = Arc<dyn Fn() -> BoxFuture<'static, Result<PollDirective>> + Send + Sync>;

struct Registration {
    token: Uuid,
    state: PollState,
    started_at: DateTime<Utc>,
    ticks: u64,
    transient_failures: u32,
    handle: JoinHandle<()>,
}

/// Snapshot of a registration, for status display
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationInfo {
    pub key: String,
    pub state: PollState,
    pub started_at: DateTime<Utc>,
    pub ticks: u64,
    pub transient_failures: u32,
}

type Registrations = Arc<Mutex<HashMap<String, Registration>>>;

#[derive(Clone)]
pub struct PollRegistry {
    interval: Duration,
    registrations: Registrations,
}

impl PollRegistry {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            registrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register `poll` under `key`, replacing any previous registration.
    ///
    /// The first tick runs one interval after this call. Callers needing an
    /// immediate check run it themselves before starting.
    pub async fn start<K, F, Fut>(&self, key: K, poll: F)
    where
        K: AsRef<str>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollDirective>> + Send + 'static,
    {
        let key = key.as_ref().to_string();
        let poll: PollFn = Arc::new(move || poll().boxed());
        let token = Uuid::new_v4();

        let mut registrations = self.registrations.lock().await;
        if let Some(previous) = registrations.remove(&key) {
            previous.handle.abort();
            info!("Superseded poll registration for {}", key);
        }

        let handle = tokio::spawn(run(
            self.registrations.clone(),
            key.clone(),
            token,
            self.interval,
            poll,
        ));

        registrations.insert(
            key.clone(),
            Registration {
                token,
                state: PollState::Polling,
                started_at: Utc::now(),
                ticks: 0,
                transient_failures: 0,
                handle,
            },
        );
        info!("Started polling {} every {}ms", key, self.interval.as_millis());
    }

    /// Cancel the registration for `key`; returns false when there was none
    #[instrument(skip(self))]
    pub async fn stop(&self, key: &str) -> bool {
        let mut registrations = self.registrations.lock().await;
        match registrations.remove(key) {
            Some(registration) => {
                registration.handle.abort();
                info!("Stopped polling {} after {} ticks", key, registration.ticks);
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let mut registrations = self.registrations.lock().await;
        for (key, registration) in registrations.drain() {
            registration.handle.abort();
            debug!("Stopped polling {}", key);
        }
    }

    pub async fn state(&self, key: &str) -> PollState {
        let registrations = self.registrations.lock().await;
        registrations
            .get(key)
            .map(|r| r.state)
            .unwrap_or(PollState::Idle)
    }

    pub async fn is_active(&self, key: &str) -> bool {
        self.registrations.lock().await.contains_key(key)
    }

    pub async fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registrations.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn info(&self, key: &str) -> Option<RegistrationInfo> {
        let registrations = self.registrations.lock().await;
        registrations.get(key).map(|r| RegistrationInfo {
            key: key.to_string(),
            state: r.state,
            started_at: r.started_at,
            ticks: r.ticks,
            transient_failures: r.transient_failures,
        })
    }

    /// Wait until `key` has no registration, checking every `check_every`
    pub async fn wait_idle(&self, key: &str, check_every: Duration) {
        while self.is_active(key).await {
            sleep(check_every).await;
        }
    }
}

async fn run(
    registrations: Registrations,
    key: String,
    token: Uuid,
    interval: Duration,
    poll: PollFn,
) {
    loop {
        sleep(interval).await;

        {
            let mut guard = registrations.lock().await;
            match guard.get_mut(&key) {
                Some(registration) if registration.token == token => {
                    registration.state = PollState::InFlight;
                    registration.ticks += 1;
                }
                _ => return,
            }
        }

        let outcome = poll().await;

        let mut guard = registrations.lock().await;
        if guard.get(&key).map(|r| r.token) != Some(token) {
            debug!("Dropping late poll response for {}", key);
            return;
        }

        match outcome {
            Ok(PollDirective::Stop) => {
                if let Some(registration) = guard.remove(&key) {
                    info!(
                        "Poll for {} reached a terminal status after {} ticks",
                        key, registration.ticks
                    );
                }
                return;
            }
            Ok(PollDirective::Continue) => {
                if let Some(registration) = guard.get_mut(&key) {
                    registration.state = PollState::Polling;
                }
            }
            Err(e) => {
                if let Some(registration) = guard.get_mut(&key) {
                    registration.state = PollState::Polling;
                    registration.transient_failures += 1;
                    warn!(
                        "Transient poll failure for {} ({} so far): {}",
                        key, registration.transient_failures, e
                    );
                }
            }
        }
    }
}
