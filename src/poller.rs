use chrono::{DateTime, Utc};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{DashboardError, Result};

/// Loading indicators of one view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshState {
    /// True only while the first fetch since mount is in flight.
    pub is_loading: bool,
    /// True while any fetch, periodic ones included, is in flight.
    pub is_refreshing: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Handle of one in-flight fetch. Only the token of the latest generation may
/// update view state.
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    cancel: CancellationToken,
}

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drives `fut` until it completes or this token is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DashboardError::Superseded),
            res = fut => res,
        }
    }
}

/// How a finished fetch relates to the view.
#[derive(Debug)]
pub enum Completion<T> {
    /// Latest request succeeded; the caller replaces its rows with the value.
    Fresh(T),
    /// Latest request failed; previous rows stay on display.
    Failed(DashboardError),
    /// A newer request owns the view, or the view was torn down.
    Superseded,
}

/// Generation counter and refresh flags of a single view.
#[derive(Debug, Default)]
pub struct Poller {
    generation: u64,
    in_flight: Option<CancellationToken>,
    state: RefreshState,
    started: bool,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        token.generation == self.generation && self.in_flight.is_some()
    }

    /// Cancels the outstanding request and issues the token of a new one.
    pub fn begin(&mut self) -> RequestToken {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.generation += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());
        self.state.is_refreshing = true;
        if !self.started {
            self.state.is_loading = true;
            self.started = true;
        }
        RequestToken {
            generation: self.generation,
            cancel,
        }
    }

    /// Settles the request of `token`.
    ///
    /// `owns_flags` is false when the request belongs to a tab that is no longer
    /// displayed; its completion then leaves the loading flags alone.
    pub fn finish<T>(&mut self, token: &RequestToken, result: Result<T>, owns_flags: bool) -> Completion<T> {
        if !self.is_current(token) || token.is_cancelled() {
            return Completion::Superseded;
        }
        if let Err(e) = &result {
            if e.is_superseded() {
                return Completion::Superseded;
            }
        }
        self.in_flight = None;
        if owns_flags {
            self.state.is_loading = false;
            self.state.is_refreshing = false;
        }
        match result {
            Ok(value) => {
                self.state.last_refreshed_at = Some(Utc::now());
                Completion::Fresh(value)
            }
            Err(e) => Completion::Failed(e),
        }
    }

    /// Flags are cleared when the displayed tab changes under a running request.
    pub fn clear_flags(&mut self) {
        self.state.is_loading = false;
        self.state.is_refreshing = false;
    }

    /// Cancels the outstanding request and clears the flags. The next
    /// `begin` counts as the first fetch of a fresh mount.
    pub fn teardown(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.clear_flags();
        self.started = false;
    }
}
