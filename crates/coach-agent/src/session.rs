use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use dt_core::apply::{apply_all, reconcile};
use dt_core::directive::{parse_directives, Directive};
use dt_core::project::{Attribution, ChatMessage, ProjectState};
use dt_core::prompt::recovery_prompt;
use tokio_util::sync::CancellationToken;

use crate::stream::drain;
use crate::transport::ChatTransport;
use crate::types::{ChatRequest, WireMessage};
use crate::{CoachError, Result};

// ─── Turn ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    /// Another request is already in flight on this session.
    Busy,
    /// The active coach never records artifacts, so there is nothing to
    /// recover.
    NotRecordable,
}

#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    Completed {
        directives: Vec<Directive>,
        raw: String,
    },
    Cancelled,
    Failed(CoachError),
}

/// Result of one round trip: the state to keep and what happened.
///
/// The state is always usable. On failure or cancel it still holds the
/// user's message.
#[derive(Debug)]
pub struct Turn {
    pub state: ProjectState,
    pub outcome: Outcome,
}

impl Turn {
    pub(crate) fn skipped(state: ProjectState, reason: SkipReason) -> Self {
        Self {
            state,
            outcome: Outcome::Skipped(reason),
        }
    }
}

// ─── Flight ───────────────────────────────────────────────────────────────

/// Held for the duration of one request. Dropping it clears the in-flight
/// flag and forgets the cancellation token, whichever way the request ended.
pub(crate) struct Flight<'a> {
    in_flight: &'a AtomicBool,
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
        self.in_flight.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─── Session ──────────────────────────────────────────────────────────────

/// Drives send-message round trips against one coach transport.
///
/// At most one request runs at a time; a second call while one is in flight
/// is skipped, not queued.
pub struct Session<T> {
    transport: T,
    attribution: Attribution,
    in_flight: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    last_error: Mutex<Option<String>>,
}

impl<T: ChatTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            attribution: Attribution::default(),
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Stamp user messages sent through this session with a collaborator.
    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The current user-visible error, if the last operation failed.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn dismiss_error(&self) {
        *lock(&self.last_error) = None;
    }

    /// Abort the request in flight. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        match lock(&self.cancel).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    // ─── Round trips ──────────────────────────────────────────────────────

    /// Send `text` as the user and fold the coach's reply into `state`.
    pub async fn send_message(&self, state: ProjectState, text: &str) -> Turn {
        let text = text.trim();
        if text.is_empty() {
            return Turn::skipped(state, SkipReason::EmptyInput);
        }
        let Some(flight) = self.begin() else {
            return Turn::skipped(state, SkipReason::Busy);
        };

        let mut state = state;
        state.push_message(ChatMessage::user(text).with_attribution(self.attribution.clone()));
        let coach = state.active_coach;
        let request = ChatRequest::from_state(&state);

        match self.exchange(&flight, &request).await {
            Ok(raw) => {
                let (state, directives) = reconcile(&state, &raw, coach);
                tracing::info!(
                    project = %state.id,
                    directives = directives.len(),
                    "coach turn completed"
                );
                Turn {
                    state,
                    outcome: Outcome::Completed { directives, raw },
                }
            }
            Err(e) => self.fail(state, e),
        }
    }

    /// Ask the active coach to emit only the directive it forgot for
    /// `content`. The chat history is sent but never modified.
    pub async fn retry_recording(&self, state: ProjectState, content: &str) -> Turn {
        let content = content.trim();
        if content.is_empty() {
            return Turn::skipped(state, SkipReason::EmptyInput);
        }
        let Some(prompt) = recovery_prompt(state.active_coach, content) else {
            return Turn::skipped(state, SkipReason::NotRecordable);
        };
        let Some(flight) = self.begin() else {
            return Turn::skipped(state, SkipReason::Busy);
        };

        let request = ChatRequest::from_state(&state).with_extra(WireMessage::user(prompt));
        match self.exchange(&flight, &request).await {
            Ok(raw) => {
                let directives = parse_directives(&raw);
                if directives.is_empty() {
                    tracing::warn!(project = %state.id, "recovery reply carried no directive");
                }
                let state = apply_all(&state, &directives);
                Turn {
                    state,
                    outcome: Outcome::Completed { directives, raw },
                }
            }
            Err(e) => self.fail(state, e),
        }
    }

    // ─── Internal ─────────────────────────────────────────────────────────

    /// Claim the single-flight slot and clear the previous error.
    pub(crate) fn begin(&self) -> Option<Flight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("request already in flight");
            return None;
        }
        self.dismiss_error();
        let token = CancellationToken::new();
        *lock(&self.cancel) = Some(token.clone());
        Some(Flight {
            in_flight: &self.in_flight,
            slot: &self.cancel,
            token,
        })
    }

    /// Open the transport and drain the reply under the flight's token.
    pub(crate) async fn exchange(&self, flight: &Flight<'_>, request: &ChatRequest) -> Result<String> {
        let stream = tokio::select! {
            biased;
            _ = flight.token.cancelled() => return Err(CoachError::Cancelled),
            opened = self.transport.open(request) => opened?,
        };
        drain(stream, &flight.token).await
    }

    pub(crate) fn record_error(&self, e: &CoachError) {
        *lock(&self.last_error) = Some(e.to_string());
    }

    pub(crate) fn fail(&self, state: ProjectState, e: CoachError) -> Turn {
        if matches!(e, CoachError::Cancelled) {
            tracing::info!(project = %state.id, "coach request cancelled");
            return Turn {
                state,
                outcome: Outcome::Cancelled,
            };
        }
        tracing::warn!(project = %state.id, error = %e, "coach request failed");
        self.record_error(&e);
        Turn {
            state,
            outcome: Outcome::Failed(e),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
