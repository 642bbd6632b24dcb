//! Activity telemetry correlator
//!
//! Folds `agent_activity` events into a per-request timeline. Tool results are
//! matched to the most recent pending call (LIFO), so nested or repeated calls
//! to the same tool resolve in reverse order. A `done` event seals the
//! request; anything arriving for it afterwards is ignored.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use crate::protocol::{ActivityEvent, ActivityKind, Progress, ToolStatus};

/// Display state of one tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Success,
    Error,
    /// The request finished before a result arrived
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEntry {
    pub tool: Option<String>,
    pub icon: Option<String>,
    pub message: String,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Snapshot of a request timeline after an event has been applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityView {
    pub request_id: String,
    /// Most recent status line
    pub message: String,
    pub icon: Option<String>,
    pub entries: Vec<ToolEntry>,
    pub progress: Progress,
    pub finished: bool,
}

impl ActivityView {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            message: String::new(),
            icon: None,
            entries: Vec::new(),
            progress: Progress::default(),
            finished: false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Pending)
            .count()
    }
}

pub struct ActivityCorrelator {
    current: Option<ActivityView>,
    finished: VecDeque<String>,
    history: usize,
}

impl ActivityCorrelator {
    /// `history` bounds how many finished request ids are remembered
    pub fn new(history: usize) -> Self {
        Self {
            current: None,
            finished: VecDeque::with_capacity(history),
            history: history.max(1),
        }
    }

    pub fn current(&self) -> Option<&ActivityView> {
        self.current.as_ref()
    }

    pub fn is_finished(&self, request_id: &str) -> bool {
        self.finished.iter().any(|id| id == request_id)
    }

    /// Drop the visible timeline. Finished ids are kept.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Apply one event. Returns the updated view, or `None` if the event was
    /// ignored.
    pub fn apply(&mut self, event: ActivityEvent) -> Option<ActivityView> {
        if self.is_finished(&event.request_id) {
            debug!(
                request_id = %event.request_id,
                activity = ?event.activity,
                "Ignoring activity for finished request"
            );
            return None;
        }

        if self
            .current
            .as_ref()
            .is_none_or(|view| view.request_id != event.request_id)
        {
            debug!(request_id = %event.request_id, "New activity timeline");
            self.current = Some(ActivityView::new(&event.request_id));
        }
        let view = self.current.as_mut()?;

        match event.activity {
            ActivityKind::Thinking => {
                view.message = event.message;
                view.icon = event.icon;
            }
            ActivityKind::ToolCall => {
                view.entries.push(ToolEntry {
                    tool: event.tool,
                    icon: event.icon.clone(),
                    message: event.message.clone(),
                    state: EntryState::Pending,
                    detail: None,
                });
                view.message = event.message;
                view.icon = event.icon;
            }
            ActivityKind::ToolResult => {
                let pending = view
                    .entries
                    .iter_mut()
                    .rev()
                    .find(|e| e.state == EntryState::Pending);
                match pending {
                    Some(entry) => {
                        entry.state = match event.status {
                            Some(ToolStatus::Error) => EntryState::Error,
                            _ => EntryState::Success,
                        };
                        entry.message = event.message.clone();
                        entry.detail = event.detail;
                    }
                    None => warn!(
                        request_id = %event.request_id,
                        tool = ?event.tool,
                        "Tool result without a pending call"
                    ),
                }
                view.message = event.message;
            }
            ActivityKind::Done => {
                for entry in view
                    .entries
                    .iter_mut()
                    .filter(|e| e.state == EntryState::Pending)
                {
                    entry.state = EntryState::Interrupted;
                }
                view.message = event.message;
                view.icon = event.icon;
                view.finished = true;
            }
        }

        view.progress.completed = view.progress.completed.max(event.progress.completed);
        view.progress.total = view.progress.total.max(event.progress.total);

        let snapshot = view.clone();
        if snapshot.finished {
            if self.finished.len() >= self.history {
                self.finished.pop_front();
            }
            self.finished.push_back(snapshot.request_id.clone());
        }
        Some(snapshot)
    }
}
