//! Presentation-side driver for a research run.
//!
//! A [`ResearchSession`] owns the user's parameters and a [`StopFlag`],
//! pulls snapshots from the pipeline, and reports progress and changed
//! fields to a [`SessionObserver`]. The flag is checked between snapshots;
//! once raised the session stops pulling and the pipeline simply goes idle.

use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ResearchError;
use crate::pipeline::{Node, ResearchPipeline};
use crate::state::{ResearchState, StateField};
use crate::tags::strip_code_fences;

/// Cooperative cancellation flag shared between the session and whoever
/// wants to stop it (a Ctrl-C handler, a UI button).
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// User-supplied research parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchParams {
    pub query: String,
    pub depth: u32,
    pub breadth: u32,
}

impl ResearchParams {
    pub fn initial_state(&self) -> ResearchState {
        ResearchState::new(self.query.clone(), self.depth, self.breadth)
    }
}

/// Receives progress while a session runs.
pub trait SessionObserver {
    /// Called after every snapshot with its 1-based position.
    fn on_progress(&mut self, _step: usize, _total: usize, _node: Node) {}

    /// Called when a displayed field differs from what was last shown.
    /// `text` has code fences removed.
    fn on_field_changed(&mut self, _field: StateField, _text: &str) {}
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The report node ran. `report` has code fences removed.
    Completed { report: String, steps: usize },
    /// The stop flag was raised; `last` is the last snapshot seen, if any.
    Stopped {
        last: Option<ResearchState>,
        steps: usize,
    },
}

/// One research run as seen by a front end.
#[derive(Debug)]
pub struct ResearchSession {
    params: ResearchParams,
    stop: StopFlag,
    displayed: HashMap<StateField, String>,
}

impl ResearchSession {
    pub fn new(params: ResearchParams) -> Self {
        Self {
            params,
            stop: StopFlag::new(),
            displayed: HashMap::new(),
        }
    }

    pub fn params(&self) -> &ResearchParams {
        &self.params
    }

    /// A handle that stops this session when raised.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn total_steps(&self) -> usize {
        ResearchPipeline::total_steps(self.params.depth)
    }

    /// Run the pipeline until it finishes, fails, or the stop flag is raised.
    pub async fn drive(
        &mut self,
        pipeline: &ResearchPipeline,
        observer: &mut dyn SessionObserver,
    ) -> Result<SessionOutcome, ResearchError> {
        self.displayed.clear();
        let total = self.total_steps();
        let events = pipeline.run(self.params.initial_state());
        futures::pin_mut!(events);

        let mut steps = 0;
        let mut last: Option<ResearchState> = None;

        loop {
            if self.stop.is_raised() {
                warn!(steps, "Research stopped by user");
                return Ok(SessionOutcome::Stopped { last, steps });
            }

            let Some(event) = events.next().await else {
                break;
            };
            let event = event?;
            steps += 1;

            observer.on_progress(steps, total, event.node);
            self.show_changes(&event.state, observer);

            let finished = event.node.is_terminal();
            last = Some(event.state);
            if finished {
                break;
            }
        }

        let report = last
            .as_ref()
            .map(|state| strip_code_fences(&state.report).to_string())
            .unwrap_or_default();
        info!(steps, "Research session completed");
        Ok(SessionOutcome::Completed { report, steps })
    }

    fn show_changes(&mut self, state: &ResearchState, observer: &mut dyn SessionObserver) {
        for field in StateField::ALL {
            let value = state.field(field);
            let shown = self.displayed.get(&field).map(String::as_str).unwrap_or("");
            if value != shown {
                observer.on_field_changed(field, strip_code_fences(value));
                self.displayed.insert(field, value.to_string());
            }
        }
    }
}

/// Progress as a whole percentage, capped at 100.
pub fn progress_percent(step: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (step.saturating_mul(100) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared() {
        let flag = StopFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_raised());
        handle.raise();
        assert!(flag.is_raised());
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 13), 0);
        assert_eq!(progress_percent(6, 13), 46);
        assert_eq!(progress_percent(13, 13), 100);
        assert_eq!(progress_percent(20, 13), 100);
        assert_eq!(progress_percent(1, 0), 100);
    }

    #[test]
    fn test_session_total_steps() {
        let session = ResearchSession::new(ResearchParams {
            query: "rust".into(),
            depth: 2,
            breadth: 3,
        });
        assert_eq!(session.total_steps(), 19);
        assert_eq!(session.params().initial_state().depth, 2);
    }
}
