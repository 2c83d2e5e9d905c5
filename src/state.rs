//! Research state threaded through the pipeline.

/// The record every pipeline node reads and updates.
///
/// One value exists per run. Snapshots handed to the caller are clones, so
/// the caller can keep them after the run moves on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchState {
    /// Current research query, rewritten on every iteration
    pub query: String,

    /// Remaining refinement iterations
    pub depth: u32,

    /// Advisory fan-out hint; only shown to the model
    pub breadth: u32,

    /// Outline from the learner, then rendered search results
    pub results: String,

    /// Bullet summary of the latest results
    pub learnings: String,

    /// Suggested next research directions
    pub directions: String,

    /// Final markdown report, set by the last node only
    pub report: String,
}

impl ResearchState {
    pub fn new(query: impl Into<String>, depth: u32, breadth: u32) -> Self {
        Self {
            query: query.into(),
            depth,
            breadth,
            ..Self::default()
        }
    }

    /// Read a displayable field.
    pub fn field(&self, field: StateField) -> &str {
        match field {
            StateField::Query => &self.query,
            StateField::Directions => &self.directions,
            StateField::Learnings => &self.learnings,
            StateField::Report => &self.report,
        }
    }
}

/// The text fields a front end shows while a run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Query,
    Directions,
    Learnings,
    Report,
}

impl StateField {
    pub const ALL: [StateField; 4] = [
        StateField::Query,
        StateField::Directions,
        StateField::Learnings,
        StateField::Report,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StateField::Query => "Query",
            StateField::Directions => "Directions",
            StateField::Learnings => "Learnings",
            StateField::Report => "Report",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_blank() {
        let state = ResearchState::new("Quantum Computing breakthroughs", 1, 3);

        assert_eq!(state.query, "Quantum Computing breakthroughs");
        assert_eq!(state.depth, 1);
        assert_eq!(state.breadth, 3);
        assert!(state.results.is_empty());
        assert!(state.report.is_empty());
    }

    #[test]
    fn test_field_access() {
        let mut state = ResearchState::new("q", 0, 1);
        state.directions = "d".to_string();
        assert_eq!(state.field(StateField::Query), "q");
        assert_eq!(state.field(StateField::Directions), "d");
        assert_eq!(state.field(StateField::Report), "");
    }
}
