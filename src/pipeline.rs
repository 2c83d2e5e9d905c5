//! # Research Pipeline
//!
//! A fixed node graph over a single [`ResearchState`]:
//!
//! ```text
//! Input -> Learner -> SerpQueries -> ProcessResults -> CompileResults -> CheckDepth
//!            ^                                                             |
//!            |                                                 depth > 0   | depth == 0
//!            +------------------------ NextDirection <---------------------+----> MarkdownReport
//! ```
//!
//! [`ResearchPipeline::run`] returns a lazy stream with one [`NodeEvent`] per
//! executed node. Nothing runs until the stream is polled, and dropping the
//! stream is all it takes to cancel. For a starting depth `d` a successful
//! run yields exactly `7 + 6d` events, the last one from `MarkdownReport`.
//! A failing node yields its error as the final item.

use futures::stream::{self, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::ResearchError;
use crate::llm::{OpenAiCompatClient, TextGenerator};
use crate::prompts::{ResearchPrompts, REFINEMENT_MARKER};
use crate::search::{render_documents, FirecrawlClient, SearchRequest, WebSearch};
use crate::state::ResearchState;
use crate::tags::extract_tag;

/// A step in the research graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Input,
    Learner,
    SerpQueries,
    ProcessResults,
    CompileResults,
    CheckDepth,
    NextDirection,
    MarkdownReport,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Input => "input",
            Node::Learner => "learner",
            Node::SerpQueries => "serp_queries",
            Node::ProcessResults => "process_results",
            Node::CompileResults => "compile_results",
            Node::CheckDepth => "check_depth",
            Node::NextDirection => "next_direction",
            Node::MarkdownReport => "markdown_report",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::MarkdownReport)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The state observed right after `node` finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: Node,
    pub state: ResearchState,
}

/// Drives the research graph against a text generator and a web search.
pub struct ResearchPipeline {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn WebSearch>,
    system_prompt: String,
    search_timeout_ms: u64,
    search_limit: usize,
    streaming: bool,
}

impl ResearchPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, search: Arc<dyn WebSearch>) -> Self {
        let defaults = Config::default();
        Self {
            generator,
            search,
            system_prompt: ResearchPrompts::system(),
            search_timeout_ms: defaults.search_timeout_ms,
            search_limit: defaults.search_limit,
            streaming: defaults.streaming,
        }
    }

    /// Build the pipeline with the bundled OpenAI-compatible and Firecrawl
    /// clients. Fails with a configuration error if either lacks settings.
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        config.validate()?;
        let generator = OpenAiCompatClient::from_config(config)?;
        let search = FirecrawlClient::from_config(config)?;

        Ok(Self::new(Arc::new(generator), Arc::new(search))
            .with_search_options(config.search_timeout_ms, config.search_limit)
            .with_streaming(config.streaming))
    }

    pub fn with_search_options(mut self, timeout_ms: u64, limit: usize) -> Self {
        self.search_timeout_ms = timeout_ms;
        self.search_limit = limit;
        self
    }

    /// Whether nodes other than the learner request streamed completions.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Number of events a successful run starting at `depth` yields.
    pub fn total_steps(depth: u32) -> usize {
        7 + 6 * depth as usize
    }

    /// Run the graph from `initial`, yielding a snapshot after every node.
    pub fn run(
        &self,
        initial: ResearchState,
    ) -> impl Stream<Item = Result<NodeEvent, ResearchError>> + Send + '_ {
        info!(
            query = %initial.query,
            depth = initial.depth,
            breadth = initial.breadth,
            generator = self.generator.name(),
            "Starting research pipeline"
        );

        stream::unfold(Some((Node::Input, initial)), move |cursor| async move {
            let (node, mut state) = cursor?;

            match self.step(node, &mut state).await {
                Ok(next) => {
                    let event = NodeEvent {
                        node,
                        state: state.clone(),
                    };
                    Some((Ok(event), next.map(|n| (n, state))))
                }
                Err(e) => {
                    error!(node = %node, error = %e, "Research pipeline failed");
                    Some((Err(e), None))
                }
            }
        })
    }

    /// Run the graph to the end and return the final state.
    pub async fn run_to_completion(
        &self,
        initial: ResearchState,
    ) -> Result<ResearchState, ResearchError> {
        let events = self.run(initial);
        futures::pin_mut!(events);

        let mut last = None;
        while let Some(event) = events.next().await {
            last = Some(event?.state);
        }
        last.ok_or_else(|| ResearchError::InvalidInput("pipeline produced no snapshots".into()))
    }

    /// Execute one node and return its successor, or `None` after the report.
    async fn step(
        &self,
        node: Node,
        state: &mut ResearchState,
    ) -> Result<Option<Node>, ResearchError> {
        debug!(node = %node, depth = state.depth, "Executing node");

        let next = match node {
            Node::Input => {
                validate_input(state)?;
                Node::Learner
            }
            Node::Learner => {
                let outline = self
                    .generate(&ResearchPrompts::learner(state), false)
                    .await?;
                state.results = format!("Initial Outline:\n{}", outline);
                Node::SerpQueries
            }
            Node::SerpQueries => {
                let reply = self
                    .generate(&ResearchPrompts::serp_queries(state), self.streaming)
                    .await?;
                state.query = extract_tag(&reply, "query")?.to_string();
                info!(query = %state.query, "Search query selected");
                Node::ProcessResults
            }
            Node::ProcessResults => {
                let request = SearchRequest::new(state.query.clone())
                    .with_timeout_ms(self.search_timeout_ms)
                    .with_limit(self.search_limit);
                let documents = self.search.search(&request).await?;
                state.results = render_documents(&state.query, &documents);

                state.learnings = self
                    .generate(&ResearchPrompts::summarize(state), self.streaming)
                    .await?;
                Node::CompileResults
            }
            Node::CompileResults => {
                state.directions = self
                    .generate(&ResearchPrompts::directions(state), self.streaming)
                    .await?;
                Node::CheckDepth
            }
            Node::CheckDepth => {
                if state.depth > 0 {
                    Node::NextDirection
                } else {
                    Node::MarkdownReport
                }
            }
            Node::NextDirection => {
                state.depth -= 1;
                state.query.push_str(REFINEMENT_MARKER);
                info!(remaining_depth = state.depth, "Refining research direction");
                Node::Learner
            }
            Node::MarkdownReport => {
                state.report = self
                    .generate(&ResearchPrompts::report(state), self.streaming)
                    .await?;
                info!(chars = state.report.len(), "Research report generated");
                return Ok(None);
            }
        };

        Ok(Some(next))
    }

    async fn generate(&self, user_prompt: &str, streaming: bool) -> Result<String, ResearchError> {
        self.generator
            .generate(&self.system_prompt, user_prompt, streaming)
            .await
    }
}

fn validate_input(state: &ResearchState) -> Result<(), ResearchError> {
    if state.query.trim().is_empty() {
        return Err(ResearchError::InvalidInput(
            "research query must not be empty".to_string(),
        ));
    }
    if state.breadth == 0 {
        return Err(ResearchError::InvalidInput(
            "breadth must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_steps() {
        assert_eq!(ResearchPipeline::total_steps(0), 7);
        assert_eq!(ResearchPipeline::total_steps(1), 13);
        assert_eq!(ResearchPipeline::total_steps(3), 25);
    }

    #[test]
    fn test_node_names() {
        assert_eq!(Node::SerpQueries.to_string(), "serp_queries");
        assert!(Node::MarkdownReport.is_terminal());
        assert!(!Node::CheckDepth.is_terminal());
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input(&ResearchState::new("rust", 0, 1)).is_ok());
        assert!(matches!(
            validate_input(&ResearchState::new("  ", 0, 1)),
            Err(ResearchError::InvalidInput(_))
        ));
        assert!(validate_input(&ResearchState::new("rust", 0, 0)).is_err());
    }

    #[test]
    fn test_from_config_requires_settings() {
        let err = ResearchPipeline::from_config(&Config::default()).err().unwrap();
        assert!(matches!(err, ResearchError::Configuration(_)));
    }
}
