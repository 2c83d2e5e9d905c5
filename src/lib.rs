//! # relearnweb
//!
//! An iterative research pipeline: outline a query with an LLM, turn the
//! outline into a search query, crawl the results, summarize them, pick new
//! directions, and repeat `depth` times before writing a markdown report.
//!
//! ```ignore
//! use futures::StreamExt;
//! use relearnweb::{Config, ResearchPipeline, ResearchState};
//!
//! let pipeline = ResearchPipeline::from_config(&Config::from_env(None)?)?;
//! let events = pipeline.run(ResearchState::new("Quantum Computing breakthroughs", 1, 3));
//! futures::pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     let event = event?;
//!     println!("{}: depth {}", event.node, event.state.depth);
//! }
//! ```

pub mod config;
pub mod error;
pub mod feedback;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod session;
pub mod settings;
pub mod state;
pub mod tags;

pub use config::Config;
pub use error::{ResearchError, Service, UpstreamError};
pub use llm::{OpenAiCompatClient, TextGenerator};
pub use pipeline::{Node, NodeEvent, ResearchPipeline};
pub use search::{FirecrawlClient, SearchDocument, SearchRequest, WebSearch};
pub use session::{ResearchParams, ResearchSession, SessionObserver, SessionOutcome, StopFlag};
pub use settings::SettingsFile;
pub use state::{ResearchState, StateField};
