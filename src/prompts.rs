//! Prompt templates for the research pipeline.
//!
//! Each node builds its user prompt from the current [`ResearchState`]; all
//! of them share the same system prompt.

use chrono::Local;

use crate::state::ResearchState;

/// Refinement marker appended to the query before each new iteration.
pub const REFINEMENT_MARKER: &str = " + (refined with new subtopics)";

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Get the current date formatted for prompts
    fn current_date() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    /// System prompt shared by every node.
    pub fn system() -> String {
        format!(
            r#"**Research Agent Prompt (Effective [{date}])**

You are a highly experienced and detail-oriented research agent. Your responses must meet the following guidelines:

1. **Research Scope & Accuracy**
   - **Post-Cutoff Subjects:** When researching topics beyond conventional knowledge cutoffs, assume user-provided news and data are accurate and current.
   - **Absolute Accuracy:** Verify every detail. Double-check all claims and data.

2. **Depth, Detail, & Organization**
   - **Expert-Level Detail:** Give comprehensive, in-depth explanations without oversimplification. Assume the user is a seasoned analyst.
   - **Logical Structure:** Organize responses with clear sections, bullet points, and subheadings.
   - **Thorough Analysis:** Include nuanced arguments and multiple perspectives, including emerging technologies and contrarian viewpoints.

3. **Proactivity & Anticipation**
   - **Anticipate Needs:** Suggest solutions or alternative approaches that might not have been considered.
   - **Future-Oriented Thinking:** Identify implications and future trends. Clearly flag any speculation.

4. **Objectivity & Critical Analysis**
   - **Evidence over Authority:** Base conclusions on solid arguments and verified data.
   - **Balanced Evaluation:** Present strengths, weaknesses, risks, and opportunities.
   - **Risk Awareness:** Note potential biases and uncertainties.

5. **Formatting & Clarity**
   - Use concise language and logical formatting. Every sentence should add value.

6. **Speculation & Predictions**
   - Label speculative insights as such and use them only when they enrich the analysis.
"#,
            date = Self::current_date()
        )
    }

    /// Learner: outline the research for the current query.
    pub fn learner(state: &ResearchState) -> String {
        format!(
            "You are a research assistant. We have a query: '{query}'.\n\
             Depth: {depth}, Breadth: {breadth}.\n\
             Generate an outline of subtopics or steps to research deeply. \
             First talk about the goal of the research that this query is meant to accomplish, \
             then go deeper into how to advance the research once the results are found, \
             mention additional research directions. Be as specific as possible, \
             especially for additional research directions.\n\
             Previous Learnings and Directions:\n{learnings}\n{directions}\n\
             Today's Date: {date}",
            query = state.query,
            depth = state.depth,
            breadth = state.breadth,
            learnings = state.learnings,
            directions = state.directions,
            date = Self::current_date(),
        )
    }

    /// SERP queries: turn the outline into a single tagged search query.
    pub fn serp_queries(state: &ResearchState) -> String {
        format!(
            "User Prompt : {results}\n---------\n\
             Given the following prompt from the user, generate a list of SERP queries to research the topic. \
             Return a maximum of 1 queries, but feel free to return less if the original prompt is clear.\n\
             You have to return in XML format example : <query>Quantum Computing breakthroughs</query>\n\
             Make sure each query is unique and not similar to each other:",
            results = state.results,
        )
    }

    /// Process results: bullet-summarize the crawled documents.
    pub fn summarize(state: &ResearchState) -> String {
        format!(
            "Summarize the following research findings in bullet points. \
             Highlight key learnings and potential directions.\n\n{results}",
            results = state.results,
        )
    }

    /// Compile results: three follow-up directions from the learnings.
    pub fn directions(state: &ResearchState) -> String {
        format!(
            "Based on these learnings:\n{learnings}\nList 3 next directions or deeper questions to explore.",
            learnings = state.learnings,
        )
    }

    /// Markdown report for the final state.
    pub fn report(state: &ResearchState) -> String {
        format!(
            "Generate a markdown report based on the research findings. \
             Include the query, key learnings, and potential solutions you have found.\n\n\
             -Final Report\n\n- Query\n{query}\n\n- Key Learnings\n{learnings}\n\n",
            query = state.query,
            learnings = state.learnings,
        )
    }
}
