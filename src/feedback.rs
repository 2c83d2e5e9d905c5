//! Clarifying follow-up questions for a research query.

use tracing::info;

use crate::error::ResearchError;
use crate::llm::TextGenerator;
use crate::tags::extract_tag;

const FOLLOW_UP_SYSTEM_PROMPT: &str = "You're a helpful AI";

/// Default number of follow-up questions to ask for.
pub const DEFAULT_QUESTIONS: usize = 3;

fn follow_up_prompt(query: &str, max_questions: usize) -> String {
    format!(
        r#"Given the following query from the user, ask some follow up questions to clarify the research direction. Return a maximum of {max_questions} questions, but feel free to return less if the original query is clear: <query>{query}</query>
A Sample Good Response would be:
<FollowUp>
Does the ....
How to ....
Make a ....
Why the ....
....
</FollowUp>
Each question should be on a new line.
"#
    )
}

/// Ask the generator for up to `max_questions` clarifying questions.
///
/// Fails with [`ResearchError::Parse`] if the reply has no
/// `<FollowUp>...</FollowUp>` block.
pub async fn follow_up_questions(
    generator: &dyn TextGenerator,
    query: &str,
    max_questions: usize,
) -> Result<Vec<String>, ResearchError> {
    let prompt = follow_up_prompt(query, max_questions);
    let reply = generator
        .generate(FOLLOW_UP_SYSTEM_PROMPT, &prompt, false)
        .await?;

    let questions = parse_follow_ups(&reply, max_questions)?;
    info!(count = questions.len(), "Follow-up questions generated");
    Ok(questions)
}

fn parse_follow_ups(reply: &str, max_questions: usize) -> Result<Vec<String>, ResearchError> {
    let block = extract_tag(reply, "FollowUp")?;
    Ok(block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_questions)
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(
            &self,
            _system: &str,
            user: &str,
            _streaming: bool,
        ) -> Result<String, ResearchError> {
            assert!(user.contains("<query>rust web frameworks</query>"));
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_prompt_mentions_limit() {
        let prompt = follow_up_prompt("q", 2);
        assert!(prompt.contains("maximum of 2 questions"));
        assert!(prompt.contains("<query>q</query>"));
    }

    #[test]
    fn test_parse_follow_ups_limits_and_trims() {
        let reply = "Sure:\n<FollowUp>\n  Which runtime?\n\nWhich year?\nWhich OS?\nExtra?\n</FollowUp>";
        let questions = parse_follow_ups(reply, 3).unwrap();
        assert_eq!(questions, vec!["Which runtime?", "Which year?", "Which OS?"]);
    }

    #[tokio::test]
    async fn test_follow_up_questions() {
        let generator = Canned("<FollowUp>\nAxum or Actix?\nFor production?\n</FollowUp>");
        let questions = follow_up_questions(&generator, "rust web frameworks", 3)
            .await
            .unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0], "Axum or Actix?");
    }

    #[tokio::test]
    async fn test_follow_up_questions_missing_tag() {
        let generator = Canned("I have no questions.");
        let err = follow_up_questions(&generator, "rust web frameworks", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Parse { ref tag } if tag == "FollowUp"));
    }
}
