//! Stage 3: search-backed rewrite into the final note.

use std::time::Duration;

use crate::ai::types::{ChatMessage, ToolSpec};
use crate::Result;

use super::prompts::{finalize_prompt, FINALIZE_SYSTEM};
use super::StageModel;

const FINALIZE_MAX_TOKENS: u32 = 12_000;
const FINALIZE_TEMPERATURE: f32 = 0.3;
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(300);

/// Rewrite `draft` using `review` and the user's requirement.
///
/// The request declares the web search tool; only the text blocks of the
/// response make it into the note.
///
/// # Errors
///
/// Propagates the backend error; a failed finalize aborts the pipeline.
pub async fn enrich_and_finalize(
    model: &StageModel,
    draft: &str,
    review: &str,
    requirement: Option<&str>,
) -> Result<String> {
    let request = model
        .request(vec![
            ChatMessage::system(FINALIZE_SYSTEM),
            ChatMessage::user(finalize_prompt(draft, review, requirement)),
        ])
        .max_tokens(FINALIZE_MAX_TOKENS)
        .temperature(FINALIZE_TEMPERATURE)
        .tools(vec![ToolSpec::web_search()]);
    model.complete(request, FINALIZE_TIMEOUT).await
}
