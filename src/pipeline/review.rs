//! Stage 2: critical review of the draft.

use std::time::Duration;

use crate::ai::types::ChatMessage;
use crate::Result;

use super::prompts::{review_prompt, REVIEW_SYSTEM};
use super::StageModel;

const REVIEW_MAX_TOKENS: u32 = 4096;
const REVIEW_TEMPERATURE: f32 = 0.2;
const REVIEW_TIMEOUT: Duration = Duration::from_secs(300);

/// Audit `draft` and return the review report.
///
/// # Errors
///
/// Propagates the backend error; a failed review aborts the pipeline.
pub async fn critical_review(model: &StageModel, draft: &str) -> Result<String> {
    let request = model
        .request(vec![
            ChatMessage::system(REVIEW_SYSTEM),
            ChatMessage::user(review_prompt(draft)),
        ])
        .max_tokens(REVIEW_MAX_TOKENS)
        .temperature(REVIEW_TEMPERATURE);
    model.complete(request, REVIEW_TIMEOUT).await
}
