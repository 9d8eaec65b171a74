//! Wire types for OpenAI-compatible chat completions.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction framing the conversation.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// Inline audio payload of a multimodal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAudio {
    /// Base64-encoded audio bytes.
    pub data: String,
    /// Container format, e.g. `mp3`.
    pub format: String,
}

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text fragment.
    Text {
        /// The text.
        text: String,
    },
    /// Audio fragment.
    InputAudio {
        /// The audio payload.
        input_audio: InputAudio,
    },
}

/// Body of an outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Ordered multimodal parts.
    Parts(Vec<ContentPart>),
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: MessageContent,
}

impl ChatMessage {
    /// System message with plain text.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message with plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message with multimodal parts.
    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Server-side tool the model may invoke while generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Provider tool type, e.g. `web_search_20250305`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tool name exposed to the model.
    pub name: String,
}

impl ToolSpec {
    /// The provider-hosted web search tool.
    #[must_use]
    pub fn web_search() -> Self {
        Self {
            kind: "web_search_20250305".into(),
            name: "web_search".into(),
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model name.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Completion token ceiling.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
}

impl ChatRequest {
    /// Request with the default limits (8192 tokens, temperature 0.3).
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: 8192,
            temperature: 0.3,
            tools: None,
        }
    }

    /// Override the token ceiling.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Attach tool declarations.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Typed unit of a structured model response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Generated text.
    Text {
        /// The text.
        #[serde(default)]
        text: String,
    },
    /// Trace of a tool invocation.
    ToolUse {
        /// Invoked tool, when reported.
        #[serde(default)]
        name: Option<String>,
    },
    /// Any other block type (search results, citations, ...).
    #[serde(other)]
    Other,
}

/// `message.content` of a completion: a string, typed blocks, or nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    /// Plain string content.
    Text(String),
    /// Typed content blocks.
    Blocks(Vec<ContentBlock>),
    /// `null` or absent content.
    #[default]
    Empty,
}

impl ResponseContent {
    /// Text of the response; for block content only text blocks are kept,
    /// joined with newlines in their original order.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Blocks(blocks) => blocks
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::ToolUse { .. } | ContentBlock::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Empty => String::new(),
        }
    }
}

/// Assistant message inside a completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Message content.
    #[serde(default)]
    pub content: ResponseContent,
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ResponseMessage,
}

/// Response body of `POST /chat/completions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    /// Generated choices; the first one is used.
    #[serde(default)]
    pub choices: Vec<Choice>,
}
