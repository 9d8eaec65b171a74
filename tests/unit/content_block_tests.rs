//! Decoding of completion responses and encoding of requests.

use clip_digest::ai::types::{
    ChatCompletion, ChatMessage, ChatRequest, ContentPart, InputAudio, ResponseContent, ToolSpec,
};
use serde_json::json;

fn content_of(body: serde_json::Value) -> ResponseContent {
    let completion: ChatCompletion = serde_json::from_value(body).expect("decodes");
    completion
        .choices
        .into_iter()
        .next()
        .expect("one choice")
        .message
        .content
}

#[test]
fn string_content_is_returned_verbatim() {
    let content = content_of(json!({"choices": [{"message": {"content": "# 笔记"}}]}));
    assert_eq!(content.into_text(), "# 笔记");
}

#[test]
fn block_content_keeps_only_text_in_order() {
    let content = content_of(json!({"choices": [{"message": {"content": [
        {"type": "text", "text": "第一段"},
        {"type": "tool_use", "name": "web_search"},
        {"type": "web_search_tool_result", "content": []},
        {"type": "text", "text": "第二段"}
    ]}}]}));
    assert_eq!(content.into_text(), "第一段\n第二段");
}

#[test]
fn null_content_is_empty() {
    let content = content_of(json!({"choices": [{"message": {"content": null}}]}));
    assert_eq!(content.into_text(), "");
}

#[test]
fn missing_choices_decode_as_empty() {
    let completion: ChatCompletion = serde_json::from_value(json!({"id": "x"})).expect("decodes");
    assert!(completion.choices.is_empty());
}

#[test]
fn request_omits_tools_unless_set() {
    let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]);
    let value = serde_json::to_value(&request).expect("encodes");
    assert!(value.get("tools").is_none());
    assert_eq!(value["max_tokens"], 8192);
    assert_eq!(value["messages"][0]["role"], "user");
    assert_eq!(value["messages"][0]["content"], "hi");
}

#[test]
fn request_with_web_search_tool_encodes_type() {
    let request = ChatRequest::new("m", vec![ChatMessage::system("s")])
        .max_tokens(12000)
        .tools(vec![ToolSpec::web_search()]);
    let value = serde_json::to_value(&request).expect("encodes");
    assert_eq!(value["tools"][0]["type"], "web_search_20250305");
    assert_eq!(value["tools"][0]["name"], "web_search");
    assert_eq!(value["max_tokens"], 12000);
}

#[test]
fn multimodal_parts_are_tagged() {
    let message = ChatMessage::user_parts(vec![
        ContentPart::InputAudio {
            input_audio: InputAudio {
                data: "AAAA".into(),
                format: "mp3".into(),
            },
        },
        ContentPart::Text { text: "转写".into() },
    ]);
    let value = serde_json::to_value(&message).expect("encodes");
    assert_eq!(value["content"][0]["type"], "input_audio");
    assert_eq!(value["content"][0]["input_audio"]["format"], "mp3");
    assert_eq!(value["content"][1]["type"], "text");
}
