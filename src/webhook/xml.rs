//! Decoding of callback message XML.
//!
//! Callback bodies are flat `<xml>` documents whose values are either CDATA
//! sections or plain text, e.g.
//! `<xml><MsgType><![CDATA[text]]></MsgType><CreateTime>1700000000</CreateTime></xml>`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::message::{InboundMessage, MessageKind};
use crate::{AppError, Result};

static ELEMENT_RE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?s)<([A-Za-z][A-Za-z0-9_]*)>\s*(?:<!\[CDATA\[(.*?)\]\]>|([^<]*?))\s*</([A-Za-z][A-Za-z0-9_]*)>")
});

fn element_regex() -> Result<&'static Regex> {
    ELEMENT_RE
        .as_ref()
        .map_err(|err| AppError::Webhook(format!("element pattern: {err}")))
}

/// Leaf elements of `xml`, first occurrence wins.
///
/// # Errors
///
/// Returns `AppError::Webhook` if the element pattern cannot be built.
pub fn parse_fields(xml: &str) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::new();
    for caps in element_regex()?.captures_iter(xml) {
        let (Some(open), Some(close)) = (caps.get(1), caps.get(4)) else {
            continue;
        };
        if open.as_str() != close.as_str() {
            continue;
        }
        let value = match (caps.get(2), caps.get(3)) {
            (Some(cdata), _) => cdata.as_str().to_owned(),
            (None, Some(plain)) => unescape(plain.as_str().trim()),
            (None, None) => String::new(),
        };
        fields.entry(open.as_str().to_owned()).or_insert(value);
    }
    Ok(fields)
}

/// Decode a callback document into an [`InboundMessage`].
///
/// `MsgType` and `FromUserName` are required; `MsgId`, `CreateTime`, and
/// `Content` default to empty/absent.
///
/// # Errors
///
/// Returns `AppError::Webhook` when a required field is missing.
pub fn parse_inbound(xml: &str) -> Result<InboundMessage> {
    let mut fields = parse_fields(xml)?;
    let mut required = |name: &str| {
        fields
            .remove(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Webhook(format!("missing {name}")))
    };
    let kind = MessageKind::parse(&required("MsgType")?);
    let from_user = required("FromUserName")?;

    Ok(InboundMessage {
        kind,
        from_user,
        msg_id: fields.remove("MsgId").unwrap_or_default(),
        create_time: fields.remove("CreateTime").unwrap_or_default(),
        content: fields.remove("Content"),
    })
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
