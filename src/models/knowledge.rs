//! Knowledge-base entry for a completed summary.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const VIDEO_CODE_LEN: usize = 5;
const VIDEO_CODE_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_TAGS: usize = 10;

/// Headings that structure every note and say nothing about its topic.
const STRUCTURAL_HEADINGS: &[&str] = &[
    "核心要点",
    "详细笔记",
    "关键收获",
    "延伸阅读",
    "原始转写文本",
];

/// A finished summary together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Source content identifier.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Video author.
    pub author: String,
    /// Link the user shared.
    pub source_url: String,
    /// Final markdown document.
    pub summary_markdown: String,
    /// Topic tags derived from the summary.
    pub tags: Vec<String>,
    /// Requirement text the summary was produced for.
    pub user_requirement: String,
    /// Short code shown to the user.
    pub video_code: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Generate a 5-character lowercase alphanumeric video code.
#[must_use]
pub fn generate_video_code() -> String {
    let mut rng = rand::thread_rng();
    (0..VIDEO_CODE_LEN)
        .map(|_| char::from(VIDEO_CODE_CHARSET[rng.gen_range(0..VIDEO_CODE_CHARSET.len())]))
        .collect()
}

/// Derive topic tags from the level-2 and level-3 headings of a note.
///
/// Leading list numbering (`1.`, `2、`) is stripped, structural headings are
/// skipped, duplicates are dropped, and at most ten tags are returned.
#[must_use]
pub fn extract_tags_from_markdown(markdown: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let Some(heading) = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("## "))
        else {
            continue;
        };

        let tag = strip_numbering(heading).trim_matches(|c: char| c == '*' || c.is_whitespace());
        if tag.is_empty() || STRUCTURAL_HEADINGS.contains(&tag) {
            continue;
        }
        if tags.iter().any(|existing| existing == tag) {
            continue;
        }

        tags.push(tag.to_owned());
        if tags.len() == MAX_TAGS {
            break;
        }
    }

    tags
}

fn strip_numbering(heading: &str) -> &str {
    let heading = heading.trim();
    let digits = heading.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return heading;
    }
    let rest = &heading[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix('、'))
        .map_or(heading, str::trim_start)
}
