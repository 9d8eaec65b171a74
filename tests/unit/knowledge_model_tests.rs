use std::path::PathBuf;

use clip_digest::models::knowledge::{extract_tags_from_markdown, generate_video_code};
use clip_digest::models::video::{VideoInfo, VideoMeta, UNKNOWN_AUTHOR, UNKNOWN_TITLE};

#[test]
fn tags_come_from_topic_headings() {
    let markdown = "# 标题\n## 核心要点\n## 1. 复利效应\n### 2、资产配置\n## **长期主义**\n## 复利效应\n正文 ## 不是标题\n";
    assert_eq!(
        extract_tags_from_markdown(markdown),
        vec!["复利效应", "资产配置", "长期主义"]
    );
}

#[test]
fn tags_are_capped_at_ten() {
    let markdown: String = (0..15).map(|i| format!("## 主题{i}\n")).collect();
    let tags = extract_tags_from_markdown(&markdown);
    assert_eq!(tags.len(), 10);
    assert_eq!(tags[0], "主题0");
}

#[test]
fn video_codes_vary() {
    let codes: std::collections::HashSet<String> = (0..50).map(|_| generate_video_code()).collect();
    assert!(codes.len() > 1);
    assert!(codes.iter().all(|code| code.len() == 5));
}

#[test]
fn missing_metadata_uses_placeholders() {
    let info = VideoInfo {
        video_id: "v1".into(),
        title: None,
        author: Some("  ".into()),
        video_path: PathBuf::from("/tmp/v1.mp4"),
    };
    let meta = VideoMeta::from(&info);
    assert_eq!(meta.title, UNKNOWN_TITLE);
    assert_eq!(meta.author, UNKNOWN_AUTHOR);
}

#[test]
fn present_metadata_is_kept() {
    let info = VideoInfo {
        video_id: "v1".into(),
        title: Some("投资课".into()),
        author: Some("老王".into()),
        video_path: PathBuf::from("/tmp/v1.mp4"),
    };
    let meta = VideoMeta::from(&info);
    assert_eq!(meta.title, "投资课");
    assert_eq!(meta.author, "老王");
}
