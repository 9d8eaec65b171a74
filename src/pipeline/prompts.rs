//! Prompt texts and request bodies for the three stages.

use crate::models::video::VideoMeta;

/// System prompt for stage 1: verbatim transcription plus a structured note.
pub const DRAFT_SYSTEM: &str = "\
你是一名专业的视频内容转写与笔记整理助手。

请依次完成：
1. 逐字转写音频中的全部口述内容，不要遗漏观点、数据或案例。
2. 在转写基础上整理一份结构化的 Markdown 学习笔记。

## 输出格式
# 视频标题
> 核心摘要：一句话概括
## 核心要点
1. **要点**：说明
## 详细笔记
### 小节标题
- 具体内容
## 关键收获
1. ...
## 原始转写文本
> 完整的逐字转写，放在引用块中。
";

/// System prompt for stage 2: critical audit of the draft.
pub const REVIEW_SYSTEM: &str = "\
你是一位严谨的知识审计专家，负责审视 AI 生成的学习笔记初稿。

请检查：
1. 内容缺失：未定义的术语、未交代的人物与背景。
2. 论证不足：缺少依据的观点。
3. 拓展方向：值得补充的关联知识与延伸阅读。

## 输出格式 (Markdown)
# 审查报告
## 需要补充解释的概念
1. **[概念]**：理由与搜索关键词
## 需要补充的背景信息
## 建议补充的关联知识
## 具体搜索任务清单
1. 搜索: \"[关键词]\"，用于补充 [内容]
";

/// System prompt for stage 3: search-backed rewrite into the final note.
pub const FINALIZE_SYSTEM: &str = "\
你是一位资深知识编辑。请结合审查报告与联网搜索结果，把初稿重写为完整、深入、排版考究的最终版笔记。

## 要求
1. 直接输出笔记正文，不要寒暄。
2. 正文不使用引用块；行内公式用 $...$，块级公式用 $$...$$。
3. 解释专业名词并补充必要背景。

## 输出结构
# [标题]
> **核心摘要**：...
> **视频作者**：...
## 1. [小节]
## 延伸阅读
";

/// Instruction for plain transcription through the multimodal model.
pub const TRANSCRIBE_INSTRUCTION: &str = "转写为中文文本";

/// User-facing context line describing the video and the user's requirement.
#[must_use]
pub fn build_context(meta: &VideoMeta, requirement: Option<&str>) -> String {
    let mut lines = vec!["请对以下视频内容进行转写和总结：".to_owned()];
    if !meta.title.is_empty() {
        lines.push(format!("标题：{}", meta.title));
    }
    if !meta.author.is_empty() {
        lines.push(format!("作者：{}", meta.author));
    }
    if let Some(requirement) = requirement.filter(|r| !r.is_empty()) {
        lines.push(format!("\n用户特别要求：{requirement}"));
    }
    lines.join("\n")
}

/// User message summarizing an already transcribed recording.
#[must_use]
pub fn transcript_prompt(context: &str, transcript: &str) -> String {
    format!("{context}\n\n转写文本:\n\n{transcript}")
}

/// User message asking for a review of `draft`.
#[must_use]
pub fn review_prompt(draft: &str) -> String {
    format!("以下是初稿，请审视：\n\n---\n{draft}\n---\n\n请输出审查报告。")
}

/// User message asking for the final note.
#[must_use]
pub fn finalize_prompt(draft: &str, review: &str, requirement: Option<&str>) -> String {
    let mut content = format!("## 初稿\n{draft}\n\n## 审查报告\n{review}\n");
    if let Some(requirement) = requirement.filter(|r| !r.is_empty()) {
        content.push_str(&format!("\n## 用户要求\n{requirement}\n"));
    }
    content.push_str("\n请执行搜索任务并输出最终版笔记。");
    content
}
