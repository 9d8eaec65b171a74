//! User-facing reply texts.

/// Acknowledgment after a link was received.
pub const ACK: &str = "收到。发送“开始”立即处理，或输入具体要求。2分钟后默认处理。";

/// Reply while the user's task is processing.
pub const BUSY: &str = "视频正在处理中，请稍候...";

/// Reply when there is no task and no link.
pub const HELP: &str = "收到，请发送视频分享链接。\n\n发送链接后，2分钟内可补充具体要求（如'关注投资策略'）。";

/// Reply when routing a message failed internally.
pub const SYSTEM_BUSY: &str = "❌ 系统繁忙";

/// Notice sent before the markdown fallback when the PDF could not be delivered.
pub const PDF_FALLBACK: &str = "PDF失败，发送文本:";

const FAILURE_DETAIL_CHARS: usize = 100;

/// Message announcing the resolved video and its code.
#[must_use]
pub fn video_info(title: &str, author: &str, video_code: &str) -> String {
    format!("视频: {title}\n作者: {author}\n视频码: {video_code}\n\n处理中...")
}

/// Failure notice carrying at most the first 100 characters of `error`.
#[must_use]
pub fn failure(error: &str) -> String {
    let detail: String = error.chars().take(FAILURE_DETAIL_CHARS).collect();
    format!("处理失败: {detail}")
}
