//! Prompt Assembly
//!
//! Builds the system prompt the agent runs under and the selected-file block
//! appended to user messages.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Header that introduces the selected-file block in a user message
pub const SELECTED_FILES_HEADER: &str = "当前选中的文件:";

/// A file the user picked in the client before sending the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    /// Display name
    pub name: String,
    /// Absolute path on the server
    pub path: String,
}

/// Build the default system prompt for the media-tool assistant.
///
/// The prompt names the absolute upload and output directories so the agent
/// can address files directly.
#[must_use]
pub fn build_system_prompt(uploads_dir: &Path, outputs_dir: &Path) -> String {
    let mut prompt = String::from(
        "你是一个专业的视频处理助手，可以使用FFmpeg工具来帮助用户进行视频编辑、\
         剪切、合并、格式转换等操作。你可以：\n",
    );
    for (idx, tool) in super::catalog::default_catalog().tools().iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", idx + 1, tool.name);
    }
    prompt.push_str(
        "请根据用户的需求选择合适的工具并执行相应操作,在你对视频进行操作之前请获取视频信息再进行。\n",
    );
    let _ = writeln!(prompt, "上传文件的绝对路径在: {}", uploads_dir.display());
    let _ = writeln!(prompt, "输出文件的绝对路径在: {}", outputs_dir.display());
    prompt.push_str(
        "重要提示：\n\
         - 当用户消息中包含'当前选中的文件:'信息时，请优先使用这些具体的文件路径\n\
         - 如果用户提到'input.mp4'等通用文件名，请替换为实际选中的文件路径\n\
         - 始终使用完整的绝对路径来访问文件\n\
         - 输出文件应保存到outputs目录中\n\
         响应格式要求：\n\
         - 请详细说明你调用了哪些工具\n\
         - 说明每个工具的具体参数\n\
         - 报告执行结果和生成的文件路径\n\
         - 如果有FFmpeg命令执行，请说明具体的命令内容\n",
    );
    prompt
}

/// Append the selected-file block to a user message.
///
/// Returns the message unchanged when no files are selected.
#[must_use]
pub fn attach_selected_files(message: &str, files: &[SelectedFile]) -> String {
    if files.is_empty() {
        return message.to_string();
    }

    let mut out = format!("{message}\n\n{SELECTED_FILES_HEADER}\n");
    for file in files {
        let _ = writeln!(out, "文件路径: {} (文件名: {})", file.path, file.name);
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_system_prompt_names_directories() {
        let prompt = build_system_prompt(
            &PathBuf::from("/srv/relay/uploads"),
            &PathBuf::from("/srv/relay/outputs"),
        );
        assert!(prompt.contains("上传文件的绝对路径在: /srv/relay/uploads"));
        assert!(prompt.contains("输出文件的绝对路径在: /srv/relay/outputs"));
        assert!(prompt.contains("9. 提取音频"));
    }

    #[test]
    fn test_attach_selected_files() {
        let files = vec![
            SelectedFile {
                name: "a.mp4".into(),
                path: "/up/a.mp4".into(),
            },
            SelectedFile {
                name: "b.mov".into(),
                path: "/up/b.mov".into(),
            },
        ];
        assert_eq!(
            attach_selected_files("合并这两个视频", &files),
            "合并这两个视频\n\n当前选中的文件:\n文件路径: /up/a.mp4 (文件名: a.mp4)\n文件路径: /up/b.mov (文件名: b.mov)"
        );
    }

    #[test]
    fn test_attach_nothing() {
        assert_eq!(attach_selected_files("hi", &[]), "hi");
    }
}
