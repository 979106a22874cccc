//! Tool Catalog
//!
//! Descriptions of the tools the agent can call, advertised to clients.
//! The agent's backend owns the tools themselves; this is display data only.

use std::fmt::Write as _;

use serde::Serialize;

/// One advertised tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    /// Stable tool identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// Example request that would use the tool
    pub example: &'static str,
}

/// Ordered set of advertised tools
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Create a catalog from descriptors
    #[must_use]
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// All tools in display order
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Look up a tool by ID
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// One `"<id> - <name>"` line per tool
    #[must_use]
    pub fn listing(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| format!("{} - {}", t.id, t.name))
            .collect()
    }

    /// Multi-line help text
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut text = String::from("可用的FFmpeg工具:\n");
        text.push_str(&"=".repeat(50));
        text.push('\n');
        for tool in &self.tools {
            let _ = write!(
                text,
                "\n📹 {} ({})\n   功能: {}\n   示例: {}\n",
                tool.name, tool.id, tool.description, tool.example
            );
        }
        text
    }
}

/// The media tools the bundled assistant exposes
#[must_use]
pub fn default_catalog() -> ToolCatalog {
    ToolCatalog::new(vec![
        ToolDescriptor {
            id: "find_video_path",
            name: "查找视频文件",
            description: "在指定目录中递归查找视频文件",
            example: "帮我在/Users/videos目录下找到名为test.mp4的视频",
        },
        ToolDescriptor {
            id: "get_video_info",
            name: "获取视频信息",
            description: "获取视频的详细信息，包括时长、帧率、编码格式等",
            example: "获取video.mp4的详细信息",
        },
        ToolDescriptor {
            id: "clip_video",
            name: "剪切视频",
            description: "从视频中剪切指定时间段的内容",
            example: "将video.mp4从第10秒开始剪切30秒的内容",
        },
        ToolDescriptor {
            id: "concat_videos",
            name: "合并视频",
            description: "将多个视频文件合并成一个",
            example: "将video1.mp4和video2.mp4合并成output.mp4",
        },
        ToolDescriptor {
            id: "play_video",
            name: "播放视频",
            description: "使用ffplay播放视频文件",
            example: "播放video.mp4",
        },
        ToolDescriptor {
            id: "overlay_video",
            name: "视频叠加",
            description: "将一个视频叠加到另一个视频上（画中画效果）",
            example: "将小视频叠加到大视频的右上角",
        },
        ToolDescriptor {
            id: "scale_video",
            name: "视频缩放",
            description: "改变视频的分辨率",
            example: "将video.mp4缩放到1920x1080分辨率",
        },
        ToolDescriptor {
            id: "extract_frames_from_video",
            name: "提取视频帧",
            description: "从视频中提取图片帧",
            example: "从video.mp4中每秒提取一帧图片",
        },
        ToolDescriptor {
            id: "extract_audio_from_video",
            name: "提取音频",
            description: "从视频中提取音频轨道",
            example: "从video.mp4中提取音频保存为audio.mp3",
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_format() {
        let catalog = default_catalog();
        let listing = catalog.listing();
        assert_eq!(listing.len(), 9);
        assert_eq!(listing[0], "find_video_path - 查找视频文件");
        assert_eq!(listing[8], "extract_audio_from_video - 提取音频");
    }

    #[test]
    fn test_lookup_and_help() {
        let catalog = default_catalog();
        assert_eq!(catalog.get("clip_video").map(|t| t.name), Some("剪切视频"));
        assert!(catalog.get("nope").is_none());

        let help = catalog.help_text();
        assert!(help.starts_with("可用的FFmpeg工具:\n"));
        assert!(help.contains("📹 视频缩放 (scale_video)"));
    }
}
