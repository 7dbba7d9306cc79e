// External tool discovery (yt-dlp, ffmpeg)

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::FetchConfig;
use super::utils::run_output_with_timeout;

const VERSION_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_path: Option<String>,
    ffmpeg_path: Option<String>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }

    fn configured(&self, tool: ToolType) -> Option<&str> {
        match tool {
            ToolType::YtDlp => self.ytdlp_path.as_deref(),
            ToolType::Ffmpeg => self.ffmpeg_path.as_deref(),
        }
    }

    /// Program to spawn for `tool`; the bare name when nothing was found
    pub fn program(&self, tool: ToolType) -> String {
        if let Some(path) = self.configured(tool) {
            return path.to_string();
        }
        self.locate(tool).unwrap_or_else(|| tool.as_str().to_string())
    }

    /// Installed location of `tool`, if any
    pub fn locate(&self, tool: ToolType) -> Option<String> {
        let binary_name = tool.as_str();

        // 1. Explicit configuration
        if let Some(path) = self.configured(tool) {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
            debug!(tool = binary_name, path, "Configured tool path does not exist");
        }

        // 2. Common install locations
        for path in common_paths(binary_name) {
            if path.exists() {
                return Some(path.to_string_lossy().into_owned());
            }
        }

        // 3. PATH
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }

        None
    }

    pub async fn get_tool_info(&self, tool: ToolType) -> ToolInfo {
        let path = self.locate(tool);
        let version = match &path {
            Some(path) => get_version(path, tool).await,
            None => None,
        };

        ToolInfo {
            name: tool.as_str().to_string(),
            tool_type: tool,
            is_available: path.is_some(),
            version,
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }
}

fn common_paths(binary_name: &str) -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/opt/homebrew/bin").join(binary_name),
        PathBuf::from("/usr/local/bin").join(binary_name),
        PathBuf::from("/usr/bin").join(binary_name),
    ];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local").join("bin").join(binary_name));
    }
    paths
}

async fn get_version(path: &str, tool: ToolType) -> Option<String> {
    match run_output_with_timeout(path, vec![tool.version_arg().to_string()], VERSION_TIMEOUT_SECS).await {
        // ffmpeg prints a banner; the first line carries the version
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string()),
        _ => None,
    }
}
