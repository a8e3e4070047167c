//! Artifact records produced by the assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of artifact as classified by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Code,
    Html,
    Css,
    Javascript,
    Python,
    React,
    Markdown,
    Json,
    Other,
}

/// A code or document blob the backend extracted from an assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub language: String,
    pub content: String,
    pub session_id: String,
    /// Backend-side message id; not the client's message id
    pub message_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub is_runnable: bool,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Part of a preview document an artifact is embedded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSection {
    Body,
    Style,
    Script,
}

impl CodeArtifact {
    /// Where the live preview embeds this artifact. The language decides,
    /// and the backend's type classification covers untagged languages.
    pub fn preview_section(&self) -> Option<PreviewSection> {
        let by_language = match self.language.to_lowercase().as_str() {
            "html" => Some(PreviewSection::Body),
            "css" => Some(PreviewSection::Style),
            "javascript" | "js" | "react" | "jsx" | "tsx" => Some(PreviewSection::Script),
            _ => None,
        };
        by_language.or(match self.artifact_type {
            ArtifactType::Html => Some(PreviewSection::Body),
            ArtifactType::Css => Some(PreviewSection::Style),
            ArtifactType::Javascript | ArtifactType::React => Some(PreviewSection::Script),
            _ => None,
        })
    }

    /// Whether the artifact can take part in a live preview
    pub fn is_previewable(&self) -> bool {
        self.preview_section().is_some()
    }

    /// File name used when saving the artifact: `<title>.<ext>`
    ///
    /// Path separators in the title are replaced so the file always lands
    /// directly in the target directory.
    pub fn download_filename(&self) -> String {
        let title = self.title.trim();
        let stem: String = if title.is_empty() {
            "code".to_string()
        } else {
            title
                .chars()
                .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
                .collect()
        };
        let stem = if stem == "." || stem == ".." { "code".to_string() } else { stem };
        format!("{stem}.{}", file_extension(&self.language))
    }
}

/// File extension for a language name, `txt` when unknown
pub fn file_extension(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "javascript" => "js",
        "typescript" => "ts",
        "python" => "py",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "json" => "json",
        "markdown" => "md",
        "react" | "jsx" => "jsx",
        "tsx" => "tsx",
        "php" => "php",
        "java" => "java",
        "csharp" => "cs",
        "cpp" => "cpp",
        "c" => "c",
        "rust" => "rs",
        "go" => "go",
        "ruby" => "rb",
        "swift" => "swift",
        "kotlin" => "kt",
        _ => "txt",
    }
}

/// Write downloaded artifact bytes into `dir`, returning the file path
pub async fn save_download(
    dir: &Path,
    artifact: &CodeArtifact,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(artifact.download_filename());
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(artifact_id = %artifact.id, path = %path.display(), "Saved artifact");
    Ok(path)
}
