//! Live preview documents composed from frontend artifacts

use crate::artifact::{CodeArtifact, PreviewSection};
use std::path::{Path, PathBuf};

/// Body used when no html artifact is selected
const DEFAULT_BODY: &str = r#"<div id="app"></div>"#;

pub const PREVIEW_FILENAME: &str = "preview.html";

/// Compose a standalone HTML document from the given artifacts.
///
/// Html content goes into the body, css into a `<style>` block and
/// scripts into a trailing `<script>` block, each concatenated in the
/// order given. Artifacts without a preview section are skipped.
pub fn generate_preview_html(artifacts: &[&CodeArtifact]) -> String {
    let mut html = String::new();
    let mut css = String::new();
    let mut js = String::new();

    for artifact in artifacts {
        match artifact.preview_section() {
            Some(PreviewSection::Body) => html.push_str(&artifact.content),
            Some(PreviewSection::Style) => css.push_str(&artifact.content),
            Some(PreviewSection::Script) => js.push_str(&artifact.content),
            None => {}
        }
    }

    if html.is_empty() {
        html.push_str(DEFAULT_BODY);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Code Preview</title>
    <style>{css}</style>
</head>
<body>
    {html}
    <script>{js}</script>
</body>
</html>
"#
    )
}

/// Write a preview document into `dir`
pub async fn write_preview(dir: &Path, document: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(PREVIEW_FILENAME);
    tokio::fs::write(&path, document).await?;
    tracing::info!(path = %path.display(), "Wrote preview");
    Ok(path)
}
