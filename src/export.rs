use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;

use crate::model::GeneratedContent;

/// Decoded `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn parse(uri: &str) -> anyhow::Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow::anyhow!("not a data uri"))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("data uri has no payload"))?;
        let Some(mime_type) = meta.strip_suffix(";base64") else {
            anyhow::bail!("only base64 data uris are supported");
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("decode base64 payload")?;
        Ok(Self {
            mime_type: if mime_type.is_empty() {
                "application/octet-stream".to_owned()
            } else {
                mime_type.to_owned()
            },
            bytes,
        })
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

/// Writes the decoded image to `dir/<stem>.<ext>` and returns the path.
pub fn write_data_uri(dir: &Path, stem: &str, uri: &str) -> anyhow::Result<PathBuf> {
    let data = DataUri::parse(uri).with_context(|| format!("parse image for {stem}"))?;
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let path = dir.join(format!("{stem}.{}", data.extension()));
    std::fs::write(&path, &data.bytes).with_context(|| format!("write: {}", path.display()))?;
    Ok(path)
}

/// Writes `content.json` plus every generated image found in `content`.
/// Hosted (non-`data:`) image URLs are left in the JSON only.
pub fn write_generated(dir: &Path, content: &GeneratedContent) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let mut written = Vec::new();

    let json_path = dir.join("content.json");
    let json = serde_json::to_vec_pretty(content).context("serialize content")?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("write: {}", json_path.display()))?;
    written.push(json_path);

    if let Some(uri) = content.image_url.as_deref().filter(|u| u.starts_with("data:")) {
        written.push(write_data_uri(dir, "post", uri)?);
    }
    for scene in content.scenes.iter().flatten() {
        if let Some(uri) = scene.image_url.as_deref().filter(|u| u.starts_with("data:")) {
            let stem = format!("scene-{}", scene.scene_number);
            written.push(write_data_uri(dir, &stem, uri)?);
        }
    }

    Ok(written)
}
