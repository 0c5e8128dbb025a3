//! Output file naming, PNG payload decoding and artifact writes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::{ExportError, Result};

/// Prefix of the data URIs returned by the PNG exports.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ExportError;

    /// Only the exact lowercase tokens are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            other => Err(ExportError::Config(format!(
                "Unsupported format '{other}'; expected png or svg"
            ))),
        }
    }
}

/// Which of a view's two images a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Diagram,
    Key,
}

/// `{key}.{ext}` for a diagram, `{key}-key.{ext}` for its key.
pub fn artifact_file_name(view_key: &str, kind: ArtifactKind, format: ImageFormat) -> String {
    match kind {
        ArtifactKind::Diagram => format!("{view_key}.{}", format.extension()),
        ArtifactKind::Key => format!("{view_key}-key.{}", format.extension()),
    }
}

/// Decodes a `data:image/png;base64,...` payload.
///
/// A payload without the prefix is decoded as bare base64.
pub fn decode_png_data_uri(payload: &str) -> Result<Vec<u8>> {
    let encoded = payload
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .unwrap_or(payload)
        .trim();
    if encoded.is_empty() {
        return Err(ExportError::Payload("PNG export returned no data".to_string()));
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| ExportError::Payload(format!("PNG export is not valid base64: {e}")))
}

/// Writes exported images into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn write_svg(&self, file_name: &str, svg: &str) -> Result<PathBuf> {
        self.write(file_name, svg.as_bytes())
    }

    /// Decodes a PNG data URI and writes the bytes unchanged.
    pub fn write_png(&self, file_name: &str, data_uri: &str) -> Result<PathBuf> {
        let bytes = decode_png_data_uri(data_uri)?;
        match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => {}
            Ok(other) => warn!("{file_name}: export decoded as {other:?}, not PNG"),
            Err(_) => warn!("{file_name}: export is not a recognizable image"),
        }
        self.write(file_name, &bytes)
    }

    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(file_name);
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Artifact {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| ExportError::Artifact {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        info!(" - {file_name}");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // PNG signature followed by IHDR/IDAT/IEND chunks.
    const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    fn data_uri(bytes: &[u8]) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(bytes))
    }

    #[test]
    fn file_names_follow_view_key() {
        assert_eq!(
            artifact_file_name("sys", ArtifactKind::Diagram, ImageFormat::Svg),
            "sys.svg"
        );
        assert_eq!(
            artifact_file_name("sys", ArtifactKind::Key, ImageFormat::Png),
            "sys-key.png"
        );
    }

    #[test]
    fn format_parsing_is_exact() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("svg".parse::<ImageFormat>().unwrap(), ImageFormat::Svg);
        assert!("PNG".parse::<ImageFormat>().is_err());
        assert!("jpg".parse::<ImageFormat>().is_err());
        assert!(" svg".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn data_uri_decodes_to_the_original_bytes() {
        let decoded = decode_png_data_uri(&data_uri(PNG_BYTES)).unwrap();
        assert_eq!(decoded, PNG_BYTES);
    }

    #[test]
    fn invalid_base64_is_a_payload_error() {
        let err = decode_png_data_uri("data:image/png;base64,not*base64").unwrap_err();
        assert!(matches!(err, ExportError::Payload(_)));
        assert!(matches!(
            decode_png_data_uri(PNG_DATA_URI_PREFIX),
            Err(ExportError::Payload(_))
        ));
    }

    #[test]
    fn writes_png_bytes_and_svg_text() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("out"));

        let png = writer.write_png("sys.png", &data_uri(PNG_BYTES)).unwrap();
        assert_eq!(fs::read(&png).unwrap(), PNG_BYTES);

        let svg = writer.write_svg("sys.svg", "<svg/>").unwrap();
        assert_eq!(fs::read_to_string(&svg).unwrap(), "<svg/>");
    }

    #[test]
    fn non_png_payload_is_still_written() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let path = writer.write_png("odd.png", &data_uri(b"hello")).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"hello");
    }

    #[test]
    fn write_failure_names_the_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let writer = ArtifactWriter::new(blocker.join("sub"));
        let err = writer.write_svg("a.svg", "<svg/>").unwrap_err();
        assert!(matches!(err, ExportError::Artifact { .. }));
    }
}
