//! Write-time page transforms.
//!
//! A [`PageTransform`] runs once per page as the assembler commits it. It is
//! local and non-retryable: a transform failure demotes the page to a
//! recorded gap without refetching.
//!
//! The built-in [`FormatTransform`] sniffs the image container from its
//! magic bytes, rejects bytes that are not a recognizable image (a CDN error
//! page saved as `.jpg` helps nobody), and normalizes the file extension to
//! the detected format. When a target format is configured, pages already in
//! that format pass through; pages that would need re-encoding fail with
//! [`ConversionError::ReencodeRequired`] — actual decode/re-encode
//! collaborators plug into this same trait.

use thiserror::Error;
use tracing::debug;

/// Image container formats the sniffing transform recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG (`jpg`).
    Jpeg,
    /// PNG.
    Png,
    /// GIF.
    Gif,
    /// WebP.
    Webp,
}

impl ImageFormat {
    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    /// Detects the container format from magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        None
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unknown image format: {other}")),
        }
    }
}

/// Errors from write-time transforms. Never retried.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The bytes are not a recognizable image container.
    #[error("unrecognized image data ({len} bytes)")]
    UnrecognizedImage {
        /// Length of the rejected payload.
        len: usize,
    },

    /// Converting to the requested format needs a re-encoding collaborator.
    #[error("page is {from:?} but {to:?} was requested; re-encoding is not available")]
    ReencodeRequired {
        /// Detected source format.
        from: ImageFormat,
        /// Requested target format.
        to: ImageFormat,
    },
}

/// A local transform applied to each page at write time.
pub trait PageTransform: Send + Sync {
    /// Transforms page bytes, possibly rewriting the extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`]; the page is recorded as failed without
    /// refetching.
    fn apply(&self, bytes: Vec<u8>, ext: &str) -> Result<(Vec<u8>, String), ConversionError>;
}

/// Sniffs the image container and normalizes the extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatTransform {
    /// Requested output format; `None` keeps the source format.
    pub target: Option<ImageFormat>,
}

impl FormatTransform {
    /// Transform targeting `format`, or pass-through when `None`.
    #[must_use]
    pub fn new(target: Option<ImageFormat>) -> Self {
        Self { target }
    }
}

impl PageTransform for FormatTransform {
    fn apply(&self, bytes: Vec<u8>, ext: &str) -> Result<(Vec<u8>, String), ConversionError> {
        let detected = ImageFormat::sniff(&bytes)
            .ok_or(ConversionError::UnrecognizedImage { len: bytes.len() })?;

        match self.target {
            Some(target) if target != detected => Err(ConversionError::ReencodeRequired {
                from: detected,
                to: target,
            }),
            _ => {
                let normalized = detected.extension();
                if normalized != ext {
                    debug!(from = ext, to = normalized, "normalized page extension");
                }
                Ok((bytes, normalized.to_string()))
            }
        }
    }
}
