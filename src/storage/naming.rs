//! Output naming rules.
//!
//! Filenames encode series/chapter/page with zero-padded indices so lexical
//! order equals logical order in every layout. The flat layout uses
//! `{chapter}_{page}.{ext}`; per-chapter directories and archive entries use
//! the bare `{page}.{ext}` since the chapter is encoded by the container.

use url::Url;

/// Returns the decimal digit count of `value`, used as a zero-pad width.
#[must_use]
pub fn pad_width(value: u32) -> usize {
    if value == 0 {
        1
    } else {
        (value.ilog10() + 1) as usize
    }
}

/// Zero-padded chapter label, e.g. `007` for chapter 7 padded to 3.
#[must_use]
pub fn chapter_label(chapter_number: u32, width: usize) -> String {
    format!("{chapter_number:0width$}")
}

/// How page filenames are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// `{chapter}_{page}.{ext}` - all chapters share one directory.
    Flat,

    /// `{page}.{ext}` - the chapter is the directory or archive name.
    Bare,
}

/// Names page files for one chapter.
#[derive(Debug, Clone)]
pub struct PageNamer {
    style: NameStyle,
    chapter_label: String,
    page_width: usize,
}

impl PageNamer {
    /// Creates a namer for one chapter.
    ///
    /// `page_count` drives the page pad width so a 100-page chapter gets
    /// three digits while a 9-page chapter gets one.
    #[must_use]
    pub fn new(style: NameStyle, chapter_label: String, page_count: usize) -> Self {
        let page_width = if page_count == 0 {
            1
        } else {
            page_count.to_string().len()
        };
        Self {
            style,
            chapter_label,
            page_width,
        }
    }

    /// Returns the filename for `page_index` with extension `ext`.
    #[must_use]
    pub fn page_file_name(&self, page_index: usize, ext: &str) -> String {
        let width = self.page_width;
        match self.style {
            NameStyle::Flat => {
                format!("{}_{page_index:0width$}.{ext}", self.chapter_label)
            }
            NameStyle::Bare => format!("{page_index:0width$}.{ext}"),
        }
    }
}

/// Derives a file extension for a page.
///
/// The server-reported content type wins; failing that, the extension of the
/// locator's path; failing that, `bin`.
#[must_use]
pub fn extension_for(content_type: Option<&str>, locator: &str) -> String {
    if let Some(ext) = content_type.and_then(extension_from_content_type) {
        return ext.to_string();
    }

    if let Some(ext) = extension_from_locator(locator) {
        return ext;
    }

    "bin".to_string()
}

/// Maps an image content type to a canonical extension.
fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    // Strip parameters such as "; charset=binary"
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Pulls an extension out of the locator's URL path.
fn extension_from_locator(locator: &str) -> Option<String> {
    let url = Url::parse(locator).ok()?;
    let last_segment = url.path_segments()?.next_back()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(char::is_alphanumeric) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
