use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::prompt::{ImagePayload, PromptPart};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "py", "js", "html", "css", "json", "md", "log"];

// Larger images are scaled down before upload.
const MAX_WIDTH: u32 = 1120;
const MAX_HEIGHT: u32 = 1120;

pub const CLIPBOARD_IMAGE_NAME: &str = "capture.png";

/// Where an attachment comes from: a selected/dropped file or pasted pixels.
#[derive(Debug)]
pub enum AttachmentSource {
    Path(PathBuf),
    Pixels(RgbaImage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Text,
}

/// A file staged for the next request.
#[derive(Debug, Clone)]
pub enum Attachment {
    Image { name: String, bitmap: DynamicImage },
    Text { name: String, content: String },
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Unsupported file type: {name}")]
    Unsupported { name: String },

    #[error("Could not read file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Could not encode image {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Classifies a file by extension, case-insensitively.
pub fn classify(path: &Path) -> Option<AttachmentKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AttachmentKind::Image)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(AttachmentKind::Text)
    } else {
        None
    }
}

pub fn handle_file(source: AttachmentSource) -> Result<Attachment, AttachmentError> {
    match source {
        AttachmentSource::Pixels(pixels) => Ok(Attachment::Image {
            name: CLIPBOARD_IMAGE_NAME.to_string(),
            bitmap: DynamicImage::ImageRgba8(pixels),
        }),
        AttachmentSource::Path(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            match classify(&path) {
                Some(AttachmentKind::Image) => {
                    let bitmap = image::open(&path)
                        .map_err(|source| AttachmentError::Decode { name: name.clone(), source })?;
                    let (width, height) = bitmap.dimensions();
                    tracing::debug!("Attached image {} ({}x{})", name, width, height);
                    Ok(Attachment::Image { name, bitmap })
                }
                Some(AttachmentKind::Text) => {
                    let bytes = std::fs::read(&path)
                        .map_err(|source| AttachmentError::Read { name: name.clone(), source })?;
                    let content = decode_dropping_invalid(&bytes);
                    tracing::debug!("Attached text file {} ({} bytes)", name, content.len());
                    Ok(Attachment::Text { name, content })
                }
                None => Err(AttachmentError::Unsupported { name }),
            }
        }
    }
}

/// Decodes UTF-8, silently skipping malformed byte sequences.
fn decode_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}

/// Reads an image from the system clipboard, if there is one.
pub fn read_clipboard_image() -> Result<Option<RgbaImage>, AttachmentError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| AttachmentError::Clipboard(e.to_string()))?;

    match clipboard.get_image() {
        Ok(data) => RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned())
            .map(Some)
            .ok_or_else(|| AttachmentError::Clipboard("image data does not match its size".to_string())),
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(e) => Err(AttachmentError::Clipboard(e.to_string())),
    }
}

fn encode_png_base64(name: &str, bitmap: &DynamicImage) -> Result<String, AttachmentError> {
    let (width, height) = bitmap.dimensions();

    let resized;
    let img = if width > MAX_WIDTH || height > MAX_HEIGHT {
        let scale = (MAX_WIDTH as f32 / width as f32).min(MAX_HEIGHT as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        tracing::debug!("Resizing {} from {}x{} to {}x{}", name, width, height, new_width, new_height);
        resized = bitmap.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
        &resized
    } else {
        bitmap
    };

    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|source| AttachmentError::Encode { name: name.to_string(), source })?;

    Ok(BASE64.encode(buffer))
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Image { name, .. } | Attachment::Text { name, .. } => name,
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        match self {
            Attachment::Image { .. } => AttachmentKind::Image,
            Attachment::Text { .. } => AttachmentKind::Text,
        }
    }

    /// Converts the attachment into the part sent to the model.
    pub fn to_prompt_part(&self) -> Result<PromptPart, AttachmentError> {
        match self {
            Attachment::Image { name, bitmap } => Ok(PromptPart::Image(ImagePayload {
                mime_type: "image/png".to_string(),
                data: encode_png_base64(name, bitmap)?,
            })),
            Attachment::Text { name, content } => Ok(PromptPart::Text(format!(
                "Here is the content of the file \"{}\":\n\n{}",
                name, content
            ))),
        }
    }
}
