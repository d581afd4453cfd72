use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Image container recognized from its leading magic bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn mime_subtype(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }
}

/// `data:` URL for the vision API. Unrecognized bytes are labelled as PNG.
#[must_use]
pub fn data_url(bytes: &[u8]) -> String {
    let subtype = ImageFormat::sniff(bytes).map_or_else(
        || {
            log::debug!("Unrecognized image format ({} bytes), sending as png", bytes.len());
            "png"
        },
        ImageFormat::mime_subtype,
    );
    format!("data:image/{subtype};base64,{}", STANDARD.encode(bytes))
}
