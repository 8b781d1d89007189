//! File type detection from leading magic bytes.
//!
//! Client-declared content types and extensions are never consulted.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Jpeg,
    Png,
    Heic,
    Heif,
    Avif,
    Gif,
    Webp,
    Bmp,
    Tiff,
    Mp4,
    QuickTime,
    Pdf,
}

impl FileType {
    /// Canonical extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Jpeg => "jpg",
            FileType::Png => "png",
            FileType::Heic => "heic",
            FileType::Heif => "heif",
            FileType::Avif => "avif",
            FileType::Gif => "gif",
            FileType::Webp => "webp",
            FileType::Bmp => "bmp",
            FileType::Tiff => "tif",
            FileType::Mp4 => "mp4",
            FileType::QuickTime => "mov",
            FileType::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Jpeg => "image/jpeg",
            FileType::Png => "image/png",
            FileType::Heic => "image/heic",
            FileType::Heif => "image/heif",
            FileType::Avif => "image/avif",
            FileType::Gif => "image/gif",
            FileType::Webp => "image/webp",
            FileType::Bmp => "image/bmp",
            FileType::Tiff => "image/tiff",
            FileType::Mp4 => "video/mp4",
            FileType::QuickTime => "video/quicktime",
            FileType::Pdf => "application/pdf",
        }
    }

    /// Types accepted into the album.
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            FileType::Jpeg | FileType::Png | FileType::Heic | FileType::Heif
        )
    }
}

/// Identifies the file type from its first bytes. Returns `None` when no
/// known signature matches.
pub fn sniff(bytes: &[u8]) -> Option<FileType> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(FileType::Jpeg);
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(FileType::Png);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(FileType::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(FileType::Webp);
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return Some(FileType::Tiff);
    }
    if bytes.starts_with(b"%PDF") {
        return Some(FileType::Pdf);
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(sniff_iso_brand(&bytes[8..12]));
    }
    // BMP last: a two-byte signature is the weakest match.
    if bytes.len() >= 14 && bytes.starts_with(b"BM") {
        return Some(FileType::Bmp);
    }
    None
}

/// ISO base media files share the `ftyp` box; the major brand tells the
/// image containers apart from video.
fn sniff_iso_brand(brand: &[u8]) -> FileType {
    match brand {
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" => FileType::Heic,
        b"mif1" | b"msf1" | b"heif" => FileType::Heif,
        b"avif" | b"avis" => FileType::Avif,
        b"qt  " => FileType::QuickTime,
        _ => FileType::Mp4,
    }
}
