use std::io::Read;
use std::path::Path;

use serde::Serialize;

/// Which loader a file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Raster,
    Container,
    Unknown,
}

const DDS_MAGIC: &[u8; 4] = b"DDS ";

fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dds"))
}

/// Classify by extension first, then by the leading bytes.
pub fn classify(path: &Path, head: &[u8]) -> FileKind {
    if has_container_extension(path) || head.starts_with(DDS_MAGIC) {
        return FileKind::Container;
    }
    if image::guess_format(head).is_ok() || image::ImageFormat::from_path(path).is_ok() {
        return FileKind::Raster;
    }
    FileKind::Unknown
}

/// Extension-only check used when scanning directories.
pub fn classify_path(path: &Path) -> FileKind {
    if has_container_extension(path) {
        FileKind::Container
    } else if image::ImageFormat::from_path(path).is_ok() {
        FileKind::Raster
    } else {
        FileKind::Unknown
    }
}

/// Read the first bytes of `path` and classify it.
pub fn classify_file(path: &Path) -> std::io::Result<FileKind> {
    let mut head = Vec::with_capacity(32);
    std::fs::File::open(path)?.take(32).read_to_end(&mut head)?;
    Ok(classify(path, &head))
}
