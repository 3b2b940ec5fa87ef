use std::io;
use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use rocket::http::ContentType;
use rocket::tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    File,
    Image,
}

impl UploadKind {
    pub fn prefix(self) -> &'static str {
        match self {
            UploadKind::File => "files",
            UploadKind::Image => "images",
        }
    }
}

/// Creates the per-kind directories under the media root.
pub fn prepare(media_root: &Path) -> io::Result<()> {
    for kind in [UploadKind::File, UploadKind::Image] {
        std::fs::create_dir_all(media_root.join(kind.prefix()))?;
    }
    Ok(())
}

/// Browsers submit an empty part for an untouched file input.
pub fn is_empty(upload: &Option<TempFile<'_>>) -> bool {
    upload.as_ref().map_or(true, |file| file.len() == 0)
}

/// Copies the upload below `media_root` and returns its relative reference,
/// e.g. `images/receipt_6f1c….png`.
pub async fn store(media_root: &Path, kind: UploadKind, file: &mut TempFile<'_>) -> io::Result<String> {
    let stem = file.name().filter(|name| !name.is_empty()).unwrap_or("upload");
    let unique = Uuid::new_v4().simple().to_string();
    let name = match file.content_type().and_then(|ct| ct.extension()) {
        Some(ext) => format!("{}_{}.{}", stem, unique, ext.as_str()),
        None => format!("{}_{}", stem, unique),
    };

    let reference = format!("{}/{}", kind.prefix(), name);
    let destination = media_root.join(&reference);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    file.copy_to(&destination).await?;

    log::info!("stored {} upload at {}", kind.prefix(), destination.display());
    Ok(reference)
}

pub fn resolve(media_root: &Path, reference: &str) -> PathBuf {
    media_root.join(reference)
}

// Raster formats a browser renders without running anything.
const INLINE_IMAGES: [&str; 5] = ["png", "jpeg", "gif", "webp", "bmp"];

/// Content type an attachment is served with. Uploaders pick the type, so
/// only plain raster images keep theirs; everything else goes out as bytes.
pub fn served_content_type(reference: &str) -> ContentType {
    let extension = Path::new(reference)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match ContentType::from_extension(extension) {
        Some(ct) if ct.top() == "image" && INLINE_IMAGES.contains(&ct.sub().as_str()) => ct,
        _ => ContentType::Binary,
    }
}

/// File name offered in `Content-Disposition`, limited to a safe charset.
pub fn download_name(reference: &str) -> String {
    let name: String = Path::new(reference)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// Best effort: a missing file is not an error worth surfacing.
pub async fn remove(media_root: &Path, reference: &str) {
    let path = resolve(media_root, reference);
    if let Err(e) = fs::remove_file(&path).await {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn remove_deletes_and_tolerates_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("media");
        prepare(&root).unwrap();
        assert!(root.join("files").is_dir());
        assert!(root.join("images").is_dir());

        let reference = "images/photo.png";
        std::fs::write(resolve(&root, reference), b"png").unwrap();

        remove(&root, reference).await;
        assert!(!resolve(&root, reference).exists());
        remove(&root, reference).await;
    }

    #[test]
    fn no_part_means_no_upload() {
        assert!(is_empty(&None));
    }

    #[test]
    fn only_raster_images_keep_their_content_type() {
        assert_eq!(served_content_type("images/cat_1.png"), ContentType::PNG);
        assert_eq!(served_content_type("images/cat_1.jpeg"), ContentType::JPEG);
        assert_eq!(served_content_type("images/logo_1.svg"), ContentType::Binary);
        assert_eq!(served_content_type("files/evil_1.html"), ContentType::Binary);
        assert_eq!(served_content_type("files/notes_1.txt"), ContentType::Binary);
        assert_eq!(served_content_type("files/noext"), ContentType::Binary);
    }

    #[test]
    fn download_names_drop_unsafe_characters() {
        assert_eq!(download_name("files/notes_1.txt"), "notes_1.txt");
        assert_eq!(download_name("files/a\"b;c.txt"), "abc.txt");
        assert_eq!(download_name("files/"), "files");
        assert_eq!(download_name(""), "download");
    }
}
