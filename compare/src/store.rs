//! Golden file storage on the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tracing::info;

use crate::error::CompareError;

const PNG_EXTENSION: &str = ".png";

/// Resolves, reads and writes golden PNGs under a root directory.
#[derive(Debug, Clone)]
pub struct GoldenStore {
    root: PathBuf,
}

impl GoldenStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the golden named `filename`. Pure path joining.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Decode the golden at `path` into RGBA8.
    pub fn read(&self, path: &Path) -> Result<RgbaImage, CompareError> {
        let bytes = fs::read(path).map_err(|e| CompareError::io(path, e))?;
        decode_png(&bytes, path)
    }

    /// Encode `image` as PNG at `path`, replacing whatever was there.
    pub fn write(&self, path: &Path, image: &RgbaImage) -> Result<(), CompareError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CompareError::io(parent, e))?;
        }
        let bytes = encode_png(image, path)?;
        fs::write(path, bytes).map_err(|e| CompareError::io(path, e))?;
        info!(path = %path.display(), "Wrote golden file");
        Ok(())
    }
}

/// Insert `suffix` before the `.png` extension.
///
/// `button.png` with `_dark` becomes `button_dark.png`; a name without the
/// extension gets one.
pub fn with_suffix(filename: &str, suffix: &str) -> String {
    let stem = filename.strip_suffix(PNG_EXTENSION).unwrap_or(filename);
    format!("{stem}{suffix}{PNG_EXTENSION}")
}

/// Golden filename without its extension, used to name report artifacts.
pub fn basename(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Decode PNG bytes, attributing failures to `path`.
pub fn decode_png(bytes: &[u8], path: &Path) -> Result<RgbaImage, CompareError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|source| CompareError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode an RGBA image to PNG bytes, attributing failures to `path`.
pub fn encode_png(image: &RgbaImage, path: &Path) -> Result<Vec<u8>, CompareError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| CompareError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

/// Write `image` to `path` as PNG without touching the parent directory.
pub(crate) fn save_png(image: &RgbaImage, path: &Path) -> Result<(), CompareError> {
    let bytes = encode_png(image, path)?;
    fs::write(path, bytes).map_err(|e| CompareError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("button.png", "_dark"), "button_dark.png");
        assert_eq!(with_suffix("button.png", ""), "button.png");
        assert_eq!(with_suffix("button", "_rtl"), "button_rtl.png");
    }

    #[test]
    fn basename_strips_extension_and_directories() {
        assert_eq!(basename("button.png"), "button");
        assert_eq!(basename("widgets/button.png"), "button");
        assert_eq!(basename("scene.v2.png"), "scene.v2");
        assert_eq!(basename("noext"), "noext");
    }

    #[test]
    fn resolve_joins_under_root() {
        let store = GoldenStore::new("/goldens");
        assert_eq!(
            store.resolve("a.png"),
            PathBuf::from("/goldens").join("a.png")
        );
    }

    #[test]
    fn write_then_read_preserves_pixels() {
        let dir = TempDir::new().unwrap();
        let store = GoldenStore::new(dir.path().join("nested"));
        let path = store.resolve("shot.png");

        let mut image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        image.put_pixel(2, 1, Rgba([9, 8, 7, 128]));

        assert!(!store.exists(&path));
        store.write(&path, &image).unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.read(&path).unwrap(), image);
    }

    #[test]
    fn write_overwrites_existing_golden() {
        let dir = TempDir::new().unwrap();
        let store = GoldenStore::new(dir.path());
        let path = store.resolve("shot.png");

        store
            .write(&path, &RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])))
            .unwrap();
        let replacement = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        store.write(&path, &replacement).unwrap();

        assert_eq!(store.read(&path).unwrap(), replacement);
    }

    #[test]
    fn read_rejects_non_png_bytes() {
        let dir = TempDir::new().unwrap();
        let store = GoldenStore::new(dir.path());
        let path = store.resolve("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        let err = store.read(&path).unwrap_err();
        assert!(matches!(err, CompareError::Decode { .. }));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = GoldenStore::new(dir.path());
        let err = store.read(&store.resolve("absent.png")).unwrap_err();
        assert!(matches!(err, CompareError::Io { .. }));
    }
}
