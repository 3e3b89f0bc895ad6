//! Image decoding and input discovery

use image::{ImageError, ImageReader, RgbImage};
use std::path::{Path, PathBuf};

use crate::error::{PhenoError, Result};

/// File extensions picked up when a directory is given as input
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// Decode any format the `image` crate understands into 8-bit RGB.
///
/// The format is guessed from the file contents, not the extension. A file
/// that cannot be opened or read is reported as `ImageDecode` too, so it
/// stays a failure of that image alone.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let decode_error = |source| PhenoError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(ImageError::IoError(e)))?;
    let image = reader.decode().map_err(decode_error)?;
    Ok(image.to_rgb8())
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Expand the command-line inputs into image files.
///
/// Files are kept as given; a directory contributes its supported files in
/// sorted order (not recursive).
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && is_supported(&path) {
                    found.push(path);
                }
            }
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(PhenoError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input not found: {}", input.display()),
            )));
        }
    }
    Ok(files)
}

/// Identifier written in the result file's `image` column
pub fn image_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
