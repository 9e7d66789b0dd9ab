//! Input stager: orientation-correct the face image and write it to
//! the staging directory under the fixed filename the workflow's load
//! node expects.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::PipelineError;

/// Filename the workflow's face-image load node reads.
pub const STAGED_FACE_FILENAME: &str = "image.png";

/// Normalize the source face image into the staging directory.
///
/// Reads the embedded EXIF orientation if present and physically
/// rotates the pixels so the backend always sees an upright face.
/// Missing or malformed metadata degrades to a no-op rotation; an
/// unreadable image is a fatal input error. Returns the staged path.
pub fn stage_face_image(source: &Path, input_dir: &Path) -> Result<PathBuf, PipelineError> {
    let bytes = std::fs::read(source).map_err(|e| PipelineError::io(source, e))?;

    let decoded = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::io(source, e))?
        .decode()
        .map_err(|e| {
            PipelineError::Codec(format!("Cannot decode face image {}: {e}", source.display()))
        })?;

    let oriented = match orientation_tag(&bytes) {
        Some(tag) => {
            tracing::debug!(orientation = tag, "Applying EXIF orientation");
            apply_orientation(decoded, tag)
        }
        None => decoded,
    };

    let staged = input_dir.join(STAGED_FACE_FILENAME);
    oriented.save(&staged).map_err(|e| {
        PipelineError::Codec(format!("Cannot write staged image {}: {e}", staged.display()))
    })?;

    tracing::info!(source = %source.display(), staged = %staged.display(), "Face image staged");
    Ok(staged)
}

/// Extract the EXIF orientation tag value, if the image carries one.
///
/// Any read or parse failure means "no orientation" — uploads without
/// EXIF are the common case, not an error.
fn orientation_tag(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Rotate the image to counter the camera orientation.
///
/// Tag 3 is upside down, 6 needs a clockwise quarter turn, 8 a
/// counter-clockwise one. All rotations expand the canvas; nothing is
/// clipped. Unlisted tag values (mirrored variants included) are left
/// as-is.
fn apply_orientation(image: DynamicImage, tag: u32) -> DynamicImage {
    match tag {
        3 => image.rotate180(),
        6 => image.rotate90(),
        8 => image.rotate270(),
        _ => image,
    }
}
