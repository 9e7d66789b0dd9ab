//! Output normalizer: re-encode eligible artifacts to the requested
//! format and quality.

use std::path::{Path, PathBuf};

use facegen_core::params::OutputFormat;
use image::DynamicImage;

use crate::error::PipelineError;

/// Suffixes the backend emits that are worth re-encoding.
const RE_ENCODABLE_SUFFIXES: &[&str] = &["png", "jpg", "jpeg"];

/// Re-encode eligible artifacts, substituting the new paths in place.
///
/// The whole pass is skipped when the caller asked for full-quality
/// png: every artifact passes through untouched. Otherwise an artifact
/// is re-encoded only when its suffix is a re-encodable image format
/// that is not already the target format; everything else (videos,
/// archives, already-converted files) passes through unchanged.
///
/// A decode failure on an eligible artifact is fatal: the backend
/// claimed to produce an image it did not.
pub fn normalize_outputs(
    files: Vec<PathBuf>,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<PathBuf>, PipelineError> {
    if quality >= 100 && !format.is_lossy() {
        return Ok(files);
    }

    let mut normalized = Vec::with_capacity(files.len());
    for file in files {
        if eligible(&file, format) {
            normalized.push(re_encode(&file, format, quality)?);
        } else {
            normalized.push(file);
        }
    }
    Ok(normalized)
}

/// Whether this artifact should be re-encoded for the target format.
fn eligible(file: &Path, format: OutputFormat) -> bool {
    let Some(suffix) = file.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let suffix = suffix.to_ascii_lowercase();
    if !RE_ENCODABLE_SUFFIXES.contains(&suffix.as_str()) {
        return false;
    }
    // Already in the target format; jpeg and jpg are the same codec.
    let same_format = match format {
        OutputFormat::Jpg => suffix == "jpg" || suffix == "jpeg",
        _ => suffix == format.extension(),
    };
    !same_format
}

/// Decode the artifact and write it beside the original under the
/// target suffix.
fn re_encode(file: &Path, format: OutputFormat, quality: u8) -> Result<PathBuf, PipelineError> {
    let decoded = image::open(file).map_err(|e| {
        PipelineError::Codec(format!("Cannot decode artifact {}: {e}", file.display()))
    })?;

    let target = file.with_extension(format.extension());
    match format {
        OutputFormat::Webp => write_webp(&decoded, &target, quality)?,
        OutputFormat::Jpg => write_jpeg(&decoded, &target, quality)?,
        OutputFormat::Png => decoded.save_with_format(&target, image::ImageFormat::Png).map_err(
            |e| PipelineError::Codec(format!("Cannot encode {}: {e}", target.display())),
        )?,
    }

    tracing::debug!(
        from = %file.display(),
        to = %target.display(),
        quality,
        "Artifact re-encoded",
    );
    Ok(target)
}

/// Lossy WebP via libwebp; the `image` crate only writes lossless WebP.
fn write_webp(decoded: &DynamicImage, target: &Path, quality: u8) -> Result<(), PipelineError> {
    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());
    let encoder = webp::Encoder::from_image(&rgba).map_err(|e| {
        PipelineError::Codec(format!("Cannot encode {}: {e}", target.display()))
    })?;
    let encoded = encoder.encode(quality as f32);
    std::fs::write(target, &*encoded).map_err(|e| PipelineError::io(target, e))
}

fn write_jpeg(decoded: &DynamicImage, target: &Path, quality: u8) -> Result<(), PipelineError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let file = std::fs::File::create(target).map_err(|e| PipelineError::io(target, e))?;
    let mut writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality.max(1));
    rgb.write_with_encoder(encoder).map_err(|e| {
        PipelineError::Codec(format!("Cannot encode {}: {e}", target.display()))
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::RgbImage;

    use super::*;

    fn write_test_png(path: &Path) {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, image::Rgb([120, 40, 200])))
            .save(path)
            .unwrap();
    }

    #[test]
    fn full_quality_png_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("out.png");
        write_test_png(&png);
        let other = dir.path().join("video.mp4");
        std::fs::write(&other, b"not an image").unwrap();

        let files = vec![png.clone(), other.clone()];
        let result = normalize_outputs(files.clone(), OutputFormat::Png, 100).unwrap();
        assert_eq!(result, files);
    }

    #[test]
    fn webp_at_half_quality_replaces_lossless_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_test_png(&a);
        write_test_png(&b);

        let result = normalize_outputs(vec![a.clone(), b.clone()], OutputFormat::Webp, 50).unwrap();

        assert_eq!(result, vec![dir.path().join("a.webp"), dir.path().join("b.webp")]);
        for path in &result {
            assert!(path.exists(), "{} should exist", path.display());
        }
        assert!(!result.contains(&a));
        assert!(!result.contains(&b));
    }

    #[test]
    fn non_image_artifacts_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        let bare = dir.path().join("noext");
        std::fs::write(&bare, b"data").unwrap();

        let result =
            normalize_outputs(vec![video.clone(), bare.clone()], OutputFormat::Webp, 50).unwrap();
        assert_eq!(result, vec![video, bare]);
    }

    #[test]
    fn artifact_already_in_target_format_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("photo.jpg");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3])))
            .save(&jpg)
            .unwrap();

        let result = normalize_outputs(vec![jpg.clone()], OutputFormat::Jpg, 50).unwrap();
        assert_eq!(result, vec![jpg]);
    }

    #[test]
    fn jpeg_re_encode_honors_target_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("frame.png");
        write_test_png(&png);

        let result = normalize_outputs(vec![png], OutputFormat::Jpg, 75).unwrap();
        assert_eq!(result, vec![dir.path().join("frame.jpg")]);
        let reread = image::open(&result[0]).unwrap();
        assert_eq!((reread.width(), reread.height()), (12, 8));
    }

    #[test]
    fn png_below_full_quality_still_re_encodes_jpegs() {
        // quality < 100 triggers the pass even for the lossless target.
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("photo.jpeg");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9])))
            .save(&jpg)
            .unwrap();

        let result = normalize_outputs(vec![jpg], OutputFormat::Png, 80).unwrap();
        assert_eq!(result, vec![dir.path().join("photo.png")]);
    }

    #[test]
    fn corrupt_eligible_artifact_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("broken.png");
        std::fs::write(&fake, b"not a png").unwrap();

        assert_matches!(
            normalize_outputs(vec![fake], OutputFormat::Webp, 50),
            Err(PipelineError::Codec(_))
        );
    }

    #[test]
    fn eligibility_rules() {
        let webp_target = OutputFormat::Webp;
        assert!(eligible(Path::new("a.png"), webp_target));
        assert!(eligible(Path::new("a.JPG"), webp_target));
        assert!(eligible(Path::new("a.jpeg"), webp_target));
        assert!(!eligible(Path::new("a.webp"), webp_target));
        assert!(!eligible(Path::new("a.mp4"), webp_target));
        assert!(!eligible(Path::new("a"), webp_target));
        // jpeg == jpg for target-format comparison.
        assert!(!eligible(Path::new("a.jpeg"), OutputFormat::Jpg));
        assert!(!eligible(Path::new("a.png"), OutputFormat::Png));
    }
}
