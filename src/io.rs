use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbaImage};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::surface::{BaseElement, ImageRef, PlacedElement, SurfaceState};

// ============================================================================
// STKR PROJECT FILE FORMAT
// ============================================================================

/// Magic header for the composition project format (v1).
const STKR_MAGIC: &str = "STKR1";

pub const PROJECT_EXTENSION: &str = "stkr";

/// Serializable project file structure.  Transient interaction state (drag
/// payload, selection) is intentionally not persisted.
#[derive(Serialize, Deserialize)]
struct ProjectFileV1 {
    magic: String,
    width: u32,
    height: u32,
    background: Option<ImageRef>,
    base: BaseElement,
    elements: Vec<PlacedElement>,
}

/// Save the surface as a `.stkr` project file.
pub fn save_project(path: &Path, surface: &SurfaceState) -> Result<(), String> {
    let mut elements = surface.elements.clone();
    for elem in &mut elements {
        elem.selected = false;
    }
    let file = ProjectFileV1 {
        magic: STKR_MAGIC.to_string(),
        width: surface.width,
        height: surface.height,
        background: surface.background.clone(),
        base: surface.base.clone(),
        elements,
    };

    let out = File::create(path)
        .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    let writer = BufWriter::new(out);
    bincode::serialize_into(writer, &file)
        .map_err(|e| format!("Failed to write project: {}", e))
}

/// Load a `.stkr` project file into a fresh surface.
pub fn load_project(path: &Path) -> Result<SurfaceState, String> {
    let input = File::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(input);
    let file: ProjectFileV1 = bincode::deserialize_from(reader)
        .map_err(|e| format!("Not a valid project file: {}", e))?;

    if file.magic != STKR_MAGIC {
        return Err(format!(
            "Unrecognized project header {:?} (expected {:?})",
            file.magic, STKR_MAGIC
        ));
    }

    let mut surface = SurfaceState::new(file.width.max(1), file.height.max(1));
    surface.background = file.background;
    surface.base = file.base;
    surface.elements = file.elements;
    surface.clear_selection();
    Ok(surface)
}

// ============================================================================
// RASTER EXPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG",
            ExportFormat::Jpeg => "JPEG",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    /// Infer from a file extension; `None` for unknown extensions.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Encode a composed image and write it to disk.
pub fn encode_and_write(
    path: &Path,
    image: &RgbaImage,
    format: ExportFormat,
    quality: u8,
) -> Result<(), String> {
    let file = File::create(path)
        .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder
                .encode(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ColorType::Rgba8,
                )
                .map_err(|e| format!("PNG encode failed: {}", e))?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha; flatten to RGB first.
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder
                .encode(
                    rgb_image.as_raw(),
                    rgb_image.width(),
                    rgb_image.height(),
                    image::ColorType::Rgb8,
                )
                .map_err(|e| format!("JPEG encode failed: {}", e))?;
        }
    }
    Ok(())
}

/// PNG-encode an image in memory (used to embed file-picker uploads).
pub fn encode_png_bytes(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new(&mut bytes);
    #[allow(deprecated)]
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| format!("PNG encode failed: {}", e))?;
    Ok(bytes)
}

/// Decode an image file from disk.
pub fn load_image_file(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

// ============================================================================
// FILE DIALOGS
// ============================================================================

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Pick an image file to upload into the palette.
pub fn pick_image_dialog() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

/// Pick a `.stkr` project to open.
pub fn pick_project_dialog() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("StickerFE project", &[PROJECT_EXTENSION])
        .pick_file()
}

/// Choose where to save a `.stkr` project.
pub fn save_project_dialog(default_name: &str) -> Option<PathBuf> {
    let path = FileDialog::new()
        .add_filter("StickerFE project", &[PROJECT_EXTENSION])
        .set_file_name(&format!("{}.{}", default_name, PROJECT_EXTENSION))
        .save_file()?;
    Some(ensure_extension(path, PROJECT_EXTENSION))
}

/// Choose where to export a raster image.  The default filename follows the
/// project name; the chosen extension picks the format.
pub fn export_dialog(default_name: &str, start_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dialog = FileDialog::new()
        .add_filter("PNG image", &["png"])
        .add_filter("JPEG image", &["jpg", "jpeg"])
        .set_file_name(&format!("{}.png", default_name));
    if let Some(dir) = start_dir {
        dialog = dialog.set_directory(dir);
    }
    dialog.save_file()
}

fn ensure_extension(mut path: PathBuf, ext: &str) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) != Some(ext) {
        path.set_extension(ext);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PlacedElement;

    fn sample_surface() -> SurfaceState {
        let mut s = SurfaceState::new(480, 360);
        s.background = Some(ImageRef::Builtin("background.sky".into()));
        s.base.image = Some(ImageRef::Builtin("character.minty".into()));
        let mut e = PlacedElement::new(ImageRef::Builtin("part.heart".into()), 120.0, 80.0);
        e.rotation = -30;
        e.scale = 1.4;
        e.opacity = 0.8;
        s.elements.push(e);
        s.elements.push(PlacedElement::new(
            ImageRef::Embedded(vec![1, 2, 3, 4]),
            10.0,
            20.0,
        ));
        s
    }

    #[test]
    fn project_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.stkr");
        let surface = sample_surface();

        save_project(&path, &surface).unwrap();
        let loaded = load_project(&path).unwrap();

        assert_eq!(loaded.width, surface.width);
        assert_eq!(loaded.height, surface.height);
        assert_eq!(loaded.background, surface.background);
        assert_eq!(loaded.base, surface.base);
        assert_eq!(loaded.elements, surface.elements);
    }

    #[test]
    fn selection_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.stkr");
        let mut surface = sample_surface();
        surface.elements[0].selected = true;

        save_project(&path, &surface).unwrap();
        let loaded = load_project(&path).unwrap();
        assert!(loaded.selected_index().is_none());
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.stkr");
        std::fs::write(&path, b"definitely not bincode").unwrap();
        assert!(load_project(&path).is_err());
    }

    #[test]
    fn export_format_from_extension() {
        assert_eq!(ExportFormat::from_extension("png"), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_extension("JPG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_extension("jpeg"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_extension("tiff"), None);
        assert_eq!(
            ExportFormat::from_path(Path::new("out/sticker.PNG")),
            Some(ExportFormat::Png)
        );
    }

    #[test]
    fn png_bytes_decode_back() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let bytes = encode_png_bytes(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 2).0, [10, 20, 30, 255]);
    }
}
