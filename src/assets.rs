use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::surface::ImageRef;

// ============================================================================
// BUILT-IN CATALOG
// ============================================================================
//
// The stock palette ships as procedurally rasterized art: no binary assets
// to load, and the same catalog resolves identically in the GUI, the
// headless CLI, and tests.

pub struct CatalogEntry {
    /// Stable id stored inside [`ImageRef::Builtin`] and project files.
    pub id: &'static str,
    /// Display name for the palette.
    pub name: &'static str,
}

/// Draggable sticker parts.
pub const PART_CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: "part.star", name: "Star" },
    CatalogEntry { id: "part.heart", name: "Heart" },
    CatalogEntry { id: "part.sunglasses", name: "Sunglasses" },
    CatalogEntry { id: "part.mustache", name: "Mustache" },
    CatalogEntry { id: "part.tophat", name: "Top Hat" },
    CatalogEntry { id: "part.crown", name: "Crown" },
    CatalogEntry { id: "part.bowtie", name: "Bow Tie" },
    CatalogEntry { id: "part.speech", name: "Speech Bubble" },
];

/// Base-element characters.
pub const CHARACTER_CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: "character.sunny", name: "Sunny" },
    CatalogEntry { id: "character.minty", name: "Minty" },
    CatalogEntry { id: "character.berry", name: "Berry" },
];

/// Surface backgrounds.
pub const BACKGROUND_CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: "background.sky", name: "Sky" },
    CatalogEntry { id: "background.sunset", name: "Sunset" },
    CatalogEntry { id: "background.meadow", name: "Meadow" },
    CatalogEntry { id: "background.checker", name: "Checker" },
];

const PART_ART_SIZE: u32 = 128;
const CHARACTER_ART_SIZE: u32 = 256;
const BACKGROUND_ART_SIZE: u32 = 256;

/// Rasterize a built-in catalog asset.  Returns `None` for unknown ids
/// (e.g. a project file from a newer build).
pub fn builtin_image(id: &str) -> Option<RgbaImage> {
    match id {
        "part.star" => Some(paint(PART_ART_SIZE, star_shader)),
        "part.heart" => Some(paint(PART_ART_SIZE, heart_shader)),
        "part.sunglasses" => Some(paint(PART_ART_SIZE, sunglasses_shader)),
        "part.mustache" => Some(paint(PART_ART_SIZE, mustache_shader)),
        "part.tophat" => Some(paint(PART_ART_SIZE, tophat_shader)),
        "part.crown" => Some(paint(PART_ART_SIZE, crown_shader)),
        "part.bowtie" => Some(paint(PART_ART_SIZE, bowtie_shader)),
        "part.speech" => Some(paint(PART_ART_SIZE, speech_shader)),
        "character.sunny" => Some(paint(CHARACTER_ART_SIZE, |u, v| blob_shader(u, v, [255, 205, 90]))),
        "character.minty" => Some(paint(CHARACTER_ART_SIZE, |u, v| blob_shader(u, v, [120, 215, 170]))),
        "character.berry" => Some(paint(CHARACTER_ART_SIZE, |u, v| blob_shader(u, v, [190, 130, 220]))),
        "background.sky" => Some(paint(BACKGROUND_ART_SIZE, |_, v| {
            Some(vertical_gradient(v, [135, 206, 250], [224, 247, 255]))
        })),
        "background.sunset" => Some(paint(BACKGROUND_ART_SIZE, |_, v| {
            Some(vertical_gradient(v, [255, 140, 90], [255, 222, 150]))
        })),
        "background.meadow" => Some(paint(BACKGROUND_ART_SIZE, |_, v| {
            if v > 0.25 {
                Some(vertical_gradient(v, [110, 190, 90], [80, 160, 70]))
            } else {
                Some(vertical_gradient(v, [150, 215, 250], [210, 240, 255]))
            }
        })),
        "background.checker" => Some(paint(BACKGROUND_ART_SIZE, |u, v| {
            let cell = |t: f32| (((t + 1.0) * 4.0) as i32) & 1;
            if cell(u) == cell(v) {
                Some([245, 245, 245, 255])
            } else {
                Some([215, 215, 215, 255])
            }
        })),
        _ => None,
    }
}

/// Run a shader over a square canvas.  The shader sees coordinates in
/// [-1, 1] with +v pointing down and returns straight-alpha RGBA or `None`
/// for transparent.
fn paint(size: u32, shader: impl Fn(f32, f32) -> Option<[u8; 4]>) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let half = size as f32 * 0.5;
    for y in 0..size {
        for x in 0..size {
            let u = (x as f32 + 0.5 - half) / half;
            let v = (y as f32 + 0.5 - half) / half;
            if let Some(rgba) = shader(u, v) {
                img.put_pixel(x, y, Rgba(rgba));
            }
        }
    }
    img
}

fn vertical_gradient(v: f32, top: [u8; 3], bottom: [u8; 3]) -> [u8; 4] {
    let t = ((v + 1.0) * 0.5).clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [lerp(top[0], bottom[0]), lerp(top[1], bottom[1]), lerp(top[2], bottom[2]), 255]
}

fn star_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let r = (u * u + v * v).sqrt();
    // Angle measured from straight up so one point faces north.
    let a = u.atan2(-v);
    let sector = std::f32::consts::TAU / 5.0;
    let t = (a.rem_euclid(sector) - sector * 0.5).abs() / (sector * 0.5);
    let boundary = 0.42 + (0.95 - 0.42) * t;
    (r <= boundary).then_some([255, 200, 40, 255])
}

fn heart_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    // Classic implicit heart curve, +y up; scaled to fill the canvas.
    let x = u * 1.3;
    let y = -v * 1.3 + 0.1;
    let q = x * x + y * y - 1.0;
    (q * q * q - x * x * y * y * y <= 0.0).then_some([235, 60, 90, 255])
}

fn sunglasses_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let lens = |cx: f32| {
        let dx = (u - cx) / 0.34;
        let dy = v / 0.3;
        dx * dx + dy * dy <= 1.0
    };
    let bridge = u.abs() <= 0.45 && v.abs() <= 0.06;
    let arms = v.abs() <= 0.05 && u.abs() > 0.45 && u.abs() <= 0.95;
    (lens(-0.48) || lens(0.48) || bridge || arms).then_some([25, 25, 30, 255])
}

fn mustache_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    // Two mirrored ellipses drooping toward the tips.
    let x = u.abs();
    let droop = (x * 1.8).min(1.0) * 0.18;
    let dx = (x - 0.4) / 0.44;
    let dy = (v - droop + 0.05) / 0.2;
    (dx * dx + dy * dy <= 1.0).then_some([70, 45, 25, 255])
}

fn tophat_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let crown = u.abs() <= 0.42 && (-0.85..=0.3).contains(&v);
    let brim = u.abs() <= 0.8 && (0.3..=0.5).contains(&v);
    let band = u.abs() <= 0.42 && (0.08..=0.3).contains(&v);
    if band {
        Some([200, 40, 60, 255])
    } else if crown || brim {
        Some([30, 30, 35, 255])
    } else {
        None
    }
}

fn crown_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let band = u.abs() <= 0.72 && (0.25..=0.65).contains(&v);
    let spike = (-0.55..0.25).contains(&v) && {
        let width = (v + 0.55) / 0.8 * 0.24;
        [-0.48f32, 0.0, 0.48]
            .iter()
            .any(|c| (u - c).abs() <= width)
    };
    (band || spike).then_some([240, 190, 50, 255])
}

fn bowtie_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let knot = u.abs() <= 0.14 && v.abs() <= 0.2;
    let wing = u.abs() > 0.1 && u.abs() <= 0.8 && v.abs() <= 0.12 + u.abs() * 0.42;
    (knot || wing).then_some([200, 40, 60, 255])
}

fn speech_shader(u: f32, v: f32) -> Option<[u8; 4]> {
    let bubble = u.abs() <= 0.85 && (-0.8..=0.3).contains(&v);
    let tail = (0.3..=0.7).contains(&v) && {
        let width = (0.7 - v) / 0.4 * 0.18;
        (u + 0.3).abs() <= width
    };
    if !(bubble || tail) {
        return None;
    }
    // Thin border so the white bubble reads against light backdrops.
    let edge = bubble
        && (u.abs() > 0.79 || v < -0.74 || (v > 0.24 && !(-0.48..=-0.12).contains(&u)));
    if edge {
        Some([120, 120, 130, 255])
    } else {
        Some([252, 252, 252, 255])
    }
}

fn blob_shader(u: f32, v: f32, body: [u8; 3]) -> Option<[u8; 4]> {
    let inside = |cx: f32, cy: f32, rx: f32, ry: f32| {
        let dx = (u - cx) / rx;
        let dy = (v - cy) / ry;
        dx * dx + dy * dy <= 1.0
    };
    // Eyes and smile sit on top of the body.
    let pupil = inside(-0.22, -0.18, 0.07, 0.09) || inside(0.22, -0.18, 0.07, 0.09);
    if pupil {
        return Some([30, 30, 35, 255]);
    }
    let eye = inside(-0.22, -0.2, 0.14, 0.17) || inside(0.22, -0.2, 0.14, 0.17);
    if eye {
        return Some([255, 255, 255, 255]);
    }
    let r = ((u / 0.3) * (u / 0.3) + ((v - 0.18) / 0.22) * ((v - 0.18) / 0.22)).sqrt();
    let smile = (0.75..=1.0).contains(&r) && v > 0.18;
    if smile {
        return Some([90, 50, 40, 255]);
    }
    if inside(0.0, 0.12, 0.62, 0.78) {
        let belly = inside(0.0, 0.42, 0.34, 0.4);
        let shade = if belly { 28 } else { 0 };
        return Some([
            body[0].saturating_add(shade),
            body[1].saturating_add(shade),
            body[2].saturating_add(shade),
            255,
        ]);
    }
    None
}

// ============================================================================
// IMAGE STORE — ImageRef → pixels, shared by GUI, CLI, and tests
// ============================================================================

/// Resolves [`ImageRef`]s to pixel data, caching every decode.  Cheap to
/// clone (images are behind `Arc`), which is how the export thread gets its
/// own copy.
#[derive(Clone, Default)]
pub struct ImageStore {
    cache: HashMap<ImageRef, Arc<RgbaImage>>,
    placeholder: Option<Arc<RgbaImage>>,
}

impl ImageStore {
    /// Resolve a reference to pixels.  Unknown builtins, unreadable files,
    /// and undecodable embedded bytes all yield `None`; callers fall back to
    /// the placeholder (the broken-image analog).
    pub fn resolve(&mut self, image: &ImageRef) -> Option<Arc<RgbaImage>> {
        if let Some(cached) = self.cache.get(image) {
            return Some(cached.clone());
        }
        let decoded = match image {
            ImageRef::Builtin(id) => builtin_image(id),
            ImageRef::Path(path) => match image::open(path) {
                Ok(img) => Some(img.to_rgba8()),
                Err(e) => {
                    crate::log_warn!("Failed to load {}: {}", path.display(), e);
                    None
                }
            },
            ImageRef::Embedded(bytes) => match image::load_from_memory(bytes) {
                Ok(img) => Some(img.to_rgba8()),
                Err(e) => {
                    crate::log_warn!("Failed to decode embedded image: {}", e);
                    None
                }
            },
        }?;
        let arc = Arc::new(decoded);
        self.cache.insert(image.clone(), arc.clone());
        Some(arc)
    }

    /// Pre-populate the cache (uploads, tests).
    pub fn insert(&mut self, image: ImageRef, pixels: RgbaImage) {
        self.cache.insert(image, Arc::new(pixels));
    }

    /// Gray box drawn for unresolvable references.
    pub fn placeholder(&mut self) -> Arc<RgbaImage> {
        self.placeholder
            .get_or_insert_with(|| {
                Arc::new(paint(PART_ART_SIZE, |u, v| {
                    if u.abs() > 0.96 || v.abs() > 0.96 {
                        Some([140, 140, 140, 255])
                    } else {
                        Some([200, 200, 200, 255])
                    }
                }))
            })
            .clone()
    }
}

// ============================================================================
// ASSETS — egui texture cache over the image store
// ============================================================================

#[derive(Default)]
pub struct Assets {
    pub store: ImageStore,
    textures: HashMap<ImageRef, TextureHandle>,
}

impl Assets {
    /// Texture for an image reference, uploading on first use.  `None` when
    /// the reference cannot be resolved.
    pub fn texture_for(&mut self, ctx: &egui::Context, image: &ImageRef) -> Option<TextureHandle> {
        if let Some(tex) = self.textures.get(image) {
            return Some(tex.clone());
        }
        let pixels = self.store.resolve(image)?;
        let color = ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        let tex = ctx.load_texture(
            format!("image-{}", self.textures.len()),
            color,
            TextureOptions::LINEAR,
        );
        self.textures.insert(image.clone(), tex.clone());
        Some(tex)
    }
}

// ============================================================================
// APP SETTINGS
// ============================================================================

/// Persisted preferences, stored as a simple key=value file.
///
/// Location:
///   Linux:    `~/.config/stickerfe/stickerfe_settings.cfg` (XDG respected)
///   Windows:  `%APPDATA%\StickerFE\stickerfe_settings.cfg`
///   macOS:    `~/Library/Application Support/StickerFE/stickerfe_settings.cfg`
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Dark UI theme.
    pub dark_mode: bool,
    /// Maximum number of undo steps.
    pub max_undo_steps: usize,
    /// JPEG export quality (1–100).
    pub jpeg_quality: u8,
    /// Directory of the last export, used to seed the save dialog.
    pub last_export_dir: Option<PathBuf>,
    /// Show a confirmation dialog when discarding unsaved work.
    pub confirm_discard: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            max_undo_steps: 50,
            jpeg_quality: 90,
            last_export_dir: None,
            confirm_discard: true,
        }
    }
}

impl AppSettings {
    fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("stickerfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("StickerFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("StickerFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerfe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("stickerfe_settings.cfg")))
        }
    }

    fn to_config_string(&self) -> String {
        format!(
            "dark_mode={}\n\
             max_undo_steps={}\n\
             jpeg_quality={}\n\
             last_export_dir={}\n\
             confirm_discard={}\n",
            self.dark_mode,
            self.max_undo_steps,
            self.jpeg_quality,
            self.last_export_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.confirm_discard,
        )
    }

    fn from_config_string(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "dark_mode" => s.dark_mode = val == "true",
                "max_undo_steps" => {
                    if let Ok(n) = val.parse() {
                        s.max_undo_steps = n;
                    }
                }
                "jpeg_quality" => {
                    if let Ok(q) = val.parse::<u8>() {
                        s.jpeg_quality = q.clamp(1, 100);
                    }
                }
                "last_export_dir" => {
                    if !val.is_empty() {
                        s.last_export_dir = Some(PathBuf::from(val));
                    }
                }
                "confirm_discard" => s.confirm_discard = val == "true",
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk.  Failures are non-fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        let _ = std::fs::write(path, self.to_config_string());
    }

    /// Load settings from disk (defaults if missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_config_string(&content),
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_id_rasterizes() {
        for entry in PART_CATALOG
            .iter()
            .chain(CHARACTER_CATALOG)
            .chain(BACKGROUND_CATALOG)
        {
            let img = builtin_image(entry.id);
            assert!(img.is_some(), "missing art for {}", entry.id);
            let img = img.unwrap();
            // Every asset must have at least some opaque pixels.
            assert!(
                img.pixels().any(|p| p[3] > 0),
                "fully transparent art for {}",
                entry.id
            );
        }
    }

    #[test]
    fn unknown_builtin_resolves_to_none() {
        let mut store = ImageStore::default();
        assert!(store.resolve(&ImageRef::Builtin("part.nonexistent".into())).is_none());
    }

    #[test]
    fn store_prefers_inserted_pixels() {
        let mut store = ImageStore::default();
        let image = ImageRef::Builtin("part.star".into());
        store.insert(image.clone(), RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        let resolved = store.resolve(&image).unwrap();
        assert_eq!(resolved.width(), 2);
        assert_eq!(resolved.get_pixel(0, 0).0, [1, 2, 3, 4]);
    }

    #[test]
    fn settings_round_trip_through_config_text() {
        let settings = AppSettings {
            dark_mode: true,
            max_undo_steps: 25,
            jpeg_quality: 70,
            last_export_dir: Some(PathBuf::from("/tmp/exports")),
            confirm_discard: false,
        };
        let parsed = AppSettings::from_config_string(&settings.to_config_string());
        assert_eq!(parsed, settings);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let parsed = AppSettings::from_config_string("max_undo_steps=banana\n???\n");
        assert_eq!(parsed, AppSettings::default());
    }
}
