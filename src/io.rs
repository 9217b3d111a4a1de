use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::canvas::{MAX_CANVAS_DIM, RasterSurface};
use crate::components::tools::{BrushKind, DrawMode, FillStrategy, ToolProperties};
use crate::error::{ColoringError, Result};

/// Output formats the studio and CLI can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    /// Native session file
    Cfe,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Cfe => "cfe",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "cfe" => Some(SaveFormat::Cfe),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// CFE SESSION FILE FORMAT
// ============================================================================

const CFE_MAGIC: &str = "CFE1";

/// Serializable session: surface pixels plus the brush the user had set up.
#[derive(Serialize, Deserialize)]
struct SessionFileV1 {
    magic: String,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    brush: BrushKind,
    intensity: f32,
    size: f32,
    color: [u8; 3],
    mode: DrawMode,
    fill_strategy: FillStrategy,
}

/// Save the surface and tool settings as a `.cfe` session file.
pub fn save_cfe(surface: &RasterSurface, tools: &ToolProperties, path: &Path) -> Result<()> {
    let file = SessionFileV1 {
        magic: CFE_MAGIC.to_string(),
        width: surface.width(),
        height: surface.height(),
        pixels: surface.pixels().as_raw().clone(),
        brush: tools.brush,
        intensity: tools.intensity,
        size: tools.size,
        color: tools.rgb(),
        mode: tools.mode,
        fill_strategy: tools.fill_strategy,
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

/// Load a `.cfe` session file.
pub fn load_cfe(path: &Path) -> Result<(RasterSurface, ToolProperties)> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(ColoringError::InvalidFormat("file too small".into()));
    }

    // bincode writes a String as an 8-byte length then the bytes,
    // so the 4-char magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != CFE_MAGIC {
        return Err(ColoringError::InvalidFormat(format!("unknown magic '{}'", magic)));
    }

    let file: SessionFileV1 = bincode::deserialize(&raw)?;
    check_dimensions(file.width, file.height)?;
    let expected = file.width as usize * file.height as usize * 4;
    if file.pixels.len() != expected {
        return Err(ColoringError::InvalidFormat(format!(
            "pixel buffer is {} bytes, expected {}",
            file.pixels.len(),
            expected
        )));
    }

    let img = RgbaImage::from_raw(file.width, file.height, file.pixels)
        .ok_or_else(|| ColoringError::InvalidFormat("could not rebuild pixel buffer".into()))?;
    let mut tools = ToolProperties {
        brush: file.brush,
        intensity: file.intensity.clamp(0.0, 1.0),
        size: file.size.max(0.5),
        mode: file.mode,
        fill_strategy: file.fill_strategy,
        ..Default::default()
    };
    tools.set_rgb(file.color);

    Ok((RasterSurface::from_rgba_image(img), tools))
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_CANVAS_DIM || height > MAX_CANVAS_DIM {
        return Err(ColoringError::InvalidDimensions { width, height });
    }
    Ok(())
}

// ============================================================================
// IMAGES
// ============================================================================

/// Decode any image the `image` crate understands into RGBA.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)?.to_rgba8();
    check_dimensions(img.width(), img.height())?;
    Ok(img)
}

/// New `width` x `height` surface with the line-art template at `path` drawn in.
pub fn load_template(path: &Path, width: u32, height: u32) -> Result<RasterSurface> {
    check_dimensions(width, height)?;
    let template = load_image_sync(path)?;
    let mut surface = RasterSurface::new(width, height);
    surface.draw_template(&template);
    log::info!(
        "template {} ({}x{}) drawn into {}x{}",
        path.display(),
        template.width(),
        template.height(),
        width,
        height
    );
    Ok(surface)
}

/// Encode and write an image as PNG or JPEG.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Cfe => {
            return Err(ColoringError::InvalidFormat(
                "session files are written with save_cfe".into(),
            ));
        }
    }

    Ok(())
}

/// Write the session in whatever format `path`'s extension names (PNG when unknown).
pub fn save_any(surface: &RasterSurface, tools: &ToolProperties, path: &Path, quality: u8) -> Result<()> {
    match SaveFormat::from_path(path).unwrap_or_default() {
        SaveFormat::Cfe => save_cfe(surface, tools, path),
        format => encode_and_write(surface.pixels(), path, format, quality),
    }
}

// ============================================================================
// FILE HANDLER
// ============================================================================

/// Remembers the last paths and format picked through the native dialogs.
pub struct FileHandler {
    pub current_path: Option<PathBuf>,
    pub last_format: SaveFormat,
    pub last_quality: u8,
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandler {
    pub fn new() -> Self {
        Self {
            current_path: None,
            last_format: SaveFormat::Png,
            last_quality: 90,
        }
    }

    /// Show a native dialog for a template image or a session file.
    pub fn pick_open_path(&self) -> Option<PathBuf> {
        FileDialog::new()
            .add_filter("All Supported", &["cfe", "png", "jpg", "jpeg", "webp", "bmp"])
            .add_filter("Coloring Session", &["cfe"])
            .add_filter("Line Art", &["png", "jpg", "jpeg", "webp", "bmp"])
            .add_filter("All Files", &["*"])
            .pick_file()
    }

    pub fn pick_save_path(&mut self, default_name: &str) -> Option<PathBuf> {
        let path = FileDialog::new()
            .add_filter("PNG", &["png"])
            .add_filter("JPEG", &["jpg", "jpeg"])
            .add_filter("Coloring Session", &["cfe"])
            .set_file_name(format!("{}.{}", default_name, self.last_format.extension()))
            .save_file()?;
        if let Some(format) = SaveFormat::from_path(&path) {
            self.last_format = format;
        }
        self.current_path = Some(path.clone());
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(SaveFormat::from_extension("JPEG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_path(Path::new("a/b.cfe")), Some(SaveFormat::Cfe));
        assert_eq!(SaveFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn dimension_cap() {
        assert!(check_dimensions(16_384, 1).is_ok());
        assert!(matches!(
            check_dimensions(16_385, 1),
            Err(ColoringError::InvalidDimensions { width: 16_385, height: 1 })
        ));
        assert!(check_dimensions(0, 10).is_err());
    }
}
