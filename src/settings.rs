use std::path::{Path, PathBuf};

use crate::canvas::{DEFAULT_CANVAS_SIZE, MAX_CANVAS_DIM};
use crate::components::history::{DEFAULT_MAX_HISTORY, DEFAULT_MAX_MEMORY_MB, HistoryManager};
use crate::components::tools::{BrushKind, FillStrategy, ToolProperties};
use crate::error::Result;
use crate::ops::color::{format_color, parse_color};

const SETTINGS_FILE: &str = "coloringfe_settings.cfg";

/// Persisted studio preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct StudioSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub max_undo_steps: usize,
    pub history_memory_mb: usize,
    pub brush: BrushKind,
    pub intensity: f32,
    pub brush_size: f32,
    pub color: [u8; 3],
    pub fill_strategy: FillStrategy,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_SIZE,
            canvas_height: DEFAULT_CANVAS_SIZE,
            max_undo_steps: DEFAULT_MAX_HISTORY,
            history_memory_mb: DEFAULT_MAX_MEMORY_MB,
            brush: BrushKind::Standard,
            intensity: 0.5,
            brush_size: 5.0,
            color: [0, 0, 0],
            fill_strategy: FillStrategy::Disc,
        }
    }
}

impl StudioSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/coloringfe/coloringfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\ColoringFE\coloringfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/ColoringFE/coloringfe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("coloringfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let config_dir = PathBuf::from(appdata).join("ColoringFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("ColoringFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             max_undo_steps={}\n\
             history_memory_mb={}\n\
             brush={}\n\
             intensity={}\n\
             brush_size={}\n\
             color={}\n\
             fill_strategy={}\n",
            self.canvas_width,
            self.canvas_height,
            self.max_undo_steps,
            self.history_memory_mb,
            self.brush.key(),
            self.intensity,
            self.brush_size,
            format_color(self.color),
            self.fill_strategy.key(),
        )
    }

    /// Parse settings text. Unknown keys and bad values fall back to defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    s.canvas_width = val.parse::<u32>().unwrap_or(DEFAULT_CANVAS_SIZE).clamp(1, MAX_CANVAS_DIM);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse::<u32>().unwrap_or(DEFAULT_CANVAS_SIZE).clamp(1, MAX_CANVAS_DIM);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(DEFAULT_MAX_HISTORY).max(1);
                }
                "history_memory_mb" => {
                    s.history_memory_mb = val.parse().unwrap_or(DEFAULT_MAX_MEMORY_MB);
                }
                "brush" => {
                    s.brush = BrushKind::from_key(val).unwrap_or_default();
                }
                "intensity" => {
                    s.intensity = val.parse::<f32>().unwrap_or(0.5).clamp(0.0, 1.0);
                }
                "brush_size" => {
                    s.brush_size = val.parse::<f32>().unwrap_or(5.0).max(0.5);
                }
                "color" => {
                    if let Some(c) = parse_color(val) {
                        s.color = c;
                    }
                }
                "fill_strategy" => {
                    s.fill_strategy = FillStrategy::from_key(val).unwrap_or_default();
                }
                _ => {}
            }
        }
        s
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Defaults when the file is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(e) => {
                log::debug!("settings: using defaults ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log::warn!("settings: failed to write {}: {}", path.display(), e);
        }
    }

    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn tool_properties(&self) -> ToolProperties {
        let mut tools = ToolProperties {
            brush: self.brush,
            intensity: self.intensity,
            size: self.brush_size,
            fill_strategy: self.fill_strategy,
            ..Default::default()
        };
        tools.set_rgb(self.color);
        tools
    }

    /// Copy the brush part of `tools` back into the settings.
    pub fn remember_tools(&mut self, tools: &ToolProperties) {
        self.brush = tools.brush;
        self.intensity = tools.intensity;
        self.brush_size = tools.size;
        self.color = tools.rgb();
        self.fill_strategy = tools.fill_strategy;
    }

    pub fn history_manager(&self) -> HistoryManager {
        let mut history = HistoryManager::new(self.max_undo_steps);
        history.set_memory_limit(if self.history_memory_mb == 0 {
            None
        } else {
            Some(self.history_memory_mb * 1024 * 1024)
        });
        history
    }
}
