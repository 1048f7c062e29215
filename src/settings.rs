use image::Rgba;
use std::path::{Path, PathBuf};

use crate::canvas::{Color, color_to_hex, parse_color};
use crate::log_warn;

/// Editor defaults persisted as a `key=value` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub primary_color: Color,
    pub secondary_color: Color,
    pub eraser_color: Color,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            canvas_width: 64,
            canvas_height: 64,
            primary_color: Rgba([0x78, 0x90, 0xe8, 0xff]),
            secondary_color: Rgba([0xff, 0xff, 0xff, 0xff]),
            eraser_color: Rgba([0, 0, 0, 0xff]),
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixelsides/pixelsides_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelSides\pixelsides_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelSides/pixelsides_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("PixelSides").join("pixelsides_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelSides")
                    .join("pixelsides_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(xdg) => PathBuf::from(xdg),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("pixelsides").join("pixelsides_settings.cfg"))
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines over the defaults. Unknown keys, `#` comments
    /// and malformed values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => {
                    if let Some(w) = parse_dimension(val) { s.canvas_width = w; }
                }
                "canvas_height" => {
                    if let Some(h) = parse_dimension(val) { s.canvas_height = h; }
                }
                "primary_color" | "secondary_color" | "eraser_color" => {
                    let Ok(color) = parse_color(val) else {
                        log_warn!("settings: ignoring {}={}", key, val);
                        continue;
                    };
                    match key {
                        "primary_color" => s.primary_color = color,
                        "secondary_color" => s.secondary_color = color,
                        _ => s.eraser_color = color,
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let mut content = String::new();
        content.push_str(&format!("canvas_width={}\n", self.canvas_width));
        content.push_str(&format!("canvas_height={}\n", self.canvas_height));
        content.push_str(&format!("primary_color={}\n", color_to_hex(self.primary_color)));
        content.push_str(&format!("secondary_color={}\n", color_to_hex(self.secondary_color)));
        content.push_str(&format!("eraser_color={}\n", color_to_hex(self.eraser_color)));
        content
    }

    /// Save settings to the default location, creating its directory.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

fn parse_dimension(val: &str) -> Option<u32> {
    val.parse::<u32>().ok().filter(|&v| v > 0)
}
