// ============================================================================
// SETTINGS — key=value .cfg file in the per-user config directory
// ============================================================================

use std::path::{Path, PathBuf};

use log::LevelFilter;

use crate::error::ComposeResult;

const SETTINGS_FILE: &str = "layerfe_settings.cfg";

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// World width given to newly generated layers.
    pub default_layer_width: f32,
    /// Exponential wheel-zoom rate per wheel delta unit.
    pub wheel_zoom_sensitivity: f32,
    /// Screen-space hit radius of the rotate/scale handles.
    pub handle_radius: f32,
    /// Screen distance from the top edge midpoint to the rotate handle.
    pub rotate_handle_offset: f32,
    /// World offset applied to layers created from an edit.
    pub duplicate_offset: f32,
    pub export_file_name: String,
    pub log_level: LevelFilter,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_layer_width: 400.0,
            wheel_zoom_sensitivity: 0.001,
            handle_radius: 10.0,
            rotate_handle_offset: 30.0,
            duplicate_offset: 20.0,
            export_file_name: "composition.png".to_string(),
            log_level: LevelFilter::Info,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/layerfe/layerfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\LayerFE\layerfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/LayerFE/layerfe_settings.cfg
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
                .join("layerfe");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("LayerFE").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("LayerFE")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Serialize to the `.cfg` text format.
    pub fn to_config_string(&self) -> String {
        format!(
            "default_layer_width={}\n\
             wheel_zoom_sensitivity={}\n\
             handle_radius={}\n\
             rotate_handle_offset={}\n\
             duplicate_offset={}\n\
             export_file_name={}\n\
             log_level={}\n",
            self.default_layer_width,
            self.wheel_zoom_sensitivity,
            self.handle_radius,
            self.rotate_handle_offset,
            self.duplicate_offset,
            self.export_file_name,
            self.log_level.to_string().to_lowercase(),
        )
    }

    /// Parse `.cfg` text. Unknown keys are ignored; malformed or out-of-range
    /// values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        let d = Self::default();
        let positive = |val: &str, fallback: f32| -> f32 {
            val.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(fallback)
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "default_layer_width" => {
                    s.default_layer_width = positive(val, d.default_layer_width);
                }
                "wheel_zoom_sensitivity" => {
                    s.wheel_zoom_sensitivity = positive(val, d.wheel_zoom_sensitivity);
                }
                "handle_radius" => {
                    s.handle_radius = positive(val, d.handle_radius);
                }
                "rotate_handle_offset" => {
                    s.rotate_handle_offset = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .unwrap_or(d.rotate_handle_offset);
                }
                "duplicate_offset" => {
                    s.duplicate_offset = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .unwrap_or(d.duplicate_offset);
                }
                "export_file_name" => {
                    if !val.is_empty() {
                        s.export_file_name = val.to_string();
                    }
                }
                "log_level" => {
                    s.log_level = val.parse().unwrap_or(d.log_level);
                }
                _ => {}
            }
        }
        s
    }

    /// Load from the default location (returns default if file missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> ComposeResult<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> ComposeResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }
}
