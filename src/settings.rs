//! Persistent defaults for the CLI and the network service.
//!
//! Stored as `key=value` lines. Missing file → defaults, unknown keys are
//! ignored and a value that fails to parse keeps its default. Command-line
//! flags override whatever is loaded here.

use std::path::{Path, PathBuf};

use crate::imgproc::parallel::available_workers;
use crate::imgproc::{FilterMode, PaddingMode};
use crate::io::SaveFormat;
use crate::server::DEFAULT_MAX_DIMENSION;

/// Defaults that persist across invocations.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Filter applied when `--action` is omitted
    pub action: FilterMode,
    /// Gaussian spread (blur radius)
    pub sigma: f64,
    /// Wiener regularization constant
    pub k: f64,
    /// Worker ceiling for the row/column passes
    pub workers: usize,
    /// Address the service listens on and the client connects to
    pub server_addr: String,
    /// Number of jobs the service processes concurrently
    pub job_workers: usize,
    /// Largest image width or height the service accepts
    pub max_dimension: u32,
    /// Fill for the power-of-two padding
    pub padding: PaddingMode,
    /// Output format when neither `--format` nor an extension decides
    pub format: SaveFormat,
    /// JPEG quality (1–100)
    pub quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            action: FilterMode::Deblur,
            sigma: 5.0,
            k: 0.001,
            workers: available_workers(),
            server_addr: "127.0.0.1:8080".to_string(),
            job_workers: 4,
            max_dimension: DEFAULT_MAX_DIMENSION,
            padding: PaddingMode::Zero,
            format: SaveFormat::Png,
            quality: 90,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/fftblur/fftblur_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\fftblur\fftblur_settings.cfg
    /// On macOS:   ~/Library/Application Support/fftblur/fftblur_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("fftblur").join("fftblur_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("fftblur")
                    .join("fftblur_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("fftblur").join("fftblur_settings.cfg"))
        }
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit file (defaults if missing or unreadable).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines on top of the defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "action" => {
                    s.action = FilterMode::from_action(val);
                }
                "sigma" => {
                    if let Some(v) = val.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0) {
                        s.sigma = v;
                    }
                }
                "k" => {
                    if let Some(v) = val.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0) {
                        s.k = v;
                    }
                }
                "workers" => {
                    if let Some(v) = val.parse::<usize>().ok().filter(|v| *v >= 1) {
                        s.workers = v;
                    }
                }
                "server_addr" => {
                    if !val.is_empty() {
                        s.server_addr = val.to_string();
                    }
                }
                "job_workers" => {
                    if let Some(v) = val.parse::<usize>().ok().filter(|v| *v >= 1) {
                        s.job_workers = v;
                    }
                }
                "max_dimension" => {
                    if let Some(v) = val.parse::<u32>().ok().filter(|v| *v >= 1) {
                        s.max_dimension = v;
                    }
                }
                "padding" => {
                    if let Some(p) = PaddingMode::from_name(val) {
                        s.padding = p;
                    }
                }
                "format" => {
                    if let Some(f) = SaveFormat::from_name(val) {
                        s.format = f;
                    }
                }
                "quality" => {
                    if let Some(q) = val.parse::<u8>().ok().filter(|q| (1..=100).contains(q)) {
                        s.quality = q;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Serialize to the `key=value` form read by [`Settings::parse`].
    pub fn to_config_string(&self) -> String {
        format!(
            "action={}\n\
             sigma={}\n\
             k={}\n\
             workers={}\n\
             server_addr={}\n\
             job_workers={}\n\
             max_dimension={}\n\
             padding={}\n\
             format={}\n\
             quality={}\n",
            self.action.action(),
            self.sigma,
            self.k,
            self.workers,
            self.server_addr,
            self.job_workers,
            self.max_dimension,
            self.padding.name(),
            self.format.extension(),
            self.quality,
        )
    }

    /// Write to an explicit file, creating its directory.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_tool() {
        let s = Settings::default();
        assert_eq!(s.action, FilterMode::Deblur);
        assert_eq!(s.sigma, 5.0);
        assert_eq!(s.k, 0.001);
        assert!(s.workers >= 1);
        assert_eq!(s.server_addr, "127.0.0.1:8080");
        assert_eq!(s.job_workers, 4);
        assert_eq!(s.padding, PaddingMode::Zero);
    }

    #[test]
    fn parse_overrides_and_ignores_junk() {
        let s = Settings::parse(
            "# comment\n\
             action=blur\n\
             sigma=2.5\n\
             k=-3\n\
             workers=0\n\
             padding=edge\n\
             max_dimension=0\n\
             quality=250\n\
             format=jpg\n\
             no_such_key=1\n\
             garbage line\n",
        );
        assert_eq!(s.action, FilterMode::Blur);
        assert_eq!(s.sigma, 2.5);
        assert_eq!(s.k, 0.001);
        assert_eq!(s.workers, Settings::default().workers);
        assert_eq!(s.padding, PaddingMode::Edge);
        assert_eq!(s.max_dimension, DEFAULT_MAX_DIMENSION);
        assert_eq!(s.quality, 90);
        assert_eq!(s.format, SaveFormat::Jpeg);
    }

    #[test]
    fn config_string_round_trips() {
        let s = Settings {
            action: FilterMode::Blur,
            sigma: 1.25,
            k: 0.05,
            workers: 3,
            server_addr: "0.0.0.0:9000".to_string(),
            job_workers: 2,
            max_dimension: 1024,
            padding: PaddingMode::Edge,
            format: SaveFormat::Bmp,
            quality: 70,
        };
        assert_eq!(Settings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("fftblur-settings-{}", std::process::id()));
        let path = dir.join("fftblur_settings.cfg");
        let s = Settings { sigma: 3.0, ..Settings::default() };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).sigma, 3.0);
        assert_eq!(Settings::load_from(&dir.join("missing.cfg")), Settings::default());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
