use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub render_command: Option<String>,
    pub render_dpi: u32,
    pub crop_margin: u32,
    pub fallback_crop_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8390".to_string(),
            allowed_origins: vec!["*".to_string()],
            render_command: None,
            render_dpi: 120,
            crop_margin: 25,
            fallback_crop_height: 900,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    render: Option<RenderSettings>,
    crop: Option<CropSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    command: Option<String>,
    dpi: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CropSettings {
    margin: Option<u32>,
    fallback_height: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.listen_addr = addr;
                }
            }
            if let Some(origins) = server.allowed_origins {
                self.allowed_origins = origins;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(command) = render.command {
                if !command.trim().is_empty() {
                    self.render_command = Some(command);
                }
            }
            if let Some(dpi) = render.dpi {
                if dpi > 0 {
                    self.render_dpi = dpi;
                }
            }
        }
        if let Some(crop) = incoming.crop {
            if let Some(margin) = crop.margin {
                self.crop_margin = margin;
            }
            if let Some(height) = crop.fallback_height {
                if height > 0 {
                    self.fallback_crop_height = height;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".corteplan"))
        }
    })
}
