use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server configuration loaded from an optional TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TLS certificate (PEM)
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// TLS private key (PEM)
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// File name suffix selecting which files get indexed and served
    #[serde(default = "default_pcb_suffix")]
    pub pcb_suffix: String,
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("server.pem")
}

fn default_key_path() -> PathBuf {
    PathBuf::from("server.key")
}

fn default_pcb_suffix() -> String {
    ".kicad_pcb".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            pcb_suffix: default_pcb_suffix(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
