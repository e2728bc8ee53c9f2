use anyhow::Context;
use std::env;
use std::path::PathBuf;

/// Upload and serving configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the HTTP server (default: 3000)
    pub port: u16,

    /// Directory for staged uploads (default: "uploads")
    pub upload_dir: PathBuf,

    /// Directory served as static assets (default: "public")
    pub public_dir: PathBuf,

    /// Maximum upload size in bytes (default: 1 MiB)
    pub max_file_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            public_dir: PathBuf::from("public"),
            max_file_size: crate::utils::validation::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            public_dir: env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.public_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
        }
    }
}

/// Credentials for the external transformation provider
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            cloud_name: env::var("CLOUD_NAME").context("CLOUD_NAME must be set")?,
            api_key: env::var("API_KEY").context("API_KEY must be set")?,
            api_secret: env::var("API_SECRET").context("API_SECRET must be set")?,
        })
    }
}
