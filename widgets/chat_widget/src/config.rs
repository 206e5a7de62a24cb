use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Command line options for the chat widget.
#[derive(Parser, Debug, Default)]
pub struct Cli {
    /// Conversation transcript (JSON) to open.
    #[arg(long)]
    pub transcript: PathBuf,
    /// Id of the user viewing the conversation.
    #[arg(long)]
    pub viewer: String,
    /// Number of scroll-to-top gestures to perform after opening.
    #[arg(long, default_value_t = 0)]
    pub scrolls: u32,
    /// Override messages per page.
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Messages requested per page when paginating backwards.
    pub page_size: u32,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    pagination: FilePagination,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FilePagination {
    #[serde(default = "default_page_size")]
    page_size: u32,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_page_size() -> u32 {
    20
}

fn default_logging() -> bool {
    true
}

impl Default for FilePagination {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            logging_enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut page_size = default_page_size();
        let mut logging = default_logging();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("CHAT_WIDGET_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/chat_widget.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            page_size = file_cfg.pagination.page_size;
            logging = file_cfg.logging.enabled;
        }

        // environment overrides
        if let Ok(p) = std::env::var("CHAT_WIDGET_PAGE_SIZE") {
            if let Ok(p) = p.parse::<u32>() {
                page_size = p;
            }
        }
        if let Ok(l) = std::env::var("CHAT_WIDGET_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }

        // CLI overrides
        if let Some(p) = cli.page_size {
            page_size = p;
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        if !(1..=200).contains(&page_size) {
            anyhow::bail!("invalid_page_size");
        }

        Ok(Self {
            page_size,
            logging_enabled: logging,
        })
    }
}
