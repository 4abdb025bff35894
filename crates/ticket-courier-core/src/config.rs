use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub spreadsheet: SpreadsheetConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The six folders the pipeline moves files between.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub unprocessed: PathBuf,
    pub download: PathBuf,
    pub edited: PathBuf,
    pub processed: PathBuf,
    pub error: PathBuf,
    pub archive: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRole {
    Unprocessed,
    Download,
    Edited,
    Processed,
    Error,
    Archive,
}

impl FolderRole {
    pub const ALL: [FolderRole; 6] = [
        FolderRole::Unprocessed,
        FolderRole::Download,
        FolderRole::Edited,
        FolderRole::Processed,
        FolderRole::Error,
        FolderRole::Archive,
    ];
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FolderRole::Unprocessed => "unprocessed",
            FolderRole::Download => "download",
            FolderRole::Edited => "edited",
            FolderRole::Processed => "processed",
            FolderRole::Error => "error",
            FolderRole::Archive => "archive",
        };
        f.write_str(name)
    }
}

impl PathsConfig {
    pub fn resolve(&self, role: FolderRole) -> &Path {
        match role {
            FolderRole::Unprocessed => &self.unprocessed,
            FolderRole::Download => &self.download,
            FolderRole::Edited => &self.edited,
            FolderRole::Processed => &self.processed,
            FolderRole::Error => &self.error,
            FolderRole::Archive => &self.archive,
        }
    }

    /// Every role folder must already exist; nothing here creates them.
    pub fn validate(&self) -> Result<(), Error> {
        for role in FolderRole::ALL {
            let dir = self.resolve(role);
            if !dir.is_dir() {
                return Err(Error::Other(format!(
                    "{} folder '{}' does not exist or is not a directory",
                    role,
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub download_button_xpath: String,
    pub implicit_wait_secs: u64,
    pub row_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub maximize_window: bool,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            download_button_xpath: "//button[contains(., 'Download')]".to_string(),
            implicit_wait_secs: 10,
            row_delay_ms: 1000,
            request_timeout_secs: 60,
            maximize_window: true,
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    pub link_column: String,
    pub shortcode_column: String,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            link_column: "Ticket Link".to_string(),
            shortcode_column: "Shortcode".to_string(),
        }
    }
}

/// Log file location and default filter. `LOG_FILE_PATH` and
/// `TRACING_LEVEL` take precedence when set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub path: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./logs/ticket-courier.log"),
            level: "info".to_string(),
        }
    }
}

/// Region to cover on every page, in points from the top-left corner
/// of the visible page: `[x0, y0, x1, y1]`. `fill` is RGB in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub region: [f32; 4],
    pub fill: [f32; 3],
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            region: [50.0, 800.0, 550.0, 850.0],
            fill: [1.0, 1.0, 1.0],
        }
    }
}

impl RedactionConfig {
    pub fn width(&self) -> f32 {
        self.region[2] - self.region[0]
    }

    pub fn height(&self) -> f32 {
        self.region[3] - self.region[1]
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(Error::Other(format!(
                "redaction region {:?} must have x1 > x0 and y1 > y0",
                self.region
            )));
        }
        if self.fill.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(Error::Other(format!(
                "redaction fill {:?} must be RGB components in 0.0..=1.0",
                self.fill
            )));
        }
        Ok(())
    }
}

/// Load `Config.toml` (or `path` when given), then overlay
/// `TICKET_COURIER__SECTION__KEY` environment variables.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };
    let builder = Config::builder()
        .add_source(file_source)
        .add_source(Environment::with_prefix("TICKET_COURIER").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }
}
