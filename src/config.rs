use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::SqliteStorage;
use crate::report::export::DEFAULT_AUTHOR;
use crate::report::pipeline::{PipelineOptions, DEFAULT_PAGE_SIZE};

/// Environment variable that overrides `jira.password`.
pub const PASSWORD_ENV: &str = "JWX_JIRA_PASSWORD";

const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  /// Base URL, e.g. "https://jira.example.com"
  #[serde(default)]
  pub endpoint: String,
  #[serde(default)]
  pub user: String,
  #[serde(default)]
  pub password: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for JiraConfig {
  fn default() -> Self {
    Self {
      endpoint: String::new(),
      user: String::new(),
      password: String::new(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Defaults to the platform cache directory
  pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      dir: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
  /// Workbook author property
  #[serde(default = "default_author")]
  pub author: String,
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  #[serde(default = "default_page_size")]
  pub page_size: u64,
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      author: default_author(),
      output_dir: default_output_dir(),
      page_size: default_page_size(),
      concurrency: default_concurrency(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_author() -> String {
  DEFAULT_AUTHOR.to_string()
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("./output")
}

fn default_page_size() -> u64 {
  DEFAULT_PAGE_SIZE
}

fn default_concurrency() -> usize {
  1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
  Yaml,
  Json,
}

impl Format {
  fn for_path(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
      _ => Format::Yaml,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jwx.yaml (current directory)
  /// 3. ./config.json (current directory)
  /// 4. $XDG_CONFIG_HOME/jwx/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create ./jwx.yaml or ~/.config/jwx/config.yaml \
         with at least jira.endpoint and jira.user."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    for local in ["jwx.yaml", "config.json"] {
      let local = PathBuf::from(local);
      if local.exists() {
        return Some(local);
      }
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jwx").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let mut config = Self::parse(&contents, Format::for_path(path))
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    config.jira.password = resolve_password(&config.jira.password, std::env::var(PASSWORD_ENV).ok());
    config.validate()?;
    Ok(config)
  }

  fn parse(contents: &str, format: Format) -> Result<Self> {
    let config: Config = match format {
      Format::Yaml => serde_yaml::from_str(contents)?,
      Format::Json => serde_json::from_str(contents)?,
    };
    Ok(config)
  }

  /// Checks that apply to every command.
  pub fn validate(&self) -> Result<()> {
    if self.jira.timeout_secs == 0 {
      return Err(eyre!("jira.timeout_secs must be greater than 0"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&self.report.page_size) {
      return Err(eyre!(
        "report.page_size must be between 1 and {}, got {}",
        MAX_PAGE_SIZE,
        self.report.page_size
      ));
    }
    if self.report.concurrency == 0 {
      return Err(eyre!("report.concurrency must be at least 1"));
    }
    Ok(())
  }

  /// Response cache and log directory; `None` when no platform cache dir
  /// exists and none is configured.
  pub fn cache_dir(&self) -> Option<PathBuf> {
    self.cache.dir.clone().or_else(SqliteStorage::default_dir)
  }

  pub fn pipeline_options(&self) -> PipelineOptions {
    PipelineOptions {
      page_size: self.report.page_size,
      concurrency: self.report.concurrency,
      ..Default::default()
    }
  }
}

impl JiraConfig {
  /// Checks needed before talking to the server.
  pub fn validate(&self) -> Result<()> {
    if self.endpoint.trim().is_empty() {
      return Err(eyre!("jira.endpoint is required"));
    }
    let url = Url::parse(&self.endpoint)
      .map_err(|e| eyre!("jira.endpoint is not a valid URL ({}): {}", self.endpoint, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "jira.endpoint must be an http or https URL, got {}",
        self.endpoint
      ));
    }
    if self.user.trim().is_empty() {
      return Err(eyre!("jira.user is required"));
    }
    if self.password.is_empty() {
      return Err(eyre!(
        "jira.password is required. Set it in the config file or the {} environment variable.",
        PASSWORD_ENV
      ));
    }
    Ok(())
  }
}

/// The environment value wins when set and non-empty.
fn resolve_password(from_file: &str, from_env: Option<String>) -> String {
  from_env
    .filter(|p| !p.is_empty())
    .unwrap_or_else(|| from_file.to_string())
}
