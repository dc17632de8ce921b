use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::classify::DateClassifier;
use crate::datetime::{
  WeekStart,
  resolve_timezone
};
use crate::persistence::STORAGE_KEY;

pub const CONFIG_FILE: &str =
  "tasklane.toml";
pub const CONFIG_ENV_VAR: &str =
  "TASKLANE_CONFIG";
const APP_DIR: &str = "tasklane";

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Config {
  /// Directory holding the stored
  /// blobs.
  pub data_dir:     Option<PathBuf>,
  pub storage_key:  String,
  /// IANA timezone id defining
  /// calendar days.
  pub timezone:     Option<String>,
  pub week_start:   WeekStart,
  pub log_level:    String,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir:     None,
      storage_key:  STORAGE_KEY
        .to_string(),
      timezone:     None,
      week_start:   WeekStart::default(),
      log_level:    "warn".to_string(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Explicit path first, then `TASKLANE_CONFIG`, then the per-user
  /// config dir. No file at all means defaults.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(
        config_override
      )
    else {
      warn!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    if !path.exists() {
      if config_override.is_some() {
        return Err(anyhow!(
          "config file does not exist: \
           {}",
          path.display()
        ));
      }
      info!(file = %path.display(), "config file not found; using defaults");
      return Ok(Self::default());
    }

    info!(file = %path.display(), "loading config");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg = Self::from_toml_str(
      &raw
    )
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Self =
      toml::from_str(raw)?;
    if cfg.storage_key.trim().is_empty()
    {
      warn!(
        "empty storage_key in config; \
         using default"
      );
      cfg.storage_key =
        STORAGE_KEY.to_string();
    }
    debug!(?cfg, "parsed config");
    Ok(cfg)
  }

  #[must_use]
  pub fn classifier(
    &self
  ) -> DateClassifier {
    DateClassifier::new(
      resolve_timezone(
        self.timezone.as_deref()
      ),
      self.week_start
    )
  }

  /// Configured data directory, or the platform data dir. Created if
  /// missing.
  #[tracing::instrument(skip(self))]
  pub fn resolve_data_dir(
    &self
  ) -> anyhow::Result<PathBuf> {
    let dir = match &self.data_dir {
      | Some(path) => expand_tilde(path),
      | None => default_data_dir()?
    };

    if !dir.exists() {
      info!(dir = %dir.display(), "creating data directory");
      fs::create_dir_all(&dir)
        .with_context(|| {
          format!(
            "failed to create {}",
            dir.display()
          )
        })?;
    }

    Ok(dir)
  }
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir.join(APP_DIR).join(CONFIG_FILE)
  })
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let base =
    dirs::data_dir().ok_or_else(|| {
      anyhow!(
        "cannot determine data \
         directory"
      )
    })?;
  Ok(base.join(APP_DIR))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
