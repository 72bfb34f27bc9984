//! Persisted Altary configuration: token, default project and API base URL.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::constants::{APP_NAME, CONFIG_FILE_NAME, DEFAULT_API_BASE_URL};
use crate::error::{AltaryError, Result};
use crate::util::{env_first, normalize_url};

/// On-disk configuration. Missing keys take their defaults, so a partial
/// file still loads with every required field populated.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "null_as_default")]
    pub api_base_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub auth: AuthSettings,
    /// Keys this version does not know about, kept so saves do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSettings {
    pub token: Option<String>,
    pub project_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: default_api_base_url(),
            auth: AuthSettings::default(),
            extra: Map::new(),
        }
    }
}

impl Config {
    pub fn token(&self) -> Option<&str> {
        non_empty(self.auth.token.as_deref())
    }

    pub fn project_id(&self) -> Option<&str> {
        non_empty(self.auth.project_id.as_deref())
    }

    /// Both a token and a default project are set.
    pub fn is_configured(&self) -> bool {
        self.token().is_some() && self.project_id().is_some()
    }

    fn normalized(mut self) -> Self {
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = default_api_base_url();
        } else {
            self.api_base_url = normalize_url(&self.api_base_url);
        }
        self
    }
}

/// Base URL used when the config file has none: `ALTARY_API_BASE_URL`, then
/// the built-in default.
pub fn default_api_base_url() -> String {
    env_first(&["ALTARY_API_BASE_URL"])
        .map(|raw| normalize_url(&raw))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

/// An explicit `null` loads like a missing key instead of failing the file.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// The configuration together with the file it is persisted to.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Open the store at `$ALTARY_CONFIG` or the per-user config directory.
    pub fn open() -> Result<Self> {
        let path = match env_first(&["ALTARY_CONFIG"]) {
            Some(path) => PathBuf::from(path),
            None => config_dir_file(CONFIG_FILE_NAME).ok_or_else(|| {
                AltaryError::Config("could not determine a home directory".to_string())
            })?,
        };
        Ok(Self::load_from(path))
    }

    /// Load from `path`, falling back to defaults when the file is missing or
    /// cannot be parsed.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_config(&path) {
            Ok(Some(config)) => config.normalized(),
            Ok(None) => Config::default(),
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "ignoring unreadable config, using defaults");
                Config::default()
            }
        };
        ConfigStore { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write the current state. The file is replaced atomically so a failed
    /// write never leaves a truncated config behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| AltaryError::io(parent, err))?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.config)
            .map_err(|err| AltaryError::io(&self.path, io::Error::other(err)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|err| AltaryError::io(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| AltaryError::io(&self.path, err))?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) -> Result<()> {
        self.config.auth.token = Some(token.into());
        self.save()
    }

    pub fn set_project_id(&mut self, project_id: impl Into<String>) -> Result<()> {
        self.config.auth.project_id = Some(project_id.into());
        self.save()
    }

    /// Reset to defaults and persist.
    pub fn clear(&mut self) -> Result<()> {
        self.config = Config::default();
        self.save()
    }
}

fn read_config(path: &Path) -> std::result::Result<Option<Config>, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.to_string()),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|err| err.to_string())
}

fn config_dir_file(filename: &str) -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", APP_NAME, APP_NAME)?;
    Some(proj_dirs.config_dir().join(filename))
}
