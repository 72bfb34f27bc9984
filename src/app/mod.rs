//! Application context: configuration, HTTP client and login settings,
//! built once at startup and shared by every tool handler.
//!
//! | Module     | Responsibility                                   |
//! |------------|--------------------------------------------------|
//! | `auth`     | `setup_auth`, startup login check                |
//! | `projects` | projects, errors, default project, config tools  |

mod auth;
mod projects;

use std::path::{Path, PathBuf};

use reqwest::Client as HttpClient;
use tokio::sync::Mutex;

use crate::altary::{AltaryClient, http_client};
use crate::auth::{BrowserLauncher, FlowSettings, system_browser};
use crate::config::{Config, ConfigStore};
use crate::error::{AltaryError, Result};

pub use self::auth::SetupOutcome;
pub use self::projects::{ConfigSummary, ProjectListing};

/// Shared state behind every tool call.
///
/// The config store sits behind an async mutex so concurrent tool calls
/// cannot interleave a read-modify-persist sequence. `auth_gate` allows a
/// single browser login per process.
pub struct App {
    config: Mutex<ConfigStore>,
    config_path: PathBuf,
    http_client: HttpClient,
    launcher: BrowserLauncher,
    flow_settings: FlowSettings,
    auth_gate: Mutex<()>,
}

// ── Lifecycle ────────────────────────────────────────────────────────

impl App {
    /// Build the context from the persisted config and the system browser.
    pub fn load() -> Result<Self> {
        Self::new(ConfigStore::open()?, system_browser(), FlowSettings::default())
    }

    pub fn new(
        store: ConfigStore,
        launcher: BrowserLauncher,
        flow_settings: FlowSettings,
    ) -> Result<Self> {
        let config_path = store.path().to_path_buf();
        Ok(App {
            config: Mutex::new(store),
            config_path,
            http_client: http_client()?,
            launcher,
            flow_settings,
            auth_gate: Mutex::new(()),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

impl App {
    /// A copy of the current configuration.
    pub async fn config(&self) -> Config {
        self.config.lock().await.config().clone()
    }

    fn client_for(&self, config: &Config) -> AltaryClient {
        AltaryClient::new(self.http_client.clone(), &config.api_base_url)
    }

    /// The config snapshot plus its token, or an auth failure when none is stored.
    async fn require_token(&self) -> Result<(Config, String)> {
        let config = self.config().await;
        let token = config
            .token()
            .map(str::to_string)
            .ok_or_else(|| AltaryError::Auth("no auth token is configured".to_string()))?;
        Ok((config, token))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::auth::pages::ResponsePages;

    pub struct TestApp {
        pub app: Arc<App>,
        pub urls: mpsc::UnboundedReceiver<String>,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        pub fn stored(&self) -> Value {
            serde_json::from_str(&fs::read_to_string(self.app.config_path()).unwrap()).unwrap()
        }
    }

    /// An app whose config file points at `base_url` with the given auth
    /// section, and whose "browser" reports each opened URL on `urls`.
    pub fn test_app(base_url: &str, auth: Value) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json!({"api_base_url": base_url, "auth": auth}).to_string()).unwrap();

        let (tx, urls) = mpsc::unbounded_channel();
        let launcher: BrowserLauncher = Arc::new(move |url: &str| {
            tx.send(url.to_string()).map_err(io::Error::other)
        });
        let settings = FlowSettings {
            poll_interval: Duration::from_millis(10),
            max_polls: 500,
            success_linger: Duration::ZERO,
            pages: ResponsePages::default(),
        };
        let app = App::new(ConfigStore::load_from(&path), launcher, settings).unwrap();
        TestApp {
            app: Arc::new(app),
            urls,
            _dir: dir,
        }
    }

    /// Follow the callback address embedded in a login URL, appending `query`.
    pub async fn hit_callback(auth_url: &str, query: &str) -> u16 {
        let url = url::Url::parse(auth_url).unwrap();
        let callback = url
            .query_pairs()
            .find(|(key, _)| key == "callback")
            .map(|(_, value)| value.into_owned())
            .expect("login URL without callback");
        let callback = callback.replace("://localhost:", "://127.0.0.1:");
        let response = reqwest::get(format!("{callback}?{query}")).await.unwrap();
        response.status().as_u16()
    }
}
