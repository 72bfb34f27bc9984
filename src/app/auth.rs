//! Token setup: validate and persist a pasted token, or run the browser
//! login and fall back to the plain login page when it fails.

use crate::auth::{CallbackFlow, open_login_page};
use crate::config::Config;
use crate::error::{AltaryError, Result};
use crate::util::mask_token;

use super::App;

/// How a `setup_auth` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The token was accepted by Altary and saved.
    Authenticated {
        masked_token: String,
        default_project: Option<String>,
        via_browser: bool,
    },
    /// Altary did not accept the token; nothing was saved.
    Rejected,
    /// The browser login did not complete; the user should log in on the
    /// plain login page and call `setup_auth` with the token.
    ManualLogin { login_url: String, reason: String },
}

/// Result of the once-per-launch login check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupStatus {
    AlreadyAuthenticated { default_project: Option<String> },
    Setup(SetupOutcome),
}

impl App {
    /// Validate and store `token`, or obtain one through the browser when
    /// `token` is `None`.
    pub async fn setup_auth(&self, token: Option<&str>) -> Result<SetupOutcome> {
        let config = self.config().await;
        let supplied = token.map(str::trim).filter(|t| !t.is_empty());
        let (token, via_browser) = match supplied {
            Some(token) => (token.to_string(), false),
            None => match self.browser_login(&config).await {
                Ok(token) => (token, true),
                Err(err @ AltaryError::LoginInProgress) => return Err(err),
                Err(err) => {
                    tracing::warn!(%err, "browser login failed, falling back to the login page");
                    let login_url = open_login_page(&config.api_base_url, &self.launcher)?;
                    return Ok(SetupOutcome::ManualLogin {
                        login_url: login_url.to_string(),
                        reason: err.to_string(),
                    });
                }
            },
        };

        self.store_if_valid(&config, &token, via_browser).await
    }

    /// Run once per launch: start the browser login when no token is stored.
    pub async fn startup_check(&self) -> Result<StartupStatus> {
        let config = self.config().await;
        if config.token().is_some() {
            let default_project = config.project_id().map(str::to_string);
            match &default_project {
                Some(project) => tracing::info!(%project, "already authenticated"),
                None => tracing::info!(
                    "already authenticated; no default project set, use set_default_project"
                ),
            }
            return Ok(StartupStatus::AlreadyAuthenticated { default_project });
        }

        tracing::info!("no Altary token stored, starting browser login");
        let outcome = self.setup_auth(None).await?;
        match &outcome {
            SetupOutcome::Authenticated { masked_token, .. } => {
                tracing::info!(token = %masked_token, "browser login complete")
            }
            SetupOutcome::Rejected => tracing::warn!("Altary rejected the token from the browser"),
            SetupOutcome::ManualLogin { login_url, reason } => {
                tracing::warn!(%login_url, %reason, "browser login did not complete")
            }
        }
        Ok(StartupStatus::Setup(outcome))
    }

    /// Only one browser login runs per process; a pasted token never waits
    /// on it.
    async fn browser_login(&self, config: &Config) -> Result<String> {
        let _gate = self
            .auth_gate
            .try_lock()
            .map_err(|_| AltaryError::LoginInProgress)?;
        let flow = CallbackFlow::new(
            &config.api_base_url,
            self.flow_settings.clone(),
            self.launcher.clone(),
        )?;
        flow.run().await
    }

    async fn store_if_valid(
        &self,
        config: &Config,
        token: &str,
        via_browser: bool,
    ) -> Result<SetupOutcome> {
        if !self.client_for(config).validate_token(token).await {
            return Ok(SetupOutcome::Rejected);
        }

        let mut store = self.config.lock().await;
        store.set_auth_token(token)?;
        Ok(SetupOutcome::Authenticated {
            masked_token: mask_token(token),
            default_project: store.config().project_id().map(str::to_string),
            via_browser,
        })
    }
}
