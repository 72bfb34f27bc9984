//! Project, error and configuration operations behind the token-gated tools.

use std::path::PathBuf;

use serde_json::Value;

use crate::altary::Project;
use crate::constants::PROJECT_ID_PREFIX;
use crate::error::{AltaryError, Result};
use crate::util::mask_token;

use super::App;

/// The user's projects together with the stored default.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectListing {
    pub projects: Vec<Project>,
    pub default_project: Option<String>,
}

/// What `show_config` reports. The token is never exposed unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSummary {
    pub masked_token: Option<String>,
    pub project_id: Option<String>,
    pub api_base_url: String,
    pub configured: bool,
    pub path: PathBuf,
}

impl App {
    pub async fn list_projects(&self) -> Result<ProjectListing> {
        let (config, token) = self.require_token().await?;
        let projects = self.client_for(&config).list_projects(&token).await?;
        tracing::debug!(count = projects.len(), "projects listed");
        Ok(ProjectListing {
            projects,
            default_project: config.project_id().map(str::to_string),
        })
    }

    /// Errors for `project_id`, or for the default project when omitted.
    pub async fn get_errors(&self, project_id: Option<&str>) -> Result<Value> {
        let (config, token) = self.require_token().await?;
        let project_id = project_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(config.project_id())
            .ok_or_else(|| {
                AltaryError::Config(
                    "no project id given and no default project is set; use set_default_project"
                        .to_string(),
                )
            })?;
        self.client_for(&config).get_errors(&token, project_id).await
    }

    pub async fn complete_error(&self, error_id: &str) -> Result<Value> {
        let error_id = error_id.trim();
        if error_id.is_empty() {
            return Err(AltaryError::Config("error_id must not be empty".to_string()));
        }
        let (config, token) = self.require_token().await?;
        self.client_for(&config).complete_error(&token, error_id).await
    }

    /// Store `project_id` as the default after checking its format and that
    /// the authenticated user can see it.
    pub async fn set_default_project(&self, project_id: &str) -> Result<Project> {
        let project_id = project_id.trim();
        if !project_id.starts_with(PROJECT_ID_PREFIX) {
            return Err(AltaryError::Config(format!(
                "invalid project id {project_id:?}: expected an id starting with {PROJECT_ID_PREFIX}"
            )));
        }

        let (config, token) = self.require_token().await?;
        let project = self
            .client_for(&config)
            .list_projects(&token)
            .await?
            .into_iter()
            .find(|project| project.matches(project_id))
            .ok_or_else(|| {
                AltaryError::Config(format!(
                    "project {project_id} was not found; check get_user_projects"
                ))
            })?;

        self.config.lock().await.set_project_id(project_id)?;
        tracing::info!(project = %project_id, "default project set");
        Ok(project)
    }

    pub async fn show_config(&self) -> ConfigSummary {
        let store = self.config.lock().await;
        let config = store.config();
        ConfigSummary {
            masked_token: config.token().map(mask_token),
            project_id: config.project_id().map(str::to_string),
            api_base_url: config.api_base_url.clone(),
            configured: config.is_configured(),
            path: store.path().to_path_buf(),
        }
    }

    pub async fn clear_config(&self) -> Result<()> {
        self.config.lock().await.clear()?;
        tracing::info!(path = %self.config_path().display(), "configuration cleared");
        Ok(())
    }
}
