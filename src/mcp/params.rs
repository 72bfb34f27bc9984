//! Tool argument types.

use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GetErrorsRequest {
    /// Project id (ALTR-...). Defaults to the configured default project.
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompleteErrorRequest {
    /// Id of the error to mark as completed, as shown by get_errors.
    pub error_id: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SetupAuthRequest {
    /// Token copied from the Altary login page. Omit it to log in through the browser.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetDefaultProjectRequest {
    /// Project id starting with ALTR-.
    pub project_id: String,
}
