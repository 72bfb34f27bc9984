//! Compile-time constants and tunables shared across the crate.

use std::time::Duration;

/// Application name used for the config directory and log target.
pub const APP_NAME: &str = "altary";
/// Application version injected from `Cargo.toml` at compile time.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Altary API base URL when neither the config file nor
/// `ALTARY_API_BASE_URL` provides one.
pub const DEFAULT_API_BASE_URL: &str = "https://altary.web-ts.dev";
/// Config file name inside the per-user config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Header carrying the Altary auth token on every API request.
pub const TOKEN_HEADER: &str = "X-Claude-Token";
/// Per-request timeout for the Altary API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser login page; accepts an optional `callback` query parameter.
pub const LOGIN_PATH: &str = "users/claude-auth";
pub const PROJECTS_PATH: &str = "users/getUserProjects";
pub const ERRORS_PATH: &str = "issues/getError";
pub const COMPLETE_ERROR_PATH: &str = "issues/completeErrorWithSimilar";

/// Route served by the loopback listener during the browser flow.
pub const CALLBACK_PATH: &str = "/callback";
/// How often the coordinator checks for a recorded callback.
pub const CALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Number of polls before the flow times out (5 minutes at 1s).
pub const CALLBACK_MAX_POLLS: u32 = 300;
/// Hold the listener open after success so the page countdown can finish.
pub const CALLBACK_SUCCESS_LINGER: Duration = Duration::from_secs(3);

/// Every public Altary project id starts with this prefix.
pub const PROJECT_ID_PREFIX: &str = "ALTR-";

/// At most this many errors are listed, labelled `A`..`Z`.
pub const MAX_LISTED_ERRORS: usize = 26;
