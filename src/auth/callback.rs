//! Browser login through a temporary loopback listener.
//!
//! Altary has no desktop URL scheme, so the login page redirects to
//! `http://localhost:<port>/callback?token=...` (or `?error=...`) served by a
//! short-lived `tiny_http` server on its own thread. The async coordinator
//! polls the shared [`AuthResult`] until it resolves or the deadline passes,
//! and the listener is torn down on every exit path.

use std::io;
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Method, Response, Server};
use url::Url;

use crate::auth::pages::ResponsePages;
use crate::constants::{
    CALLBACK_MAX_POLLS, CALLBACK_PATH, CALLBACK_POLL_INTERVAL, CALLBACK_SUCCESS_LINGER, LOGIN_PATH,
};
use crate::error::{AltaryError, Result};

/// Recorded when the redirect carries neither `token` nor `error`.
pub const MISSING_TOKEN_MESSAGE: &str = "token not found";

/// Opens a URL in the user's browser.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// The platform default browser via the `open` crate.
pub fn system_browser() -> BrowserLauncher {
    Arc::new(|url: &str| open::that(url))
}

/// Timing and presentation knobs for one flow.
#[derive(Clone, Debug)]
pub struct FlowSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Delay before teardown after a successful login.
    pub success_linger: Duration,
    pub pages: ResponsePages,
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            poll_interval: CALLBACK_POLL_INTERVAL,
            max_polls: CALLBACK_MAX_POLLS,
            success_linger: CALLBACK_SUCCESS_LINGER,
            pages: ResponsePages::default(),
        }
    }
}

impl FlowSettings {
    pub fn deadline(&self) -> Duration {
        self.poll_interval * self.max_polls
    }
}

/// The browser login page, without a callback.
pub fn login_url(api_base_url: &str) -> Result<Url> {
    let raw = format!("{}/{LOGIN_PATH}", api_base_url.trim_end_matches('/'));
    Url::parse(&raw)
        .map_err(|err| AltaryError::Config(format!("invalid api_base_url {api_base_url:?}: {err}")))
}

/// Open the plain login page so the user can copy a token by hand.
/// Returns the URL so callers can show it if the browser did not open.
pub fn open_login_page(api_base_url: &str, launcher: &BrowserLauncher) -> Result<Url> {
    let url = login_url(api_base_url)?;
    if let Err(err) = launcher(url.as_str()) {
        tracing::warn!(%err, %url, "could not open a browser; visit the login URL manually");
    }
    Ok(url)
}

/// Written once by the listener thread, read by the coordinator.
#[derive(Debug, Default)]
struct AuthResult {
    token: Option<String>,
    error: Option<String>,
}

impl AuthResult {
    /// Record the first outcome; later callbacks are ignored.
    fn record(&mut self, outcome: std::result::Result<String, String>) -> bool {
        if self.token.is_some() || self.error.is_some() {
            return false;
        }
        match outcome {
            Ok(token) => self.token = Some(token),
            Err(error) => self.error = Some(error),
        }
        true
    }

    fn resolved(&self) -> Option<std::result::Result<String, String>> {
        if let Some(error) = &self.error {
            return Some(Err(error.clone()));
        }
        self.token.clone().map(Ok)
    }
}

fn lock(result: &Mutex<AuthResult>) -> MutexGuard<'_, AuthResult> {
    result.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a request to the loopback listener asked for.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Token(String),
    Denied(String),
    MissingToken,
}

/// Parse a request target such as `/callback?token=abc`. `Ok(None)` means the
/// request was not for the callback route.
fn parse_callback(method: &Method, target: &str) -> std::result::Result<Option<Callback>, url::ParseError> {
    let parsed = Url::parse(&format!("http://localhost{target}"))?;
    if *method != Method::Get || parsed.path() != CALLBACK_PATH {
        return Ok(None);
    }

    let mut token = None;
    let mut error = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let token = token.filter(|t| !t.is_empty());
    let error = error.filter(|e| !e.is_empty());
    Ok(Some(match (error, token) {
        (Some(error), _) => Callback::Denied(error),
        (None, Some(token)) => Callback::Token(token),
        (None, None) => Callback::MissingToken,
    }))
}

/// Decide the status and page for one request, recording the outcome.
fn handle_request<'p>(
    method: &Method,
    target: &str,
    result: &Mutex<AuthResult>,
    pages: &'p ResponsePages,
) -> (u16, &'p str) {
    match parse_callback(method, target) {
        Ok(Some(Callback::Token(token))) => {
            lock(result).record(Ok(token));
            (200, pages.success.as_str())
        }
        Ok(Some(Callback::Denied(error))) => {
            lock(result).record(Err(error));
            (200, pages.failure.as_str())
        }
        Ok(Some(Callback::MissingToken)) => {
            lock(result).record(Err(MISSING_TOKEN_MESSAGE.to_string()));
            (200, pages.missing_token.as_str())
        }
        Ok(None) => (404, pages.not_found.as_str()),
        Err(err) => {
            tracing::warn!(%err, "malformed callback request");
            lock(result).record(Err(format!("callback handling error: {err}")));
            (500, pages.internal_error.as_str())
        }
    }
}

fn serve(server: &Server, result: &Mutex<AuthResult>, pages: &ResponsePages) {
    for request in server.incoming_requests() {
        let (status, body) = handle_request(request.method(), request.url(), result, pages);
        tracing::debug!(status, path = request.url(), "callback request");
        let mut response = Response::from_string(body).with_status_code(status);
        if let Ok(header) =
            Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        {
            response = response.with_header(header);
        }
        if let Err(err) = request.respond(response) {
            tracing::debug!(%err, "browser went away before the callback page was sent");
        }
    }
}

/// Owns the listener thread. Dropping it stops the server and frees the port.
struct CallbackListener {
    port: u16,
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
}

impl CallbackListener {
    fn start(result: Arc<Mutex<AuthResult>>, pages: ResponsePages) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|err| AltaryError::Auth(format!("bind loopback listener: {err}")))?;
        let port = listener
            .local_addr()
            .map_err(|err| AltaryError::Auth(format!("read loopback port: {err}")))?
            .port();
        let server = Server::from_listener(listener, None)
            .map(Arc::new)
            .map_err(|err| AltaryError::Auth(format!("start callback server: {err}")))?;

        let worker = {
            let server = Arc::clone(&server);
            thread::Builder::new()
                .name("altary-callback".to_string())
                .spawn(move || serve(&server, &result, &pages))
                .map_err(|err| AltaryError::Auth(format!("spawn callback thread: {err}")))?
        };

        tracing::debug!(port, "callback listener started");
        Ok(CallbackListener {
            port,
            server,
            worker: Some(worker),
        })
    }

    fn callback_url(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.port)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        tracing::debug!(port = self.port, "callback listener stopped");
    }
}

/// One browser login attempt.
pub struct CallbackFlow {
    login_url: Url,
    settings: FlowSettings,
    launcher: BrowserLauncher,
}

impl CallbackFlow {
    pub fn new(api_base_url: &str, settings: FlowSettings, launcher: BrowserLauncher) -> Result<Self> {
        Ok(CallbackFlow {
            login_url: login_url(api_base_url)?,
            settings,
            launcher,
        })
    }

    /// Run the flow to completion: the token on success, `Auth` with the
    /// browser-reported message, or `Timeout`.
    pub async fn run(&self) -> Result<String> {
        let result = Arc::new(Mutex::new(AuthResult::default()));
        let listener = CallbackListener::start(Arc::clone(&result), self.settings.pages.clone())?;

        let auth_url = self.authorization_url(&listener.callback_url());
        tracing::info!(port = listener.port, "waiting for Altary login in the browser");
        if let Err(err) = (self.launcher)(auth_url.as_str()) {
            tracing::warn!(%err, url = %auth_url, "could not open a browser; visit the login URL manually");
        }

        let outcome = self.wait_for(&result).await;
        if outcome.is_ok() && !self.settings.success_linger.is_zero() {
            tokio::time::sleep(self.settings.success_linger).await;
        }
        drop(listener);
        outcome
    }

    fn authorization_url(&self, callback_url: &str) -> Url {
        let mut url = self.login_url.clone();
        url.query_pairs_mut().append_pair("callback", callback_url);
        url
    }

    async fn wait_for(&self, result: &Mutex<AuthResult>) -> Result<String> {
        for _ in 0..self.settings.max_polls {
            let resolved = lock(result).resolved();
            if let Some(outcome) = resolved {
                return outcome.map_err(AltaryError::Auth);
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
        let resolved = lock(result).resolved();
        match resolved {
            Some(outcome) => outcome.map_err(AltaryError::Auth),
            None => Err(AltaryError::Timeout(self.settings.deadline())),
        }
    }
}
