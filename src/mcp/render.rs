//! Plain-text rendering of tool results.

use std::fmt::Write as _;

use serde_json::Value;

use crate::altary::Project;
use crate::app::{ConfigSummary, ProjectListing, SetupOutcome};
use crate::constants::MAX_LISTED_ERRORS;
use crate::error::AltaryError;
use crate::util::truncate_chars;

const ERROR_MESSAGE_CHARS: usize = 100;
const COMPLETED_MESSAGE_CHARS: usize = 50;

pub const CLEARED: &str =
    "Configuration cleared. Run setup_auth to connect to Altary again.";

pub fn projects(listing: &ProjectListing) -> String {
    if listing.projects.is_empty() {
        return "No projects found.".to_string();
    }

    let mut out = String::from("Available projects:\n");
    for (n, project) in listing.projects.iter().enumerate() {
        let id = project.public_id();
        let name = project.name.as_deref().unwrap_or("Unnamed project");
        let marker = if listing.default_project.as_deref() == Some(id) {
            " (default)"
        } else {
            ""
        };
        let _ = write!(out, "\n{}. {name}{marker}\n   ID: {id}\n", n + 1);
    }
    out
}

/// Render the error list. A payload whose `status` is not `success` becomes
/// the `Err` text.
pub fn errors(payload: &Value) -> Result<String, String> {
    check_status(payload, "could not fetch errors")?;

    let errors = payload
        .get("errors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if errors.is_empty() {
        return Ok("No errors. Everything is resolved.".to_string());
    }

    let mut out = format!("Errors ({} total):\n", errors.len());
    for (label, error) in (b'A'..=b'Z').map(char::from).zip(errors.iter()) {
        let file = text_field(error, &["file"]).unwrap_or_else(|| "unknown file".to_string());
        let line = text_field(error, &["line"]).unwrap_or_else(|| "?".to_string());
        let message = text_field(error, &["message"]).unwrap_or_else(|| "unknown error".to_string());
        let id = text_field(error, &["rand", "id"]).unwrap_or_default();

        let _ = write!(
            out,
            "\n{label}. {file}:{line}\n   Message: {}\n   ID: {id}\n",
            truncate_chars(&message, ERROR_MESSAGE_CHARS)
        );
        if let Some(summary) = text_field(error, &["ai_summary"]) {
            let _ = writeln!(out, "   AI summary: {summary}");
        }
        if let Some(suggestion) = text_field(error, &["ai_suggestion"]) {
            let _ = writeln!(out, "   AI suggestion: {suggestion}");
        }
    }

    if errors.len() > MAX_LISTED_ERRORS {
        let _ = write!(
            out,
            "\n... and {} more errors not shown.\n",
            errors.len() - MAX_LISTED_ERRORS
        );
    }
    Ok(out)
}

/// Render the completion result for `error_id`.
pub fn completion(payload: &Value, error_id: &str) -> Result<String, String> {
    check_status(payload, "could not complete the error")?;

    let target = text_field(payload, &["target_error_rand"]).unwrap_or_else(|| error_id.to_string());
    let similar = payload
        .get("similar_completed")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let mut out = format!(
        "Error completed.\n\nTarget error: {target}\nSimilar errors completed automatically: {similar}\n"
    );

    let completed = payload
        .get("completed_errors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if !completed.is_empty() {
        out.push_str("\nCompleted errors:\n");
        for (n, entry) in completed.iter().enumerate() {
            let similarity = entry.get("similarity").and_then(Value::as_f64).unwrap_or(0.0);
            let message = text_field(entry, &["message"]).unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(
                out,
                "{}. similarity {similarity:.2}: {}...",
                n + 1,
                truncate_chars(&message, COMPLETED_MESSAGE_CHARS)
            );
        }
    }
    Ok(out)
}

pub fn setup(outcome: &SetupOutcome) -> String {
    match outcome {
        SetupOutcome::Authenticated {
            masked_token,
            default_project,
            via_browser,
        } => {
            let source = if *via_browser { " from the browser login" } else { "" };
            let next = match default_project {
                Some(project) => format!("Default project: {project}."),
                None => "Next, choose a default project with set_default_project.".to_string(),
            };
            format!("Authenticated{source}. Token {masked_token} saved.\n\n{next}")
        }
        SetupOutcome::Rejected => {
            "Altary rejected the token. Check it and run setup_auth again.".to_string()
        }
        SetupOutcome::ManualLogin { login_url, reason } => format!(
            "The browser login did not complete ({reason}).\n\n\
             1. Log in at {login_url}\n\
             2. Copy the token shown after login\n\
             3. Run setup_auth again with the token parameter"
        ),
    }
}

pub fn default_project(project: &Project) -> String {
    let id = project.public_id();
    match project.name.as_deref() {
        Some(name) => format!("Default project set to {name} ({id}). get_errors now uses it."),
        None => format!("Default project set to {id}. get_errors now uses it."),
    }
}

pub fn config(summary: &ConfigSummary) -> String {
    let token = summary.masked_token.as_deref().unwrap_or("not set");
    let project = summary.project_id.as_deref().unwrap_or("not set");
    let status = if summary.configured {
        "Configured: every tool is available."
    } else {
        "Incomplete: run setup_auth and set_default_project."
    };
    format!(
        "Current configuration\n\nToken: {token}\nDefault project: {project}\nAPI base URL: {}\nConfig file: {}\n\n{status}",
        summary.api_base_url,
        summary.path.display()
    )
}

/// Failure text for a tool call, with a `setup_auth` hint when a fresh
/// token would help.
pub fn failure(context: &str, err: &AltaryError) -> String {
    if err.needs_reauth() {
        format!("{context}: {err}\n\nRun setup_auth to (re)authenticate.")
    } else {
        format!("{context}: {err}")
    }
}

fn check_status(payload: &Value, context: &str) -> Result<(), String> {
    if payload.get("status").and_then(Value::as_str) == Some("success") {
        return Ok(());
    }
    let message = text_field(payload, &["message"]).unwrap_or_else(|| "unknown error".to_string());
    Err(format!("{context}: {message}"))
}

/// First present, non-empty value among `keys`, numbers included.
fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
