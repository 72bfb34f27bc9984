//! MCP (Model Context Protocol) server: tool definitions, argument types and
//! plain-text rendering of results.

pub mod params;
pub mod render;
pub mod server;

pub use server::AltaryServer;
