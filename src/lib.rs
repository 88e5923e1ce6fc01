//! Toolgate is a resilient MCP tool-session gateway for chat-agent backends.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns endpoint configuration and the correlation-ID generator
//!   used to tie together the log lines of one logical operation.
//! - [`mcp`] provides the Model Context Protocol integration: the SSE
//!   transport session, the session manager that owns every session plus the
//!   merged tool registry, and the transport-aware tool-call dispatcher.
//!
//! The runtime entrypoint lives in the binary crate (`src/main.rs`), which
//! constructs an [`mcp::McpSessionManager`] at startup, drives it through
//! [`mcp::McpSessionManager::initialize`], and tears it down with
//! [`mcp::McpSessionManager::shutdown`] on exit.

pub mod core;
pub mod mcp;
