//! Ladle
//!
//! A multi-server MCP (Model Context Protocol) tool client. Ladle launches
//! tool-serving child processes from a JSON config, aggregates their tool
//! catalogs into one registry, dispatches tool calls, and optionally lets
//! a language model pick tools through a strict JSON payload embedded in
//! its replies.

pub mod chat;
pub mod cli;
pub mod config;
pub mod mcp;
pub mod model;
