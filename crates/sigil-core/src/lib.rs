//! # sigil-core
//!
//! Foundation types for the Sigil agent engine.
//!
//! This crate provides the shared vocabulary that all other Sigil crates
//! depend on:
//!
//! - **Protocol**: the `§`-delimiter vocabulary and [`protocol::EventKind`]
//!   enumeration, including hardstop classification
//! - **Events**: [`events::Event`] with typed payloads for calls and results
//! - **Messages**: [`messages::Message`] conversation records,
//!   [`messages::Call`] and [`messages::ToolResult`]
//! - **Tools**: the [`tools::Tool`] invocation contract and
//!   [`tools::ToolRegistry`]
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod logging;
pub mod messages;
pub mod protocol;
pub mod tools;
