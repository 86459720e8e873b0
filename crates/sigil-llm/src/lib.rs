//! # sigil-llm
//!
//! Model-provider contracts for the Sigil engine.
//!
//! Concrete adapters (Anthropic, OpenAI, local runtimes) live outside the
//! engine; this crate defines the call contract they implement:
//! [`provider::Provider`] for one-shot and streamed requests, and
//! [`provider::ModelSession`] for persistent bidirectional connections used
//! by resume mode.

#![deny(unsafe_code)]

pub mod provider;

pub use provider::{FragmentStream, ModelSession, Provider, ProviderError, ProviderResult};
