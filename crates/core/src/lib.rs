//! # Agora Core
//!
//! Domain types, traits, and error definitions for the Agora agent
//! marketplace runtime. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The three marketplace agents are one capability polymorphism over a
//! single [`Adapter`] trait, not three unrelated code paths. The registry
//! is built once at startup and frozen; the dispatcher stays agent-agnostic
//! and holds no state of its own. Implementations live in their respective
//! crates — all crates depend inward on core.

pub mod adapter;
pub mod canonical;
pub mod descriptor;
pub mod error;
pub mod invocation;
pub mod registry;

// Re-export key types at crate root for ergonomics
pub use adapter::Adapter;
pub use canonical::{cache_key, canonicalize};
pub use descriptor::AgentDescriptor;
pub use error::{Error, ErrorKind, InvokeError, RegistryError, Result};
pub use invocation::{AgentRequest, AgentResult};
pub use registry::{AgentRegistry, RegisteredAgent};
