//! Runtimes for enveil.
//!
//! The frame and controller crates are pure state machines. This crate runs
//! them: it opens ports, waits on the editor and the mail provider, and fires
//! the close timer.
//!
//! # Components
//!
//! - [`FrameRuntime`]: one per compose element, content side
//! - [`Background`]: all controllers, background side
//! - [`EditorBackend`], [`MailTransport`], [`Authorizer`]: collaborator
//!   boundaries the [`Background`] executes actions against
//! - [`SystemEnv`]: production [`enveil_core::env::Environment`]
//! - [`RuntimeConfig`]: timings and queue bounds

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod background;
mod config;
mod driver;
mod error;
mod frame_runtime;
mod system_env;

pub use background::{Background, BackgroundHandle};
pub use config::RuntimeConfig;
pub use driver::{Authorizer, EditorBackend, MailTransport};
pub use error::RuntimeError;
pub use frame_runtime::{FrameRuntime, HostEvent};
pub use system_env::SystemEnv;
