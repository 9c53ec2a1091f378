//! Content-side frame for enveil.
//!
//! A [`Frame`] attaches to one compose element of a webmail page, shows an
//! overlay control next to it and brokers between the page and its
//! background controller over a port.
//!
//! # Architecture
//!
//! The frame is a sans-IO state machine. Page access goes through the
//! synchronous [`HostPage`] trait; port traffic and the close timer come back
//! as [`FrameAction`]s for the runtime to execute.
//!
//! # Components
//!
//! - [`Frame`]: attach, activation, editor output, two-phase close
//! - [`HostPage`]: compose element, overlay and provider recipient fields
//! - [`FrameId`]: content-derived id, names the frame's port
//! - [`markup`]: escaping for rich-text bodies

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod error;
mod frame;
pub mod host;
mod id;
pub mod markup;

pub use action::FrameAction;
pub use error::FrameError;
pub use frame::{Frame, FrameConfig, FrameStatus};
pub use host::{BodyFormat, ElementKind, HostPage, OverlayPosition, StatusMarker, has_overlay};
pub use id::FrameId;
