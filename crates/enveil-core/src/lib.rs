//! Core primitives shared by every enveil context.
//!
//! # Components
//!
//! - [`Port`] / [`PortHub`]: named, FIFO, disconnect-aware channels between a
//!   content frame and its background controller
//! - [`Message`]: the port protocol, CBOR-encoded on the wire
//! - [`HandlerTable`]: explicit event-name to handler dispatch
//! - [`ControllerRegistry`]: controller id to instance, passed by reference
//! - [`env::Environment`]: time and randomness, swappable for simulation
//! - [`address`], [`armor`], [`token`]: parsing and caching helpers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod address;
pub mod armor;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod message;
pub mod port;
pub mod registry;
pub mod token;

pub use dispatch::{Handler, HandlerTable};
pub use error::{ArmorError, CodecError, DispatchError, PortError};
pub use message::{ComposeRequest, EditorOutput, Message, Recipient, events};
pub use port::{Inbound, Port, PortAcceptor, PortHub, PortReceiver, PortSender};
pub use registry::{ControllerId, ControllerRegistry, FRAME_PORT_PREFIX};
pub use token::{AccessToken, ScopeSet, TokenCache, scopes};
