//! # gateway-realtime
//!
//! One live, authorization-filtered, backpressure-safe realtime connection
//! per session.
//!
//! - `hub`: the process-wide registry of live clients, admission and broadcast
//! - `client`: the per-connection actor (reader and writer tasks)
//! - `publisher`: bounded, lossy per-client outbound buffer
//! - `router`: inbound message dispatch to handlers
//! - `terminator`: kill notices for sessions ended elsewhere

pub mod client;
pub mod error;
pub mod error_handler;
pub mod fd_limit;
pub mod heartbeat;
pub mod hub;
pub mod keywords;
pub mod message;
pub mod publisher;
pub mod router;
pub mod terminator;

pub use client::{Client, ClientState, CloseReason};
pub use error::RealtimeError;
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use heartbeat::HeartbeatSettings;
pub use hub::{ConnectRequest, ConnectionHub};
pub use keywords::{KeywordSet, StaticPolicyEngine};
pub use message::{Frame, InboundEnvelope, OutboundMessage};
pub use publisher::Publisher;
pub use router::{HandlerContext, HandlerError, MessageHandler, Router};
pub use terminator::SessionTerminator;
