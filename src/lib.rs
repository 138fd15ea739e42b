//! WA Relay — WhatsApp webhook relay with a policy gate.

pub mod channels;
pub mod config;
pub mod error;
pub mod normalize;
pub mod policy;
pub mod relay;
pub mod responder;
pub mod webhook;
