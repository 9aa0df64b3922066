//! # orderwire-dump — update order stream inspector
//!
//! Diagnostic client for a display endpoint. Connects in the service
//! role, announces its desktop capabilities, requests a full-screen
//! refresh, then tallies (and optionally prints as JSON lines) every
//! update order the display side emits until the peer goes away or
//! Ctrl-C.

pub mod config;
pub mod dump;
