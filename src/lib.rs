//! Ship Arena
//!
//! Authoritative arena ship simulation with client-side prediction,
//! reconciliation and snapshot interpolation.
//!
//! # Layout
//!
//! - `game` - engine, entity state and the per-tick systems
//! - `net` - wire protocol, transport seam and the host loop
//! - `client` - predictor and interpolation buffer
//!
//! # Features
//!
//! - `metrics_extended` - per-kind entity gauges in the metrics endpoint (enabled by default)

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod client;
pub mod metrics;
