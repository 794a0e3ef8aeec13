//! Background Jobs for Waypoint API
//!
//! - `expiry_sweep`: Periodically removes expired roadmap cache entries
//!
//! # Usage
//!
//! ```ignore
//! use waypoint_api::jobs::{expiry_sweep_task, ExpirySweepConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(expiry_sweep_task(maintenance, ExpirySweepConfig::from_env(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod expiry_sweep;

pub use expiry_sweep::{
    expiry_sweep_task, ExpirySweepConfig, ExpirySweepMetrics, ExpirySweepSnapshot,
};
