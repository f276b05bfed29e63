//! `sensor-bridge` library crate.
//!
//! Agent side: `hardware` -> `codec` -> `transmit`, kept alive by
//! `heartbeat` + `watchdog` (wired together in `agent`).
//! Monitor side: `ingress` -> `consumers`, with `connection` tracking
//! staleness (wired together in `controller`).
//!
//! The binary entrypoint lives in `main.rs`.

pub mod agent;
pub mod codec;
pub mod config;
pub mod connection;
pub mod consumers;
pub mod controller;
pub mod domain;
pub mod hardware;
pub mod heartbeat;
pub mod ingress;
pub mod transmit;
pub mod watchdog;
