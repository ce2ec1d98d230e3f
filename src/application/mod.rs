//! Application layer orchestrating the shipment aggregate.
//!
//! This module defines the `TrackingEngine`, the exposed query and mutation surface,
//! and the read models it returns. Every mutation is a version-checked
//! read-modify-write on a single shipment.

pub mod command;
pub mod engine;
pub mod views;
