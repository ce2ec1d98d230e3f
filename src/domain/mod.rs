//! Domain layer: shipment aggregate, payment ledger and the rules binding them.

pub mod actor;
pub mod payment;
pub mod ports;
pub mod shipment;
pub mod status;
pub mod timeline;
pub mod verification;
