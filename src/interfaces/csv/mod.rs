//! CSV adapters used by the replay binary.

pub mod operation_reader;
pub mod shipment_writer;
