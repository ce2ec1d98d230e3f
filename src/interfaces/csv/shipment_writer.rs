use crate::domain::shipment::ShipmentRecord;
use crate::domain::timeline::synthesize;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ShipmentSummaryRow<'a> {
    tracking_number: &'a str,
    status: &'a str,
    payment_type: &'a str,
    payment_status: &'a str,
    amount_due: String,
    progress: u8,
}

/// Writes one summary row per shipment.
pub struct ShipmentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ShipmentWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    /// Writes the header and the given shipments in order, then flushes.
    pub fn write_shipments(&mut self, records: &[ShipmentRecord]) -> Result<()> {
        for record in records {
            let timeline = synthesize(record, &record.payment);
            let payment_type = record.payment.payment_type.to_string();
            let payment_status = record.payment.status.to_string();
            self.writer.serialize(ShipmentSummaryRow {
                tracking_number: record.tracking_number.as_str(),
                status: record.current_status().as_str(),
                payment_type: &payment_type,
                payment_status: &payment_status,
                amount_due: record.payment.amount_due().normalize().to_string(),
                progress: timeline.progress_percent,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
