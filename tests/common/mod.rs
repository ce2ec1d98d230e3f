#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use rand::Rng;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: [&str; 18] = [
    "op",
    "tracking",
    "actor",
    "at",
    "status",
    "city",
    "state",
    "country",
    "description",
    "amount",
    "payment_type",
    "methods",
    "email",
    "transaction_id",
    "method",
    "notes",
    "request",
    "decision",
];

/// Writes the header and the given raw rows to a temporary operations file.
pub fn operations_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER.join(",")).unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file
}

/// Generates `shipments` shipments with a random payment policy and amount. Each one is
/// picked up; full-payment shipments are also moved in transit.
pub fn generate_csv(path: &Path, shipments: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    let mut rng = rand::thread_rng();
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    for i in 1..=shipments {
        let tracking = format!("GEN-{i}");
        let at = start + Duration::minutes(i as i64);
        let payment_type = if rng.gen_bool(0.5) { "partial" } else { "full" };
        let amount = format!("{}.{:02}", rng.gen_range(1..=500), rng.gen_range(0..100));

        let mut create = [""; 18];
        create[0] = "create";
        create[1] = &tracking;
        create[2] = "admin:generator";
        let created_at = at.to_rfc3339();
        create[3] = &created_at;
        create[9] = &amount;
        create[10] = payment_type;
        wtr.write_record(create)?;

        let picked_up_at = (at + Duration::seconds(10)).to_rfc3339();
        let mut track = [""; 18];
        track[0] = "track";
        track[1] = &tracking;
        track[2] = "system";
        track[3] = &picked_up_at;
        track[4] = "picked_up";
        track[5] = "Austin";
        track[6] = "TX";
        track[7] = "US";
        wtr.write_record(track)?;

        if payment_type == "full" {
            let in_transit_at = (at + Duration::seconds(20)).to_rfc3339();
            track[3] = &in_transit_at;
            track[4] = "in_transit";
            wtr.write_record(track)?;
        }
    }

    wtr.flush()?;
    Ok(())
}
