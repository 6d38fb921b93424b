//! Write SLIP-framed records to a file, then read them back with a small
//! chunk size the way a serial link would deliver them.
//!
//! Run with:
//!   cargo run --example stream-file

use std::fs::{File, OpenOptions};

use slipframe::{DriverConfig, ErrorMode, SlipStream, SlipWrapper};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join(format!("slipframe-records-{}.slip", std::process::id()));

    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let config = DriverConfig::default().with_leading_end(true);
        let mut writer = SlipStream::with_config(file, config);
        for record in [&b"temperature=21.5"[..], b"\xc0binary\xdb", b"humidity=40"] {
            writer.send_msg(record)?;
        }
    }

    let config = DriverConfig::default().with_error_mode(ErrorMode::Relaxed);
    let mut reader = SlipStream::with_config(File::open(&path)?, config).with_chunk_size(3);
    for (index, record) in reader.messages().enumerate() {
        let record = record?;
        println!("#{} {:?}", index + 1, String::from_utf8_lossy(&record));
    }

    std::fs::remove_file(&path)?;
    Ok(())
}
