use std::fs::File;
use std::io::{ErrorKind, Read};

use slipframe::transport::MAX_CHUNK_SIZE;
use slipframe::Driver;
use tracing::{info, warn};

use crate::cmd::{driver_config, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    messages: usize,
    malformed: usize,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (input, source): (Box<dyn Read>, String) = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            (Box::new(file), path.display().to_string())
        }
        None => (Box::new(std::io::stdin().lock()), "stdin".to_string()),
    };

    let driver = Driver::with_config(driver_config(false, args.relaxed));
    let chunk_size = usize::try_from(args.chunk_size).unwrap_or(MAX_CHUNK_SIZE);
    let tally = decode_stream(input, &driver, chunk_size, |msg, index| {
        print_message(msg, &source, index, format)
    })?;

    info!(
        messages = tally.messages,
        malformed = tally.malformed,
        "decode finished"
    );
    if tally.malformed > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} malformed packet(s) skipped", tally.malformed),
        ));
    }
    Ok(SUCCESS)
}

/// Feed `input` through `driver` until end of stream, handing each message
/// and its 1-based index to `emit`.
fn decode_stream<R, F>(
    mut input: R,
    driver: &Driver,
    chunk_size: usize,
    mut emit: F,
) -> CliResult<Tally>
where
    R: Read,
    F: FnMut(&[u8], usize),
{
    let mut tally = Tally::default();
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match input.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        };
        // A zero-length read is end of stream and also flushes the tail packet.
        driver.receive(&chunk[..n]);

        for result in driver.try_iter() {
            match result {
                Ok(msg) => {
                    tally.messages += 1;
                    emit(&msg, tally.messages);
                }
                Err(err) => {
                    tally.malformed += 1;
                    warn!(error = %err, "skipping malformed packet");
                }
            }
        }

        if n == 0 {
            return Ok(tally);
        }
    }
}
