use std::time::Duration;

use slipframe::{SlipSocket, SlipWrapper};
use tracing::debug;

use crate::cmd::{driver_config, parse_endpoint, resolve_payload, SendArgs};
use crate::exit::{transport_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args.payload)?;

    let mut socket =
        SlipSocket::connect_with_config(&endpoint, driver_config(args.leading_end, args.relaxed))
            .map_err(|err| transport_error("connect failed", err))?;

    socket
        .send_msg(&payload)
        .map_err(|err| transport_error("send failed", err))?;
    debug!(%endpoint, size = payload.len(), "message sent");

    if args.wait {
        socket
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| transport_error("set timeout failed", err))?;
        let response = socket
            .recv_msg()
            .map_err(|err| transport_error("receive failed", err))?
            .ok_or_else(|| {
                CliError::new(FAILURE, "peer closed the connection without a response")
            })?;
        print_message(&response, &endpoint.to_string(), 1, format);
    }

    Ok(SUCCESS)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
