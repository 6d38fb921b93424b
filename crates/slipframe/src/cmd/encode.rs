use crate::cmd::{resolve_payload, EncodeArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args.payload)?;
    let packet = slipframe::encode(&payload, args.leading_end);
    tracing::debug!(
        message = payload.len(),
        packet = packet.len(),
        "encoded message"
    );
    print_raw(&packet);
    Ok(SUCCESS)
}
