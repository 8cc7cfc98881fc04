use std::time::Instant;

use olcbprims_frame::mti;

use crate::cmd::{parse_hex_bytes, LinkArgs, SendArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let quiet = link.timeout()?;
    let engine = link.start_engine()?;

    engine
        .send(args.mti, &payload, args.dest.as_ref())
        .map_err(|err| node_error("send failed", err))?;

    if args.wait {
        let mut deadline = Instant::now() + quiet;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match engine
                .receive(remaining, true)
                .map_err(|err| node_error("receive failed", err))?
            {
                // Only answers addressed to us; global chatter is noise here.
                Some(message) if message.is_addressed() => {
                    print_message(&message, format);
                    deadline = Instant::now() + quiet;
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    engine
        .shutdown()
        .map_err(|err| node_error("shutdown failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(event) = &args.event {
        return Ok(event.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return parse_hex_bytes(data);
    }
    if mti::has_event(args.mti) {
        return Err(CliError::new(
            USAGE,
            format!("mti 0x{:03X} carries an event id; pass --event", args.mti),
        ));
    }
    Ok(Vec::new())
}
