use std::time::Instant;

use olcbprims_frame::mti;

use crate::cmd::{LinkArgs, VerifyArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: VerifyArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let quiet = link.timeout()?;
    let engine = link.start_engine()?;

    let filter = args.node.map(|id| id.as_bytes().to_vec()).unwrap_or_default();
    engine
        .send(mti::VERIFY_NODE_ID_GLOBAL, &filter, None)
        .map_err(|err| node_error("verify failed", err))?;

    let mut answered = 0usize;
    let mut deadline = Instant::now() + quiet;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let Some(message) = engine
            .receive(remaining, true)
            .map_err(|err| node_error("receive failed", err))?
        else {
            break;
        };
        if mti::is_verified_node_id(message.mti) {
            print_message(&message, format);
            answered = answered.saturating_add(1);
            deadline = Instant::now() + quiet;
        }
    }

    engine
        .shutdown()
        .map_err(|err| node_error("shutdown failed", err))?;

    if answered == 0 {
        return Err(CliError::new(TIMEOUT, "no node answered"));
    }
    Ok(SUCCESS)
}
