use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cmd::{LinkArgs, ListenArgs};
use crate::exit::{node_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// How often the loop checks for Ctrl-C while the bus is idle.
const POLL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let engine = link.start_engine()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let message = match engine.receive(POLL, args.to_me) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => return Err(node_error("receive failed", err)),
        };

        print_message(&message, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    engine
        .shutdown()
        .map_err(|err| node_error("shutdown failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
