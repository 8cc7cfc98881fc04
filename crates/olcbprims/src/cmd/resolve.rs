use serde::Serialize;

use crate::cmd::{LinkArgs, ResolveArgs, ResolveTarget};
use crate::exit::{node_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct Resolution {
    schema_id: &'static str,
    node_id: String,
    alias: String,
}

pub fn run(args: ResolveArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let engine = link.start_engine()?;

    let resolved = match args.target {
        ResolveTarget::Node(node_id) => engine
            .resolve_alias(&node_id)
            .map(|alias| (node_id, alias)),
        ResolveTarget::Alias(alias) => engine
            .resolve_node_id(alias)
            .map(|node_id| (node_id, alias)),
    };
    let shutdown = engine.shutdown();
    let (node_id, alias) = resolved.map_err(|err| node_error("resolve failed", err))?;
    shutdown.map_err(|err| node_error("shutdown failed", err))?;

    let record = Resolution {
        schema_id: "https://schemas.3leaps.dev/olcbprims/cli/v1/resolution.schema.json",
        node_id: node_id.to_string(),
        alias: alias.to_string(),
    };
    let rows = [
        ("node_id", record.node_id.clone()),
        ("alias", record.alias.clone()),
    ];
    print_record(&record, &rows, format);

    Ok(SUCCESS)
}
