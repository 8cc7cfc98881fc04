//! Two nodes on an in-memory bus: one asks who is out there, the other answers.
//!
//! Run with:
//!   cargo run --example verify-bus
//!
//! Pass a host to run the same query against a real GridConnect hub:
//!   cargo run --example verify-bus -- localhost 12021

use std::time::Duration;

use olcbprims::frame::{mti, NodeId};
use olcbprims::node::{connect, MessageEngine, NodeConfig};
use olcbprims::transport::MemoryLink;

const ASKER: NodeId = NodeId::new([0x05, 0x01, 0x01, 0x01, 0x00, 0x0A]);
const ANSWERER: NodeId = NodeId::new([0x05, 0x01, 0x01, 0x01, 0x00, 0x0B]);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);

    // Keep the answering node alive until the query has been answered.
    let (asker, _answerer) = match args.next() {
        Some(host) => {
            let port = args.next().map(|p| p.parse()).transpose()?.unwrap_or(12021);
            (connect(&host, port, ASKER)?, None)
        }
        None => {
            let mut links = MemoryLink::hub(2);
            let (Some(asker_link), Some(answerer_link)) = (links.pop(), links.pop()) else {
                return Err("hub should have two endpoints".into());
            };
            let answerer = MessageEngine::start(answerer_link, NodeConfig::new(ANSWERER))?;
            // Claim up front so the answerer can hear the query.
            answerer.source_alias()?;
            let asker = MessageEngine::start(asker_link, NodeConfig::new(ASKER))?;
            (asker, Some(answerer))
        }
    };

    eprintln!("[asker] claimed alias {}", asker.source_alias()?);
    asker.send(mti::VERIFY_NODE_ID_GLOBAL, &[], None)?;

    while let Some(message) = asker.receive(Duration::from_secs(1), true)? {
        if mti::is_verified_node_id(message.mti) {
            let alias = message
                .source_alias
                .map(|alias| alias.to_string())
                .unwrap_or_else(|| "?".to_string());
            match message.source {
                Some(node_id) => println!("{node_id} answered from alias {alias}"),
                None => println!("unidentified node answered from alias {alias}"),
            }
        }
    }

    asker.shutdown()?;
    Ok(())
}
