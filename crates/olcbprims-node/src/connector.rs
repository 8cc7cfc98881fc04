use std::sync::Arc;

use olcbprims_frame::NodeId;
use olcbprims_transport::{TcpConfig, TcpLink};

use crate::config::NodeConfig;
use crate::engine::MessageEngine;
use crate::error::Result;
use crate::events::{EventSink, TracingEvents};

/// Connect to a GridConnect hub and start a node with default settings.
pub fn connect(host: &str, port: u16, node_id: NodeId) -> Result<MessageEngine> {
    connect_with_config(host, port, &TcpConfig::default(), NodeConfig::new(node_id), None)
}

/// Connect with explicit link and node configuration.
pub fn connect_with_config(
    host: &str,
    port: u16,
    tcp_config: &TcpConfig,
    node_config: NodeConfig,
    events: Option<Arc<dyn EventSink>>,
) -> Result<MessageEngine> {
    let link = TcpLink::connect_with_config(host, port, tcp_config)?;
    let events = events.unwrap_or_else(|| Arc::new(TracingEvents));
    MessageEngine::start_with_events(link, node_config, events)
}
