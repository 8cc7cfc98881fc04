use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use olcbprims_frame::{
    alias_map_definition, encode_frame, mti, Alias, CanFrame, FrameKind, FrameScanner, NodeId,
};
use olcbprims_transport::Transport;
use tracing::{debug, error, trace};

use crate::allocator::{AliasAllocator, SourceState};
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::events::{EventSink, NodeEvent, TracingEvents};
use crate::inbound::{Closed, Inbound};
use crate::message::{
    encode_message, parse_frame, Message, Reassembled, MAX_ADDRESSED_PAYLOAD, MAX_GLOBAL_PAYLOAD,
};
use crate::outbound::{FrameSink, Outbound};
use crate::reassembly::{Reassembler, RxOutcome};
use crate::registry::AliasRegistry;
use crate::resolver::NodeResolver;

/// State shared by the caller-facing handle and the two loop threads.
struct Shared {
    config: NodeConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<AliasRegistry>,
    allocator: Arc<AliasAllocator>,
    resolver: NodeResolver,
    outbound: Arc<Outbound>,
    inbound: Inbound,
    assembly: Mutex<Assembly>,
    events: Arc<dyn EventSink>,
    shutdown: AtomicBool,
}

/// Receive-side state of `receive` callers.
struct Assembly {
    reassembler: Reassembler,
    ready: VecDeque<RxOutcome>,
}

/// An OpenLCB node speaking over one GridConnect link.
///
/// Owns a send loop, which drains queued frames to the link in order, and a
/// receive loop, which decodes link bytes and dispatches every frame: alias
/// management updates the registry and allocator, standard frames are
/// buffered for [`receive`](Self::receive). The source alias is claimed
/// lazily on first use.
pub struct MessageEngine {
    shared: Arc<Shared>,
    send_loop: Option<JoinHandle<()>>,
    receive_loop: Option<JoinHandle<()>>,
}

impl MessageEngine {
    /// Start both loops over `transport`, reporting events to `tracing`.
    pub fn start<T>(transport: T, config: NodeConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::start_with_events(transport, config, Arc::new(TracingEvents))
    }

    /// Start both loops, reporting events to `events`.
    pub fn start_with_events<T>(
        transport: T,
        config: NodeConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        if config.read_chunk == 0 {
            return Err(NodeError::InvalidConfig("read_chunk must be non-zero".to_string()));
        }
        if config.resolver.attempts == 0 {
            return Err(NodeError::InvalidConfig(
                "resolver attempts must be non-zero".to_string(),
            ));
        }

        let transport: Arc<dyn Transport> = Arc::new(transport);
        let outbound = Arc::new(Outbound::new());
        let sink: Arc<dyn FrameSink> = outbound.clone();
        let registry = Arc::new(AliasRegistry::new());
        let allocator = Arc::new(AliasAllocator::new(
            config.node_id,
            config.alias_seed,
            config.alias_range,
            sink.clone(),
            events.clone(),
        ));
        let resolver = NodeResolver::new(registry.clone(), allocator.clone(), sink, config.resolver);

        let shared = Arc::new(Shared {
            inbound: Inbound::new(config.inbound_capacity),
            assembly: Mutex::new(Assembly {
                reassembler: Reassembler::new(config.reassembly_timeout),
                ready: VecDeque::new(),
            }),
            config,
            transport,
            registry,
            allocator,
            resolver,
            outbound,
            events,
            shutdown: AtomicBool::new(false),
        });

        let send_loop = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("olcb-send".to_string())
                .spawn(move || shared.run_send_loop())
                .map_err(olcbprims_transport::TransportError::Io)?
        };
        let receive_loop = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("olcb-receive".to_string())
                .spawn(move || shared.run_receive_loop())
                .map_err(olcbprims_transport::TransportError::Io)?
        };

        debug!(
            node_id = %shared.config.node_id,
            transport = shared.transport.transport_name(),
            "node engine started"
        );
        Ok(Self {
            shared,
            send_loop: Some(send_loop),
            receive_loop: Some(receive_loop),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.config.node_id
    }

    /// This node's alias, claiming one first if needed.
    pub fn source_alias(&self) -> Result<Alias> {
        self.ensure_running()?;
        self.shared.allocator.allocate()
    }

    pub fn alias_state(&self) -> SourceState {
        self.shared.allocator.state()
    }

    /// Remote alias mappings learned so far.
    pub fn registry(&self) -> &AliasRegistry {
        &self.shared.registry
    }

    pub fn resolve_alias(&self, node_id: &NodeId) -> Result<Alias> {
        self.ensure_running()?;
        self.shared.resolver.resolve_alias(node_id)
    }

    pub fn resolve_node_id(&self, alias: Alias) -> Result<NodeId> {
        self.ensure_running()?;
        self.shared.resolver.resolve_node_id(alias)
    }

    /// Send one message, addressed when `dest` is given.
    ///
    /// Size and MTI checks run before anything is transmitted. Blocks until
    /// every frame of the message has been written to the link.
    pub fn send(&self, mti: u16, payload: &[u8], dest: Option<&NodeId>) -> Result<()> {
        self.ensure_running()?;
        if mti > mti::MAX_CAN_MTI {
            return Err(NodeError::InvalidMti(mti));
        }
        if mti::is_addressed(mti) != dest.is_some() {
            return Err(NodeError::AddressMismatch {
                mti,
                addressed: mti::is_addressed(mti),
            });
        }
        let max = if dest.is_some() {
            MAX_ADDRESSED_PAYLOAD
        } else {
            MAX_GLOBAL_PAYLOAD
        };
        if payload.len() > max {
            return Err(NodeError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        let source = self.shared.allocator.allocate()?;
        let dest = dest
            .map(|node_id| self.shared.resolver.resolve_alias(node_id))
            .transpose()?;
        let frames = encode_message(mti, source, dest, payload)?;
        self.shared.outbound.submit_and_wait(frames)?;
        self.shared.allocator.mark_active(source);
        Ok(())
    }

    /// Send a [`Message`]; its event id, if present, becomes the payload.
    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.send(message.mti, &message.body(), message.dest.as_ref())
    }

    /// Next inbound message, or `None` once `timeout` passes.
    ///
    /// Multi-frame addressed payloads are reassembled and arrive as one
    /// message. With `to_self_only`, addressed frames for other nodes are
    /// skipped. Never waits past `timeout` for a lookup: node ids come from
    /// the registry, and an unmapped alias leaves `source` or `dest` as
    /// `None` next to the alias while a Verify Node ID goes out in the
    /// background.
    pub fn receive(&self, timeout: Duration, to_self_only: bool) -> Result<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.take_ready() {
                return Ok(Some(message));
            }
            let wake = self
                .assembly()
                .reassembler
                .next_expiry()
                .map_or(deadline, |expiry| expiry.min(deadline));

            if let Some(frame) = self.shared.inbound.pop(wake)? {
                self.accept(frame, to_self_only);
            }
            let now = Instant::now();
            {
                let mut assembly = self.assembly();
                let Assembly { reassembler, ready } = &mut *assembly;
                reassembler.expire(now, ready);
            }
            if now >= deadline {
                return Ok(self.take_ready());
            }
        }
    }

    fn assembly(&self) -> MutexGuard<'_, Assembly> {
        self.shared
            .assembly
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn accept(&self, frame: CanFrame, to_self_only: bool) {
        let parsed = match parse_frame(&frame) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.shared.events.emit(&NodeEvent::MalformedFrame {
                    reason: err.to_string(),
                });
                return;
            }
        };
        let own = self.shared.allocator.current();
        if to_self_only && parsed.dest.is_some() && parsed.dest != own {
            trace!(frame = %frame, "skipping frame addressed elsewhere");
            return;
        }

        let mut assembly = self.assembly();
        let Assembly { reassembler, ready } = &mut *assembly;
        reassembler.accept(parsed, Instant::now(), ready);
    }

    /// Oldest finished message. Abandoned partial messages are reported
    /// and skipped.
    fn take_ready(&self) -> Option<Message> {
        loop {
            let outcome = self.assembly().ready.pop_front()?;
            match outcome {
                RxOutcome::Completed(message) => return Some(self.deliver(message)),
                RxOutcome::Dropped(reason) => {
                    self.shared.events.emit(&NodeEvent::MalformedFrame { reason })
                }
            }
        }
    }

    fn deliver(&self, message: Reassembled) -> Message {
        let source = self.known_node_id(message.source);
        let dest = message.dest.and_then(|alias| self.known_node_id(alias));
        Message::received(message, source, dest)
    }

    fn known_node_id(&self, alias: Alias) -> Option<NodeId> {
        let found = self.shared.resolver.known_node_id(alias);
        if found.is_none() {
            self.shared.resolver.request_node_id(alias);
        }
        found
    }

    /// Stop both loops and close the link.
    ///
    /// Waits up to the configured read timeout for the receive loop.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(NodeError::Shutdown);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.send_loop.is_none() && self.receive_loop.is_none() {
            return Ok(());
        }
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.outbound.close();
        self.shared.inbound.close(Closed::Shutdown);

        for handle in [self.send_loop.take(), self.receive_loop.take()]
            .into_iter()
            .flatten()
        {
            if handle.join().is_err() {
                error!("node engine loop panicked");
            }
        }
        self.shared.transport.close()?;
        debug!(node_id = %self.shared.config.node_id, "node engine stopped");
        Ok(())
    }
}

impl Drop for MessageEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl Shared {
    fn running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    fn run_send_loop(&self) {
        let mut buf = BytesMut::with_capacity(olcbprims_frame::MAX_FRAME_LEN);
        while let Some(batch) = self.outbound.next_batch() {
            let mut result = Ok(());
            for frame in &batch.frames {
                buf.clear();
                encode_frame(frame, &mut buf);
                trace!(frame = %frame, "send");
                if let Err(err) = self.transport.send(&buf) {
                    result = Err(err);
                    break;
                }
            }

            if let Err(err) = result {
                if self.running() {
                    self.link_failed(&err.to_string());
                }
                batch.complete(Err(err.into()));
                return;
            }
            batch.complete(Ok(()));
        }
    }

    fn run_receive_loop(&self) {
        let mut scanner = FrameScanner::new();
        while self.running() {
            match self
                .transport
                .recv(self.config.read_chunk, self.config.read_timeout)
            {
                Ok(None) => continue,
                Ok(Some(bytes)) => {
                    scanner.push(&bytes);
                    for result in scanner.by_ref() {
                        match result {
                            Ok(frame) => self.dispatch(frame),
                            Err(err) => self.events.emit(&NodeEvent::MalformedFrame {
                                reason: err.to_string(),
                            }),
                        }
                    }
                }
                Err(err) => {
                    if self.running() {
                        self.link_failed(&err.to_string());
                    }
                    return;
                }
            }
        }
    }

    /// The link is unusable: fail queued sends and drain `receive`.
    fn link_failed(&self, reason: &str) {
        error!(%reason, "link failed");
        self.events.emit(&NodeEvent::LinkFailed {
            reason: reason.to_string(),
        });
        self.outbound.close();
        self.inbound.close(Closed::LinkDown);
    }

    fn dispatch(&self, frame: CanFrame) {
        trace!(frame = %frame, "receive");
        self.allocator.observe(&frame);

        match frame.kind() {
            FrameKind::CheckId { .. } | FrameKind::ReserveId { .. } => {}
            FrameKind::AliasMapDefinition { alias } => {
                match (Alias::new(alias), NodeId::from_slice(frame.data())) {
                    (Some(alias), Some(node_id)) if node_id != self.config.node_id => {
                        if self.registry.record(alias, node_id) {
                            self.events.emit(&NodeEvent::MappingLearned { alias, node_id });
                        }
                    }
                    (Some(_), Some(_)) => {}
                    _ => self.events.emit(&NodeEvent::MalformedFrame {
                        reason: format!("alias map definition {frame}"),
                    }),
                }
            }
            FrameKind::AliasMapEnquiry { .. } => self.answer_enquiry(&frame),
            FrameKind::AliasMapReset { alias } => {
                if let Some(alias) = Alias::new(alias) {
                    if self.registry.purge_by_alias(alias).is_some() {
                        self.events.emit(&NodeEvent::MappingReleased { alias });
                    }
                }
                if let Some(node_id) = NodeId::from_slice(frame.data()) {
                    self.registry.purge_by_node_id(&node_id);
                }
            }
            FrameKind::Standard { mti, source } => {
                if mti::is_verified_node_id(mti) {
                    if let (Some(alias), Some(node_id)) =
                        (Alias::new(source), NodeId::from_slice(frame.data()))
                    {
                        if self.registry.record(alias, node_id) {
                            self.events.emit(&NodeEvent::MappingLearned { alias, node_id });
                        }
                    }
                }
                if self.config.answer_verify_node {
                    self.answer_verify(mti, &frame);
                }
                if self.inbound.push(frame) {
                    self.events.emit(&NodeEvent::InboundOverflow);
                }
            }
            FrameKind::Unsupported { kind, source } => {
                self.events.emit(&NodeEvent::UnsupportedFrame { kind, source });
            }
            FrameKind::Unknown => trace!(frame = %frame, "ignoring unknown control frame"),
        }
    }

    /// Answer an Alias Map Enquiry that names us, or names nobody.
    fn answer_enquiry(&self, frame: &CanFrame) {
        let Some(own) = self.allocator.current() else {
            return;
        };
        let wanted = frame.data().is_empty()
            || NodeId::from_slice(frame.data()) == Some(self.config.node_id);
        if !wanted {
            return;
        }
        if let Err(err) = self
            .outbound
            .submit(&[alias_map_definition(own, &self.config.node_id)])
        {
            debug!(error = %err, "cannot answer alias map enquiry");
        }
    }

    /// Answer Verify Node ID, global (optionally filtered) or addressed to us.
    fn answer_verify(&self, mti: u16, frame: &CanFrame) {
        let Some(own) = self.allocator.current() else {
            return;
        };
        let data = frame.data();
        let wanted = match mti {
            mti::VERIFY_NODE_ID_GLOBAL => {
                data.is_empty() || NodeId::from_slice(data) == Some(self.config.node_id)
            }
            mti::VERIFY_NODE_ID_ADDRESSED => {
                data.len() >= 2 && (u16::from(data[0] & 0x0F) << 8 | u16::from(data[1])) == own.get()
            }
            _ => false,
        };
        if !wanted {
            return;
        }
        match encode_message(
            mti::VERIFIED_NODE_ID,
            own,
            None,
            self.config.node_id.as_bytes(),
        ) {
            Ok(reply) => {
                if let Err(err) = self.outbound.submit(&reply) {
                    debug!(error = %err, "cannot send verified node id reply");
                }
            }
            Err(err) => debug!(error = %err, "cannot build verified node id reply"),
        }
    }
}
