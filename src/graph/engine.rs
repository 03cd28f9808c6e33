//! PacketGraph: the in-process graph engine and its scheduler thread.
//!
//! Lifecycle: `Uninitialized → Initialized → Running → Done`.
//!
//! 1. `initialize` parses node specs, builds calculators and computes a
//!    topological execution order.
//! 2. While initialized, the host submits side packets once, registers
//!    callbacks and adds pollers.
//! 3. `start_run` resolves side packets per node, builds the executor pools,
//!    then hands the nodes to a dedicated scheduler thread which opens every
//!    calculator.
//! 4. For every packet the host adds, the scheduler walks the topological
//!    levels of the graph. Nodes of one level that are ready run together
//!    on their executors. Graph output packets are dispatched to callbacks
//!    and pollers from the scheduler thread.
//! 5. Once every input stream is closed the scheduler closes the
//!    calculators, publishes output side packets and exits. Calculators are
//!    closed even when the run failed.

use crate::callback::{CallbackRegistry, PacketCallback};
use crate::config::GraphConfig;
use crate::graph::calculator::{AnyCalculator, CalculatorContext, CalculatorFactory, NodeSpec};
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::executor::{ExecutorPlan, DEFAULT_EXECUTOR_INDEX};
use crate::graph::handler::{InputQueues, InputStreamHandler};
use crate::graph::id::{NodeId, StreamId};
use crate::graph::poller::OutputStreamPoller;
use crate::graph::port::expected_side_packet_kind;
use crate::graph::stream::StreamSpec;
use crate::graph::GraphHandle;
use crate::packet::{Packet, PacketCreator, Timestamp};
use crate::side_packet::{SidePacketBundle, SidePacketValue};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Default capacity of the host → scheduler packet channel.
pub const DEFAULT_INPUT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Initialized,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Producer {
    GraphInput,
    Node(NodeId),
}

/// Stream table shared by the host side and the scheduler.
#[derive(Debug, Default)]
struct Topology {
    streams: Vec<String>,
    stream_ids: HashMap<String, StreamId>,
    producers: Vec<Option<Producer>>,
    /// Streams declared as graph outputs; always dispatched.
    is_output: Vec<bool>,
    graph_inputs: Vec<StreamId>,
}

impl Topology {
    fn intern(&mut self, name: &str) -> StreamId {
        if let Some(&id) = self.stream_ids.get(name) {
            return id;
        }
        let id = StreamId(self.streams.len() as u32);
        self.streams.push(name.to_string());
        self.stream_ids.insert(name.to_string(), id);
        self.producers.push(None);
        self.is_output.push(false);
        id
    }

    fn set_producer(&mut self, id: StreamId, producer: Producer) -> GraphResult<()> {
        let slot = &mut self.producers[id.index()];
        if slot.is_some() {
            return Err(GraphError::DuplicateOutputStream(
                self.streams[id.index()].clone(),
            ));
        }
        *slot = Some(producer);
        Ok(())
    }

    fn name(&self, id: StreamId) -> &str {
        &self.streams[id.index()]
    }
}

/// A node and its stream wiring.
struct NodeSlot {
    spec: NodeSpec,
    calculator: AnyCalculator,
    inputs: Vec<StreamId>,
    outputs: Vec<StreamId>,
    handler: InputStreamHandler,
    executor: usize,
}

#[derive(Debug, Clone, Copy)]
struct InputStreamState {
    id: StreamId,
    last: Timestamp,
    closed: bool,
}

enum SchedulerEvent {
    Packet(StreamId, Packet),
    Close(StreamId),
    CloseAll,
}

/// The graph engine.
pub struct PacketGraph {
    factory: CalculatorFactory,
    state: GraphState,
    topology: Arc<Topology>,
    execution_order: Vec<usize>,
    levels: Vec<Vec<usize>>,
    executors: ExecutorPlan,
    node_names: Vec<String>,
    nodes: Vec<NodeSlot>,
    declared_side_outputs: Vec<String>,
    side_packets: Option<SidePacketBundle>,
    registry: Arc<CallbackRegistry>,
    pollers: Vec<(StreamId, Sender<Packet>)>,
    input_capacity: usize,
    input_streams: HashMap<String, InputStreamState>,
    input_tx: Option<Sender<SchedulerEvent>>,
    scheduler: Option<JoinHandle<GraphResult<()>>>,
    running: Arc<AtomicBool>,
    output_side_packets: Arc<Mutex<HashMap<String, SidePacketValue>>>,
    creator: PacketCreator,
}

impl PacketGraph {
    pub fn new(factory: CalculatorFactory) -> Self {
        Self {
            factory,
            state: GraphState::Uninitialized,
            topology: Arc::new(Topology::default()),
            execution_order: Vec::new(),
            levels: Vec::new(),
            executors: ExecutorPlan::default(),
            node_names: Vec::new(),
            nodes: Vec::new(),
            declared_side_outputs: Vec::new(),
            side_packets: None,
            registry: Arc::new(CallbackRegistry::new()),
            pollers: Vec::new(),
            input_capacity: DEFAULT_INPUT_CHANNEL_CAPACITY,
            input_streams: HashMap::new(),
            input_tx: None,
            scheduler: None,
            running: Arc::new(AtomicBool::new(false)),
            output_side_packets: Arc::new(Mutex::new(HashMap::new())),
            creator: PacketCreator::new(),
        }
    }

    /// Create and initialize a graph with the built-in calculators.
    pub fn from_config(config: &GraphConfig) -> GraphResult<Self> {
        let mut graph = Self::new(CalculatorFactory::new());
        graph.initialize(config)?;
        Ok(graph)
    }

    /// Bound on packets queued between the host and the scheduler. Adding a
    /// packet blocks while the queue is full.
    #[must_use]
    pub fn with_input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity.max(1);
        self
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Whether the scheduler thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn input_stream_names(&self) -> Vec<&str> {
        self.topology
            .graph_inputs
            .iter()
            .map(|&id| self.topology.name(id))
            .collect()
    }

    pub fn output_stream_names(&self) -> Vec<&str> {
        self.topology
            .streams
            .iter()
            .zip(&self.topology.is_output)
            .filter(|(_, out)| **out)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Node names in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .filter_map(|&i| self.node_names.get(i))
            .map(String::as_str)
            .collect()
    }

    // ── Initialization ──

    pub fn initialize(&mut self, config: &GraphConfig) -> GraphResult<()> {
        if self.state != GraphState::Uninitialized {
            return Err(GraphError::AlreadyInitialized);
        }

        let executors = ExecutorPlan::from_config(config)?;
        let mut topology = Topology::default();

        for raw in &config.input_stream {
            let spec = StreamSpec::parse(raw)?;
            let id = topology.intern(&spec.name);
            topology.set_producer(id, Producer::GraphInput)?;
            topology.graph_inputs.push(id);
        }

        let mut nodes = Vec::with_capacity(config.nodes.len());
        let mut names = HashSet::new();
        for (index, node_config) in config.nodes.iter().enumerate() {
            let spec = NodeSpec::from_config(index, node_config)?;
            if !names.insert(spec.name.clone()) {
                return Err(spec.invalid("duplicate node name"));
            }
            let calculator = self.factory.create(&spec)?;
            let executor = executors.resolve(&spec.name, node_config.executor.as_deref())?;
            let handler = node_config
                .input_stream_handler
                .or(config.input_stream_handler)
                .unwrap_or_default();

            let mut outputs = Vec::with_capacity(spec.outputs.len());
            for name in spec.outputs.names() {
                let id = topology.intern(name);
                topology.set_producer(id, Producer::Node(NodeId(index as u32)))?;
                outputs.push(id);
            }

            nodes.push(NodeSlot {
                spec,
                calculator,
                inputs: Vec::new(),
                outputs,
                handler,
                executor,
            });
        }

        // Inputs are wired after every producer is known, so node order in
        // the config does not matter.
        for slot in nodes.iter_mut() {
            for name in slot.spec.inputs.names() {
                let id = topology
                    .stream_ids
                    .get(name)
                    .copied()
                    .filter(|id| topology.producers[id.index()].is_some())
                    .ok_or_else(|| GraphError::UnconnectedInput {
                        node: slot.spec.name.clone(),
                        stream: name.to_string(),
                    })?;
                slot.inputs.push(id);
            }
        }

        for raw in &config.output_stream {
            let spec = StreamSpec::parse(raw)?;
            let id = topology
                .stream_ids
                .get(&spec.name)
                .copied()
                .ok_or_else(|| GraphError::UnknownStream(spec.name.clone()))?;
            topology.is_output[id.index()] = true;
        }

        let mut declared_side_outputs = Vec::new();
        for raw in &config.output_side_packet {
            let spec = StreamSpec::parse(raw)?;
            let produced = nodes
                .iter()
                .any(|slot| slot.spec.output_side_packets.names().any(|n| n == spec.name));
            if !produced {
                return Err(GraphError::UnknownOutputSidePacket(spec.name));
            }
            declared_side_outputs.push(spec.name);
        }

        self.execution_order = compute_execution_order(&nodes, &topology)?;
        self.levels = group_levels(&self.execution_order, &nodes, &topology);
        self.input_streams = topology
            .graph_inputs
            .iter()
            .map(|&id| {
                (
                    topology.name(id).to_string(),
                    InputStreamState {
                        id,
                        last: Timestamp::UNSET,
                        closed: false,
                    },
                )
            })
            .collect();
        self.node_names = nodes.iter().map(|slot| slot.spec.name.clone()).collect();
        self.nodes = nodes;
        self.topology = Arc::new(topology);
        self.declared_side_outputs = declared_side_outputs;
        self.state = GraphState::Initialized;

        tracing::info!(
            "Graph initialized: {} nodes in {} levels, {} streams, {} inputs, {} default threads",
            self.nodes.len(),
            self.levels.len(),
            self.topology.streams.len(),
            self.topology.graph_inputs.len(),
            executors.threads(DEFAULT_EXECUTOR_INDEX)
        );
        self.executors = executors;
        Ok(())
    }

    fn require_initialized(&self) -> GraphResult<()> {
        match self.state {
            GraphState::Uninitialized => Err(GraphError::NotInitialized),
            GraphState::Initialized => Ok(()),
            GraphState::Running | GraphState::Done => Err(GraphError::AlreadyStarted),
        }
    }

    // ── Host-side setup ──

    /// Hand the side-packet bundle to the graph. Allowed once, before start.
    pub fn set_input_side_packets(&mut self, bundle: SidePacketBundle) -> GraphResult<()> {
        self.require_initialized()?;
        if self.side_packets.is_some() {
            return Err(GraphError::SidePacketsAlreadySet);
        }
        tracing::info!("Received {} input side packets", bundle.len());
        self.side_packets = Some(bundle);
        Ok(())
    }

    /// Register `callback` for every packet on `stream`. Packets emitted
    /// before the registration are not replayed.
    pub fn add_packet_callback(
        &mut self,
        stream: &str,
        callback: Arc<dyn PacketCallback>,
    ) -> GraphResult<()> {
        if self.state == GraphState::Uninitialized {
            return Err(GraphError::NotInitialized);
        }
        if !self.topology.stream_ids.contains_key(stream) {
            return Err(GraphError::UnknownStream(stream.to_string()));
        }
        if self.state == GraphState::Running {
            tracing::warn!(
                "Callback for '{}' registered after start; earlier packets were not delivered",
                stream
            );
        }
        self.registry.register(stream, callback);
        Ok(())
    }

    /// Create a poller receiving every packet on `stream`. Only before start.
    pub fn add_output_stream_poller(&mut self, stream: &str) -> GraphResult<OutputStreamPoller> {
        self.require_initialized()?;
        let id = self
            .topology
            .stream_ids
            .get(stream)
            .copied()
            .ok_or_else(|| GraphError::UnknownStream(stream.to_string()))?;
        let (tx, rx) = unbounded();
        self.pollers.push((id, tx));
        Ok(OutputStreamPoller::new(stream, rx))
    }

    // ── Run ──

    fn resolve_side_packets(
        &self,
        bundle: &SidePacketBundle,
    ) -> GraphResult<(Vec<Vec<SidePacketValue>>, HashSet<String>)> {
        let mut resolved = Vec::with_capacity(self.nodes.len());
        let mut used = HashSet::new();

        for slot in &self.nodes {
            let ports = slot.calculator.ports();
            let mut values = Vec::with_capacity(slot.spec.input_side_packets.len());
            for spec in slot.spec.input_side_packets.iter() {
                let key = slot.spec.side_packet_key(&spec.name);
                let value = bundle.get(key.as_str()).ok_or_else(|| {
                    GraphError::MissingSidePacket {
                        node: slot.spec.name.clone(),
                        key: key.to_string(),
                    }
                })?;
                if let Some(expected) = expected_side_packet_kind(ports, &spec.tag) {
                    if value.kind() != expected {
                        return Err(GraphError::SidePacketTypeMismatch {
                            node: slot.spec.name.clone(),
                            key: key.to_string(),
                            expected,
                            actual: value.kind(),
                        });
                    }
                }
                used.insert(key.to_string());
                values.push(value.clone());
            }
            resolved.push(values);
        }

        Ok((resolved, used))
    }

    /// Resolve side packets, open every calculator on the scheduler thread
    /// and start accepting input packets.
    ///
    /// Fails with [`GraphError::MissingSidePacket`] or
    /// [`GraphError::SidePacketTypeMismatch`] when a node's side packet cannot
    /// be resolved, and with the calculator's error when an `open` fails.
    pub fn start_run(&mut self) -> GraphResult<()> {
        self.require_initialized()?;
        let pools = self.executors.build_pools()?;

        let bundle = self.side_packets.take().unwrap_or_default();
        let (resolved, used) = match self.resolve_side_packets(&bundle) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Graph start failed: {}", e);
                self.side_packets = Some(bundle);
                return Err(e);
            }
        };
        for key in bundle.keys() {
            if !used.contains(key.as_str()) {
                tracing::debug!("Side packet '{}' is not read by any node", key);
            }
        }

        let topology = self.topology.clone();
        let mut pollers: Vec<Vec<Sender<Packet>>> = vec![Vec::new(); topology.streams.len()];
        for (id, tx) in self.pollers.drain(..) {
            pollers[id.index()].push(tx);
        }

        let wiring: Vec<NodeWiring> = self
            .nodes
            .iter()
            .map(|slot| NodeWiring {
                name: slot.spec.name.clone(),
                inputs: slot.inputs.clone(),
                outputs: slot.outputs.clone(),
                handler: slot.handler,
                executor: slot.executor,
            })
            .collect();
        let sync: Vec<Option<InputQueues>> = wiring
            .iter()
            .map(|w| {
                (w.handler == InputStreamHandler::Synchronized)
                    .then(|| InputQueues::new(w.inputs.len()))
            })
            .collect();
        let mut sync_consumers = vec![Vec::new(); topology.streams.len()];
        for (idx, w) in wiring.iter().enumerate() {
            if w.handler == InputStreamHandler::Synchronized {
                for (port, stream) in w.inputs.iter().enumerate() {
                    sync_consumers[stream.index()].push((idx, port));
                }
            }
        }

        let nodes: Vec<Arc<Mutex<RunningNode>>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .zip(resolved)
            .map(|(slot, side_packets)| {
                let output_side_packets = vec![None; slot.spec.output_side_packets.len()];
                Arc::new(Mutex::new(RunningNode {
                    slot,
                    side_packets,
                    output_side_packets,
                }))
            })
            .collect();

        let (event_tx, event_rx) = bounded(self.input_capacity);
        let (started_tx, started_rx) = bounded(1);
        let scheduler = Scheduler {
            nodes,
            wiring,
            order: self.execution_order.clone(),
            levels: self.levels.clone(),
            pools,
            last_timestamp: vec![Timestamp::UNSET; topology.streams.len()],
            bounds: vec![Timestamp::PRE_STREAM; topology.streams.len()],
            sync,
            sync_consumers,
            open_inputs: topology.graph_inputs.iter().copied().collect(),
            topology,
            registry: self.registry.clone(),
            pollers,
            events: event_rx,
            running: self.running.clone(),
            output_side_packets: self.output_side_packets.clone(),
        };

        self.running.store(true, Ordering::Relaxed);
        let handle = std::thread::Builder::new()
            .name("graphlink-scheduler".to_string())
            .spawn(move || scheduler.run(started_tx))
            .inspect_err(|_| self.running.store(false, Ordering::Relaxed))?;

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                self.state = GraphState::Done;
                tracing::error!("Graph start failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                self.state = GraphState::Done;
                return Err(match handle.join() {
                    Ok(Err(e)) => e,
                    _ => GraphError::ThreadPanicked,
                });
            }
        }

        self.input_tx = Some(event_tx);
        self.scheduler = Some(handle);
        self.state = GraphState::Running;
        tracing::info!("Graph started");
        Ok(())
    }

    fn sender(&self) -> GraphResult<&Sender<SchedulerEvent>> {
        match (self.state, &self.input_tx) {
            (GraphState::Running, Some(tx)) => Ok(tx),
            _ => Err(GraphError::NotRunning),
        }
    }

    /// Feed `packet` into the graph input `stream`. Each timestamp must be at
    /// or after the previous packet's next allowed timestamp, so nothing may
    /// follow a `PRE_STREAM` or `POST_STREAM` packet.
    pub fn add_packet_to_input_stream(&mut self, stream: &str, packet: Packet) -> GraphResult<()> {
        self.sender()?;
        let input = self
            .input_streams
            .get_mut(stream)
            .ok_or_else(|| GraphError::UnknownInputStream(stream.to_string()))?;
        if input.closed {
            return Err(GraphError::InputStreamClosed(stream.to_string()));
        }

        let timestamp = packet.timestamp();
        check_order(stream, input.last, timestamp)?;
        input.last = timestamp;
        let id = input.id;

        self.sender()?
            .send(SchedulerEvent::Packet(id, packet))
            .map_err(|_| GraphError::ChannelSend)
    }

    pub fn close_input_stream(&mut self, stream: &str) -> GraphResult<()> {
        self.sender()?;
        let input = self
            .input_streams
            .get_mut(stream)
            .ok_or_else(|| GraphError::UnknownInputStream(stream.to_string()))?;
        if input.closed {
            return Err(GraphError::InputStreamClosed(stream.to_string()));
        }
        input.closed = true;
        let id = input.id;
        tracing::debug!("Closing input stream '{}'", stream);

        self.sender()?
            .send(SchedulerEvent::Close(id))
            .map_err(|_| GraphError::ChannelSend)
    }

    pub fn close_all_input_streams(&mut self) -> GraphResult<()> {
        self.sender()?;
        for input in self.input_streams.values_mut() {
            input.closed = true;
        }
        tracing::debug!("Closing all input streams");
        self.sender()?
            .send(SchedulerEvent::CloseAll)
            .map_err(|_| GraphError::ChannelSend)
    }

    /// Block until the scheduler has closed every calculator. Returns the
    /// first error the run hit.
    ///
    /// The run only ends once every input stream is closed; call
    /// [`close_all_input_streams`](Self::close_all_input_streams) first.
    pub fn wait_until_done(&mut self) -> GraphResult<()> {
        match self.state {
            GraphState::Done => return Ok(()),
            GraphState::Running => {}
            _ => return Err(GraphError::NotRunning),
        }

        let result = match self.scheduler.take() {
            Some(handle) => handle.join().unwrap_or(Err(GraphError::ThreadPanicked)),
            None => Ok(()),
        };
        self.input_tx = None;
        self.state = GraphState::Done;
        tracing::info!("Graph done");
        result
    }

    /// A side packet produced by a node during the run. Available once the
    /// run is done.
    pub fn output_side_packet(&self, name: &str) -> GraphResult<SidePacketValue> {
        if self.state != GraphState::Done {
            return Err(GraphError::NotDone);
        }
        self.output_side_packets
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownOutputSidePacket(name.to_string()))
    }

    /// Names listed under `output_side_packet` in the graph config.
    pub fn declared_output_side_packets(&self) -> &[String] {
        &self.declared_side_outputs
    }
}

impl GraphHandle for PacketGraph {
    fn packet_creator(&self) -> PacketCreator {
        self.creator
    }

    fn set_input_side_packets(&mut self, bundle: SidePacketBundle) -> GraphResult<()> {
        PacketGraph::set_input_side_packets(self, bundle)
    }

    fn add_packet_callback(
        &mut self,
        stream: &str,
        callback: Arc<dyn PacketCallback>,
    ) -> GraphResult<()> {
        PacketGraph::add_packet_callback(self, stream, callback)
    }
}

impl Drop for PacketGraph {
    fn drop(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            // Dropping the sender closes every input stream.
            self.input_tx = None;
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for PacketGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketGraph")
            .field("state", &self.state)
            .field("nodes", &self.execution_order())
            .field("streams", &self.topology.streams)
            .finish()
    }
}

// ── Topological sort (Kahn's algorithm) ──

fn compute_execution_order(nodes: &[NodeSlot], topology: &Topology) -> GraphResult<Vec<usize>> {
    let n = nodes.len();
    let mut in_degree = vec![0u32; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (to, slot) in nodes.iter().enumerate() {
        for id in &slot.inputs {
            if let Some(Producer::Node(from)) = topology.producers[id.index()] {
                adj[from.index()].push(to);
                in_degree[to] += 1;
            }
        }
    }

    // Reverse seeding keeps independent nodes in config order.
    let mut queue: Vec<usize> = (0..n).rev().filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop() {
        order.push(node);
        for &next in adj[node].iter().rev() {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push(next);
            }
        }
    }

    if order.len() != n {
        tracing::warn!(
            "Graph has a cycle: only {} of {} nodes could be scheduled",
            order.len(),
            n
        );
        return Err(GraphError::CycleDetected);
    }

    Ok(order)
}

/// Bucket nodes by longest path from a graph input. Nodes in one level never
/// feed each other.
fn group_levels(order: &[usize], nodes: &[NodeSlot], topology: &Topology) -> Vec<Vec<usize>> {
    let mut depth = vec![0usize; nodes.len()];
    let mut levels: Vec<Vec<usize>> = Vec::new();
    for &idx in order {
        let level = nodes[idx]
            .inputs
            .iter()
            .filter_map(|id| match topology.producers[id.index()] {
                Some(Producer::Node(from)) => Some(depth[from.index()] + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        depth[idx] = level;
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(idx);
    }
    levels
}

/// Ordering rule shared by graph inputs and node outputs.
fn check_order(stream: &str, previous: Timestamp, current: Timestamp) -> GraphResult<()> {
    if !current.is_allowed_in_stream() {
        return Err(GraphError::TimestampNotAllowed {
            stream: stream.to_string(),
            timestamp: current,
        });
    }
    if previous != Timestamp::UNSET && current < previous.next_allowed_in_stream() {
        return Err(GraphError::TimestampOutOfOrder {
            stream: stream.to_string(),
            previous,
            current,
        });
    }
    Ok(())
}

// ── Scheduler thread ──

struct RunningNode {
    slot: NodeSlot,
    side_packets: Vec<SidePacketValue>,
    output_side_packets: Vec<Option<SidePacketValue>>,
}

/// What the scheduler reads about a node without locking it.
struct NodeWiring {
    name: String,
    inputs: Vec<StreamId>,
    outputs: Vec<StreamId>,
    handler: InputStreamHandler,
    executor: usize,
}

type PacketQueue = BTreeMap<Timestamp, Vec<(StreamId, Packet)>>;
type Emitted = Vec<(StreamId, Packet)>;
/// One `process` call: its timestamp and one packet per input.
type Invocation = (Timestamp, Vec<Packet>);
type Runs = Vec<(Timestamp, Emitted)>;

struct Scheduler {
    nodes: Vec<Arc<Mutex<RunningNode>>>,
    wiring: Vec<NodeWiring>,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
    /// One per executor; `None` runs on the scheduler thread.
    pools: Vec<Option<rayon::ThreadPool>>,
    topology: Arc<Topology>,
    last_timestamp: Vec<Timestamp>,
    /// Smallest timestamp each stream may still carry.
    bounds: Vec<Timestamp>,
    sync: Vec<Option<InputQueues>>,
    /// Synchronized `(node, port)` pairs fed by each stream.
    sync_consumers: Vec<Vec<(usize, usize)>>,
    registry: Arc<CallbackRegistry>,
    pollers: Vec<Vec<Sender<Packet>>>,
    events: Receiver<SchedulerEvent>,
    open_inputs: HashSet<StreamId>,
    running: Arc<AtomicBool>,
    output_side_packets: Arc<Mutex<HashMap<String, SidePacketValue>>>,
}

impl Scheduler {
    fn run(mut self, started: Sender<GraphResult<()>>) -> GraphResult<()> {
        tracing::debug!("Scheduler thread started");

        if let Err(e) = self.open_all() {
            self.running.store(false, Ordering::Relaxed);
            let _ = started.send(Err(e));
            // Reported through `started`.
            return Ok(());
        }
        let _ = started.send(Ok(()));

        let run_result = self.event_loop();
        if let Err(e) = &run_result {
            tracing::error!("Graph run failed: {}", e);
        }
        let close_result = self.close_all(run_result.is_ok());
        let result = run_result.and(close_result);

        self.publish_side_packets();
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!("Scheduler thread exiting");
        result
    }

    fn open_all(&mut self) -> GraphResult<()> {
        let mut queue = PacketQueue::new();
        for i in 0..self.order.len() {
            let idx = self.order[i];
            let emitted = invoke(
                &mut self.nodes[idx].lock(),
                Timestamp::UNSTARTED,
                &[],
                Phase::Open,
            )?;
            enqueue(&mut queue, emitted);
        }
        self.run_queue(queue)
    }

    fn event_loop(&mut self) -> GraphResult<()> {
        while !self.open_inputs.is_empty() {
            match self.events.recv() {
                Ok(SchedulerEvent::Packet(stream, packet)) => {
                    let mut queue = PacketQueue::new();
                    queue.insert(packet.timestamp(), vec![(stream, packet)]);
                    self.run_queue(queue)?;
                }
                Ok(SchedulerEvent::Close(stream)) => {
                    self.open_inputs.remove(&stream);
                    self.bounds[stream.index()] = Timestamp::DONE;
                    self.settle()?;
                }
                Ok(SchedulerEvent::CloseAll) => self.close_inputs()?,
                Err(_) => {
                    tracing::debug!("Input channel disconnected, closing all input streams");
                    self.close_inputs()?;
                }
            }
        }
        Ok(())
    }

    fn close_inputs(&mut self) -> GraphResult<()> {
        for stream in self.open_inputs.drain() {
            self.bounds[stream.index()] = Timestamp::DONE;
        }
        self.settle()
    }

    /// Close every calculator in execution order. A failing `close` does not
    /// stop the others; the first error is returned. Packets emitted while
    /// closing only flow on when nothing has failed.
    fn close_all(&mut self, run_ok: bool) -> GraphResult<()> {
        let mut result = Ok(());
        for i in 0..self.order.len() {
            let idx = self.order[i];
            let emitted = invoke(&mut self.nodes[idx].lock(), Timestamp::DONE, &[], Phase::Close);
            for stream in &self.wiring[idx].outputs {
                self.bounds[stream.index()] = Timestamp::DONE;
            }

            match emitted {
                Ok(emitted) if run_ok && result.is_ok() => {
                    let mut queue = PacketQueue::new();
                    enqueue(&mut queue, emitted);
                    if let Err(e) = self.run_queue(queue).and_then(|()| self.settle()) {
                        tracing::error!("Flushing after '{}' closed failed: {}", self.wiring[idx].name, e);
                        result = Err(e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Closing '{}' failed: {}", self.wiring[idx].name, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    fn run_queue(&mut self, mut queue: PacketQueue) -> GraphResult<()> {
        while let Some((timestamp, seeds)) = queue.pop_first() {
            self.run_wave(timestamp, seeds, &mut queue)?;
        }
        Ok(())
    }

    /// Run synchronized nodes whose inputs settled without a new packet.
    fn settle(&mut self) -> GraphResult<()> {
        if self.sync.iter().all(Option::is_none) {
            return Ok(());
        }
        let mut queue = PacketQueue::new();
        self.run_wave(Timestamp::UNSET, Vec::new(), &mut queue)?;
        self.run_queue(queue)
    }

    /// Publish `seeds` and run every node they make ready, level by level.
    /// Packets emitted at other timestamps go back on `queue`.
    fn run_wave(
        &mut self,
        timestamp: Timestamp,
        seeds: Emitted,
        queue: &mut PacketQueue,
    ) -> GraphResult<()> {
        let mut pending: HashMap<StreamId, Packet> = HashMap::new();
        for (stream, packet) in seeds {
            self.publish(stream, &packet)?;
            pending.insert(stream, packet);
        }

        for level in 0..self.levels.len() {
            let mut jobs = Vec::new();
            for i in 0..self.levels[level].len() {
                let idx = self.levels[level][i];
                let invocations = self.ready_invocations(idx, timestamp, &pending, queue);
                if !invocations.is_empty() {
                    jobs.push((idx, invocations));
                }
            }
            if jobs.is_empty() {
                continue;
            }

            for (idx, runs) in self.execute(jobs)? {
                // A node that also ran at other timestamps publishes through
                // the queue so its streams stay ordered.
                let deferred = runs.iter().any(|(at, _)| *at != timestamp);
                for (at, emitted) in runs {
                    self.advance_bounds(idx, at);
                    for (stream, packet) in emitted {
                        if !deferred && packet.timestamp() == timestamp {
                            self.publish(stream, &packet)?;
                            pending.insert(stream, packet);
                        } else {
                            queue
                                .entry(packet.timestamp())
                                .or_default()
                                .push((stream, packet));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The `process` calls node `idx` is ready for in this wave.
    fn ready_invocations(
        &mut self,
        idx: usize,
        timestamp: Timestamp,
        pending: &HashMap<StreamId, Packet>,
        queue: &PacketQueue,
    ) -> Vec<Invocation> {
        match self.wiring[idx].handler {
            InputStreamHandler::Immediate => {
                let wiring = &self.wiring[idx].inputs;
                let triggered = wiring
                    .iter()
                    .any(|s| pending.get(s).is_some_and(|p| !p.is_empty()));
                if !triggered {
                    return Vec::new();
                }
                let inputs = wiring
                    .iter()
                    .map(|s| {
                        pending
                            .get(s)
                            .cloned()
                            .unwrap_or_else(|| Packet::empty_at(timestamp))
                    })
                    .collect();
                vec![(timestamp, inputs)]
            }
            InputStreamHandler::Synchronized => {
                let bounds: Vec<Timestamp> = self.wiring[idx]
                    .inputs
                    .iter()
                    .map(|&s| self.stream_bound(s, queue))
                    .collect();
                let mut runs = Vec::new();
                if let Some(queues) = self.sync[idx].as_mut() {
                    while let Some(at) = queues.next_ready(&bounds) {
                        runs.push((at, queues.pop_set(at)));
                    }
                }
                runs
            }
        }
    }

    /// Smallest timestamp `stream` may still carry.
    ///
    /// A node output is bounded by the node's own inputs. Source nodes
    /// without inputs only emit from `open` and `close`.
    fn stream_bound(&self, stream: StreamId, queue: &PacketQueue) -> Timestamp {
        let tracked = self.bounds[stream.index()];
        let bound = match self.topology.producers[stream.index()] {
            Some(Producer::Node(node)) => {
                let inputs = &self.wiring[node.index()].inputs;
                let upstream = if inputs.is_empty() {
                    Timestamp::POST_STREAM
                } else {
                    inputs
                        .iter()
                        .map(|&s| self.stream_bound(s, queue))
                        .min()
                        .unwrap_or(Timestamp::DONE)
                };
                tracked.max(upstream)
            }
            _ => tracked,
        };
        // Queued packets are not published yet.
        queue
            .iter()
            .find(|(_, packets)| packets.iter().any(|(s, _)| *s == stream))
            .map_or(bound, |(&at, _)| bound.min(at))
    }

    /// After node `idx` processed at `at`, none of its outputs go below the
    /// next timestamp.
    fn advance_bounds(&mut self, idx: usize, at: Timestamp) {
        if !at.is_range_value() {
            return;
        }
        let next = at.next_allowed_in_stream();
        for stream in &self.wiring[idx].outputs {
            let bound = &mut self.bounds[stream.index()];
            *bound = (*bound).max(next);
        }
    }

    /// Run each job on its node's executor, or inline when that executor has
    /// no pool. Results come back in job order.
    fn execute(&self, jobs: Vec<(usize, Vec<Invocation>)>) -> GraphResult<Vec<(usize, Runs)>> {
        let ids: Vec<usize> = jobs.iter().map(|(idx, _)| *idx).collect();
        let mut results: Vec<Option<GraphResult<Runs>>> = Vec::with_capacity(jobs.len());
        results.resize_with(jobs.len(), || None);

        let (tx, rx) = unbounded();
        let mut inline = Vec::new();
        let mut spawned = 0;
        for (slot, (idx, invocations)) in jobs.into_iter().enumerate() {
            match self.pools.get(self.wiring[idx].executor).and_then(Option::as_ref) {
                Some(pool) => {
                    let node = Arc::clone(&self.nodes[idx]);
                    let tx = tx.clone();
                    pool.spawn(move || {
                        let _ = tx.send((slot, process_all(&node, invocations)));
                    });
                    spawned += 1;
                }
                None => inline.push((slot, idx, invocations)),
            }
        }
        drop(tx);

        for (slot, idx, invocations) in inline {
            results[slot] = Some(process_all(&self.nodes[idx], invocations));
        }
        for _ in 0..spawned {
            // Senders drop without a reply when a calculator panics.
            let (slot, result) = rx.recv().map_err(|_| GraphError::ThreadPanicked)?;
            results[slot] = Some(result);
        }

        ids.into_iter()
            .zip(results)
            .map(|(idx, result)| {
                let runs = result.ok_or(GraphError::ThreadPanicked)??;
                Ok((idx, runs))
            })
            .collect()
    }

    /// Check ordering on `stream` and hand `packet` to its observers.
    fn publish(&mut self, stream: StreamId, packet: &Packet) -> GraphResult<()> {
        let name = self.topology.name(stream);
        let timestamp = packet.timestamp();
        let last = &mut self.last_timestamp[stream.index()];
        check_order(name, *last, timestamp)?;
        *last = timestamp;
        let bound = &mut self.bounds[stream.index()];
        *bound = (*bound).max(timestamp.next_allowed_in_stream());

        if !packet.is_empty() {
            for &(node, port) in &self.sync_consumers[stream.index()] {
                if let Some(queues) = self.sync[node].as_mut() {
                    queues.push(port, packet.clone());
                }
            }
        }

        if self.topology.is_output[stream.index()] || self.registry.is_registered(name) {
            self.registry.dispatch(name, packet);
        }
        for tx in &self.pollers[stream.index()] {
            let _ = tx.send(packet.clone());
        }
        Ok(())
    }

    fn publish_side_packets(&self) {
        let mut published = self.output_side_packets.lock();
        for node in &self.nodes {
            let node = node.lock();
            for (spec, value) in node
                .slot
                .spec
                .output_side_packets
                .iter()
                .zip(&node.output_side_packets)
            {
                if let Some(value) = value {
                    published.insert(spec.name.clone(), value.clone());
                }
            }
        }
    }
}

/// Run one calculator hook and return what it emitted, mapped to stream ids.
fn invoke(
    node: &mut RunningNode,
    timestamp: Timestamp,
    inputs: &[Packet],
    phase: Phase,
) -> GraphResult<Emitted> {
    let mut outputs = Vec::new();
    let mut ctx = CalculatorContext::new(
        &node.slot.spec,
        timestamp,
        inputs,
        &node.side_packets,
        &mut outputs,
        &mut node.output_side_packets,
    );
    match phase {
        Phase::Open => node.slot.calculator.open(&mut ctx)?,
        Phase::Process => node.slot.calculator.process(&mut ctx)?,
        Phase::Close => node.slot.calculator.close(&mut ctx)?,
    }
    Ok(outputs
        .into_iter()
        .map(|(port, packet)| (node.slot.outputs[port], packet))
        .collect())
}

fn process_all(node: &Mutex<RunningNode>, invocations: Vec<Invocation>) -> GraphResult<Runs> {
    let mut node = node.lock();
    let mut runs = Vec::with_capacity(invocations.len());
    for (timestamp, inputs) in invocations {
        tracing::trace!("Processing '{}' at {}", node.slot.spec.name, timestamp);
        let emitted = invoke(&mut node, timestamp, &inputs, Phase::Process)?;
        runs.push((timestamp, emitted));
    }
    Ok(runs)
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Open,
    Process,
    Close,
}

fn enqueue(queue: &mut PacketQueue, emitted: Emitted) {
    for (stream, packet) in emitted {
        queue
            .entry(packet.timestamp())
            .or_default()
            .push((stream, packet));
    }
}
