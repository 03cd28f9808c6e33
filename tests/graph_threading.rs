//! Executors and input stream handlers

mod common;

use common::builders::pass_through_graph;
use graphlink::config::{ExecutorConfig, GraphConfig, NodeConfig};
use graphlink::graph::{
    Calculator, CalculatorContext, CalculatorFactory, GraphError, GraphResult,
    InputStreamHandler, NodeSpec, PortDescriptor,
};
use graphlink::packet::Payload;
use graphlink::{GraphHandle, PacketGetter, PacketGraph, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;

static TAG_PORTS: &[PortDescriptor] = &[PortDescriptor::input(""), PortDescriptor::output("")];

/// Forwards its input and records the name of the thread it ran on.
struct ThreadTagCalculator {
    threads: Arc<Mutex<Vec<String>>>,
}

impl Calculator for ThreadTagCalculator {
    fn name(&self) -> &str {
        "ThreadTagCalculator"
    }

    fn ports(&self) -> &[PortDescriptor] {
        TAG_PORTS
    }

    fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        let name = std::thread::current().name().unwrap_or("unnamed").to_string();
        self.threads.lock().push(name);
        if let Some(packet) = ctx.input(0).cloned() {
            ctx.output(0, packet)?;
        }
        Ok(())
    }
}

static JOIN_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("").repeated(),
    PortDescriptor::output(""),
];

/// Emits the values of the non-empty inputs it was run with.
struct JoinCalculator;

impl Calculator for JoinCalculator {
    fn name(&self) -> &str {
        "JoinCalculator"
    }

    fn ports(&self) -> &[PortDescriptor] {
        JOIN_PORTS
    }

    fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        let values: Vec<f32> = (0..ctx.input_count())
            .filter_map(|port| ctx.input(port))
            .filter_map(|p| PacketGetter::get_float32(p).ok())
            .collect();
        ctx.output_payload(0, Payload::Float32Vec(values))
    }
}

/// Panics on the first packet.
struct PanicCalculator;

impl Calculator for PanicCalculator {
    fn name(&self) -> &str {
        "PanicCalculator"
    }

    fn ports(&self) -> &[PortDescriptor] {
        TAG_PORTS
    }

    fn process(&mut self, _ctx: &mut CalculatorContext) -> GraphResult<()> {
        panic!("calculator blew up");
    }
}

fn tagging_factory(tags: &[(&str, Arc<Mutex<Vec<String>>>)]) -> CalculatorFactory {
    let mut factory = CalculatorFactory::new();
    for (name, threads) in tags {
        let threads = threads.clone();
        factory.register(*name, move |_: &NodeSpec| {
            Ok(Box::new(ThreadTagCalculator {
                threads: threads.clone(),
            }) as Box<dyn Calculator>)
        });
    }
    factory.register("JoinCalculator", |_: &NodeSpec| {
        Ok(Box::new(JoinCalculator) as Box<dyn Calculator>)
    });
    factory.register("PanicCalculator", |_: &NodeSpec| {
        Ok(Box::new(PanicCalculator) as Box<dyn Calculator>)
    });
    factory
}

fn run_strings(graph: &mut PacketGraph, stream: &str, count: i64) {
    graph.start_run().unwrap();
    let creator = graph.packet_creator();
    for i in 0..count {
        let packet = creator.string_packet(format!("Threading. {}", i), Timestamp::new(i));
        graph.add_packet_to_input_stream(stream, packet).unwrap();
    }
    graph.close_all_input_streams().unwrap();
    graph.wait_until_done().unwrap();
}

#[test]
fn test_named_executors_run_their_nodes() {
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let factory = tagging_factory(&[("FirstTag", first.clone()), ("SecondTag", second.clone())]);

    let config = GraphConfig::new()
        .with_num_threads(2)
        .with_executor(ExecutorConfig::new("test0", 2))
        .with_executor(ExecutorConfig::new("test1", 2))
        .with_input_stream("in")
        .with_output_stream("out")
        .with_node(NodeConfig::new("FirstTag").input("in").output("mid").on_executor("test0"))
        .with_node(NodeConfig::new("SecondTag").input("mid").output("out").on_executor("test1"));
    let mut graph = PacketGraph::new(factory);
    graph.initialize(&config).unwrap();
    let poller = graph.add_output_stream_poller("out").unwrap();
    run_strings(&mut graph, "in", 4);

    let received: Vec<String> = poller
        .map(|p| PacketGetter::get_string(&p).unwrap())
        .collect();
    let expected: Vec<String> = (0..4).map(|i| format!("Threading. {}", i)).collect();
    assert_eq!(received, expected);

    let first = first.lock();
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(|t| t.starts_with("graphlink-test0-")), "{:?}", first);
    let second = second.lock();
    assert_eq!(second.len(), 4);
    assert!(second.iter().all(|t| t.starts_with("graphlink-test1-")), "{:?}", second);
}

#[test]
fn test_default_executor_threads() {
    let inline = Arc::new(Mutex::new(Vec::new()));
    let pooled = Arc::new(Mutex::new(Vec::new()));

    // One thread: calculators run on the scheduler thread.
    let config = |threads: usize| {
        GraphConfig::new()
            .with_num_threads(threads)
            .with_input_stream("in")
            .with_output_stream("left")
            .with_output_stream("right")
            .with_node(NodeConfig::new("Tag").input("in").output("left"))
            .with_node(NodeConfig::new("PassThroughCalculator").input("in").output("right"))
    };

    let mut results = Vec::new();
    for (threads, tags) in [(1, &inline), (3, &pooled)] {
        let mut graph = PacketGraph::new(tagging_factory(&[("Tag", tags.clone())]));
        graph.initialize(&config(threads)).unwrap();
        let left = graph.add_output_stream_poller("left").unwrap();
        let right = graph.add_output_stream_poller("right").unwrap();
        run_strings(&mut graph, "in", 5);
        let left: Vec<String> = left.map(|p| PacketGetter::get_string(&p).unwrap()).collect();
        let right: Vec<String> = right.map(|p| PacketGetter::get_string(&p).unwrap()).collect();
        results.push((left, right));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[1].0.len(), 5);
    assert!(inline.lock().iter().all(|t| t == "graphlink-scheduler"));
    assert!(pooled.lock().iter().all(|t| t.starts_with("graphlink-default-")));
}

#[test]
fn test_unknown_executor_rejected() {
    let config = pass_through_graph().with_node(
        NodeConfig::new("PassThroughCalculator")
            .input("out")
            .output("echo")
            .on_executor("gpu"),
    );
    assert!(matches!(
        PacketGraph::from_config(&config),
        Err(GraphError::UnknownExecutor { executor, .. }) if executor == "gpu"
    ));
}

#[test]
fn test_panicking_calculator_fails_run() {
    let config = GraphConfig::new()
        .with_executor(ExecutorConfig::new("worker", 1))
        .with_input_stream("in")
        .with_node(NodeConfig::new("PanicCalculator").input("in").output("out").on_executor("worker"));
    let mut graph = PacketGraph::new(tagging_factory(&[]));
    graph.initialize(&config).unwrap();
    graph.start_run().unwrap();

    let packet = graph.packet_creator().float32_packet(1.0, Timestamp::new(0));
    graph.add_packet_to_input_stream("in", packet).unwrap();
    let _ = graph.close_all_input_streams();
    assert!(matches!(graph.wait_until_done(), Err(GraphError::ThreadPanicked)));
}

fn join_graph(handler: InputStreamHandler) -> GraphConfig {
    GraphConfig::new()
        .with_input_stream("a")
        .with_input_stream("b")
        .with_output_stream("joined")
        .with_node(
            NodeConfig::new("JoinCalculator")
                .input("a")
                .input("b")
                .output("joined")
                .input_stream_handler(handler),
        )
}

#[test]
fn test_synchronized_handler_joins_inputs() {
    let mut graph = PacketGraph::new(tagging_factory(&[]));
    graph.initialize(&join_graph(InputStreamHandler::Synchronized)).unwrap();
    let poller = graph.add_output_stream_poller("joined").unwrap();
    graph.start_run().unwrap();

    let creator = graph.packet_creator();
    let sends = [("a", 1.0, 1), ("b", 10.0, 1), ("a", 2.0, 2), ("b", 30.0, 3)];
    for (stream, value, at) in sends {
        let packet = creator.float32_packet(value, Timestamp::new(at));
        graph.add_packet_to_input_stream(stream, packet).unwrap();
    }
    // `a` may still send at 3 until it is closed.
    graph.close_all_input_streams().unwrap();
    graph.wait_until_done().unwrap();

    let joined: Vec<(i64, Vec<f32>)> = poller
        .map(|p| (p.timestamp().value(), PacketGetter::get_float32_vector(&p).unwrap()))
        .collect();
    assert_eq!(
        joined,
        vec![(1, vec![1.0, 10.0]), (2, vec![2.0]), (3, vec![30.0])]
    );
}

#[test]
fn test_synchronized_handler_from_graph_default() {
    let config = GraphConfig::new()
        .with_input_stream_handler(InputStreamHandler::Synchronized)
        .with_input_stream("a")
        .with_input_stream("b")
        .with_output_stream("joined")
        .with_node(NodeConfig::new("JoinCalculator").input("a").input("b").output("joined"));
    let mut graph = PacketGraph::new(tagging_factory(&[]));
    graph.initialize(&config).unwrap();
    let poller = graph.add_output_stream_poller("joined").unwrap();
    graph.start_run().unwrap();

    let creator = graph.packet_creator();
    graph
        .add_packet_to_input_stream("a", creator.float32_packet(1.0, Timestamp::new(5)))
        .unwrap();
    graph
        .add_packet_to_input_stream("b", creator.float32_packet(2.0, Timestamp::new(5)))
        .unwrap();
    graph.close_all_input_streams().unwrap();
    graph.wait_until_done().unwrap();

    let joined: Vec<Vec<f32>> = poller
        .map(|p| PacketGetter::get_float32_vector(&p).unwrap())
        .collect();
    assert_eq!(joined, vec![vec![1.0, 2.0]]);
}

#[test]
fn test_immediate_handler_runs_per_packet() {
    let mut graph = PacketGraph::new(tagging_factory(&[]));
    graph.initialize(&join_graph(InputStreamHandler::Immediate)).unwrap();
    let poller = graph.add_output_stream_poller("joined").unwrap();
    graph.start_run().unwrap();

    let creator = graph.packet_creator();
    graph
        .add_packet_to_input_stream("a", creator.float32_packet(1.0, Timestamp::new(1)))
        .unwrap();
    graph
        .add_packet_to_input_stream("b", creator.float32_packet(10.0, Timestamp::new(2)))
        .unwrap();
    graph.close_all_input_streams().unwrap();
    graph.wait_until_done().unwrap();

    let joined: Vec<Vec<f32>> = poller
        .map(|p| PacketGetter::get_float32_vector(&p).unwrap())
        .collect();
    assert_eq!(joined, vec![vec![1.0], vec![10.0]]);
}
