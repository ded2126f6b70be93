// src/backend.rs
//
// The seam between the scheduler and the rendering graph.
//
// The scheduler never renders audio. It asks an `AudioBackend` for tone
// generators and output routes, and drives their parameters through
// automation. `CommandBackend` turns all of that into a flat command stream
// a host can replay onto its own audio graph.

use std::cell::RefCell;
use std::rc::Rc;

use crate::automation::{AutomatableParam, AutomationOp, DetachedParam};

/// Identifier of a node created through a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Oscillator shape requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn code(self) -> u32 {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Sawtooth => 2,
            Waveform::Triangle => 3,
        }
    }
}

/// Which parameter of a node an automation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Frequency,
    Gain,
}

impl ParamKind {
    pub fn code(self) -> u32 {
        match self {
            ParamKind::Frequency => 0,
            ParamKind::Gain => 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Node traits
// ═══════════════════════════════════════════════════════════════════

/// An oscillator with its own amplitude stage.
pub trait ToneGenerator {
    fn frequency_param(&mut self) -> Box<dyn AutomatableParam>;

    fn gain_param(&mut self) -> Box<dyn AutomatableParam>;

    fn start(&mut self);

    fn stop(&mut self);
}

/// Per-note output stage feeding the shared output bus.
pub trait OutputRoute {
    fn id(&self) -> NodeId;

    fn gain_param(&mut self) -> Box<dyn AutomatableParam>;

    fn disconnect(&mut self);
}

/// Factory for rendering-graph nodes.
pub trait AudioBackend {
    /// Create an output route connected to the shared output bus.
    fn route(&mut self) -> Box<dyn OutputRoute>;

    /// Create a tone generator feeding `route`.
    fn tone(&mut self, waveform: Waveform, route: NodeId) -> Box<dyn ToneGenerator>;
}

// ═══════════════════════════════════════════════════════════════════
// Silent backend
// ═══════════════════════════════════════════════════════════════════

/// Backend whose nodes go nowhere.
#[derive(Debug, Default)]
pub struct SilentBackend {
    next_id: u32,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

struct SilentNode(NodeId);

impl ToneGenerator for SilentNode {
    fn frequency_param(&mut self) -> Box<dyn AutomatableParam> {
        Box::new(DetachedParam)
    }

    fn gain_param(&mut self) -> Box<dyn AutomatableParam> {
        Box::new(DetachedParam)
    }

    fn start(&mut self) {}

    fn stop(&mut self) {}
}

impl OutputRoute for SilentNode {
    fn id(&self) -> NodeId {
        self.0
    }

    fn gain_param(&mut self) -> Box<dyn AutomatableParam> {
        Box::new(DetachedParam)
    }

    fn disconnect(&mut self) {}
}

impl AudioBackend for SilentBackend {
    fn route(&mut self) -> Box<dyn OutputRoute> {
        Box::new(SilentNode(self.allocate()))
    }

    fn tone(&mut self, _waveform: Waveform, _route: NodeId) -> Box<dyn ToneGenerator> {
        Box::new(SilentNode(self.allocate()))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Command stream backend
// ═══════════════════════════════════════════════════════════════════

/// One mutation of the host's rendering graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphCommand {
    /// Create a gain stage connected to the output bus.
    CreateRoute { node: NodeId },
    /// Create an oscillator + gain pair feeding `route`.
    CreateTone {
        node: NodeId,
        waveform: Waveform,
        route: NodeId,
    },
    Start { node: NodeId },
    Stop { node: NodeId },
    Disconnect { node: NodeId },
    Automate {
        node: NodeId,
        param: ParamKind,
        op: AutomationOp,
    },
}

/// Number of `f64` words in an encoded command.
pub const ENCODED_COMMAND_WORDS: usize = 6;

impl GraphCommand {
    /// Pack the command into fixed-width words for transfer across FFI.
    ///
    /// Layout: `[opcode, node, a, b, c, d]`, unused words are zero.
    ///
    /// | opcode | command                  | a        | b      | c      | d       |
    /// |--------|--------------------------|----------|--------|--------|---------|
    /// | 0      | CreateRoute              |          |        |        |         |
    /// | 1      | CreateTone               | waveform | route  |        |         |
    /// | 2      | Start                    |          |        |        |         |
    /// | 3      | Stop                     |          |        |        |         |
    /// | 4      | Disconnect               |          |        |        |         |
    /// | 10     | CancelScheduledValues    | param    | from   |        |         |
    /// | 11     | CancelAndHoldAtTime      | param    | time   |        |         |
    /// | 12     | SetValue                 | param    | value  |        |         |
    /// | 13     | SetValueAtTime           | param    | value  | time   |         |
    /// | 14     | LinearRampToValueAtTime  | param    | value  | time   |         |
    /// | 15     | SetTargetAtTime          | param    | target | start  | tau     |
    pub fn encode(&self) -> [f64; ENCODED_COMMAND_WORDS] {
        match *self {
            GraphCommand::CreateRoute { node } => [0.0, node.0 as f64, 0.0, 0.0, 0.0, 0.0],
            GraphCommand::CreateTone {
                node,
                waveform,
                route,
            } => [
                1.0,
                node.0 as f64,
                waveform.code() as f64,
                route.0 as f64,
                0.0,
                0.0,
            ],
            GraphCommand::Start { node } => [2.0, node.0 as f64, 0.0, 0.0, 0.0, 0.0],
            GraphCommand::Stop { node } => [3.0, node.0 as f64, 0.0, 0.0, 0.0, 0.0],
            GraphCommand::Disconnect { node } => [4.0, node.0 as f64, 0.0, 0.0, 0.0, 0.0],
            GraphCommand::Automate { node, param, op } => {
                let node = node.0 as f64;
                let param = param.code() as f64;
                match op {
                    AutomationOp::CancelScheduledValues { from } => {
                        [10.0, node, param, from, 0.0, 0.0]
                    }
                    AutomationOp::CancelAndHoldAtTime { time } => {
                        [11.0, node, param, time, 0.0, 0.0]
                    }
                    AutomationOp::SetValue { value } => [12.0, node, param, value, 0.0, 0.0],
                    AutomationOp::SetValueAtTime { value, time } => {
                        [13.0, node, param, value, time, 0.0]
                    }
                    AutomationOp::LinearRampToValueAtTime { value, time } => {
                        [14.0, node, param, value, time, 0.0]
                    }
                    AutomationOp::SetTargetAtTime {
                        target,
                        start,
                        time_constant,
                    } => [15.0, node, param, target, start, time_constant],
                }
            }
        }
    }
}

type CommandQueue = Rc<RefCell<Vec<GraphCommand>>>;

/// Backend that records graph mutations for the host to replay.
///
/// Clones share the same queue, so the host can keep one handle while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct CommandBackend {
    queue: CommandQueue,
    next_id: Rc<RefCell<u32>>,
}

impl CommandBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every command recorded since the last drain.
    pub fn drain(&self) -> Vec<GraphCommand> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    /// Take at most `max` commands, oldest first. The rest stay queued.
    pub fn drain_up_to(&self, max: usize) -> Vec<GraphCommand> {
        let mut queue = self.queue.borrow_mut();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Number of commands waiting to be drained.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn allocate(&self) -> NodeId {
        let mut next = self.next_id.borrow_mut();
        let id = NodeId(*next);
        *next += 1;
        id
    }

    fn push(&self, command: GraphCommand) {
        self.queue.borrow_mut().push(command);
    }
}

struct QueuedParam {
    node: NodeId,
    param: ParamKind,
    queue: CommandQueue,
}

impl AutomatableParam for QueuedParam {
    fn apply(&mut self, op: AutomationOp) {
        self.queue.borrow_mut().push(GraphCommand::Automate {
            node: self.node,
            param: self.param,
            op,
        });
    }
}

struct QueuedNode {
    node: NodeId,
    queue: CommandQueue,
}

impl QueuedNode {
    fn param(&self, param: ParamKind) -> Box<dyn AutomatableParam> {
        Box::new(QueuedParam {
            node: self.node,
            param,
            queue: self.queue.clone(),
        })
    }

    fn push(&self, command: GraphCommand) {
        self.queue.borrow_mut().push(command);
    }
}

impl ToneGenerator for QueuedNode {
    fn frequency_param(&mut self) -> Box<dyn AutomatableParam> {
        self.param(ParamKind::Frequency)
    }

    fn gain_param(&mut self) -> Box<dyn AutomatableParam> {
        self.param(ParamKind::Gain)
    }

    fn start(&mut self) {
        self.push(GraphCommand::Start { node: self.node });
    }

    fn stop(&mut self) {
        self.push(GraphCommand::Stop { node: self.node });
    }
}

impl OutputRoute for QueuedNode {
    fn id(&self) -> NodeId {
        self.node
    }

    fn gain_param(&mut self) -> Box<dyn AutomatableParam> {
        self.param(ParamKind::Gain)
    }

    fn disconnect(&mut self) {
        self.push(GraphCommand::Disconnect { node: self.node });
    }
}

impl AudioBackend for CommandBackend {
    fn route(&mut self) -> Box<dyn OutputRoute> {
        let node = self.allocate();
        self.push(GraphCommand::CreateRoute { node });
        Box::new(QueuedNode {
            node,
            queue: self.queue.clone(),
        })
    }

    fn tone(&mut self, waveform: Waveform, route: NodeId) -> Box<dyn ToneGenerator> {
        let node = self.allocate();
        self.push(GraphCommand::CreateTone {
            node,
            waveform,
            route,
        });
        Box::new(QueuedNode {
            node,
            queue: self.queue.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_backend_records_node_lifecycle() {
        let mut backend = CommandBackend::new();
        let host = backend.clone();

        let mut route = backend.route();
        let mut tone = backend.tone(Waveform::Sawtooth, route.id());
        tone.start();
        tone.gain_param().apply(AutomationOp::SetValue { value: 0.5 });
        tone.stop();
        route.disconnect();

        let commands = host.drain();
        assert_eq!(
            commands,
            vec![
                GraphCommand::CreateRoute { node: NodeId(0) },
                GraphCommand::CreateTone {
                    node: NodeId(1),
                    waveform: Waveform::Sawtooth,
                    route: NodeId(0),
                },
                GraphCommand::Start { node: NodeId(1) },
                GraphCommand::Automate {
                    node: NodeId(1),
                    param: ParamKind::Gain,
                    op: AutomationOp::SetValue { value: 0.5 },
                },
                GraphCommand::Stop { node: NodeId(1) },
                GraphCommand::Disconnect { node: NodeId(0) },
            ]
        );
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn partial_drain_keeps_the_remainder() {
        let mut backend = CommandBackend::new();
        let host = backend.clone();
        let route = backend.route();
        backend.tone(Waveform::Sine, route.id()).start();

        let first = host.drain_up_to(2);
        assert_eq!(first.len(), 2);
        assert_eq!(host.pending(), 1);
        assert_eq!(
            host.drain_up_to(10),
            vec![GraphCommand::Start { node: NodeId(1) }]
        );
        assert!(host.drain_up_to(10).is_empty());
    }

    #[test]
    fn encoding_is_fixed_width() {
        let command = GraphCommand::Automate {
            node: NodeId(7),
            param: ParamKind::Frequency,
            op: AutomationOp::SetTargetAtTime {
                target: 0.0,
                start: 1.0,
                time_constant: 0.3,
            },
        };
        assert_eq!(command.encode(), [15.0, 7.0, 0.0, 0.0, 1.0, 0.3]);

        let command = GraphCommand::CreateTone {
            node: NodeId(3),
            waveform: Waveform::Triangle,
            route: NodeId(2),
        };
        assert_eq!(command.encode(), [1.0, 3.0, 3.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn silent_backend_hands_out_distinct_ids() {
        let mut backend = SilentBackend::new();
        let a = backend.route();
        let b = backend.route();
        assert_ne!(a.id(), b.id());
    }
}
