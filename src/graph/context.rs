//! The audio context: an arena of nodes, the edges between them, and the
//! audio clock that drives them.
//!
//! Nodes are addressed by generational [`NodeId`]s. Disconnecting a node
//! frees its slot and bumps the slot's generation, so any id still held for
//! it is rejected with [`GraphError::StaleNode`] instead of reaching a newer
//! node that reuses the slot.
//!
//! Sources (oscillators and buffer players) are scheduled on the audio
//! clock with [`AudioContext::start`] and [`AudioContext::stop`]. A source
//! is started at most once. When it ends the context queues an ended
//! notification, and if the source was registered with
//! [`AudioContext::free_on_end`] the whole one-shot group is freed once all
//! of its sources have ended.
//!
//! ```
//! use saavy_toys::dsp::oscillator::Waveform;
//! use saavy_toys::graph::{AudioContext, ParamKind};
//!
//! let mut audio = AudioContext::new(48_000.0);
//! let osc = audio.oscillator(Waveform::Saw, 110.0);
//! let env = audio.gain(0.0);
//! audio.chain(&[osc, env, audio.destination()]).unwrap();
//! audio.param(env, ParamKind::Gain).unwrap()
//!     .set_value_at_time(0.0, 0.0)
//!     .linear_ramp_to_value_at_time(0.3, 0.01)
//!     .linear_ramp_to_value_at_time(0.0, 0.1);
//! audio.start(osc, 0.0).unwrap();
//! audio.stop(osc, 0.1).unwrap();
//! audio.free_on_end(&[osc], &[env]).unwrap();
//!
//! let (mut l, mut r) = (vec![0.0; 9_600], vec![0.0; 9_600]);
//! audio.render(&mut l, &mut r);
//! assert_eq!(audio.live_nodes(), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::dsp::shaper::Curve;
use crate::graph::buffer::AudioBuffer;
use crate::graph::buffer_source::BufferSourceNode;
use crate::graph::filter::FilterNode;
use crate::graph::gain::GainNode;
use crate::graph::node::{AudioNode, Block, ParamKind, RenderCtx};
use crate::graph::oscillator::OscNode;
use crate::graph::panner::PannerNode;
use crate::graph::param::AudioParam;
use crate::graph::processor::{Processor, ProcessorNode};
use crate::graph::reverb::ReverbNode;
use crate::graph::shaper::ShaperNode;
use crate::RENDER_QUANTUM;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {0} has been disconnected")]
    StaleNode(NodeId),
    #[error("connecting {from} to {to} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },
    #[error("node {node} has no {param:?} parameter")]
    NoSuchParam { node: NodeId, param: ParamKind },
    #[error("node {0} is not a source")]
    NotASource(NodeId),
    #[error("source {0} was already started")]
    AlreadyStarted(NodeId),
    #[error("source {0} has not been started")]
    NotStarted(NodeId),
    #[error("node {node} is not a {expected}")]
    WrongKind { node: NodeId, expected: &'static str },
    #[error("the destination cannot be {0}")]
    Destination(&'static str),
}

pub enum NodeKind {
    Destination,
    Oscillator(OscNode),
    Gain(GainNode),
    Filter(FilterNode),
    Panner(PannerNode),
    Shaper(ShaperNode),
    BufferSource(BufferSourceNode),
    Reverb(ReverbNode),
    Processor(ProcessorNode),
}

impl NodeKind {
    fn node(&self) -> Option<&dyn AudioNode> {
        match self {
            NodeKind::Destination => None,
            NodeKind::Oscillator(n) => Some(n),
            NodeKind::Gain(n) => Some(n),
            NodeKind::Filter(n) => Some(n),
            NodeKind::Panner(n) => Some(n),
            NodeKind::Shaper(n) => Some(n),
            NodeKind::BufferSource(n) => Some(n),
            NodeKind::Reverb(n) => Some(n),
            NodeKind::Processor(n) => Some(n),
        }
    }

    fn node_mut(&mut self) -> Option<&mut dyn AudioNode> {
        match self {
            NodeKind::Destination => None,
            NodeKind::Oscillator(n) => Some(n),
            NodeKind::Gain(n) => Some(n),
            NodeKind::Filter(n) => Some(n),
            NodeKind::Panner(n) => Some(n),
            NodeKind::Shaper(n) => Some(n),
            NodeKind::BufferSource(n) => Some(n),
            NodeKind::Reverb(n) => Some(n),
            NodeKind::Processor(n) => Some(n),
        }
    }

    fn is_source(&self) -> bool {
        matches!(self, NodeKind::Oscillator(_) | NodeKind::BufferSource(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Destination => "destination",
            NodeKind::Oscillator(_) => "oscillator",
            NodeKind::Gain(_) => "gain",
            NodeKind::Filter(_) => "filter",
            NodeKind::Panner(_) => "panner",
            NodeKind::Shaper(_) => "wave shaper",
            NodeKind::BufferSource(_) => "buffer source",
            NodeKind::Reverb(_) => "reverb",
            NodeKind::Processor(_) => "processor",
        }
    }
}

/// Audio-clock schedule of a source node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SourceTimes {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub ended: bool,
}

struct Entry {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    param_inputs: Vec<(ParamKind, NodeId)>,
    source: Option<SourceTimes>,
    group: Option<u64>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Nodes freed together once every source in `sources` has ended.
struct Group {
    sources: Vec<NodeId>,
    members: Vec<NodeId>,
}

pub struct AudioContext {
    sample_rate: f32,
    frame: u64,
    slots: Vec<Slot>,
    outputs: Vec<Block>,
    free: Vec<u32>,
    order: Vec<u32>,
    order_dirty: bool,
    groups: HashMap<u64, Group>,
    next_group: u64,
    ended: Vec<NodeId>,
    finished: Vec<NodeId>,
    scratch: Box<Block>,
    destination: NodeId,
}

impl AudioContext {
    pub fn new(sample_rate: f32) -> Self {
        let destination = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            sample_rate,
            frame: 0,
            slots: vec![Slot {
                generation: 0,
                entry: Some(Entry {
                    kind: NodeKind::Destination,
                    inputs: Vec::new(),
                    param_inputs: Vec::new(),
                    source: None,
                    group: None,
                }),
            }],
            outputs: vec![Block::silent()],
            free: Vec::new(),
            order: vec![0],
            order_dirty: false,
            groups: HashMap::new(),
            next_group: 0,
            ended: Vec::new(),
            finished: Vec::new(),
            scratch: Box::new(Block::silent()),
            destination,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Audio-clock time in seconds, derived from the frames rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Nodes currently alive, not counting the destination.
    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count() - 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_ok()
    }

    pub fn kind_name(&self, id: NodeId) -> Result<&'static str, GraphError> {
        Ok(self.entry(id)?.kind.name())
    }

    // ---------------------------------------------------------------------
    // Node construction

    pub fn oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        let node = OscNode::new(waveform, frequency, self.sample_rate);
        self.insert(NodeKind::Oscillator(node))
    }

    pub fn gain(&mut self, gain: f32) -> NodeId {
        self.insert(NodeKind::Gain(GainNode::new(gain)))
    }

    pub fn filter(&mut self, filter_type: FilterType, cutoff_hz: f32, q: f32) -> NodeId {
        let node = FilterNode::new(filter_type, cutoff_hz, q, self.sample_rate);
        self.insert(NodeKind::Filter(node))
    }

    pub fn panner(&mut self, pan: f32) -> NodeId {
        self.insert(NodeKind::Panner(PannerNode::new(pan)))
    }

    pub fn shaper(&mut self, curve: Curve) -> NodeId {
        self.insert(NodeKind::Shaper(ShaperNode::new(curve)))
    }

    pub fn buffer_source(&mut self, buffer: AudioBuffer) -> NodeId {
        self.insert(NodeKind::BufferSource(BufferSourceNode::new(buffer)))
    }

    pub fn reverb(&mut self) -> NodeId {
        let node = ReverbNode::new(self.sample_rate);
        self.insert(NodeKind::Reverb(node))
    }

    pub fn processor(&mut self, processor: Box<dyn Processor>) -> NodeId {
        self.insert(NodeKind::Processor(ProcessorNode::new(processor)))
    }

    fn insert(&mut self, mut kind: NodeKind) -> NodeId {
        let now = self.current_time();
        if let Some(params) = kind.node_mut().and_then(|n| n.params_mut()) {
            params.sync_time(now);
        }
        let entry = Entry {
            source: kind.is_source().then(SourceTimes::default),
            kind,
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            group: None,
        };

        self.order_dirty = true;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            self.outputs[index as usize].clear();
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            self.outputs.push(Block::silent());
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Wiring

    /// Route `from`'s output into `to`'s input.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        let entry = self.entry_mut(to)?;
        if !entry.inputs.contains(&from) {
            entry.inputs.push(from);
        }
        self.order_dirty = true;
        Ok(())
    }

    /// Route `from`'s output onto one of `to`'s parameters, where it is added
    /// to the parameter's own value at audio rate.
    pub fn connect_param(
        &mut self,
        from: NodeId,
        to: NodeId,
        param: ParamKind,
    ) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        let entry = self.entry_mut(to)?;
        let has_param = entry
            .kind
            .node()
            .and_then(|n| n.params())
            .is_some_and(|p| p.get(param).is_some());
        if !has_param {
            return Err(GraphError::NoSuchParam { node: to, param });
        }
        if !entry.param_inputs.contains(&(param, from)) {
            entry.param_inputs.push((param, from));
        }
        self.order_dirty = true;
        Ok(())
    }

    /// Connect each node to the next.
    pub fn chain(&mut self, nodes: &[NodeId]) -> Result<(), GraphError> {
        for pair in nodes.windows(2) {
            self.connect(pair[0], pair[1])?;
        }
        Ok(())
    }

    fn check_edge(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.entry(from)?;
        self.entry(to)?;
        if from == self.destination {
            return Err(GraphError::Destination("connected onward"));
        }
        if from == to || self.is_upstream(to, from) {
            return Err(GraphError::Cycle { from, to });
        }
        Ok(())
    }

    /// Whether `candidate` feeds `of`, directly or through other nodes.
    fn is_upstream(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut stack = vec![of];
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            let Ok(entry) = self.entry(id) else {
                continue;
            };
            for &input in entry
                .inputs
                .iter()
                .chain(entry.param_inputs.iter().map(|(_, id)| id))
            {
                if input == candidate {
                    return true;
                }
                if !seen.contains(&input) {
                    seen.push(input);
                    stack.push(input);
                }
            }
        }
        false
    }

    /// Free a node and every edge touching it.
    pub fn disconnect(&mut self, id: NodeId) -> Result<(), GraphError> {
        if id == self.destination {
            return Err(GraphError::Destination("disconnected"));
        }
        self.entry(id)?;
        self.free_node(id);
        Ok(())
    }

    /// Free whichever of `ids` are still alive. Returns how many were freed.
    pub fn release(&mut self, ids: &[NodeId]) -> usize {
        let mut freed = 0;
        for &id in ids {
            if id != self.destination && self.contains(id) {
                self.free_node(id);
                freed += 1;
            }
        }
        freed
    }

    fn free_node(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index as usize];
        let Some(entry) = slot.entry.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.order_dirty = true;
        trace!(node = %id, kind = entry.kind.name(), "freed node");

        for other in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            other.inputs.retain(|&input| input != id);
            other.param_inputs.retain(|&(_, input)| input != id);
        }

        let Some(group_id) = entry.group else {
            return;
        };
        let drained = match self.groups.get_mut(&group_id) {
            Some(group) => {
                group.sources.retain(|&s| s != id);
                group.members.retain(|&m| m != id);
                group.sources.is_empty()
            }
            None => false,
        };
        if drained {
            if let Some(group) = self.groups.remove(&group_id) {
                self.release(&group.members);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Source scheduling

    pub fn start(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        let times = self.source_mut(id)?;
        if times.start.is_some() {
            return Err(GraphError::AlreadyStarted(id));
        }
        times.start = Some(when.max(0.0));
        Ok(())
    }

    /// Start a buffer source `offset` seconds into its buffer.
    pub fn start_at(&mut self, id: NodeId, when: f64, offset: f64) -> Result<(), GraphError> {
        match &mut self.entry_mut(id)?.kind {
            NodeKind::BufferSource(node) => node.set_offset(offset),
            _ => {
                return Err(GraphError::WrongKind {
                    node: id,
                    expected: "buffer source",
                })
            }
        }
        self.start(id, when)
    }

    /// Make a buffer source wrap around its buffer instead of ending.
    pub fn set_loop(&mut self, id: NodeId, looping: bool) -> Result<(), GraphError> {
        match &mut self.entry_mut(id)?.kind {
            NodeKind::BufferSource(node) => {
                node.set_looping(looping);
                Ok(())
            }
            _ => Err(GraphError::WrongKind {
                node: id,
                expected: "buffer source",
            }),
        }
    }

    /// Schedule (or move) the stop time of a started source.
    pub fn stop(&mut self, id: NodeId, when: f64) -> Result<(), GraphError> {
        let times = self.source_mut(id)?;
        if times.start.is_none() {
            return Err(GraphError::NotStarted(id));
        }
        if !times.ended {
            times.stop = Some(when.max(0.0));
        }
        Ok(())
    }

    pub fn source_times(&self, id: NodeId) -> Result<SourceTimes, GraphError> {
        self.entry(id)?.source.ok_or(GraphError::NotASource(id))
    }

    /// Scheduled start of a live source, if it has been started.
    pub fn start_time(&self, id: NodeId) -> Option<f64> {
        self.entry(id).ok()?.source.as_ref()?.start
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut SourceTimes, GraphError> {
        self.entry_mut(id)?
            .source
            .as_mut()
            .ok_or(GraphError::NotASource(id))
    }

    /// Free `sources` and `members` together once every source has ended.
    /// Freeing all of the sources by hand frees the members too.
    pub fn free_on_end(&mut self, sources: &[NodeId], members: &[NodeId]) -> Result<(), GraphError> {
        for &id in sources {
            self.source_times(id)?;
        }
        for &id in members {
            self.entry(id)?;
        }

        let group_id = self.next_group;
        self.next_group += 1;
        for &id in sources.iter().chain(members) {
            self.entry_mut(id)?.group = Some(group_id);
        }
        self.groups.insert(
            group_id,
            Group {
                sources: sources.to_vec(),
                members: members.to_vec(),
            },
        );
        Ok(())
    }

    /// Sources that have ended since the last call.
    pub fn take_ended(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ended)
    }

    // ---------------------------------------------------------------------
    // Parameters

    pub fn param(&mut self, id: NodeId, param: ParamKind) -> Result<&mut AudioParam, GraphError> {
        self.entry_mut(id)?
            .kind
            .node_mut()
            .and_then(|n| n.params_mut())
            .and_then(|p| p.get_mut(param))
            .ok_or(GraphError::NoSuchParam { node: id, param })
    }

    pub fn param_ref(&self, id: NodeId, param: ParamKind) -> Result<&AudioParam, GraphError> {
        self.entry(id)?
            .kind
            .node()
            .and_then(|n| n.params())
            .and_then(|p| p.get(param))
            .ok_or(GraphError::NoSuchParam { node: id, param })
    }

    pub fn set_curve(&mut self, id: NodeId, curve: Curve) -> Result<(), GraphError> {
        match &mut self.entry_mut(id)?.kind {
            NodeKind::Shaper(node) => {
                node.set_curve(curve);
                Ok(())
            }
            _ => Err(GraphError::WrongKind {
                node: id,
                expected: "wave shaper",
            }),
        }
    }

    pub fn inputs(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        Ok(&self.entry(id)?.inputs)
    }

    fn entry(&self, id: NodeId) -> Result<&Entry, GraphError> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_ref())
            .ok_or(GraphError::StaleNode(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut Entry, GraphError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut())
            .ok_or(GraphError::StaleNode(id))
    }

    // ---------------------------------------------------------------------
    // Rendering

    /// Render the destination's output, advancing the audio clock by
    /// `left.len()` frames.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let total = left.len().min(right.len());
        let dest = self.destination.index as usize;
        let mut offset = 0;
        while offset < total {
            let frames = (total - offset).min(RENDER_QUANTUM);
            self.render_quantum(frames);
            let out = &self.outputs[dest];
            left[offset..offset + frames].copy_from_slice(&out.left[..frames]);
            right[offset..offset + frames].copy_from_slice(&out.right[..frames]);
            offset += frames;
        }
    }

    fn render_quantum(&mut self, frames: usize) {
        if self.order_dirty {
            self.rebuild_order();
        }

        let time = self.current_time();
        let sample_rate = self.sample_rate;
        let end_time = time + frames as f64 / sample_rate as f64;

        for k in 0..self.order.len() {
            let index = self.order[k] as usize;
            let slot = &mut self.slots[index];
            let generation = slot.generation;
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };

            let active = match &entry.source {
                Some(times) => active_range(times, time, sample_rate, frames),
                None => 0..frames,
            };

            if entry.source.is_some() && active.is_empty() {
                self.outputs[index].clear();
            } else {
                self.scratch.clear();
                for input in &entry.inputs {
                    self.scratch.mix_from(&self.outputs[input.index as usize], frames);
                }

                let ctx = RenderCtx {
                    sample_rate,
                    time,
                    frames,
                    active,
                };
                match entry.kind.node_mut() {
                    Some(node) => {
                        if let Some(params) = node.params_mut() {
                            params.render(&ctx);
                            for &(param, input) in &entry.param_inputs {
                                params.modulate(param, &self.outputs[input.index as usize], frames);
                            }
                        }
                        let out = &mut self.outputs[index];
                        out.clear();
                        node.process(&self.scratch, out, &ctx);
                    }
                    None => {
                        let out = &mut self.outputs[index];
                        out.clear();
                        out.mix_from(&self.scratch, frames);
                    }
                }
            }

            if let Some(times) = entry.source.as_mut() {
                if times.ended || times.start.is_none() {
                    continue;
                }
                let stopped = times.stop.is_some_and(|stop| stop <= end_time);
                let finished = entry.kind.node().is_some_and(|n| n.is_finished());
                if stopped || finished {
                    times.ended = true;
                    self.finished.push(NodeId {
                        index: index as u32,
                        generation,
                    });
                }
            }
        }

        self.frame += frames as u64;

        let mut finished = std::mem::take(&mut self.finished);
        for id in finished.drain(..) {
            self.ended.push(id);
            self.settle_group(id);
        }
        self.finished = finished;
    }

    /// Free a source's group once all of its sources have ended.
    fn settle_group(&mut self, id: NodeId) {
        let Some(group_id) = self.entry(id).ok().and_then(|e| e.group) else {
            return;
        };
        let Some(group) = self.groups.get(&group_id) else {
            return;
        };
        let all_ended = group.sources.iter().all(|&s| {
            self.entry(s)
                .ok()
                .and_then(|e| e.source)
                .map_or(true, |t| t.ended)
        });
        if all_ended {
            if let Some(group) = self.groups.remove(&group_id) {
                self.release(&group.sources);
                self.release(&group.members);
            }
        }
    }

    fn rebuild_order(&mut self) {
        let n = self.slots.len();
        let mut indegree = vec![0usize; n];
        let mut downstream: Vec<Vec<u32>> = vec![Vec::new(); n];

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(entry) = &slot.entry else {
                continue;
            };
            let deps = entry
                .inputs
                .iter()
                .chain(entry.param_inputs.iter().map(|(_, id)| id));
            for dep in deps {
                downstream[dep.index as usize].push(index as u32);
                indegree[index] += 1;
            }
        }

        let mut ready: VecDeque<u32> = (0..n)
            .filter(|&i| self.slots[i].entry.is_some() && indegree[i] == 0)
            .map(|i| i as u32)
            .collect();

        self.order.clear();
        while let Some(index) = ready.pop_front() {
            self.order.push(index);
            for &next in &downstream[index as usize] {
                indegree[next as usize] -= 1;
                if indegree[next as usize] == 0 {
                    ready.push_back(next);
                }
            }
        }
        self.order_dirty = false;
    }
}

/// Frames of this pass during which a source plays.
fn active_range(
    times: &SourceTimes,
    time: f64,
    sample_rate: f32,
    frames: usize,
) -> std::ops::Range<usize> {
    let Some(start) = times.start else {
        return 0..0;
    };
    if times.ended {
        return 0..0;
    }
    let to_frame = |t: f64| -> usize {
        if t <= time {
            0
        } else {
            (((t - time) * sample_rate as f64).ceil() as usize).min(frames)
        }
    };
    let first = to_frame(start);
    let last = times.stop.map_or(frames, to_frame);
    first..last.max(first)
}
