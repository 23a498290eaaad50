//! Cycle graph: ordered function blocks wired to inputs, constants and
//! earlier blocks.
//!
//! Evaluation order is declaration order, so every block sees the outputs
//! its upstream blocks produced in the same cycle. Wiring is resolved to
//! indices once at build time; [`CycleGraph::execute`] does no lookups and
//! no allocation.
//!
//! Parameter changes from other threads go through [`ParamHandle`] and are
//! applied only at the cycle boundary by [`CycleGraph::apply_pending`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use plc_common::consts::MAX_FUNCTION_BLOCKS_LIMIT;
use plc_common::graph::{OutputConfig, SourceConfig};
use static_assertions::{assert_impl_all, const_assert};
use tracing::{debug, warn};

use crate::blocks::{Block, BlockKind, BlockParams, BlockState, BlockUpdate};
use crate::error::{BlockError, GraphError};
use crate::io::{InputImage, OutputImage, SignalImage};

/// Block declaration handed to [`CycleGraph::build`].
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub block: Block,
    /// Port name → source.
    pub inputs: BTreeMap<String, SourceConfig>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, block: impl Into<Block>) -> Self {
        Self {
            name: name.into(),
            block: block.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Wire `port` to `source`.
    pub fn input(mut self, port: impl Into<String>, source: SourceConfig) -> Self {
        self.inputs.insert(port.into(), source);
        self
    }
}

/// Resolved port source.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    External(usize),
    Block(usize),
    Constant(f64),
}

#[derive(Debug)]
struct ParamSlot {
    staged: Mutex<BlockParams>,
    dirty: AtomicBool,
    reset: AtomicBool,
}

/// Thread-safe handle for changing one block's parameters.
///
/// Updates are validated immediately and take effect at the next cycle
/// boundary.
#[derive(Debug, Clone)]
pub struct ParamHandle {
    name: Arc<str>,
    kind: BlockKind,
    slot: Arc<ParamSlot>,
}

assert_impl_all!(ParamHandle: Send, Sync);

impl ParamHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Last accepted parameter set, including updates not yet applied.
    pub fn params(&self) -> BlockParams {
        *self.slot.staged.lock()
    }

    /// Validate and stage a partial update.
    ///
    /// Returns the merged parameter set. On error nothing is staged.
    pub fn set_params(&self, update: BlockUpdate) -> Result<BlockParams, BlockError> {
        let mut staged = self.slot.staged.lock();
        let next = staged.merged(&update)?;
        *staged = next;
        self.slot.dirty.store(true, Ordering::Release);
        Ok(next)
    }

    /// Reset the block's internal state at the next cycle boundary.
    pub fn request_reset(&self) {
        self.slot.reset.store(true, Ordering::Release);
    }

    /// True while a parameter update or reset waits for the next cycle.
    pub fn is_pending(&self) -> bool {
        self.slot.dirty.load(Ordering::Acquire) || self.slot.reset.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Node {
    name: Arc<str>,
    block: Block,
    sources: Vec<Source>,
    slot: Arc<ParamSlot>,
}

#[derive(Debug, Clone)]
struct OutputBinding {
    block: usize,
    loopback: Option<usize>,
}

// Snapshot indices are stored as u16.
const_assert!(MAX_FUNCTION_BLOCKS_LIMIT <= u16::MAX as usize);

/// Per-block diagnostic snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSnapshot {
    /// Declaration index of the block.
    pub index: u16,
    pub output: f64,
    pub state: BlockState,
}

/// Result of one graph evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteReport {
    /// Blocks whose compute failed and held their previous output.
    pub faults: usize,
}

/// Ordered, validated block graph.
#[derive(Debug)]
pub struct CycleGraph {
    nodes: Vec<Node>,
    /// Latest output of each node, by declaration index.
    values: Vec<f64>,
    outputs: Vec<OutputBinding>,
    output_names: Vec<String>,
    executed: u64,
}

impl CycleGraph {
    /// Resolve wiring and validate the graph.
    ///
    /// `inputs` is the input image layout the graph will run against;
    /// external sources and loopbacks must name signals declared there.
    pub fn build(
        nodes: Vec<NodeSpec>,
        outputs: &[OutputConfig],
        inputs: &InputImage,
        max_blocks: usize,
    ) -> Result<Self, GraphError> {
        let limit = max_blocks.min(MAX_FUNCTION_BLOCKS_LIMIT);
        if nodes.len() > limit {
            return Err(GraphError::TooManyBlocks {
                count: nodes.len(),
                limit,
            });
        }

        let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
        let mut built = Vec::with_capacity(nodes.len());

        for (i, spec) in nodes.into_iter().enumerate() {
            if names[..i].contains(&spec.name) {
                return Err(GraphError::DuplicateBlock(spec.name));
            }

            let kind = spec.block.kind();
            if let Some(port) = spec
                .inputs
                .keys()
                .find(|p| !kind.ports().iter().any(|q| *q == p.as_str()))
            {
                return Err(GraphError::UnknownPort {
                    block: spec.name.clone(),
                    port: port.clone(),
                    kind,
                });
            }

            let mut sources = Vec::with_capacity(kind.ports().len());
            for &port in kind.ports() {
                let source = spec.inputs.get(port).ok_or_else(|| GraphError::UnwiredPort {
                    block: spec.name.clone(),
                    port,
                })?;
                sources.push(resolve_source(&spec.name, port, source, &names[..i], &names, inputs)?);
            }

            let params = spec.block.params();
            built.push(Node {
                name: Arc::from(spec.name.as_str()),
                block: spec.block,
                sources,
                slot: Arc::new(ParamSlot {
                    staged: Mutex::new(params),
                    dirty: AtomicBool::new(false),
                    reset: AtomicBool::new(false),
                }),
            });
        }

        let mut bindings = Vec::with_capacity(outputs.len());
        let mut output_names: Vec<String> = Vec::with_capacity(outputs.len());
        for out in outputs {
            if output_names.contains(&out.name) {
                return Err(GraphError::DuplicateOutput(out.name.clone()));
            }
            let block = names.iter().position(|n| *n == out.block).ok_or_else(|| {
                GraphError::UnknownOutputBlock {
                    output: out.name.clone(),
                    block: out.block.clone(),
                }
            })?;
            let loopback = match &out.loopback {
                Some(input) => Some(inputs.index_of(input).ok_or_else(|| {
                    GraphError::UnknownLoopback {
                        output: out.name.clone(),
                        input: input.clone(),
                    }
                })?),
                None => None,
            };
            bindings.push(OutputBinding { block, loopback });
            output_names.push(out.name.clone());
        }

        Ok(Self {
            values: vec![0.0; built.len()],
            nodes: built,
            outputs: bindings,
            output_names,
            executed: 0,
        })
    }

    /// Fresh output image matching this graph's outputs.
    pub fn output_image(&self) -> OutputImage {
        SignalImage::from_pairs(self.output_names.iter().map(|n| (n.as_str(), 0.0)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|n| &*n.name)
    }

    /// Parameter handle for a block.
    pub fn handle(&self, name: &str) -> Option<ParamHandle> {
        self.nodes.iter().find(|n| &*n.name == name).map(|n| ParamHandle {
            name: Arc::clone(&n.name),
            kind: n.block.kind(),
            slot: Arc::clone(&n.slot),
        })
    }

    /// Parameter handles for all blocks, in declaration order.
    pub fn handles(&self) -> Vec<ParamHandle> {
        self.nodes
            .iter()
            .map(|n| ParamHandle {
                name: Arc::clone(&n.name),
                kind: n.block.kind(),
                slot: Arc::clone(&n.slot),
            })
            .collect()
    }

    /// Latest output of a block.
    pub fn block_output(&self, name: &str) -> Option<f64> {
        self.nodes
            .iter()
            .position(|n| &*n.name == name)
            .map(|i| self.values[i])
    }

    /// Params currently in effect (staged updates excluded).
    pub fn block_params(&self, name: &str) -> Option<BlockParams> {
        self.nodes
            .iter()
            .find(|n| &*n.name == name)
            .map(|n| n.block.params())
    }

    pub fn block_state(&self, name: &str) -> Option<BlockState> {
        self.nodes
            .iter()
            .find(|n| &*n.name == name)
            .map(|n| n.block.state())
    }

    /// Apply staged parameter updates and reset requests.
    ///
    /// Call only at a cycle boundary. Returns `true` if anything changed.
    pub fn apply_pending(&mut self) -> bool {
        let mut applied = false;
        for node in &mut self.nodes {
            if node.slot.dirty.swap(false, Ordering::AcqRel) {
                let params = *node.slot.staged.lock();
                match node.block.set_params(BlockUpdate::from(params)) {
                    Ok(()) => {
                        debug!(block = %node.name, ?params, "parameters applied");
                        applied = true;
                    }
                    Err(e) => warn!(block = %node.name, error = %e, "staged parameters rejected"),
                }
            }
            if node.slot.reset.swap(false, Ordering::AcqRel) {
                node.block.reset();
                debug!(block = %node.name, "block reset");
                applied = true;
            }
        }
        applied
    }

    /// Evaluate every block once, in declaration order.
    ///
    /// Loopback outputs from the previous evaluation are written into
    /// `inputs` first. A block whose compute fails keeps its previous output
    /// and the remaining blocks still run.
    pub fn execute(
        &mut self,
        inputs: &mut InputImage,
        outputs: &mut OutputImage,
        dt: f64,
    ) -> ExecuteReport {
        if self.executed > 0 {
            for (k, binding) in self.outputs.iter().enumerate() {
                if let Some(target) = binding.loopback {
                    inputs.set_value(target, outputs.value(k));
                }
            }
        }

        let mut report = ExecuteReport::default();
        let mut port_values = [0.0; plc_common::consts::MAX_BLOCK_INPUTS];

        for i in 0..self.nodes.len() {
            let node = &mut self.nodes[i];
            let n = node.sources.len();
            for (slot, source) in port_values.iter_mut().zip(&node.sources) {
                *slot = match *source {
                    Source::External(idx) => inputs.value(idx),
                    Source::Block(idx) => self.values[idx],
                    Source::Constant(c) => c,
                };
            }
            match node.block.compute(&port_values[..n], dt) {
                Ok(v) => self.values[i] = v,
                Err(e) => {
                    report.faults += 1;
                    warn!(block = %node.name, error = %e, "block compute failed, holding previous output");
                }
            }
        }

        for (k, binding) in self.outputs.iter().enumerate() {
            outputs.set_value(k, self.values[binding.block]);
        }

        self.executed += 1;
        report
    }

    /// Append a snapshot of every block to `out`, up to its capacity.
    pub fn snapshot<const N: usize>(&self, out: &mut heapless::Vec<BlockSnapshot, N>) {
        for (i, node) in self.nodes.iter().enumerate() {
            let snap = BlockSnapshot {
                index: i as u16,
                output: self.values[i],
                state: node.block.state(),
            };
            if out.push(snap).is_err() {
                break;
            }
        }
    }
}

fn resolve_source(
    block: &str,
    port: &str,
    source: &SourceConfig,
    earlier: &[String],
    all: &[String],
    inputs: &InputImage,
) -> Result<Source, GraphError> {
    match source {
        SourceConfig::External(name) => {
            inputs
                .index_of(name)
                .map(Source::External)
                .ok_or_else(|| GraphError::UnknownInput {
                    block: block.to_string(),
                    port: port.to_string(),
                    input: name.clone(),
                })
        }
        SourceConfig::Block(name) => {
            if let Some(idx) = earlier.iter().position(|n| n == name) {
                Ok(Source::Block(idx))
            } else if all.contains(name) {
                Err(GraphError::ForwardReference {
                    block: block.to_string(),
                    port: port.to_string(),
                    source_block: name.clone(),
                })
            } else {
                Err(GraphError::UnknownSource {
                    block: block.to_string(),
                    port: port.to_string(),
                    source_block: name.clone(),
                })
            }
        }
        SourceConfig::Constant(c) if c.is_finite() => Ok(Source::Constant(*c)),
        SourceConfig::Constant(_) => Err(GraphError::InvalidConstant {
            block: block.to_string(),
            port: port.to_string(),
        }),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
