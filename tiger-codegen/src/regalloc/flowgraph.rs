//! Assembler-level flow graph and the live-in/live-out dataflow fixed point
//! (§4.G). Grounded on
//! `examples/original_source/src/liveness_analysis/flow_graph.py`.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::isa::x86::asm::Instr;
use crate::regalloc::graph::{Graph, NodeId};
use crate::temp::{Label, Temp};

/// Per-instruction liveness bookkeeping: a flow-graph node's payload.
pub struct AssemblerInfo {
    pub instr: Instr,
    pub definitions: HashSet<Temp>,
    pub uses: HashSet<Temp>,
    pub live_in: HashSet<Temp>,
    pub live_out: HashSet<Temp>,
}

impl AssemblerInfo {
    fn new(instr: Instr) -> Self {
        let definitions = instr.destinations().iter().copied().collect();
        let uses = instr.sources().iter().copied().collect();
        AssemblerInfo { instr, definitions, uses, live_in: HashSet::new(), live_out: HashSet::new() }
    }

    pub fn is_move(&self) -> bool {
        self.instr.is_move()
    }

    fn is_jump(&self) -> bool {
        self.instr.jumps().is_some()
    }

    fn recompute_live_in(&mut self) {
        let live_out_minus_def: HashSet<Temp> = &self.live_out - &self.definitions;
        self.live_in = self.uses.union(&live_out_minus_def).copied().collect();
    }
}

pub struct FlowGraph {
    pub graph: Graph<AssemblerInfo>,
    pub temp_uses: HashMap<Temp, Vec<NodeId>>,
    pub temp_definitions: HashMap<Temp, Vec<NodeId>>,
}

/// Builds the flow graph for one procedure's instruction list and runs the
/// live-in/live-out fixed point to completion.
pub fn assembler_flow_graph(instructions: Vec<Instr>) -> FlowGraph {
    debug!("building flow graph from {} instruction(s)", instructions.len());
    let mut graph: Graph<AssemblerInfo> = Graph::new();
    let mut temp_uses: HashMap<Temp, Vec<NodeId>> = HashMap::new();
    let mut temp_definitions: HashMap<Temp, Vec<NodeId>> = HashMap::new();
    let mut label_nodes: HashMap<Label, NodeId> = HashMap::new();
    let mut nodes = Vec::with_capacity(instructions.len());

    for instr in instructions {
        let label = if let Instr::Label { label, .. } = &instr { Some(label.clone()) } else { None };
        let info = AssemblerInfo::new(instr);
        let node = graph.add_node(info);
        if let Some(label) = label {
            label_nodes.insert(label, node);
        }
        for &t in &graph.info(node).uses {
            temp_uses.entry(t).or_default().push(node);
        }
        for &t in &graph.info(node).definitions {
            temp_definitions.entry(t).or_default().push(node);
        }
        nodes.push(node);
    }

    for (i, &node) in nodes.iter().enumerate() {
        if graph.info(node).is_jump() {
            let targets: Vec<Label> = graph.info(node).instr.jumps().unwrap().to_vec();
            for target in targets {
                if let Some(&target_node) = label_nodes.get(&target) {
                    graph.add_edge(node, target_node);
                }
            }
        } else if let Some(&next) = nodes.get(i + 1) {
            graph.add_edge(node, next);
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &node in &nodes {
            let old_in = graph.info(node).live_in.clone();
            let old_out = graph.info(node).live_out.clone();

            let successors: Vec<NodeId> = graph.successors(node).collect();
            let new_out: HashSet<Temp> =
                successors.iter().flat_map(|&s| graph.info(s).live_in.clone()).collect();
            graph.info_mut(node).live_out = new_out;
            graph.info_mut(node).recompute_live_in();

            if graph.info(node).live_in != old_in || graph.info(node).live_out != old_out {
                changed = true;
            }
        }
    }

    FlowGraph { graph, temp_uses, temp_definitions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::TempFactory;

    #[test]
    fn live_in_excludes_definitions_covered_by_a_later_use() {
        let mut f = TempFactory::new();
        let t = f.new_temp();
        let d = f.new_temp();
        let instructions = vec![
            Instr::oper("movq $1, %'d0", Vec::new(), vec![t], None),
            Instr::oper("movq %'s0, %'d0", vec![t], vec![d], None),
        ];
        let flow = assembler_flow_graph(instructions);
        let first = flow.graph.node_ids().next().unwrap();
        assert!(flow.graph.info(first).live_out.contains(&t));
    }

    #[test]
    fn a_jump_instruction_has_no_fallthrough_successor() {
        let mut f = TempFactory::new();
        let l = f.new_label();
        let instructions =
            vec![Instr::oper("jmp 'j0", Vec::new(), Vec::new(), Some(vec![l.clone()]))];
        let flow = assembler_flow_graph(instructions);
        let only = flow.graph.node_ids().next().unwrap();
        assert_eq!(flow.graph.successors(only).count(), 0);
    }
}
