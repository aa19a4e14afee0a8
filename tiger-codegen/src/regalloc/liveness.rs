//! Interference-graph construction from a flow graph (§4.G). Grounded on
//! `examples/original_source/src/liveness_analysis/liveness.py`, with moves
//! keyed by their flow-graph [`NodeId`] rather than Python's value-identity
//! list search.

use std::collections::{HashMap, HashSet};

use crate::regalloc::flowgraph::FlowGraph;
use crate::regalloc::graph::{Graph, NodeId};
use crate::temp::Temp;

pub struct Interference {
    pub graph: Graph<Temp>,
    pub temp_to_node: HashMap<Temp, NodeId>,
    /// For every temp, the flow-graph nodes of every move instruction that
    /// reads or writes it.
    pub move_list: HashMap<Temp, Vec<NodeId>>,
    /// Every move instruction's flow-graph node.
    pub moves: Vec<NodeId>,
}

/// Builds the undirected interference graph over every temp live anywhere
/// in `flow`. For a move with a single source and destination, the source
/// is excluded from the destination's interference with the move's
/// live-out set, so the coalescer may still merge them (§4.G).
pub fn build_interference(flow: &FlowGraph) -> Interference {
    let mut graph: Graph<Temp> = Graph::new();
    let mut temp_to_node = HashMap::new();
    let mut move_list: HashMap<Temp, Vec<NodeId>> = HashMap::new();
    let mut moves = Vec::new();

    let mut temporaries: HashSet<Temp> = HashSet::new();
    for node in flow.graph.node_ids() {
        let info = flow.graph.info(node);
        temporaries.extend(info.definitions.iter().copied());
        temporaries.extend(info.uses.iter().copied());
    }
    for &t in &temporaries {
        let node = graph.add_node(t);
        temp_to_node.insert(t, node);
    }

    for node in flow.graph.node_ids() {
        let info = flow.graph.info(node);
        if info.is_move() {
            moves.push(node);
            let dst = info.instr.destinations().first().copied();
            let src = info.instr.sources().first().copied();
            if let Some(d) = dst {
                move_list.entry(d).or_default().push(node);
            }
            if let Some(s) = src {
                move_list.entry(s).or_default().push(node);
            }
            if let Some(d) = dst {
                for &live in &info.live_out {
                    if Some(live) != src {
                        add_interference(&mut graph, &temp_to_node, d, live);
                    }
                }
            }
        } else {
            for &d in &info.definitions {
                for &live in &info.live_out {
                    add_interference(&mut graph, &temp_to_node, d, live);
                }
            }
        }
    }

    Interference { graph, temp_to_node, move_list, moves }
}

fn add_interference(graph: &mut Graph<Temp>, temp_to_node: &HashMap<Temp, NodeId>, a: Temp, b: Temp) {
    if a == b {
        return;
    }
    if let (Some(&na), Some(&nb)) = (temp_to_node.get(&a), temp_to_node.get(&b)) {
        graph.add_edge(na, nb);
        graph.add_edge(nb, na);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::x86::asm::Instr;
    use crate::regalloc::flowgraph::assembler_flow_graph;
    use crate::temp::TempFactory;

    #[test]
    fn definitions_interfere_with_simultaneously_live_temps() {
        let mut f = TempFactory::new();
        let a = f.new_temp();
        let b = f.new_temp();
        let d = f.new_temp();
        let instructions = vec![
            Instr::oper("movq $1, %'d0", Vec::new(), vec![a], None),
            Instr::oper("movq $2, %'d0", Vec::new(), vec![b], None),
            Instr::oper("addq %'s0, %'d0", vec![a, b], vec![d], None),
        ];
        let flow = assembler_flow_graph(instructions);
        let interference = build_interference(&flow);
        let na = interference.temp_to_node[&a];
        let nb = interference.temp_to_node[&b];
        assert!(interference.graph.successors(na).any(|n| n == nb));
    }

    #[test]
    fn a_move_does_not_interfere_with_its_own_source() {
        let mut f = TempFactory::new();
        let s = f.new_temp();
        let d = f.new_temp();
        let instructions = vec![Instr::mov("movq %'s0, %'d0", s, d)];
        let flow = assembler_flow_graph(instructions);
        let interference = build_interference(&flow);
        let ns = interference.temp_to_node[&s];
        let nd = interference.temp_to_node[&d];
        assert!(!interference.graph.successors(ns).any(|n| n == nd));
    }
}
