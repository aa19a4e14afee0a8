//! Appel's iterated-coalescing register allocator (§4.H). Grounded on
//! `examples/original_source/src/register_allocation/allocation.py`.
//!
//! Two deliberate departures from that source: moves are identified by
//! their flow-graph [`NodeId`] instead of list-identity search, and the
//! spill rewrite collects edits by instruction position instead of
//! re-deriving each position with a linear `instructions.index(...)` scan.
//! Both are the same algorithm, expressed with owned indices rather than
//! value-identity lookups.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::frame::{all_registers, frame_pointer, Access, Frame};
use crate::isa::x86::asm::Instr;
use crate::isa::x86::registers::ALLOCATABLE_REGISTERS;
use crate::regalloc::flowgraph::{assembler_flow_graph, FlowGraph};
use crate::regalloc::graph::NodeId;
use crate::regalloc::liveness::{build_interference, Interference};
use crate::temp::{Temp, TempFactory, TempMap};

/// A degree large enough that a precolored temp never reaches `k - 1`
/// through ordinary decrements, mirroring the source's `999999` sentinel.
const HUGE_DEGREE: usize = 1_000_000;

pub struct AllocationResult {
    pub instructions: Vec<Instr>,
    pub coloring: HashMap<Temp, Temp>,
}

/// Runs iterated coalescing to a fixed point, rewriting and re-running
/// after every round that spills, per §4.H step 7.
pub fn allocate(
    factory: &mut TempFactory,
    map: &TempMap,
    frame: &mut Frame,
    instructions: Vec<Instr>,
) -> AllocationResult {
    let mut instructions = instructions;
    loop {
        let flow = assembler_flow_graph(instructions.clone());
        let interference = build_interference(&flow);
        let mut allocator = Allocator::new(map.clone(), &flow, interference);
        allocator.run();
        if allocator.spilled_nodes.is_empty() {
            return AllocationResult { instructions, coloring: allocator.color };
        }
        debug!("spilled {} temp(s), rewriting and re-allocating", allocator.spilled_nodes.len());
        instructions = allocator.rewrite_program(factory, frame, instructions);
    }
}

struct Allocator {
    k: usize,
    precolored: HashSet<Temp>,
    allocatable_colors: Vec<Temp>,
    initial: Vec<Temp>,

    simplify_worklist: VecDeque<Temp>,
    freeze_worklist: Vec<Temp>,
    spill_worklist: Vec<Temp>,
    spilled_nodes: Vec<Temp>,
    coalesced_nodes: Vec<Temp>,
    colored_nodes: Vec<Temp>,
    select_stack: Vec<Temp>,

    worklist_moves: VecDeque<NodeId>,
    active_moves: HashSet<NodeId>,
    coalesced_moves: Vec<NodeId>,
    constrained_moves: Vec<NodeId>,
    frozen_moves: Vec<NodeId>,
    move_endpoints: HashMap<NodeId, (Temp, Temp)>,

    adjacencies: HashSet<(Temp, Temp)>,
    adjacent_nodes: HashMap<Temp, Vec<Temp>>,
    node_degree: HashMap<Temp, usize>,

    move_list: HashMap<Temp, Vec<NodeId>>,
    alias: HashMap<Temp, Temp>,
    color: HashMap<Temp, Temp>,

    temp_uses: HashMap<Temp, Vec<NodeId>>,
    temp_definitions: HashMap<Temp, Vec<NodeId>>,
    map: TempMap,
}

impl Allocator {
    fn new(map: TempMap, flow: &FlowGraph, interference: Interference) -> Self {
        let allocatable_colors: Vec<Temp> = ALLOCATABLE_REGISTERS
            .iter()
            .map(|&name| map.temp_for(name).expect("allocatable register must be precolored"))
            .collect();
        let k = allocatable_colors.len();

        let precolored: HashSet<Temp> = all_registers()
            .iter()
            .map(|&name| map.temp_for(name).expect("register must be precolored"))
            .collect();

        let initial: Vec<Temp> = interference
            .temp_to_node
            .keys()
            .copied()
            .filter(|t| !precolored.contains(t))
            .collect();

        let mut adjacent_nodes: HashMap<Temp, Vec<Temp>> =
            initial.iter().map(|&t| (t, Vec::new())).collect();
        let mut node_degree: HashMap<Temp, usize> = HashMap::new();
        for &t in &initial {
            node_degree.insert(t, 0);
        }
        for &t in &precolored {
            node_degree.insert(t, HUGE_DEGREE);
        }

        let mut move_endpoints = HashMap::new();
        for &node in &interference.moves {
            let instr = &flow.graph.info(node).instr;
            let src = instr.sources()[0];
            let dst = instr.destinations()[0];
            move_endpoints.insert(node, (src, dst));
        }

        let mut color = HashMap::new();
        for &t in &precolored {
            color.insert(t, t);
        }

        let worklist_moves: VecDeque<NodeId> = interference.moves.iter().copied().collect();

        let mut allocator = Allocator {
            k,
            precolored,
            allocatable_colors,
            initial,
            simplify_worklist: VecDeque::new(),
            freeze_worklist: Vec::new(),
            spill_worklist: Vec::new(),
            spilled_nodes: Vec::new(),
            coalesced_nodes: Vec::new(),
            colored_nodes: Vec::new(),
            select_stack: Vec::new(),
            worklist_moves,
            active_moves: HashSet::new(),
            coalesced_moves: Vec::new(),
            constrained_moves: Vec::new(),
            frozen_moves: Vec::new(),
            move_endpoints,
            adjacencies: HashSet::new(),
            adjacent_nodes,
            node_degree,
            move_list: interference.move_list,
            alias: HashMap::new(),
            color,
            temp_uses: flow.temp_uses.clone(),
            temp_definitions: flow.temp_definitions.clone(),
            map,
        };

        let temp_to_node = interference.temp_to_node.clone();
        for (&temp, &node) in &temp_to_node {
            for succ in interference.graph.successors(node) {
                let neighbor = *interference.graph.info(succ);
                allocator.add_edge(temp, neighbor);
            }
        }

        allocator.make_worklist();
        allocator
    }

    fn make_worklist(&mut self) {
        for t in self.initial.clone() {
            let degree = self.node_degree[&t];
            if degree >= self.k {
                self.spill_worklist.push(t);
            } else if self.is_move_related(t) {
                self.freeze_worklist.push(t);
            } else {
                self.simplify_worklist.push_back(t);
            }
        }
    }

    fn node_moves(&self, t: Temp) -> Vec<NodeId> {
        self.move_list
            .get(&t)
            .into_iter()
            .flatten()
            .copied()
            .filter(|m| self.active_moves.contains(m) || self.worklist_moves.contains(m))
            .collect()
    }

    fn is_move_related(&self, t: Temp) -> bool {
        !self.node_moves(t).is_empty()
    }

    fn adjacent(&self, t: Temp) -> Vec<Temp> {
        self.adjacent_nodes
            .get(&t)
            .into_iter()
            .flatten()
            .copied()
            .filter(|n| !self.select_stack.contains(n) && !self.coalesced_nodes.contains(n))
            .collect()
    }

    fn add_edge(&mut self, a: Temp, b: Temp) {
        if a == b || self.adjacencies.contains(&(a, b)) {
            return;
        }
        self.adjacencies.insert((a, b));
        self.adjacencies.insert((b, a));
        if !self.precolored.contains(&a) {
            self.adjacent_nodes.entry(a).or_default().push(b);
            *self.node_degree.entry(a).or_insert(0) += 1;
        }
        if !self.precolored.contains(&b) {
            self.adjacent_nodes.entry(b).or_default().push(a);
            *self.node_degree.entry(b).or_insert(0) += 1;
        }
    }

    fn run(&mut self) {
        while !self.simplify_worklist.is_empty()
            || !self.worklist_moves.is_empty()
            || !self.freeze_worklist.is_empty()
            || !self.spill_worklist.is_empty()
        {
            if !self.simplify_worklist.is_empty() {
                self.simplify();
            } else if !self.worklist_moves.is_empty() {
                self.coalesce();
            } else if !self.freeze_worklist.is_empty() {
                self.freeze();
            } else if !self.spill_worklist.is_empty() {
                self.select_spill();
            }
        }
        self.assign_colors();
    }

    fn simplify(&mut self) {
        while let Some(node) = self.simplify_worklist.pop_front() {
            self.select_stack.push(node);
            for neighbor in self.adjacent(node) {
                self.decrement_degree(neighbor);
            }
        }
    }

    fn decrement_degree(&mut self, t: Temp) {
        let degree = self.node_degree.get_mut(&t).expect("degree must be tracked for every node");
        *degree -= 1;
        let new_degree = *degree;
        if new_degree == self.k - 1 {
            let mut to_enable = vec![t];
            to_enable.extend(self.adjacent(t));
            self.enable_moves(&to_enable);
            self.spill_worklist.retain(|&x| x != t);
            if self.is_move_related(t) {
                self.freeze_worklist.push(t);
            } else {
                self.simplify_worklist.push_back(t);
            }
        }
    }

    fn enable_moves(&mut self, nodes: &[Temp]) {
        for &t in nodes {
            for m in self.node_moves(t) {
                if self.active_moves.remove(&m) {
                    self.worklist_moves.push_back(m);
                }
            }
        }
    }

    fn coalesce(&mut self) {
        while let Some(m) = self.worklist_moves.pop_front() {
            let (src, dst) = self.move_endpoints[&m];
            let x = self.get_alias(src);
            let y = self.get_alias(dst);
            let (u, v) = if self.precolored.contains(&y) { (y, x) } else { (x, y) };

            if u == v {
                self.coalesced_moves.push(m);
                self.add_to_worklist(u);
            } else if self.precolored.contains(&v) || self.adjacencies.contains(&(u, v)) {
                self.constrained_moves.push(m);
                self.add_to_worklist(u);
                self.add_to_worklist(v);
            } else {
                let george = self.precolored.contains(&u)
                    && self.adjacent(v).into_iter().all(|t| self.precolored_coalesceable(t, u));
                let briggs = !self.precolored.contains(&u) && {
                    let mut nodes: HashSet<Temp> = self.adjacent(u).into_iter().collect();
                    nodes.extend(self.adjacent(v));
                    self.conservative_coalesceable(&nodes)
                };
                if george || briggs {
                    self.coalesced_moves.push(m);
                    self.combine(u, v);
                    self.add_to_worklist(u);
                } else {
                    self.active_moves.insert(m);
                }
            }
        }
    }

    fn add_to_worklist(&mut self, t: Temp) {
        if !self.precolored.contains(&t) && !self.is_move_related(t) && self.node_degree[&t] < self.k {
            self.freeze_worklist.retain(|&x| x != t);
            self.simplify_worklist.push_back(t);
        }
    }

    fn precolored_coalesceable(&self, t: Temp, precolored_node: Temp) -> bool {
        self.node_degree[&t] < self.k
            || self.precolored.contains(&t)
            || self.adjacencies.contains(&(t, precolored_node))
    }

    fn conservative_coalesceable(&self, nodes: &HashSet<Temp>) -> bool {
        nodes.iter().filter(|&&t| self.node_degree[&t] >= self.k).count() < self.k
    }

    fn get_alias(&self, mut t: Temp) -> Temp {
        while self.coalesced_nodes.contains(&t) {
            t = self.alias[&t];
        }
        t
    }

    fn combine(&mut self, u: Temp, v: Temp) {
        if self.freeze_worklist.contains(&v) {
            self.freeze_worklist.retain(|&x| x != v);
        } else {
            self.spill_worklist.retain(|&x| x != v);
        }
        self.coalesced_nodes.push(v);
        self.alias.insert(v, u);
        let v_moves = self.move_list.get(&v).cloned().unwrap_or_default();
        self.move_list.entry(u).or_default().extend(v_moves);
        for t in self.adjacent(v) {
            self.add_edge(t, u);
            self.decrement_degree(t);
        }
        if self.node_degree[&u] >= self.k && self.freeze_worklist.contains(&u) {
            self.freeze_worklist.retain(|&x| x != u);
            self.spill_worklist.push(u);
        }
    }

    fn freeze(&mut self) {
        while !self.freeze_worklist.is_empty() {
            let node = self.freeze_worklist.remove(0);
            self.simplify_worklist.push_back(node);
            self.freeze_moves(node);
        }
    }

    fn freeze_moves(&mut self, node: Temp) {
        for m in self.node_moves(node) {
            let (src, dst) = self.move_endpoints[&m];
            let x = self.get_alias(src);
            let y = self.get_alias(dst);
            let v = if self.get_alias(y) == self.get_alias(node) { self.get_alias(x) } else { self.get_alias(y) };
            self.active_moves.remove(&m);
            self.frozen_moves.push(m);
            if !self.is_move_related(v) && self.node_degree[&v] < self.k {
                self.freeze_worklist.retain(|&t| t != v);
                self.simplify_worklist.push_back(v);
            }
        }
    }

    fn select_spill(&mut self) {
        let spillable: Vec<Temp> =
            self.spill_worklist.iter().copied().filter(|t| !self.precolored.contains(t)).collect();
        let spilled = *spillable
            .iter()
            .min_by(|&&a, &&b| {
                self.spill_heuristic(a)
                    .partial_cmp(&self.spill_heuristic(b))
                    .expect("spill heuristic is never NaN")
            })
            .expect("select_spill requires a non-empty spill worklist");
        self.spill_worklist.retain(|&t| t != spilled);
        self.simplify_worklist.push_back(spilled);
        self.freeze_moves(spilled);
    }

    fn spill_heuristic(&self, t: Temp) -> f64 {
        let uses = self.temp_uses.get(&t).map_or(0, |v| v.len());
        let defs = self.temp_definitions.get(&t).map_or(0, |v| v.len());
        (uses + defs) as f64 / self.node_degree[&t] as f64
    }

    fn assign_colors(&mut self) {
        while let Some(node) = self.select_stack.pop() {
            let mut possible_colors = self.allocatable_colors.clone();
            let neighbors = self.adjacent_nodes.get(&node).cloned().unwrap_or_default();
            for neighbor in neighbors {
                let alias = self.get_alias(neighbor);
                if self.colored_nodes.contains(&alias) || self.precolored.contains(&alias) {
                    if let Some(&c) = self.color.get(&alias) {
                        possible_colors.retain(|&pc| pc != c);
                    }
                }
            }
            if possible_colors.is_empty() {
                self.spilled_nodes.push(node);
            } else {
                self.colored_nodes.push(node);
                self.color.insert(node, possible_colors[0]);
            }
        }
        for node in self.coalesced_nodes.clone() {
            let alias = self.get_alias(node);
            let c = self.color[&alias];
            self.color.insert(node, c);
        }
    }

    /// §4.H step 7: gives every spilled temp a fresh escaped frame slot,
    /// inserts a reload before each use and a store after each definition,
    /// and renames every occurrence to a fresh per-occurrence temp.
    fn rewrite_program(
        &mut self,
        factory: &mut TempFactory,
        frame: &mut Frame,
        instructions: Vec<Instr>,
    ) -> Vec<Instr> {
        let mut before: HashMap<usize, Vec<Instr>> = HashMap::new();
        let mut after: HashMap<usize, Vec<Instr>> = HashMap::new();
        let mut instructions = instructions;
        let fp = frame_pointer(&self.map);

        for &node in &self.spilled_nodes.clone() {
            let access = frame.alloc_local(factory, true);
            let offset = match access {
                Access::InFrame(offset) => offset,
                Access::InReg(_) => unreachable!("alloc_local(escape=true) always returns InFrame"),
            };

            if let Some(uses) = self.temp_uses.get(&node).cloned() {
                for use_node in uses {
                    let idx = use_node.index();
                    let new_temp = factory.new_temp();
                    replace_temp_in_sources(&mut instructions[idx], node, new_temp);
                    let fetch =
                        Instr::oper(format!("movq {offset}(%'s0), %'d0"), vec![fp], vec![new_temp], None);
                    before.entry(idx).or_default().push(fetch);
                }
            }
            if let Some(defs) = self.temp_definitions.get(&node).cloned() {
                for def_node in defs {
                    let idx = def_node.index();
                    let new_temp = factory.new_temp();
                    replace_temp_in_destinations(&mut instructions[idx], node, new_temp);
                    let store =
                        Instr::oper(format!("movq %'s0, {offset}(%'s1)"), vec![new_temp, fp], Vec::new(), None);
                    after.entry(idx).or_default().push(store);
                }
            }
        }

        let mut rewritten = Vec::with_capacity(instructions.len());
        for (idx, instr) in instructions.into_iter().enumerate() {
            if let Some(pre) = before.remove(&idx) {
                rewritten.extend(pre);
            }
            rewritten.push(instr);
            if let Some(post) = after.remove(&idx) {
                rewritten.extend(post);
            }
        }
        rewritten
    }
}

fn replace_temp_in_sources(instr: &mut Instr, old: Temp, new: Temp) {
    match instr {
        Instr::Oper { src, .. } => {
            for s in src.iter_mut() {
                if *s == old {
                    *s = new;
                }
            }
        }
        Instr::Move { src, .. } => {
            if *src == old {
                *src = new;
            }
        }
        Instr::Label { .. } => {}
    }
}

fn replace_temp_in_destinations(instr: &mut Instr, old: Temp, new: Temp) {
    match instr {
        Instr::Oper { dst, .. } => {
            for d in dst.iter_mut() {
                if *d == old {
                    *d = new;
                }
            }
        }
        Instr::Move { dst, .. } => {
            if *dst == old {
                *dst = new;
            }
        }
        Instr::Label { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_all_registers(factory: &mut TempFactory) -> TempMap {
        TempMap::initialize(factory, &all_registers())
    }

    #[test]
    fn two_independent_temps_get_distinct_colors() {
        let mut factory = TempFactory::new();
        let map = map_with_all_registers(&mut factory);
        let name = factory.new_label();
        let mut frame = Frame::new(&mut factory, name, &[]);
        let a = factory.new_temp();
        let b = factory.new_temp();
        let instructions = vec![
            Instr::oper("movq $1, %'d0", Vec::new(), vec![a], None),
            Instr::oper("movq $2, %'d0", Vec::new(), vec![b], None),
            Instr::oper("addq %'s0, %'d0", vec![a, b], vec![b], None),
        ];
        let result = allocate(&mut factory, &map, &mut frame, instructions);
        assert!(result.coloring.contains_key(&a));
        assert!(result.coloring.contains_key(&b));
        assert_ne!(result.coloring[&a], result.coloring[&b]);
    }

    #[test]
    fn a_move_between_otherwise_unconstrained_temps_coalesces_to_one_color() {
        let mut factory = TempFactory::new();
        let map = map_with_all_registers(&mut factory);
        let name = factory.new_label();
        let mut frame = Frame::new(&mut factory, name, &[]);
        let a = factory.new_temp();
        let b = factory.new_temp();
        let instructions = vec![
            Instr::oper("movq $1, %'d0", Vec::new(), vec![a], None),
            Instr::mov("movq %'s0, %'d0", a, b),
            Instr::oper("movq %'s0, %'d0", vec![b], vec![b], None),
        ];
        let result = allocate(&mut factory, &map, &mut frame, instructions);
        assert_eq!(result.coloring[&a], result.coloring[&b]);
    }

    #[test]
    fn precolored_registers_keep_their_own_identity_color() {
        let mut factory = TempFactory::new();
        let map = map_with_all_registers(&mut factory);
        let name = factory.new_label();
        let mut frame = Frame::new(&mut factory, name, &[]);
        let rax = map.temp_for("rax").unwrap();
        let instructions = vec![Instr::oper("movq %'s0, %'s0", vec![rax], Vec::new(), None)];
        let result = allocate(&mut factory, &map, &mut frame, instructions);
        assert_eq!(result.coloring[&rax], rax);
    }
}
