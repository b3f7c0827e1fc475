//! End-to-end scenarios over the public API: one method shape per test, checked
//! from construction through analysis.

mod common;

use common::*;
use dexflow::prelude::*;

#[test]
fn straight_line_method() {
    let mut cfg = ControlFlowGraph::from_ir(straight_line(), 3).unwrap();

    assert_eq!(cfg.num_blocks(), 1);
    let b0 = cfg.entry_block();
    assert_eq!(cfg.branchingness(b0), Branchingness::Return);
    assert_eq!(cfg.registers_size(), 3);

    cfg.calculate_exit_block();
    assert_eq!(cfg.exit_block(), Some(b0));

    let doms = cfg.immediate_dominators();
    assert_eq!(doms.immediate_dominator(b0), Some(b0));
}

#[test]
fn if_else_method() {
    let cfg = ControlFlowGraph::from_ir(if_else(), 3).unwrap();

    assert_eq!(cfg.num_blocks(), 4);
    let b0 = cfg.entry_block();

    // One taken edge, one fall-through edge.
    let branch = cfg.get_succ_edge_of_type(b0, EdgeType::Branch).unwrap();
    let goto = cfg.get_succ_edge_of_type(b0, EdgeType::Goto).unwrap();
    let taken = cfg.edge(branch).unwrap().target();
    let fallthrough = cfg.edge(goto).unwrap().target();
    assert_ne!(taken, fallthrough);

    // Both arms leave through a goto into the shared join.
    let join = cfg
        .edge(cfg.get_succ_edge_of_type(taken, EdgeType::Goto).unwrap())
        .unwrap()
        .target();
    let join2 = cfg
        .edge(cfg.get_succ_edge_of_type(fallthrough, EdgeType::Goto).unwrap())
        .unwrap()
        .target();
    assert_eq!(join, join2);
    assert_eq!(cfg.branchingness(join), Branchingness::Return);

    // The branch head dominates every other block.
    let doms = cfg.immediate_dominators();
    for block in [taken, fallthrough, join] {
        assert_eq!(doms.immediate_dominator(block), Some(b0));
    }

    // Linearizing elides the goto for whichever arm falls through to the join.
    let out = cfg.linearize();
    let gotos = out
        .iter()
        .filter(|(_, item)| item.insn().is_some_and(|i| i.opcode.is_goto()))
        .count();
    assert_eq!(gotos, 1);
}

#[test]
fn try_catch_method() {
    let cfg = ControlFlowGraph::from_ir(try_catch_div(), 3).unwrap();

    // The division block carries one throw edge with index 0 and the caught type.
    let div_block = cfg
        .block_ids()
        .into_iter()
        .find(|&b| {
            cfg.block_items(b)
                .any(|(_, item)| item.insn().is_some_and(|i| i.opcode == Opcode::Div))
        })
        .unwrap();
    let throws = cfg.get_succ_edges_of_type(div_block, EdgeType::Throw);
    assert_eq!(throws.len(), 1);
    let edge = cfg.edge(throws[0]).unwrap();
    assert_eq!(edge.kind().throw_index(), Some(0));
    assert_eq!(edge.kind().catch_type(), Some(ARITHMETIC_EXCEPTION));
    let handler = edge.target();
    assert!(cfg.is_catch(handler));

    // Linearizing recreates the region: a try-start before the division, a
    // try-end after it, and a catch entry at the handler.
    let out = cfg.linearize();
    let mut saw = Vec::new();
    for (_, item) in out.iter() {
        match item {
            Item::Try(marker) if marker.kind == TryKind::Start => saw.push("start"),
            Item::Try(marker) if marker.kind == TryKind::End => saw.push("end"),
            Item::Catch(marker) => {
                assert_eq!(marker.catch_type, Some(ARITHMETIC_EXCEPTION));
                saw.push("catch");
            }
            Item::Opcode(insn) if insn.opcode == Opcode::Div => saw.push("div"),
            _ => {}
        }
    }
    assert_eq!(saw, vec!["start", "div", "end", "catch"]);
}

#[test]
fn infinite_loop_method() {
    let mut cfg = ControlFlowGraph::from_ir(self_loop(), 0).unwrap();

    assert_eq!(cfg.num_blocks(), 1);
    let b0 = cfg.entry_block();
    assert!(cfg.has_succ(b0, b0, Some(EdgeType::Goto)));

    // The loop is the only exitless SCC, so its head is the lone candidate and
    // becomes the exit directly.
    cfg.calculate_exit_block();
    assert_eq!(cfg.exit_block(), Some(b0));
    assert_eq!(cfg.real_exit_blocks(true), vec![b0]);
}

#[test]
fn switch_method() {
    let cfg = ControlFlowGraph::from_ir(switch_two_cases(), 1).unwrap();

    let b0 = cfg.entry_block();
    let branches = cfg.get_succ_edges_of_type(b0, EdgeType::Branch);
    assert_eq!(branches.len(), 2);
    let mut keys: Vec<CaseKey> = branches
        .iter()
        .map(|&e| cfg.edge(e).unwrap().kind().case_key().unwrap())
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1]);

    // A switch is not a goto: the fall-through edge to the next block exists.
    assert!(cfg.get_succ_edge_of_type(b0, EdgeType::Goto).is_some());
    assert_eq!(cfg.branchingness(b0), Branchingness::Switch);
}

#[test]
fn empty_block_is_simplified_away() {
    // simplify() runs as part of construction: the goto-only block between the
    // two real ones must be gone, leaving a direct edge.
    let cfg = ControlFlowGraph::from_ir(empty_block_between(), 1).unwrap();

    assert_eq!(cfg.num_blocks(), 2);
    let a = cfg.entry_block();
    let goto = cfg.get_succ_edge_of_type(a, EdgeType::Goto).unwrap();
    let c = cfg.edge(goto).unwrap().target();
    assert_eq!(cfg.branchingness(c), Branchingness::Return);
}

#[test]
fn dot_dump_lists_every_edge() {
    let cfg = ControlFlowGraph::from_ir(if_else(), 3).unwrap();
    let dot = cfg.to_dot();

    assert!(dot.starts_with("digraph {"));
    assert!(dot.trim_end().ends_with('}'));
    let edge_lines = dot.lines().filter(|line| line.contains(" -> ")).count();
    assert_eq!(edge_lines, cfg.num_edges());
}

#[test]
fn deep_copy_is_structurally_identical() {
    let cfg = ControlFlowGraph::from_ir(try_catch_div(), 3).unwrap();
    let copy = cfg.deep_copy();

    assert_eq!(copy.num_blocks(), cfg.num_blocks());
    assert_eq!(copy.num_edges(), cfg.num_edges());
    assert_eq!(copy.entry_block(), cfg.entry_block());
    assert_eq!(copy.registers_size(), cfg.registers_size());
    copy.sanity_check();

    // The copy owns its entries: linearizing it must not disturb the original.
    let out = copy.linearize();
    assert!(!out.is_empty());
    cfg.sanity_check();
}
