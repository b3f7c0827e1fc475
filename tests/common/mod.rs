//! Shared method builders for the integration suite.
#![allow(dead_code)]

use dexflow::prelude::*;

/// Stand-in type reference for `java.lang.ArithmeticException`.
pub const ARITHMETIC_EXCEPTION: TypeRef = TypeRef(0x2A);

pub fn op(insn: Instruction) -> Item {
    Item::Opcode(insn)
}

pub fn konst(dest: u16, literal: i64) -> Item {
    op(Instruction::new(Opcode::Const)
        .with_dest(Register::new(dest))
        .with_literal(literal))
}

pub fn target(src: ItemId) -> Item {
    Item::Target(BranchTarget {
        src,
        case_key: None,
    })
}

pub fn case_target(src: ItemId, case_key: CaseKey) -> Item {
    Item::Target(BranchTarget {
        src,
        case_key: Some(case_key),
    })
}

/// S1: `const v0, 1; const v1, 2; add v2, v0, v1; return v2`
pub fn straight_line() -> IrList {
    let mut list = IrList::new();
    list.push_back(konst(0, 1));
    list.push_back(konst(1, 2));
    list.push_back(op(Instruction::new(Opcode::Add)
        .with_dest(Register::new(2))
        .with_src(Register::new(0))
        .with_src(Register::new(1))));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(2))));
    list
}

/// S2: `if-eq v0, v1, :taken; const v2, 0; goto :join; :taken const v2, 1; :join return v2`
pub fn if_else() -> IrList {
    let mut list = IrList::new();
    let branch = list.push_back(op(Instruction::new(Opcode::IfEq)
        .with_src(Register::new(0))
        .with_src(Register::new(1))));
    list.push_back(konst(2, 0));
    let goto = list.push_back(op(Instruction::new(Opcode::Goto)));
    list.push_back(target(branch));
    list.push_back(konst(2, 1));
    list.push_back(target(goto));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(2))));
    list
}

/// S3: a division wrapped in a try region with one arithmetic-exception handler.
pub fn try_catch_div() -> IrList {
    let mut list = IrList::new();
    list.push_back(konst(1, 10));
    list.push_back(konst(2, 2));
    let div = list.push_back(op(Instruction::new(Opcode::Div)
        .with_dest(Register::new(0))
        .with_src(Register::new(1))
        .with_src(Register::new(2))));
    let goto = list.push_back(op(Instruction::new(Opcode::Goto)));
    let catch = list.push_back(Item::Catch(CatchMarker {
        catch_type: Some(ARITHMETIC_EXCEPTION),
        next: None,
    }));
    list.push_back(konst(0, 0));
    list.push_back(target(goto));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(0))));
    list.insert_before(
        div,
        Item::Try(TryMarker {
            kind: TryKind::Start,
            catch_start: catch,
        }),
    );
    list.insert_after(
        div,
        Item::Try(TryMarker {
            kind: TryKind::End,
            catch_start: catch,
        }),
    );
    list
}

/// S4: `:here goto :here`
pub fn self_loop() -> IrList {
    let mut list = IrList::new();
    let goto = list.push_back(op(Instruction::new(Opcode::Goto)));
    list.push_front(target(goto));
    list
}

/// S5: `switch v0 {0: :a, 1: :b}; :a return v0; :b return v0`
pub fn switch_two_cases() -> IrList {
    let mut list = IrList::new();
    let switch = list.push_back(op(Instruction::new(Opcode::Switch).with_src(Register::new(0))));
    list.push_back(case_target(switch, 0));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(0))));
    list.push_back(case_target(switch, 1));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(0))));
    list
}

/// S6: an empty block sitting on the goto edge between two real blocks.
pub fn empty_block_between() -> IrList {
    let mut list = IrList::new();
    list.push_back(konst(0, 1));
    let goto_b = list.push_back(op(Instruction::new(Opcode::Goto)));
    let b_head = list.push_back(target(goto_b));
    let goto_c = list.insert_after(b_head, op(Instruction::new(Opcode::Goto)));
    list.push_back(target(goto_c));
    list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(0))));
    list
}
