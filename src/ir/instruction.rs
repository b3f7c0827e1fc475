//! Instruction model for the register-based linear IR.
//!
//! The control flow layer never interprets what an instruction computes; it only consumes
//! the classification predicates defined here (branching, throwing, result pairing) plus
//! the register operands for width recomputation. The opcode set is therefore a
//! representative Dalvik-style selection, not a complete ISA.

use std::fmt;

/// A switch case key.
pub type CaseKey = i32;

/// An opaque reference into an external type pool.
///
/// Catch handlers carry an optional `TypeRef`; `None` at the catch site means a
/// catch-all handler. The CFG never resolves the reference, it only compares them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(
    /// Index into the external type pool.
    pub u32,
);

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef(0x{:X})", self.0)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t0x{:X}", self.0)
    }
}

/// A virtual register operand.
///
/// Wide registers (64-bit values) occupy the named register and the one after it,
/// which matters only for register-width recomputation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    /// The register number (`v0`, `v1`, ...).
    pub num: u16,
    /// Whether this operand occupies a register pair.
    pub wide: bool,
}

impl Register {
    /// Creates a normal-width register operand.
    #[must_use]
    pub const fn new(num: u16) -> Self {
        Register { num, wide: false }
    }

    /// Creates a wide (register pair) operand.
    #[must_use]
    pub const fn wide(num: u16) -> Self {
        Register { num, wide: true }
    }

    /// Returns the highest register number this operand touches.
    #[must_use]
    pub const fn highest(self) -> u16 {
        self.num + self.wide as u16
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wide {
            write!(f, "v{}:wide", self.num)
        } else {
            write!(f, "v{}", self.num)
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.num)
    }
}

/// Opcodes of the register-based IR, reduced to what control flow recovery needs.
///
/// The grouping mirrors how the builder consumes them: parameter loads are internal
/// pseudo-ops at the method head, `MoveResultPseudo` is the internal second half of
/// instructions that both define a register and may throw, and the branch family
/// drives block boundaries and edge installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    Nop,
    /// Internal parameter-loading pseudo-op.
    LoadParam,
    /// Internal wide parameter-loading pseudo-op.
    LoadParamWide,
    /// Load a literal constant.
    Const,
    /// Load a wide literal constant.
    ConstWide,
    /// Load a string reference. May throw; result arrives via `MoveResultPseudo`.
    ConstString,
    /// Register-to-register move.
    Move,
    /// Wide register-to-register move.
    MoveWide,
    /// Capture the result of the preceding invoke.
    MoveResult,
    /// Internal capture of the result of the preceding throwing definition.
    MoveResultPseudo,
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Integer division. Throws on division by zero.
    Div,
    /// Integer remainder. Throws on division by zero.
    Rem,
    /// Allocate an instance. May throw; result arrives via `MoveResultPseudo`.
    NewInstance,
    /// Runtime type check. May throw; result arrives via `MoveResultPseudo`.
    CheckCast,
    /// Method invocation. May throw; result arrives via `MoveResult`.
    Invoke,
    /// Array element load. May throw.
    Aget,
    /// Array element store. May throw.
    Aput,
    /// Monitor acquisition. May throw.
    MonitorEnter,
    /// Monitor release. May throw.
    MonitorExit,
    /// Unconditional branch.
    Goto,
    /// Branch if both sources are equal.
    IfEq,
    /// Branch if the sources differ.
    IfNe,
    /// Branch if less than.
    IfLt,
    /// Branch if greater or equal.
    IfGe,
    /// Branch if greater than.
    IfGt,
    /// Branch if less or equal.
    IfLe,
    /// Branch if the source is zero.
    IfEqz,
    /// Branch if the source is non-zero.
    IfNez,
    /// Multi-way branch keyed by the source value.
    Switch,
    /// Return a value.
    Return,
    /// Return without a value.
    ReturnVoid,
    /// Return a wide value.
    ReturnWide,
    /// Raise the exception held in the source register.
    Throw,
}

impl Opcode {
    /// Returns `true` for every opcode that transfers control to a branch target
    /// (unconditional gotos, conditional branches, and switches).
    #[must_use]
    pub const fn is_branch(self) -> bool {
        self.is_goto() || self.is_conditional_branch() || self.is_switch()
    }

    /// Returns `true` for the unconditional branch.
    #[must_use]
    pub const fn is_goto(self) -> bool {
        matches!(self, Opcode::Goto)
    }

    /// Returns `true` for two-way conditional branches.
    #[must_use]
    pub const fn is_conditional_branch(self) -> bool {
        matches!(
            self,
            Opcode::IfEq
                | Opcode::IfNe
                | Opcode::IfLt
                | Opcode::IfGe
                | Opcode::IfGt
                | Opcode::IfLe
                | Opcode::IfEqz
                | Opcode::IfNez
        )
    }

    /// Returns `true` for the multi-way branch.
    #[must_use]
    pub const fn is_switch(self) -> bool {
        matches!(self, Opcode::Switch)
    }

    /// Returns `true` for every return variant.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(self, Opcode::Return | Opcode::ReturnVoid | Opcode::ReturnWide)
    }

    /// Returns `true` for the explicit throw.
    #[must_use]
    pub const fn is_throw(self) -> bool {
        matches!(self, Opcode::Throw)
    }

    /// Returns `true` for the invoke-result capture.
    #[must_use]
    pub const fn is_move_result(self) -> bool {
        matches!(self, Opcode::MoveResult)
    }

    /// Returns `true` for the internal result capture paired with throwing definitions.
    #[must_use]
    pub const fn is_move_result_pseudo(self) -> bool {
        matches!(self, Opcode::MoveResultPseudo)
    }

    /// Returns `true` if executing this opcode can raise an exception.
    ///
    /// The explicit `Throw` is deliberately excluded; callers that care about
    /// "ends the block exceptionally" use [`Instruction::can_throw`] which ors
    /// both together.
    #[must_use]
    pub const fn may_throw(self) -> bool {
        matches!(
            self,
            Opcode::ConstString
                | Opcode::Div
                | Opcode::Rem
                | Opcode::NewInstance
                | Opcode::CheckCast
                | Opcode::Invoke
                | Opcode::Aget
                | Opcode::Aput
                | Opcode::MonitorEnter
                | Opcode::MonitorExit
        )
    }

    /// Returns `true` for pseudo-ops that exist only in this IR, never in emitted code.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(
            self,
            Opcode::LoadParam | Opcode::LoadParamWide | Opcode::MoveResultPseudo
        )
    }

    /// Returns `true` for the parameter-loading pseudo-ops at the method head.
    #[must_use]
    pub const fn is_load_param(self) -> bool {
        matches!(self, Opcode::LoadParam | Opcode::LoadParamWide)
    }

    /// Returns `true` if this opcode's result is delivered by a trailing
    /// `MoveResultPseudo` that must stay adjacent to it.
    #[must_use]
    pub const fn has_move_result_pseudo(self) -> bool {
        matches!(
            self,
            Opcode::ConstString | Opcode::NewInstance | Opcode::CheckCast
        )
    }
}

/// A decoded instruction of the linear IR.
///
/// Operand meaning is opaque to the control flow layer; `dest` and `srcs` exist so
/// the register width of a method can be recomputed after transformations, and
/// `literal` exists so tests and dumps stay readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation.
    pub opcode: Opcode,
    /// Destination register, if the instruction defines one.
    pub dest: Option<Register>,
    /// Source registers, in operand order.
    pub srcs: Vec<Register>,
    /// Attached literal value, for constant loads.
    pub literal: Option<i64>,
}

impl Instruction {
    /// Creates an instruction with no operands.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            dest: None,
            srcs: Vec::new(),
            literal: None,
        }
    }

    /// Sets the destination register.
    #[must_use]
    pub fn with_dest(mut self, dest: Register) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Appends a source register.
    #[must_use]
    pub fn with_src(mut self, src: Register) -> Self {
        self.srcs.push(src);
        self
    }

    /// Sets the literal payload.
    #[must_use]
    pub fn with_literal(mut self, literal: i64) -> Self {
        self.literal = Some(literal);
        self
    }

    /// Returns `true` if this instruction can leave the block exceptionally,
    /// either by an explicit throw or by a potentially-throwing operation.
    #[must_use]
    pub fn can_throw(&self) -> bool {
        self.opcode.is_throw() || self.opcode.may_throw()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode)?;
        if let Some(dest) = self.dest {
            write!(f, " {dest}")?;
        }
        for src in &self.srcs {
            write!(f, " {src}")?;
        }
        if let Some(literal) = self.literal {
            write!(f, " #{literal}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_classification() {
        assert!(Opcode::Goto.is_branch());
        assert!(Opcode::Goto.is_goto());
        assert!(!Opcode::Goto.is_conditional_branch());

        assert!(Opcode::IfEq.is_branch());
        assert!(Opcode::IfEq.is_conditional_branch());
        assert!(!Opcode::IfEq.is_goto());

        assert!(Opcode::Switch.is_branch());
        assert!(Opcode::Switch.is_switch());
        assert!(!Opcode::Switch.is_goto());

        assert!(!Opcode::Return.is_branch());
        assert!(!Opcode::Throw.is_branch());
        assert!(!Opcode::Add.is_branch());
    }

    #[test]
    fn test_throw_classification() {
        // The explicit throw is not part of may_throw.
        assert!(Opcode::Throw.is_throw());
        assert!(!Opcode::Throw.may_throw());

        assert!(Opcode::Div.may_throw());
        assert!(Opcode::Invoke.may_throw());
        assert!(!Opcode::Const.may_throw());
        assert!(!Opcode::Goto.may_throw());

        let throw = Instruction::new(Opcode::Throw).with_src(Register::new(0));
        assert!(throw.can_throw());
        let div = Instruction::new(Opcode::Div);
        assert!(div.can_throw());
        let add = Instruction::new(Opcode::Add);
        assert!(!add.can_throw());
    }

    #[test]
    fn test_internal_and_result_pairing() {
        assert!(Opcode::LoadParam.is_internal());
        assert!(Opcode::LoadParamWide.is_internal());
        assert!(Opcode::MoveResultPseudo.is_internal());
        assert!(!Opcode::MoveResult.is_internal());

        assert!(Opcode::CheckCast.has_move_result_pseudo());
        assert!(Opcode::NewInstance.has_move_result_pseudo());
        assert!(!Opcode::Invoke.has_move_result_pseudo());

        assert!(Opcode::MoveResult.is_move_result());
        assert!(Opcode::MoveResultPseudo.is_move_result_pseudo());
    }

    #[test]
    fn test_register_highest() {
        assert_eq!(Register::new(3).highest(), 3);
        assert_eq!(Register::wide(3).highest(), 4);
    }

    #[test]
    fn test_instruction_display() {
        let insn = Instruction::new(Opcode::Add)
            .with_dest(Register::new(2))
            .with_src(Register::new(0))
            .with_src(Register::new(1));
        assert_eq!(format!("{insn}"), "Add v2 v0 v1");

        let konst = Instruction::new(Opcode::Const)
            .with_dest(Register::new(0))
            .with_literal(7);
        assert_eq!(format!("{konst}"), "Const v0 #7");
    }
}
