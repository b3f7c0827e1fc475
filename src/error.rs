use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! cfg_assert {
    ($cfg:expr, $cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("{}\n{}", format_args!($($arg)+), $cfg);
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only construction of a control flow graph can fail recoverably: the input instruction
/// stream may be empty or structurally malformed (for example a try-region start marker
/// that does not sit at a block head). Everything downstream of a successful construction
/// is governed by graph invariants, and a broken invariant is a bug in the caller or in
/// this library — those are reported by panicking with the offending block id and a dump
/// of the graph, never through this type.
///
/// # Examples
///
/// ```rust
/// use dexflow::{ControlFlowGraph, Error, IrList};
///
/// match ControlFlowGraph::from_ir(IrList::new(), 0) {
///     Err(Error::Empty) => {}
///     _ => unreachable!("an empty instruction list must be rejected"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input instruction list is damaged and a graph could not be built from it.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Provided instruction list was empty.
    ///
    /// A control flow graph needs at least one entry to anchor its entry block.
    #[error("Provided instruction list was empty")]
    Empty,
}
