//! Console output and the command line
//!
//! [`buffer`] keeps the capped line log with its scroll state, [`command_line`]
//! edits one input line and [`history`] remembers submissions.

pub mod buffer;
pub mod command_line;
pub mod history;
