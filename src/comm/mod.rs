//! The in-process communication fabric.
//!
//! Ranks are OS threads of one process. Each rank talks to its peers through
//! a [`Communicator`]: buffered point-to-point messages matched on
//! `(source, tag)`, collectives layered on top of them, and one-sided
//! [`Window`]s over memory registered by every rank.

mod communicator;
mod fabric;
mod mailbox;
mod window;

pub use communicator::Communicator;
pub use fabric::Fabric;
pub use mailbox::Tag;
pub use window::{Window, WindowId};
