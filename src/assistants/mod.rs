//! Wire types and endpoints of the Assistants API that the relay uses.

pub mod files;
pub mod messages;
pub mod runs;
pub mod threads;
