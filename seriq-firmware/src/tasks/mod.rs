//! Embassy async tasks
//!
//! Both tasks drive the shared transport from foreground context.

pub mod echo;
pub mod matcher;

pub use echo::echo_task;
pub use matcher::match_task;
