//! Background tasks
//!
//! Long-running loops that drive the job service without a caller: the
//! periodic timeout sweep and the consumers of the notification topic and
//! the job-creation queue. Each loop stops when the shutdown signal flips.

pub mod intake;
pub mod listener;
pub mod sweeper;

pub use intake::JobRequestListener;
pub use listener::CompletionListener;
pub use sweeper::TimeoutSweeper;
