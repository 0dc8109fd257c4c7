//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → resolve the shutdown future
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed background loop exits after its current round
//! ```
//!
//! # Design Decisions
//! - Background loops never outlive their coordinator's trigger
//! - Ordered shutdown: stop serving, stop probing, exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
