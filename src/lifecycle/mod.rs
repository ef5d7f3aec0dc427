//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → route_source (cache or registered, frozen)
//!     → Application::boot (signer, matcher, pipelines, generator)
//!     → start_background_tasks (signed URL GC)
//!
//! Shutdown (shutdown.rs):
//!     BackgroundTasks::shutdown → signal → join with deadline
//! ```

pub mod shutdown;
pub mod startup;

pub use shutdown::BackgroundTasks;
pub use startup::{route_source, Application, BootError, Collaborators};
