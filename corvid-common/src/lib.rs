pub mod destination;
pub mod logging;

pub use destination::Destination;
pub use tracing;

/// Process-level lifecycle signal, broadcast to every long-running task.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
