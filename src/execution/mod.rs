//! Run execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, EventSink, ExecutionEngine, ExecutionEvent};
pub use executor::{CellExecutor, ExecutionResult};
pub use scheduler::{CellScheduler, SchedulingStrategy};
