//! Coordinator and worker roles and the envelope channel between them.
pub mod channel;
pub mod coordinator;
pub mod protocol;
pub mod worker;

pub use channel::{
    MemoryChannel, MemoryHub, MessageChannel, TcpCoordinatorChannel, TcpWorkerChannel, memory_hub,
};
pub use coordinator::{Coordinator, WorkerRecord, WorkerTable};
pub use worker::{Worker, WorkerControl};
