//! Cluster coordination: worker heartbeats and the master registry/proxy

pub mod beacon;
pub mod master;
pub mod registry;

pub use beacon::{Beacon, HeartbeatError};
pub use master::{MasterState, router as master_router};
pub use registry::WorkerRegistry;
