//! Background parse jobs.

pub mod backend;
pub mod manager;
pub mod model;
pub mod registry;
pub mod sweeper;

pub use backend::{InMemoryJobBackend, JobBackend, SqliteJobBackend};
pub use manager::{JobManagerOptions, ParseJobManager};
pub use model::{JobSource, JobStatus, ParseJob};
pub use registry::JobManagerRegistry;
pub use sweeper::ExpirySweeper;
