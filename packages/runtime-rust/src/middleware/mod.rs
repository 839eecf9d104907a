//! Tower middleware layers for the run pipeline.
//!
//! - [`timeout`]: Per-invocation deadline, enforced through a child signal
//! - [`metrics`]: Invocation timing and counting via `tracing` spans and `metrics`
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::build_pipeline;
pub use timeout::TimeoutLayer;
