//! Tumbling-window metric aggregation (C1 + C2): the Aggregation Kernel,
//! its per-window Metric Buffers, and the four aggregation functions.

mod functions;
mod kernel;
mod window;

pub use kernel::AggregationKernel;
pub use window::truncate;
