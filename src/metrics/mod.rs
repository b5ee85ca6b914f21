//! Performance metrics
//!
//! - **types**: `ResourceMetrics` and `BrowserMetrics` records
//! - **keys**: storage key layout and the monotonic key clock
//! - **table**: bounded in-memory table of the latest record per URL
//! - **system**: host memory/CPU probes
//! - **recorder**: persistence and sampling
//! - **sampler**: background snapshot loop

pub mod keys;
mod recorder;
mod sampler;
pub mod system;
mod table;
mod types;

pub use recorder::{
    MetricRecorder, DEFAULT_REQUEST_RETENTION, DEFAULT_RESOURCE_RETENTION, DEFAULT_SNAPSHOT_RETENTION,
};
pub use sampler::{spawn_sampler, DEFAULT_SAMPLE_INTERVAL};
pub use system::{HostProbe, SysinfoProbe};
pub use table::{MetricTable, DEFAULT_TABLE_CAPACITY};
pub use types::{BrowserMetrics, ResourceMetrics};
