//! Per-frame machinery: instance pools, the scene/lighting block and the
//! batching pass that feeds them.

pub mod batcher;
pub mod pools;
pub mod uniforms;

pub use batcher::{batch_instances, pool_payload, MeshBatch};
pub use pools::{compute_pool_capacity, InstancePools};
pub use uniforms::{GpuLight, SceneBlock, MAX_LIGHTS};
