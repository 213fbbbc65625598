//! An instanced forward renderer that packs a whole scene into a handful
//! of GPU-resident buffers.
//!
//! The interesting problem here is resource layout and batching, not the
//! shading maths: every mesh shares one vertex and one index buffer, every
//! mesh reuses the same per-frame instance pools, materials live in one
//! randomly-indexable table, and the per-frame scene/lighting data is a
//! single byte-exact block rewritten wholesale each frame.
//!
//! # Structure
//! - [`backend`] - GPU abstraction: a wgpu implementation for windows and
//!   a headless recording implementation for tests
//! - [`scene`] - the host-supplied data model (meshes, materials, lights,
//!   instances, camera)
//! - [`geometry`] - the packer laying all meshes into the shared buffers
//! - [`materials`] - the material table and texture resolution
//! - [`frame`] - per-frame pools, batching and the scene/lighting block
//! - [`pipeline`] - the render pipeline, its WGSL and the CPU twin of the
//!   shading model
//! - [`renderer`] - the orchestrator tying load and frame together

pub mod backend;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod materials;
pub mod pipeline;
pub mod renderer;
pub mod scene;

pub use backend::headless::HeadlessBackend;
pub use backend::traits::GraphicsBackend;
pub use backend::wgpu_backend::WgpuBackend;
pub use error::{RenderError, RenderResult};
pub use frame::MAX_LIGHTS;
pub use renderer::{Renderer, RendererConfig};
