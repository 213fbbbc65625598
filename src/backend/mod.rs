//! Graphics backend abstraction
//!
//! The renderer talks to the GPU through [`traits::GraphicsBackend`]. The
//! windowed implementation lives in [`wgpu_backend`]; [`headless`] provides
//! a recording implementation used by the test suite.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;
