//! GPU side of the scene renderer.
//!
//! - `driver` lists every GL call the renderer makes behind [`GpuDriver`],
//!   with plain-integer handles and status-returning calls.
//! - `context` acquires and releases the display/surface/context triple and
//!   owns presentation.
//! - `session` ties the surface to the programs, quad and textures created
//!   on it and tears them down in reverse order.
//! - `shaders`, `textures` and `geometry` own the individual object kinds.
//! - `glow_driver` and `glutin_backend` are the real GL ES implementations;
//!   the in-memory ones live in [`crate::headless`].

pub mod context;
pub mod driver;
pub mod geometry;
mod glow_driver;
mod glutin_backend;
pub mod session;
pub mod shaders;
pub mod textures;

pub use context::{DisplayBackend, PixelConfig, RenderSurface, SurfaceInitError};
pub use driver::{
    BlendFactor, BlendFunc, DriverError, GpuDriver, MeshHandle, PixelFormat, ProgramHandle,
    QuadVertex, ShaderHandle, ShaderKind, TextureHandle, TextureUpload, UniformLocation, WrapMode,
};
pub use geometry::{build_unit_quad, Quad};
pub use glow_driver::GlowDriver;
pub use glutin_backend::GlutinBackend;
pub use session::GpuSession;
pub use shaders::{BuildStage, ShaderCache, ShaderCompileError, ShaderProgram};
pub use textures::{Texture, TextureCache, TextureError};
