//! Renderer crate for the layered winter scene.
//!
//! Four textured full-screen quads are composited every frame: an opaque
//! background, an additive far-snow sprite sheet, an alpha-blended
//! foreground and an additive near-snow sprite sheet. The flow is:
//!
//! ```text
//!   event pump (window::run_windowed / simulate)
//!          │ now
//!          ▼
//!   SceneRenderer::render_frame ──▶ FrameClock::advance ──▶ SpriteGrid::uv_rect
//!          │                                                      │
//!          └─▶ ShaderCache / TextureCache / Quad ──▶ GpuDriver ◀──┘
//!                                                      │
//!                                            RenderSurface::present
//! ```
//!
//! GPU access goes through two traits: [`gpu::DisplayBackend`] for the
//! display/surface/context and [`gpu::GpuDriver`] for GL calls. The real
//! implementations sit on `glutin` and `glow`; [`headless`] provides an
//! in-memory pair used by tests and by [`simulate`].

pub mod animation;
pub mod assets;
pub mod compositor;
pub mod gpu;
pub mod headless;
pub mod runtime;
pub mod simulation;
pub mod types;
pub mod window;

pub use animation::{FrameClock, SpriteGrid, UvRect};
pub use assets::{FsImageDecoder, ImageDecoder, PixelBuffer};
pub use compositor::{FrameReport, RendererError, SceneRenderer};
pub use runtime::{SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use simulation::{simulate, LayerReport, SimulationReport};
pub use types::{
    BlendMode, LayerConfig, LayerId, SceneConfig, ShaderSources, SpriteSheet,
    DEFAULT_CLEAR_COLOR,
};
pub use window::{run_windowed, WindowOptions};
