use super::context::{DisplayBackend, RenderSurface, SurfaceInitError};
use super::driver::GpuDriver;
use super::geometry::Quad;
use super::shaders::ShaderCache;
use super::textures::TextureCache;

/// Every GPU object a scene owns, tied to the surface they were created on.
///
/// Acquisition order is surface → programs → quad → textures; teardown runs
/// the exact reverse on drop, whether the scene finished normally or failed
/// halfway through construction.
pub struct GpuSession<B: DisplayBackend> {
    pub(crate) driver: B::Driver,
    pub(crate) programs: ShaderCache,
    pub(crate) quad: Option<Quad>,
    pub(crate) textures: TextureCache,
    surface: RenderSurface<B>,
}

impl<B: DisplayBackend> GpuSession<B> {
    pub fn open(backend: B) -> Result<Self, SurfaceInitError> {
        let (surface, driver) = RenderSurface::acquire(backend)?;
        Ok(Self {
            driver,
            programs: ShaderCache::new(),
            quad: None,
            textures: TextureCache::new(),
            surface,
        })
    }

    pub fn programs(&self) -> &ShaderCache {
        &self.programs
    }

    pub fn present(&mut self) -> bool {
        self.surface.present()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        self.driver.set_viewport(width, height);
    }

    fn teardown(&mut self) {
        if !self.surface.is_live() {
            return;
        }
        self.textures.release(&mut self.driver);
        if let Some(quad) = self.quad.take() {
            quad.release(&mut self.driver);
        }
        self.programs.release(&mut self.driver);
        self.surface.release();
        tracing::info!("GPU session torn down");
    }
}

impl<B: DisplayBackend> Drop for GpuSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
