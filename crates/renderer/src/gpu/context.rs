use std::fmt;

use super::driver::GpuDriver;

/// Colour/depth bit sizes of a surface configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelConfig {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub depth: u8,
}

impl PixelConfig {
    /// The only layout the renderer accepts.
    pub const REQUIRED: Self = Self {
        red: 8,
        green: 8,
        blue: 8,
        depth: 24,
    };
}

impl fmt::Display for PixelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "r{} g{} b{} d{}",
            self.red, self.green, self.blue, self.depth
        )
    }
}

/// Terminal failures while bringing up the drawing surface. None of these are
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceInitError {
    #[error("failed to open display: {0}")]
    Display(String),
    #[error("no surface configuration matches {required} ({candidates} candidates enumerated)")]
    NoMatchingConfig {
        required: PixelConfig,
        candidates: usize,
    },
    #[error("failed to create window surface: {0}")]
    Surface(String),
    #[error("failed to create rendering context: {0}")]
    Context(String),
}

/// Platform side of the surface: display connection, config enumeration,
/// window surface, context, buffer swap.
///
/// [`RenderSurface`] drives these in a fixed order and owns teardown, so a
/// backend only has to implement the individual steps.
pub trait DisplayBackend {
    type Config;
    type Surface;
    type Context;
    type Driver: GpuDriver;

    fn open_display(&mut self) -> Result<(), SurfaceInitError>;
    /// Candidate configurations in the platform's enumeration order.
    fn configs(&mut self) -> Result<Vec<(Self::Config, PixelConfig)>, SurfaceInitError>;
    fn create_surface(&mut self, config: &Self::Config) -> Result<Self::Surface, SurfaceInitError>;
    /// Creates a GL ES 3 context and makes it current on `surface`.
    fn create_context(
        &mut self,
        config: &Self::Config,
        surface: &Self::Surface,
    ) -> Result<Self::Context, SurfaceInitError>;
    fn load_driver(&mut self, context: &Self::Context) -> Result<Self::Driver, SurfaceInitError>;
    fn swap_buffers(
        &mut self,
        surface: &Self::Surface,
        context: &Self::Context,
    ) -> Result<(), String>;
    fn resize_surface(
        &mut self,
        _surface: &Self::Surface,
        _context: &Self::Context,
        _width: u32,
        _height: u32,
    ) {
    }
    fn destroy_context(&mut self, context: Self::Context);
    fn destroy_surface(&mut self, surface: Self::Surface);
    fn close_display(&mut self);
}

/// Picks the first configuration whose sizes equal `required` exactly.
pub(crate) fn select_config<C>(
    configs: Vec<(C, PixelConfig)>,
    required: PixelConfig,
) -> Option<(C, PixelConfig)> {
    configs.into_iter().find(|(_, pixel)| {
        tracing::debug!(config = %pixel, "found surface configuration");
        *pixel == required
    })
}

/// Display, window surface and context for one live window.
///
/// Dropping releases whatever was acquired, newest first: context, surface,
/// display. That also covers a half-finished [`RenderSurface::acquire`].
pub struct RenderSurface<B: DisplayBackend> {
    backend: B,
    context: Option<B::Context>,
    surface: Option<B::Surface>,
    display_open: bool,
}

impl<B: DisplayBackend> RenderSurface<B> {
    pub fn acquire(backend: B) -> Result<(Self, B::Driver), SurfaceInitError> {
        let mut this = Self {
            backend,
            context: None,
            surface: None,
            display_open: false,
        };

        this.backend.open_display()?;
        this.display_open = true;

        let configs = this.backend.configs()?;
        let candidates = configs.len();
        tracing::info!(candidates, "enumerated surface configurations");
        let (config, format) = select_config(configs, PixelConfig::REQUIRED).ok_or(
            SurfaceInitError::NoMatchingConfig {
                required: PixelConfig::REQUIRED,
                candidates,
            },
        )?;

        let surface = this.backend.create_surface(&config)?;
        let surface = this.surface.insert(surface);
        let context = this.backend.create_context(&config, surface)?;
        let context = this.context.insert(context);
        let driver = this.backend.load_driver(context)?;

        tracing::info!(config = %format, "rendering surface acquired");
        Ok((this, driver))
    }

    /// Swaps buffers. `false` means the present failed; the caller keeps
    /// going.
    pub fn present(&mut self) -> bool {
        let (Some(surface), Some(context)) = (self.surface.as_ref(), self.context.as_ref()) else {
            tracing::warn!("present requested on a released surface");
            return false;
        };
        match self.backend.swap_buffers(surface, context) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "failed to present frame");
                false
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let (Some(surface), Some(context)) = (self.surface.as_ref(), self.context.as_ref()) {
            self.backend.resize_surface(surface, context, width, height);
        }
    }

    /// Tears everything down. Safe to call repeatedly.
    pub fn release(&mut self) {
        let mut released = false;
        if let Some(context) = self.context.take() {
            self.backend.destroy_context(context);
            released = true;
        }
        if let Some(surface) = self.surface.take() {
            self.backend.destroy_surface(surface);
            released = true;
        }
        if self.display_open {
            self.backend.close_display();
            self.display_open = false;
            released = true;
        }
        if released {
            tracing::debug!("rendering surface released");
        }
    }

    pub fn is_live(&self) -> bool {
        self.context.is_some() && self.surface.is_some()
    }
}

impl<B: DisplayBackend> Drop for RenderSurface<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;

    const RGB565: PixelConfig = PixelConfig {
        red: 5,
        green: 6,
        blue: 5,
        depth: 16,
    };

    #[test]
    fn first_matching_config_wins() {
        let configs = vec![
            ("a", RGB565),
            ("b", PixelConfig::REQUIRED),
            ("c", PixelConfig::REQUIRED),
        ];
        let (chosen, _) = select_config(configs, PixelConfig::REQUIRED).expect("config");
        assert_eq!(chosen, "b");
    }

    #[test]
    fn acquire_fails_without_matching_config_and_closes_display() {
        let backend = HeadlessBackend::new().with_configs(vec![RGB565]);
        let probe = backend.probe();
        let err = RenderSurface::acquire(backend).err().expect("acquire must fail");
        assert_eq!(
            err,
            SurfaceInitError::NoMatchingConfig {
                required: PixelConfig::REQUIRED,
                candidates: 1
            }
        );
        assert!(!probe.display_open());
        assert!(!probe.surface_live());
    }

    #[test]
    fn display_failure_is_reported() {
        let backend = HeadlessBackend::new().fail_display();
        let probe = backend.probe();
        assert!(matches!(
            RenderSurface::acquire(backend),
            Err(SurfaceInitError::Display(_))
        ));
        assert!(!probe.display_open());
        assert!(!probe.surface_live());
    }

    #[test]
    fn surface_failure_closes_display() {
        let backend = HeadlessBackend::new().fail_surface();
        let probe = backend.probe();
        assert!(matches!(
            RenderSurface::acquire(backend),
            Err(SurfaceInitError::Surface(_))
        ));
        assert!(!probe.surface_live());
        assert!(!probe.display_open());
    }

    #[test]
    fn context_failure_releases_created_surface() {
        let backend = HeadlessBackend::new().fail_context();
        let probe = backend.probe();
        assert!(matches!(
            RenderSurface::acquire(backend),
            Err(SurfaceInitError::Context(_))
        ));
        assert!(!probe.surface_live());
        assert!(!probe.display_open());
    }

    #[test]
    fn release_is_idempotent() {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let (mut surface, _driver) = RenderSurface::acquire(backend).expect("surface");
        assert!(surface.is_live());
        surface.release();
        surface.release();
        assert!(!surface.is_live());
        assert!(!probe.display_open());
        assert!(!surface.present());
    }

    #[test]
    fn present_failure_is_reported_not_fatal() {
        let backend = HeadlessBackend::new().fail_present();
        let (mut surface, _driver) = RenderSurface::acquire(backend).expect("surface");
        assert!(!surface.present());
        assert!(surface.is_live());
    }
}
