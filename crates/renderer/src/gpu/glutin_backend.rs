use std::ffi::CStr;
use std::num::NonZeroU32;
use std::sync::Arc;

use glutin::config::{Api, ColorBufferType, Config, ConfigTemplateBuilder};
use glutin::context::{ContextApi, ContextAttributesBuilder, PossiblyCurrentContext, Version};
use glutin::display::{Display, DisplayApiPreference};
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, WindowSurface};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use super::context::{DisplayBackend, PixelConfig, SurfaceInitError};
use super::glow_driver::GlowDriver;

/// EGL (WGL on Windows, CGL on macOS) surface for a winit window.
pub struct GlutinBackend {
    window: Arc<Window>,
    display: Option<Display>,
}

impl GlutinBackend {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            display: None,
        }
    }

    fn display(&self) -> Result<&Display, SurfaceInitError> {
        self.display
            .as_ref()
            .ok_or_else(|| SurfaceInitError::Display("display is not open".into()))
    }

    fn raw_window(&self) -> Result<RawWindowHandle, SurfaceInitError> {
        self.window
            .window_handle()
            .map(|handle| handle.as_raw())
            .map_err(|err| SurfaceInitError::Surface(err.to_string()))
    }

    fn window_extent(&self) -> (NonZeroU32, NonZeroU32) {
        let size = self.window.inner_size();
        (
            NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
        )
    }
}

#[cfg(target_os = "windows")]
fn api_preference(window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Wgl(Some(window))
}

#[cfg(target_os = "macos")]
fn api_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(all(unix, not(target_os = "macos")))]
fn api_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Egl
}

fn pixel_config(config: &Config) -> Option<PixelConfig> {
    match config.color_buffer_type()? {
        ColorBufferType::Rgb {
            r_size,
            g_size,
            b_size,
        } => Some(PixelConfig {
            red: r_size,
            green: g_size,
            blue: b_size,
            depth: config.depth_size(),
        }),
        ColorBufferType::Luminance(_) => None,
    }
}

impl DisplayBackend for GlutinBackend {
    type Config = Config;
    type Surface = Surface<WindowSurface>;
    type Context = PossiblyCurrentContext;
    type Driver = GlowDriver;

    fn open_display(&mut self) -> Result<(), SurfaceInitError> {
        let raw_display = self
            .window
            .display_handle()
            .map_err(|err| SurfaceInitError::Display(err.to_string()))?
            .as_raw();
        let preference = api_preference(self.raw_window()?);
        let display = unsafe { Display::new(raw_display, preference) }
            .map_err(|err| SurfaceInitError::Display(err.to_string()))?;
        let api = display.version_string();
        tracing::debug!(api = %api, "display connection opened");
        self.display = Some(display);
        Ok(())
    }

    fn configs(&mut self) -> Result<Vec<(Config, PixelConfig)>, SurfaceInitError> {
        let template = ConfigTemplateBuilder::new()
            .with_api(Api::GLES3)
            .compatible_with_native_window(self.raw_window()?)
            .build();
        let display = self.display()?;
        let configs = unsafe { display.find_configs(template) }
            .map_err(|err| SurfaceInitError::Display(err.to_string()))?;
        Ok(configs
            .filter_map(|config| pixel_config(&config).map(|pixel| (config, pixel)))
            .collect())
    }

    fn create_surface(&mut self, config: &Config) -> Result<Self::Surface, SurfaceInitError> {
        let (width, height) = self.window_extent();
        let attributes =
            SurfaceAttributesBuilder::<WindowSurface>::new().build(self.raw_window()?, width, height);
        let display = self.display()?;
        unsafe { display.create_window_surface(config, &attributes) }
            .map_err(|err| SurfaceInitError::Surface(err.to_string()))
    }

    fn create_context(
        &mut self,
        config: &Config,
        surface: &Self::Surface,
    ) -> Result<Self::Context, SurfaceInitError> {
        let attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
            .build(Some(self.raw_window()?));
        let display = self.display()?;
        let context = unsafe { display.create_context(config, &attributes) }
            .map_err(|err| SurfaceInitError::Context(err.to_string()))?;
        context
            .make_current(surface)
            .map_err(|err| SurfaceInitError::Context(format!("make current: {err}")))
    }

    fn load_driver(&mut self, _context: &Self::Context) -> Result<GlowDriver, SurfaceInitError> {
        let display = self.display()?;
        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|symbol: &CStr| {
                display.get_proc_address(symbol)
            })
        };
        // The context was made current in `create_context` and stays current
        // on this thread until `destroy_context`.
        Ok(unsafe { GlowDriver::new(gl) })
    }

    fn swap_buffers(
        &mut self,
        surface: &Self::Surface,
        context: &Self::Context,
    ) -> Result<(), String> {
        surface.swap_buffers(context).map_err(|err| err.to_string())
    }

    fn resize_surface(
        &mut self,
        surface: &Self::Surface,
        context: &Self::Context,
        width: u32,
        height: u32,
    ) {
        if let (Some(width), Some(height)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            surface.resize(context, width, height);
        }
    }

    fn destroy_context(&mut self, context: Self::Context) {
        if let Err(err) = context.make_not_current() {
            tracing::warn!(error = %err, "failed to release rendering context");
        }
    }

    fn destroy_surface(&mut self, surface: Self::Surface) {
        drop(surface);
    }

    fn close_display(&mut self) {
        self.display = None;
    }
}
