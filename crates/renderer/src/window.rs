use std::sync::Arc;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use tracing::{error, info};

use crate::assets::ImageDecoder;
use crate::compositor::SceneRenderer;
use crate::gpu::GlutinBackend;
use crate::runtime::{SystemTimeSource, TimeSource};
use crate::types::SceneConfig;

/// Window parameters for the interactive scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    pub title: String,
    pub size: (u32, u32),
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Snow Scene".to_owned(),
            size: (1280, 720),
        }
    }
}

/// Runs the scene in a window until it is closed.
///
/// The renderer lives exactly as long as the platform window is usable: it
/// is built on `Resumed` and dropped on `Suspended` or close, before any
/// further GL work could reach a dead surface. The loop polls, so a redraw
/// is requested every time the event queue drains.
pub fn run_windowed(
    options: WindowOptions,
    scene: SceneConfig,
    decoder: Box<dyn ImageDecoder>,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut window: Option<Arc<Window>> = None;
    let mut renderer: Option<SceneRenderer<GlutinBackend>> = None;
    let mut clock = SystemTimeSource::new();
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::Resumed => {
            if renderer.is_some() {
                return;
            }
            let handle = match window.as_ref() {
                Some(handle) => Arc::clone(handle),
                None => {
                    let built = WindowBuilder::new()
                        .with_title(options.title.as_str())
                        .with_inner_size(PhysicalSize::new(options.size.0, options.size.1))
                        .build(elwt);
                    match built {
                        Ok(built) => Arc::clone(window.insert(Arc::new(built))),
                        Err(err) => {
                            failure = Some(anyhow!("failed to create window: {err}"));
                            elwt.exit();
                            return;
                        }
                    }
                }
            };
            let size = handle.inner_size();
            let backend = GlutinBackend::new(Arc::clone(&handle));
            match SceneRenderer::new(backend, &scene, decoder.as_ref()) {
                Ok(mut built) => {
                    built.resize(size.width, size.height);
                    clock.reset();
                    info!(
                        width = size.width,
                        height = size.height,
                        "window available; scene ready"
                    );
                    renderer = Some(built);
                }
                Err(err) => {
                    error!(error = %err, "failed to initialise scene renderer");
                    failure = Some(
                        anyhow::Error::new(err).context("failed to initialise scene renderer"),
                    );
                    elwt.exit();
                }
            }
        }
        Event::Suspended => {
            if renderer.take().is_some() {
                info!("window lost; scene renderer released");
            }
        }
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                renderer = None;
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(active) = renderer.as_mut() {
                    active.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(active) = renderer.as_mut() {
                    let sample = clock.sample();
                    active.render_frame(sample.elapsed);
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if let (Some(handle), Some(_)) = (window.as_ref(), renderer.as_ref()) {
                handle.request_redraw();
            }
        }
        _ => {}
    });

    drop(renderer);
    if let Some(err) = failure {
        return Err(err);
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
