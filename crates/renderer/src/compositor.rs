use std::time::Duration;

use crate::animation::{FrameClock, UvRect};
use crate::assets::ImageDecoder;
use crate::gpu::{
    BlendFunc, BuildStage, DisplayBackend, DriverError, GpuDriver, GpuSession, ProgramHandle,
    Quad, ShaderCompileError, SurfaceInitError, Texture, TextureError, TextureHandle, WrapMode,
};
use crate::types::{uniforms, LayerId, SceneConfig};

/// Failures that stop a [`SceneRenderer`] from being built. Anything that
/// escapes `new` has already released what was acquired.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error(transparent)]
    Surface(#[from] SurfaceInitError),
    #[error("essential layer {layer} could not build its shader program")]
    EssentialLayer {
        layer: LayerId,
        #[source]
        source: ShaderCompileError,
    },
    #[error("layer {layer} has an unusable sprite sheet ({rows}x{cols} at {fps} fps)")]
    InvalidSprite {
        layer: LayerId,
        rows: u32,
        cols: u32,
        fps: u32,
    },
    #[error("failed to upload quad geometry")]
    Geometry(#[source] DriverError),
}

/// Outcome of one [`SceneRenderer::render_frame`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// 1-based number of this frame.
    pub frame: u64,
    pub drawn: u32,
    /// Layers left out because their program or texture is missing.
    pub skipped: u32,
    /// Layers whose draw call reported an error.
    pub failed: u32,
    pub presented: bool,
}

struct LayerState {
    id: LayerId,
    blend: Option<BlendFunc>,
    program: ProgramHandle,
    texture: TextureHandle,
    sampler: &'static str,
    clock: Option<FrameClock>,
    draws: u64,
    warned: bool,
}

impl LayerState {
    fn is_drawable(&self) -> bool {
        self.program.is_valid() && self.texture.is_valid()
    }
}

/// Draws the four-layer scene onto one surface.
///
/// Layers are composited in [`LayerId::DRAW_ORDER`]: an opaque background,
/// far snow added on top, the alpha-blended foreground and finally near
/// snow. Animated layers carry their own [`FrameClock`].
pub struct SceneRenderer<B: DisplayBackend> {
    session: GpuSession<B>,
    clear_color: [f32; 4],
    layers: Vec<LayerState>,
    quad: Quad,
    frames: u64,
}

impl<B: DisplayBackend> SceneRenderer<B> {
    pub fn new(
        backend: B,
        config: &SceneConfig,
        decoder: &dyn ImageDecoder,
    ) -> Result<Self, RendererError> {
        let mut session = GpuSession::open(backend)?;

        let mut layers = Vec::with_capacity(LayerId::DRAW_ORDER.len());
        for id in LayerId::DRAW_ORDER {
            let layer = config.layer(id);
            let clock = match layer.sprite {
                Some(sheet) => {
                    let clock = sheet
                        .grid()
                        .and_then(|grid| FrameClock::new(grid, sheet.fps))
                        .ok_or(RendererError::InvalidSprite {
                            layer: id,
                            rows: sheet.rows,
                            cols: sheet.cols,
                            fps: sheet.fps,
                        })?;
                    Some(clock)
                }
                None => None,
            };
            let (vertex, fragment, sampler) = if clock.is_some() {
                (
                    &config.shaders.sprite_vertex,
                    &config.shaders.sprite_fragment,
                    uniforms::SPRITE_TEXTURE,
                )
            } else {
                (
                    &config.shaders.quad_vertex,
                    &config.shaders.quad_fragment,
                    uniforms::QUAD_TEXTURE,
                )
            };

            if layer.essential {
                // Build results are cached per source pair, so the sentinel
                // lookup below does not compile a second time.
                if let Err(err) = session.programs.build(&mut session.driver, vertex, fragment) {
                    if err.stage == BuildStage::Link {
                        return Err(RendererError::EssentialLayer {
                            layer: id,
                            source: err,
                        });
                    }
                }
            }
            let program =
                session
                    .programs
                    .build_or_invalid(&mut session.driver, vertex, fragment, id.name());

            layers.push(LayerState {
                id,
                blend: layer.blend.func(),
                program,
                texture: TextureHandle::INVALID,
                sampler,
                clock,
                draws: 0,
                warned: false,
            });
        }

        let quad = Quad::build(&mut session.driver).map_err(RendererError::Geometry)?;
        session.quad = Some(quad);

        for state in &mut layers {
            let layer = config.layer(state.id);
            let loaded = session
                .textures
                .load_with(&mut session.driver, &layer.asset, layer.wrap, || {
                    decoder.decode(&layer.asset)
                });
            match loaded {
                Ok(texture) => state.texture = texture.handle,
                Err(err) => {
                    tracing::warn!(
                        layer = %state.id,
                        asset = %layer.asset,
                        error = %err,
                        "texture failed to load; layer disabled"
                    );
                }
            }
        }

        tracing::info!(
            programs = session.programs.len(),
            textures = session.textures.len(),
            "scene renderer ready"
        );
        Ok(Self {
            session,
            clear_color: config.clear_color,
            layers,
            quad,
            frames: 0,
        })
    }

    /// Advances every animated layer to `now`, draws the scene and presents.
    pub fn render_frame(&mut self, now: Duration) -> FrameReport {
        let mut report = FrameReport::default();
        let session = &mut self.session;
        session.driver.clear(self.clear_color);

        for layer in &mut self.layers {
            let uv = match layer.clock.as_mut() {
                Some(clock) => {
                    clock.advance(now);
                    Some(clock.uv_rect())
                }
                None => None,
            };

            if !layer.is_drawable() {
                report.skipped += 1;
                if !layer.warned {
                    tracing::warn!(
                        layer = %layer.id,
                        program = layer.program.0,
                        texture = layer.texture.0,
                        "skipping layer without a usable program or texture"
                    );
                    layer.warned = true;
                }
                continue;
            }

            let driver = &mut session.driver;
            driver.set_blend(layer.blend);
            driver.use_program(layer.program);
            driver.bind_texture(0, layer.texture);
            let sampler = session
                .programs
                .uniform(&*driver, layer.program, layer.sampler);
            if let Some(sampler) = sampler {
                driver.set_uniform_i32(sampler, 0);
            }
            if let Some(uv) = uv {
                set_uv_uniforms(session, layer.program, uv);
            }

            match self.quad.draw(&mut session.driver) {
                Ok(()) => {
                    report.drawn += 1;
                    layer.draws += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(layer = %layer.id, error = %err, "draw call failed");
                }
            }
        }

        report.presented = session.present();
        self.frames += 1;
        report.frame = self.frames;
        tracing::trace!(
            frame = report.frame,
            drawn = report.drawn,
            skipped = report.skipped,
            "frame rendered"
        );
        report
    }

    /// Applies a new surface size. Zero-sized requests (minimised windows)
    /// are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "ignoring zero-sized resize");
            return;
        }
        self.session.resize(width, height);
    }

    /// Loads an extra texture into the renderer's cache.
    pub fn load_texture(
        &mut self,
        asset: &str,
        wrap: WrapMode,
        decoder: &dyn ImageDecoder,
    ) -> Result<Texture, TextureError> {
        let session = &mut self.session;
        session
            .textures
            .load_with(&mut session.driver, asset, wrap, || decoder.decode(asset))
    }

    fn layer(&self, id: LayerId) -> &LayerState {
        &self.layers[id.index()]
    }

    /// Current cell of an animated layer; `None` for static layers.
    pub fn layer_frame(&self, id: LayerId) -> Option<u32> {
        self.layer(id).clock.as_ref().map(FrameClock::frame_index)
    }

    pub fn layer_advances(&self, id: LayerId) -> u64 {
        self.layer(id)
            .clock
            .as_ref()
            .map_or(0, FrameClock::advances)
    }

    pub fn layer_draws(&self, id: LayerId) -> u64 {
        self.layer(id).draws
    }

    pub fn texture(&self, id: LayerId) -> TextureHandle {
        self.layer(id).texture
    }

    pub fn program(&self, id: LayerId) -> ProgramHandle {
        self.layer(id).program
    }

    /// Number of `render_frame` calls so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn session(&self) -> &GpuSession<B> {
        &self.session
    }
}

fn set_uv_uniforms<B: DisplayBackend>(
    session: &mut GpuSession<B>,
    program: ProgramHandle,
    uv: UvRect,
) {
    let driver = &mut session.driver;
    if let Some(offset) = session.programs.uniform(&*driver, program, uniforms::UV_OFFSET) {
        driver.set_uniform_vec2(offset, uv.offset());
    }
    if let Some(scale) = session.programs.uniform(&*driver, program, uniforms::UV_SCALE) {
        driver.set_uniform_vec2(scale, uv.scale());
    }
}
