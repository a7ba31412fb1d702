use std::num::NonZeroU32;

use glow::HasContext;

use super::driver::{
    BlendFactor, BlendFunc, DriverError, GpuDriver, MeshHandle, PixelFormat, ProgramHandle,
    QuadVertex, ShaderHandle, ShaderKind, TextureHandle, TextureUpload, UniformLocation, WrapMode,
};

/// [`GpuDriver`] over a live `glow` context.
pub struct GlowDriver {
    gl: glow::Context,
}

impl GlowDriver {
    /// # Safety
    ///
    /// The context `gl` was loaded from must be current on this thread for
    /// the whole lifetime of the driver.
    pub unsafe fn new(gl: glow::Context) -> Self {
        log_driver_info(&gl);
        Self { gl }
    }

    /// Reports the first pending GL error, if any, against `call`.
    fn check(&self, call: &'static str) -> Result<(), DriverError> {
        let code = unsafe { self.gl.get_error() };
        if code == glow::NO_ERROR {
            Ok(())
        } else {
            Err(DriverError::Gl { call, code })
        }
    }
}

fn log_driver_info(gl: &glow::Context) {
    let (vendor, renderer, version) = unsafe {
        (
            gl.get_parameter_string(glow::VENDOR),
            gl.get_parameter_string(glow::RENDERER),
            gl.get_parameter_string(glow::VERSION),
        )
    };
    tracing::info!(%vendor, %renderer, %version, "GL driver loaded");
}

fn shader(handle: ShaderHandle) -> Option<glow::NativeShader> {
    NonZeroU32::new(handle.0).map(glow::NativeShader)
}

fn program(handle: ProgramHandle) -> Option<glow::NativeProgram> {
    NonZeroU32::new(handle.0).map(glow::NativeProgram)
}

fn texture(handle: TextureHandle) -> Option<glow::NativeTexture> {
    NonZeroU32::new(handle.0).map(glow::NativeTexture)
}

fn vertex_array(name: u32) -> Option<glow::NativeVertexArray> {
    NonZeroU32::new(name).map(glow::NativeVertexArray)
}

fn buffer(name: u32) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(name).map(glow::NativeBuffer)
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

fn pixel_formats(format: PixelFormat) -> (u32, u32) {
    match format {
        PixelFormat::Red => (glow::R8, glow::RED),
        PixelFormat::Rgb => (glow::RGB8, glow::RGB),
        PixelFormat::Rgba => (glow::RGBA8, glow::RGBA),
    }
}

fn create_error(kind: &'static str) -> impl FnOnce(String) -> DriverError {
    move |message| DriverError::Create { kind, message }
}

impl GpuDriver for GlowDriver {
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderHandle, DriverError> {
        let stage = match kind {
            ShaderKind::Vertex => glow::VERTEX_SHADER,
            ShaderKind::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = unsafe { self.gl.create_shader(stage) }.map_err(create_error("shader"))?;
        Ok(ShaderHandle(shader.0.get()))
    }

    fn compile_shader(&mut self, handle: ShaderHandle, source: &str) -> bool {
        let Some(shader) = shader(handle) else {
            return false;
        };
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            self.gl.get_shader_compile_status(shader)
        }
    }

    fn shader_info_log(&self, handle: ShaderHandle) -> String {
        shader(handle)
            .map(|shader| unsafe { self.gl.get_shader_info_log(shader) })
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, handle: ShaderHandle) {
        if let Some(shader) = shader(handle) {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn create_program(&mut self) -> Result<ProgramHandle, DriverError> {
        let program = unsafe { self.gl.create_program() }.map_err(create_error("program"))?;
        Ok(ProgramHandle(program.0.get()))
    }

    fn attach_shader(&mut self, handle: ProgramHandle, shader_handle: ShaderHandle) {
        if let (Some(program), Some(shader)) = (program(handle), shader(shader_handle)) {
            unsafe { self.gl.attach_shader(program, shader) };
        }
    }

    fn detach_shader(&mut self, handle: ProgramHandle, shader_handle: ShaderHandle) {
        if let (Some(program), Some(shader)) = (program(handle), shader(shader_handle)) {
            unsafe { self.gl.detach_shader(program, shader) };
        }
    }

    fn link_program(&mut self, handle: ProgramHandle) -> bool {
        let Some(program) = program(handle) else {
            return false;
        };
        unsafe {
            self.gl.link_program(program);
            self.gl.get_program_link_status(program)
        }
    }

    fn program_info_log(&self, handle: ProgramHandle) -> String {
        program(handle)
            .map(|program| unsafe { self.gl.get_program_info_log(program) })
            .unwrap_or_default()
    }

    fn delete_program(&mut self, handle: ProgramHandle) {
        if let Some(program) = program(handle) {
            unsafe { self.gl.delete_program(program) };
        }
    }

    fn uniform_location(&self, handle: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let program = program(handle)?;
        unsafe { self.gl.get_uniform_location(program, name) }
            .map(|location| UniformLocation(location.0))
    }

    fn create_texture(&mut self) -> Result<TextureHandle, DriverError> {
        let texture = unsafe { self.gl.create_texture() }.map_err(create_error("texture"))?;
        Ok(TextureHandle(texture.0.get()))
    }

    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        upload: &TextureUpload<'_>,
    ) -> Result<(), DriverError> {
        let texture = texture(handle).ok_or(DriverError::InvalidHandle {
            kind: "texture",
            handle: handle.0,
        })?;
        let wrap = match upload.wrap {
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            WrapMode::Repeat => glow::REPEAT,
        } as i32;
        let (internal, format) = pixel_formats(upload.format);

        unsafe {
            let gl = &self.gl;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                upload.width as i32,
                upload.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                Some(upload.pixels),
            );
        }
        self.check("glTexImage2D")?;
        unsafe {
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.check("glGenerateMipmap")
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        if let Some(texture) = texture(handle) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn create_mesh(
        &mut self,
        vertices: &[QuadVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, DriverError> {
        let stride = std::mem::size_of::<QuadVertex>() as i32;
        let uv_offset = std::mem::size_of::<[f32; 2]>() as i32;
        unsafe {
            let gl = &self.gl;
            let vao = gl
                .create_vertex_array()
                .map_err(create_error("vertex array"))?;
            let vbo = match gl.create_buffer() {
                Ok(vbo) => vbo,
                Err(message) => {
                    gl.delete_vertex_array(vao);
                    return Err(DriverError::Create {
                        kind: "vertex buffer",
                        message,
                    });
                }
            };
            let ibo = match gl.create_buffer() {
                Ok(ibo) => ibo,
                Err(message) => {
                    gl.delete_buffer(vbo);
                    gl.delete_vertex_array(vao);
                    return Err(DriverError::Create {
                        kind: "index buffer",
                        message,
                    });
                }
            };

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, uv_offset);
            gl.bind_vertex_array(None);

            let mesh = MeshHandle {
                vertex_array: vao.0.get(),
                vertex_buffer: vbo.0.get(),
                index_buffer: ibo.0.get(),
            };
            if let Err(err) = self.check("mesh upload") {
                self.delete_mesh(mesh);
                return Err(err);
            }
            Ok(mesh)
        }
    }

    fn delete_mesh(&mut self, mesh: MeshHandle) {
        unsafe {
            if let Some(vao) = vertex_array(mesh.vertex_array) {
                self.gl.delete_vertex_array(vao);
            }
            if let Some(vbo) = buffer(mesh.vertex_buffer) {
                self.gl.delete_buffer(vbo);
            }
            if let Some(ibo) = buffer(mesh.index_buffer) {
                self.gl.delete_buffer(ibo);
            }
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        unsafe {
            match blend {
                Some(func) => {
                    self.gl.enable(glow::BLEND);
                    self.gl
                        .blend_func(blend_factor(func.src), blend_factor(func.dst));
                }
                None => self.gl.disable(glow::BLEND),
            }
        }
    }

    fn use_program(&mut self, handle: ProgramHandle) {
        unsafe { self.gl.use_program(program(handle)) };
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_1_i32(Some(&location), value) };
    }

    fn set_uniform_vec2(&mut self, location: UniformLocation, value: [f32; 2]) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_2_f32(Some(&location), value[0], value[1]) };
    }

    fn bind_texture(&mut self, unit: u32, handle: TextureHandle) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, texture(handle));
        }
    }

    fn draw_indexed(&mut self, mesh: MeshHandle, index_count: u32) -> Result<(), DriverError> {
        let vao = vertex_array(mesh.vertex_array).ok_or(DriverError::InvalidHandle {
            kind: "vertex array",
            handle: mesh.vertex_array,
        })?;
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl
                .draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
        self.check("glDrawElements")
    }
}
