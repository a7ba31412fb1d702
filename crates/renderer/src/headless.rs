//! In-memory GL model.
//!
//! [`HeadlessBackend`] and [`HeadlessDriver`] implement the surface and
//! driver traits without a GPU. They keep a ledger of every live object,
//! validate shader sources the way a strict GLSL ES 300 compiler would for
//! the constructs the scene uses, and record each draw together with the
//! state it was issued under. A [`HeadlessProbe`] reads that ledger (and
//! toggles forced failures) from outside.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::assets::{ImageDecoder, PixelBuffer};
use crate::gpu::{
    BlendFunc, DisplayBackend, DriverError, GpuDriver, MeshHandle, PixelConfig, PixelFormat,
    ProgramHandle, QuadVertex, ShaderHandle, ShaderKind, SurfaceInitError, TextureError,
    TextureHandle, TextureUpload, UniformLocation, WrapMode,
};

/// Value last written to a uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec2([f32; 2]),
}

/// One `draw_indexed` call and the pipeline state it saw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub texture: TextureHandle,
    pub blend: Option<BlendFunc>,
    pub index_count: u32,
    pub uniforms: BTreeMap<String, UniformValue>,
}

#[derive(Debug)]
struct ShaderRecord {
    kind: ShaderKind,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<String>,
    values: HashMap<u32, UniformValue>,
}

#[derive(Debug)]
struct TextureRecord {
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    wrap: WrapMode,
}

#[derive(Debug, Default)]
struct Failures {
    link: bool,
    upload: bool,
    mesh: bool,
    draw: bool,
    display: bool,
    surface: bool,
    context: bool,
    present: bool,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_name: u32,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    textures: HashMap<u32, TextureRecord>,
    meshes: HashMap<u32, MeshHandle>,

    shader_allocations: usize,
    program_allocations: usize,
    texture_allocations: usize,
    texture_uploads: usize,
    uniform_queries: usize,

    viewport: Option<(u32, u32)>,
    clears: Vec<[f32; 4]>,
    blend: Option<BlendFunc>,
    current_program: u32,
    bound_textures: HashMap<u32, u32>,
    draws: Vec<DrawRecord>,

    display_open: bool,
    surface_live: bool,
    context_live: bool,
    surface_size: Option<(u32, u32)>,
    presents: u64,
    failed_presents: u64,
    /// Driver calls issued while a backend-created driver had no context.
    stray_calls: usize,
    requires_context: bool,

    fail: Failures,
}

impl HeadlessState {
    fn allocate(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn touch(&mut self) {
        if self.requires_context && !self.context_live {
            self.stray_calls += 1;
        }
    }
}

type Shared = Rc<RefCell<HeadlessState>>;

/// Read access to the headless ledger, plus failure injection.
#[derive(Clone, Debug)]
pub struct HeadlessProbe {
    state: Shared,
}

impl HeadlessProbe {
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.state.borrow().meshes.len()
    }

    /// Every GPU object still alive.
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.shaders.len() + state.programs.len() + state.textures.len() + state.meshes.len()
    }

    pub fn shader_allocations(&self) -> usize {
        self.state.borrow().shader_allocations
    }

    pub fn program_allocations(&self) -> usize {
        self.state.borrow().program_allocations
    }

    pub fn texture_allocations(&self) -> usize {
        self.state.borrow().texture_allocations
    }

    pub fn texture_uploads(&self) -> usize {
        self.state.borrow().texture_uploads
    }

    pub fn uniform_queries(&self) -> usize {
        self.state.borrow().uniform_queries
    }

    /// Size and wrap mode of a live texture.
    pub fn texture_info(&self, texture: TextureHandle) -> Option<(u32, u32, WrapMode)> {
        self.state
            .borrow()
            .textures
            .get(&texture.0)
            .map(|record| (record.width, record.height, record.wrap))
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    pub fn clears(&self) -> Vec<[f32; 4]> {
        self.state.borrow().clears.clone()
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.state.borrow().viewport
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.state.borrow().surface_size
    }

    pub fn presents(&self) -> u64 {
        self.state.borrow().presents
    }

    pub fn failed_presents(&self) -> u64 {
        self.state.borrow().failed_presents
    }

    pub fn display_open(&self) -> bool {
        self.state.borrow().display_open
    }

    pub fn surface_live(&self) -> bool {
        self.state.borrow().surface_live
    }

    pub fn context_live(&self) -> bool {
        self.state.borrow().context_live
    }

    pub fn stray_calls(&self) -> usize {
        self.state.borrow().stray_calls
    }

    pub fn force_link_failure(&self, fail: bool) {
        self.state.borrow_mut().fail.link = fail;
    }

    pub fn force_upload_failure(&self, fail: bool) {
        self.state.borrow_mut().fail.upload = fail;
    }

    pub fn force_mesh_failure(&self, fail: bool) {
        self.state.borrow_mut().fail.mesh = fail;
    }

    pub fn force_draw_failure(&self, fail: bool) {
        self.state.borrow_mut().fail.draw = fail;
    }

    pub fn force_present_failure(&self, fail: bool) {
        self.state.borrow_mut().fail.present = fail;
    }
}

/// Recording [`GpuDriver`].
#[derive(Debug)]
pub struct HeadlessDriver {
    state: Shared,
}

impl HeadlessDriver {
    /// A driver with its own ledger and no surface behind it.
    pub fn standalone() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState::default())),
        }
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Rc::clone(&self.state),
        }
    }
}

/// Minimal structural check of a GLSL ES 300 source.
fn check_glsl(source: &str) -> Result<(), String> {
    if !source.trim_start().starts_with("#version 300 es") {
        return Err("0:1: '#version 300 es' directive missing".into());
    }
    if !source.contains("void main") {
        return Err("missing entry point 'main'".into());
    }
    let mut braces = 0i32;
    let mut parens = 0i32;
    for (line, text) in source.lines().enumerate() {
        for ch in text.chars() {
            match ch {
                '{' => braces += 1,
                '}' => braces -= 1,
                '(' => parens += 1,
                ')' => parens -= 1,
                _ => {}
            }
            if braces < 0 || parens < 0 {
                return Err(format!("0:{}: syntax error: unexpected '{ch}'", line + 1));
            }
        }
    }
    if braces != 0 || parens != 0 {
        return Err("syntax error: unexpected end of file".into());
    }
    Ok(())
}

/// Names declared with `qualifier` (`uniform`, `in`, `out`) at global scope.
fn declarations(source: &str, qualifier: &str) -> Vec<String> {
    let code: String = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");
    code.split(';')
        .filter_map(|statement| {
            let mut statement = statement.trim();
            if statement.starts_with("layout") {
                statement = statement.split_once(')')?.1.trim();
            }
            let mut tokens = statement.split_whitespace();
            (tokens.next()? == qualifier).then(|| tokens.last().map(str::to_owned))?
        })
        .collect()
}

impl GpuDriver for HeadlessDriver {
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        let name = state.allocate();
        state.shader_allocations += 1;
        state.shaders.insert(
            name,
            ShaderRecord {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Ok(ShaderHandle(name))
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> bool {
        let mut state = self.state.borrow_mut();
        state.touch();
        let Some(record) = state.shaders.get_mut(&shader.0) else {
            return false;
        };
        record.source = source.to_owned();
        match check_glsl(source) {
            Ok(()) => {
                record.compiled = true;
                record.log.clear();
            }
            Err(log) => {
                record.compiled = false;
                record.log = format!("ERROR: {log}");
            }
        }
        record.compiled
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader.0)
            .map(|record| record.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.shaders.remove(&shader.0);
    }

    fn create_program(&mut self) -> Result<ProgramHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        let name = state.allocate();
        state.program_allocations += 1;
        state.programs.insert(name, ProgramRecord::default());
        Ok(ProgramHandle(name))
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        if let Some(record) = state.programs.get_mut(&program.0) {
            record.attached.push(shader.0);
        }
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        if let Some(record) = state.programs.get_mut(&program.0) {
            record.attached.retain(|name| *name != shader.0);
        }
    }

    fn link_program(&mut self, program: ProgramHandle) -> bool {
        let mut state = self.state.borrow_mut();
        state.touch();
        let forced = state.fail.link;
        let Some(attached) = state
            .programs
            .get(&program.0)
            .map(|record| record.attached.clone())
        else {
            return false;
        };
        let stage = |kind: ShaderKind| {
            attached
                .iter()
                .filter_map(|name| state.shaders.get(name))
                .find(|shader| shader.kind == kind && shader.compiled)
                .map(|shader| shader.source.clone())
        };
        let result = match (stage(ShaderKind::Vertex), stage(ShaderKind::Fragment)) {
            _ if forced => Err("link failure requested".to_owned()),
            (Some(vertex), Some(fragment)) => {
                let outputs = declarations(&vertex, "out");
                match declarations(&fragment, "in")
                    .into_iter()
                    .find(|input| !outputs.contains(input))
                {
                    Some(missing) => Err(format!(
                        "fragment input '{missing}' is not written by the vertex stage"
                    )),
                    None => {
                        let mut uniforms = declarations(&vertex, "uniform");
                        for name in declarations(&fragment, "uniform") {
                            if !uniforms.contains(&name) {
                                uniforms.push(name);
                            }
                        }
                        Ok(uniforms)
                    }
                }
            }
            _ => Err("program needs a compiled vertex and fragment shader".to_owned()),
        };

        let Some(record) = state.programs.get_mut(&program.0) else {
            return false;
        };
        match result {
            Ok(uniforms) => {
                record.linked = true;
                record.uniforms = uniforms;
                record.log.clear();
            }
            Err(log) => {
                record.linked = false;
                record.log = format!("ERROR: {log}");
            }
        }
        record.linked
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .map(|record| record.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.programs.remove(&program.0);
        if state.current_program == program.0 {
            state.current_program = 0;
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.uniform_queries += 1;
        let record = state.programs.get(&program.0).filter(|record| record.linked)?;
        record
            .uniforms
            .iter()
            .position(|uniform| uniform == name)
            .map(|index| UniformLocation(index as u32))
    }

    fn create_texture(&mut self) -> Result<TextureHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        let name = state.allocate();
        state.texture_allocations += 1;
        state.textures.insert(
            name,
            TextureRecord {
                width: 0,
                height: 0,
                format: None,
                wrap: WrapMode::default(),
            },
        );
        Ok(TextureHandle(name))
    }

    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        upload: &TextureUpload<'_>,
    ) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        if state.fail.upload {
            return Err(DriverError::Gl {
                call: "glTexImage2D",
                code: 0x0505,
            });
        }
        let expected =
            upload.width as usize * upload.height as usize * upload.format.bytes_per_pixel();
        if upload.pixels.len() < expected {
            return Err(DriverError::Gl {
                call: "glTexImage2D",
                code: 0x0501,
            });
        }
        let record = state
            .textures
            .get_mut(&texture.0)
            .ok_or(DriverError::InvalidHandle {
                kind: "texture",
                handle: texture.0,
            })?;
        record.width = upload.width;
        record.height = upload.height;
        record.format = Some(upload.format);
        record.wrap = upload.wrap;
        state.texture_uploads += 1;
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.textures.remove(&texture.0);
        state.bound_textures.retain(|_, bound| *bound != texture.0);
    }

    fn create_mesh(
        &mut self,
        vertices: &[QuadVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        if state.fail.mesh {
            return Err(DriverError::Create {
                kind: "vertex array",
                message: "mesh creation failure requested".into(),
            });
        }
        if indices.iter().any(|index| *index as usize >= vertices.len()) {
            return Err(DriverError::Gl {
                call: "glBufferData",
                code: 0x0501,
            });
        }
        let mesh = MeshHandle {
            vertex_array: state.allocate(),
            vertex_buffer: state.allocate(),
            index_buffer: state.allocate(),
        };
        state.meshes.insert(mesh.vertex_array, mesh);
        Ok(mesh)
    }

    fn delete_mesh(&mut self, mesh: MeshHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.meshes.remove(&mesh.vertex_array);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.viewport = Some((width, height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.clears.push(color);
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.blend = blend;
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.current_program = program.0;
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let mut state = self.state.borrow_mut();
        state.touch();
        let current = state.current_program;
        if let Some(record) = state.programs.get_mut(&current) {
            record.values.insert(location.0, UniformValue::Int(value));
        }
    }

    fn set_uniform_vec2(&mut self, location: UniformLocation, value: [f32; 2]) {
        let mut state = self.state.borrow_mut();
        state.touch();
        let current = state.current_program;
        if let Some(record) = state.programs.get_mut(&current) {
            record.values.insert(location.0, UniformValue::Vec2(value));
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        let mut state = self.state.borrow_mut();
        state.touch();
        state.bound_textures.insert(unit, texture.0);
    }

    fn draw_indexed(&mut self, mesh: MeshHandle, index_count: u32) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.touch();
        if state.fail.draw {
            return Err(DriverError::Gl {
                call: "glDrawElements",
                code: 0x0502,
            });
        }
        if !state.meshes.contains_key(&mesh.vertex_array) {
            return Err(DriverError::InvalidHandle {
                kind: "vertex array",
                handle: mesh.vertex_array,
            });
        }
        let program = state.current_program;
        let Some(record) = state.programs.get(&program).filter(|record| record.linked) else {
            return Err(DriverError::Gl {
                call: "glDrawElements",
                code: 0x0502,
            });
        };
        let uniforms = record
            .values
            .iter()
            .filter_map(|(location, value)| {
                let name = record.uniforms.get(*location as usize)?;
                Some((name.clone(), *value))
            })
            .collect();
        let texture = state.bound_textures.get(&0).copied().unwrap_or(0);
        let draw = DrawRecord {
            program: ProgramHandle(program),
            texture: TextureHandle(texture),
            blend: state.blend,
            index_count,
            uniforms,
        };
        state.draws.push(draw);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessSurface(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessContext(u32);

/// [`DisplayBackend`] whose display, surface and context exist only in the
/// shared ledger.
#[derive(Debug)]
pub struct HeadlessBackend {
    state: Shared,
    configs: Vec<PixelConfig>,
    size: (u32, u32),
}

impl HeadlessBackend {
    /// Offers a 16-bit config followed by the required 8/8/8/24 one.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState::default())),
            configs: vec![
                PixelConfig {
                    red: 5,
                    green: 6,
                    blue: 5,
                    depth: 16,
                },
                PixelConfig::REQUIRED,
            ],
            size: (800, 600),
        }
    }

    pub fn with_configs(mut self, configs: Vec<PixelConfig>) -> Self {
        self.configs = configs;
        self
    }

    pub fn fail_display(self) -> Self {
        self.state.borrow_mut().fail.display = true;
        self
    }

    pub fn fail_surface(self) -> Self {
        self.state.borrow_mut().fail.surface = true;
        self
    }

    pub fn fail_context(self) -> Self {
        self.state.borrow_mut().fail.context = true;
        self
    }

    pub fn fail_present(self) -> Self {
        self.state.borrow_mut().fail.present = true;
        self
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBackend for HeadlessBackend {
    type Config = PixelConfig;
    type Surface = HeadlessSurface;
    type Context = HeadlessContext;
    type Driver = HeadlessDriver;

    fn open_display(&mut self) -> Result<(), SurfaceInitError> {
        let mut state = self.state.borrow_mut();
        if state.fail.display {
            return Err(SurfaceInitError::Display("no display available".into()));
        }
        state.display_open = true;
        Ok(())
    }

    fn configs(&mut self) -> Result<Vec<(PixelConfig, PixelConfig)>, SurfaceInitError> {
        Ok(self.configs.iter().map(|config| (*config, *config)).collect())
    }

    fn create_surface(&mut self, _config: &PixelConfig) -> Result<HeadlessSurface, SurfaceInitError> {
        let mut state = self.state.borrow_mut();
        if state.fail.surface {
            return Err(SurfaceInitError::Surface("surface creation failure requested".into()));
        }
        state.surface_live = true;
        state.surface_size = Some(self.size);
        let name = state.allocate();
        Ok(HeadlessSurface(name))
    }

    fn create_context(
        &mut self,
        _config: &PixelConfig,
        _surface: &HeadlessSurface,
    ) -> Result<HeadlessContext, SurfaceInitError> {
        let mut state = self.state.borrow_mut();
        if state.fail.context {
            return Err(SurfaceInitError::Context("context creation failure requested".into()));
        }
        state.context_live = true;
        let name = state.allocate();
        Ok(HeadlessContext(name))
    }

    fn load_driver(&mut self, _context: &HeadlessContext) -> Result<HeadlessDriver, SurfaceInitError> {
        self.state.borrow_mut().requires_context = true;
        Ok(HeadlessDriver {
            state: Rc::clone(&self.state),
        })
    }

    fn swap_buffers(
        &mut self,
        _surface: &HeadlessSurface,
        _context: &HeadlessContext,
    ) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        if state.fail.present {
            state.failed_presents += 1;
            return Err("buffer swap failure requested".into());
        }
        state.presents += 1;
        Ok(())
    }

    fn resize_surface(
        &mut self,
        _surface: &HeadlessSurface,
        _context: &HeadlessContext,
        width: u32,
        height: u32,
    ) {
        self.state.borrow_mut().surface_size = Some((width, height));
    }

    fn destroy_context(&mut self, _context: HeadlessContext) {
        self.state.borrow_mut().context_live = false;
    }

    fn destroy_surface(&mut self, _surface: HeadlessSurface) {
        let mut state = self.state.borrow_mut();
        state.surface_live = false;
        state.surface_size = None;
    }

    fn close_display(&mut self) {
        self.state.borrow_mut().display_open = false;
    }
}

/// Serves pre-decoded images by asset identifier.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    images: HashMap<String, PixelBuffer>,
    decodes: Cell<usize>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, asset: impl Into<String>, image: PixelBuffer) -> Self {
        self.images.insert(asset.into(), image);
        self
    }

    /// Number of successful and failed `decode` calls so far.
    pub fn decodes(&self) -> usize {
        self.decodes.get()
    }
}

impl ImageDecoder for MemoryDecoder {
    fn decode(&self, asset: &str) -> Result<PixelBuffer, TextureError> {
        self.decodes.set(self.decodes.get() + 1);
        self.images
            .get(asset)
            .cloned()
            .ok_or_else(|| TextureError::Decode {
                asset: asset.to_owned(),
                message: "no such image".into(),
            })
    }
}

/// Produces a solid RGBA image for any asset identifier.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticDecoder {
    width: u32,
    height: u32,
}

impl SyntheticDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SyntheticDecoder {
    fn default() -> Self {
        Self::new(16, 16)
    }
}

impl ImageDecoder for SyntheticDecoder {
    fn decode(&self, asset: &str) -> Result<PixelBuffer, TextureError> {
        // Tint derived from the identifier so layers stay distinguishable.
        let tint = asset.bytes().fold(0u8, |acc, byte| acc.wrapping_add(byte));
        Ok(PixelBuffer::solid_rgba(
            self.width,
            self.height,
            [tint, 255 - tint, 200, 255],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShaderSources;

    #[test]
    fn glsl_check_catches_structural_errors() {
        let sources = ShaderSources::default();
        assert!(check_glsl(&sources.quad_vertex).is_ok());
        assert!(check_glsl(&sources.sprite_fragment).is_ok());
        assert!(check_glsl("void main() {}").is_err());
        assert!(check_glsl("#version 300 es\nvoid main() {").is_err());
        assert!(check_glsl("#version 300 es\nvoid main() }{").is_err());
    }

    #[test]
    fn declarations_are_parsed_from_bundled_sources() {
        let sources = ShaderSources::default();
        assert_eq!(
            declarations(&sources.sprite_fragment, "uniform"),
            vec!["uvOffset", "uvScale", "snowTexture"]
        );
        assert_eq!(declarations(&sources.quad_vertex, "in"), vec!["aPos", "aTexCoord"]);
        assert_eq!(declarations(&sources.quad_vertex, "out"), vec!["TexCoord"]);
    }

    #[test]
    fn link_requires_matching_varyings() {
        let mut driver = HeadlessDriver::standalone();
        let vertex = driver.create_shader(ShaderKind::Vertex).expect("shader");
        let fragment = driver.create_shader(ShaderKind::Fragment).expect("shader");
        assert!(driver.compile_shader(
            vertex,
            "#version 300 es\nout vec2 Other;\nvoid main() {}"
        ));
        assert!(driver.compile_shader(
            fragment,
            "#version 300 es\nin vec2 TexCoord;\nvoid main() {}"
        ));
        let program = driver.create_program().expect("program");
        driver.attach_shader(program, vertex);
        driver.attach_shader(program, fragment);
        assert!(!driver.link_program(program));
        assert!(driver.program_info_log(program).contains("TexCoord"));
    }

    #[test]
    fn draws_record_named_uniforms() {
        let mut driver = HeadlessDriver::standalone();
        let sources = ShaderSources::default();
        let mut cache = crate::gpu::ShaderCache::new();
        let program = cache
            .build(&mut driver, &sources.sprite_vertex, &sources.sprite_fragment)
            .expect("program");
        let quad = crate::gpu::build_unit_quad(&mut driver).expect("quad");
        driver.use_program(program);
        let offset = driver.uniform_location(program, "uvOffset").expect("uvOffset");
        driver.set_uniform_vec2(offset, [0.5, 0.25]);
        quad.draw(&mut driver).expect("draw");

        let draws = driver.probe().draws();
        assert_eq!(
            draws[0].uniforms.get("uvOffset"),
            Some(&UniformValue::Vec2([0.5, 0.25]))
        );
    }

    #[test]
    fn backend_driver_counts_calls_without_context() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        backend.open_display().expect("display");
        let surface = backend.create_surface(&PixelConfig::REQUIRED).expect("surface");
        let context = backend
            .create_context(&PixelConfig::REQUIRED, &surface)
            .expect("context");
        let mut driver = backend.load_driver(&context).expect("driver");
        driver.clear([0.0; 4]);
        backend.destroy_context(context);
        driver.clear([0.0; 4]);
        assert_eq!(probe.stray_calls(), 1);
    }

    #[test]
    fn memory_decoder_counts_lookups() {
        let decoder = MemoryDecoder::new().with_image("a", PixelBuffer::solid_rgba(1, 1, [0; 4]));
        assert!(decoder.decode("a").is_ok());
        assert!(decoder.decode("b").is_err());
        assert_eq!(decoder.decodes(), 2);
    }
}
