use std::collections::HashMap;
use std::fmt;

use super::driver::{GpuDriver, ProgramHandle, ShaderHandle, ShaderKind, UniformLocation};

/// Compiler/linker diagnostics are cut to this many bytes.
pub const DIAGNOSTIC_LIMIT: usize = 512;

/// The step of a program build that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStage {
    Vertex,
    Fragment,
    Link,
}

impl From<ShaderKind> for BuildStage {
    fn from(kind: ShaderKind) -> Self {
        match kind {
            ShaderKind::Vertex => BuildStage::Vertex,
            ShaderKind::Fragment => BuildStage::Fragment,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Vertex => f.write_str("vertex"),
            BuildStage::Fragment => f.write_str("fragment"),
            BuildStage::Link => f.write_str("link"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage failed: {log}")]
pub struct ShaderCompileError {
    pub stage: BuildStage,
    pub log: String,
}

impl ShaderCompileError {
    pub fn new(stage: BuildStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: truncate_diagnostic(log.into()),
        }
    }
}

fn truncate_diagnostic(mut log: String) -> String {
    if log.len() > DIAGNOSTIC_LIMIT {
        let mut end = DIAGNOSTIC_LIMIT;
        while !log.is_char_boundary(end) {
            end -= 1;
        }
        log.truncate(end);
    }
    let trimmed = log.trim_end().len();
    log.truncate(trimmed);
    log
}

/// A linked program plus the uniform locations looked up so far.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    fn new(handle: ProgramHandle) -> Self {
        Self {
            handle,
            uniforms: HashMap::new(),
        }
    }

    /// Cached `glGetUniformLocation`; misses are cached too.
    pub fn uniform<D>(&mut self, driver: &D, name: &str) -> Option<UniformLocation>
    where
        D: GpuDriver + ?Sized,
    {
        if let Some(location) = self.uniforms.get(name) {
            return *location;
        }
        let location = driver.uniform_location(self.handle, name);
        if location.is_none() {
            tracing::debug!(program = self.handle.0, uniform = name, "uniform not active");
        }
        self.uniforms.insert(name.to_owned(), location);
        location
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ProgramKey {
    vertex: String,
    fragment: String,
}

/// One linked program per distinct (vertex, fragment) source pair.
///
/// Failed pairs are remembered so a broken shader is reported once rather
/// than recompiled on every request.
#[derive(Debug, Default)]
pub struct ShaderCache {
    by_source: HashMap<ProgramKey, Result<ProgramHandle, ShaderCompileError>>,
    programs: HashMap<ProgramHandle, ShaderProgram>,
    order: Vec<ProgramHandle>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<D>(
        &mut self,
        driver: &mut D,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramHandle, ShaderCompileError>
    where
        D: GpuDriver + ?Sized,
    {
        let key = ProgramKey {
            vertex: vertex.to_owned(),
            fragment: fragment.to_owned(),
        };
        if let Some(entry) = self.by_source.get(&key) {
            return entry.clone();
        }

        let result = build_program(driver, vertex, fragment);
        if let Ok(handle) = result {
            tracing::debug!(program = handle.0, "shader program linked");
            self.programs.insert(handle, ShaderProgram::new(handle));
            self.order.push(handle);
        }
        self.by_source.insert(key, result.clone());
        result
    }

    /// Like [`ShaderCache::build`], but logs the failure and hands back
    /// [`ProgramHandle::INVALID`] so the caller can skip the layer.
    pub fn build_or_invalid<D>(
        &mut self,
        driver: &mut D,
        vertex: &str,
        fragment: &str,
        label: &str,
    ) -> ProgramHandle
    where
        D: GpuDriver + ?Sized,
    {
        match self.build(driver, vertex, fragment) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(
                    layer = label,
                    stage = %err.stage,
                    log = %err.log,
                    "shader program failed to build; layer disabled"
                );
                ProgramHandle::INVALID
            }
        }
    }

    pub fn uniform<D>(
        &mut self,
        driver: &D,
        program: ProgramHandle,
        name: &str,
    ) -> Option<UniformLocation>
    where
        D: GpuDriver + ?Sized,
    {
        self.programs.get_mut(&program)?.uniform(driver, name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Deletes every linked program, newest first.
    pub fn release<D>(&mut self, driver: &mut D)
    where
        D: GpuDriver + ?Sized,
    {
        for handle in self.order.drain(..).rev() {
            driver.delete_program(handle);
        }
        self.programs.clear();
        self.by_source.clear();
    }
}

fn compile_stage<D>(
    driver: &mut D,
    kind: ShaderKind,
    source: &str,
) -> Result<ShaderHandle, ShaderCompileError>
where
    D: GpuDriver + ?Sized,
{
    let shader = driver
        .create_shader(kind)
        .map_err(|err| ShaderCompileError::new(kind.into(), err.to_string()))?;
    if !driver.compile_shader(shader, source) {
        let log = driver.shader_info_log(shader);
        driver.delete_shader(shader);
        return Err(ShaderCompileError::new(kind.into(), log));
    }
    Ok(shader)
}

fn build_program<D>(
    driver: &mut D,
    vertex: &str,
    fragment: &str,
) -> Result<ProgramHandle, ShaderCompileError>
where
    D: GpuDriver + ?Sized,
{
    let vertex_shader = compile_stage(driver, ShaderKind::Vertex, vertex)?;
    let fragment_shader = match compile_stage(driver, ShaderKind::Fragment, fragment) {
        Ok(shader) => shader,
        Err(err) => {
            driver.delete_shader(vertex_shader);
            return Err(err);
        }
    };

    let program = match driver.create_program() {
        Ok(program) => program,
        Err(err) => {
            driver.delete_shader(vertex_shader);
            driver.delete_shader(fragment_shader);
            return Err(ShaderCompileError::new(BuildStage::Link, err.to_string()));
        }
    };

    driver.attach_shader(program, vertex_shader);
    driver.attach_shader(program, fragment_shader);
    let linked = driver.link_program(program);
    let failure = (!linked).then(|| driver.program_info_log(program));

    // The program keeps the compiled code; the shader objects are done.
    driver.detach_shader(program, vertex_shader);
    driver.detach_shader(program, fragment_shader);
    driver.delete_shader(vertex_shader);
    driver.delete_shader(fragment_shader);

    if let Some(log) = failure {
        driver.delete_program(program);
        return Err(ShaderCompileError::new(BuildStage::Link, log));
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDriver;
    use crate::types::ShaderSources;

    #[test]
    fn identical_sources_share_one_program() {
        let mut driver = HeadlessDriver::standalone();
        let sources = ShaderSources::default();
        let mut cache = ShaderCache::new();
        let first = cache
            .build(&mut driver, &sources.sprite_vertex, &sources.sprite_fragment)
            .expect("sprite program");
        let second = cache
            .build(&mut driver, &sources.sprite_vertex, &sources.sprite_fragment)
            .expect("sprite program");
        let quad = cache
            .build(&mut driver, &sources.quad_vertex, &sources.quad_fragment)
            .expect("quad program");

        assert_eq!(first, second);
        assert_ne!(first, quad);
        assert_eq!(cache.len(), 2);
        assert_eq!(driver.probe().live_programs(), 2);
        assert_eq!(driver.probe().live_shaders(), 0);
    }

    #[test]
    fn invalid_fragment_returns_sentinel_and_frees_vertex_shader() {
        let mut driver = HeadlessDriver::standalone();
        let sources = ShaderSources::default();
        let mut cache = ShaderCache::new();
        let broken = "#version 300 es\nvoid main() { gl_FragColor = ; ";

        let err = cache
            .build(&mut driver, &sources.quad_vertex, broken)
            .unwrap_err();
        assert_eq!(err.stage, BuildStage::Fragment);

        let handle = cache.build_or_invalid(&mut driver, &sources.quad_vertex, broken, "test");
        assert_eq!(handle, ProgramHandle::INVALID);

        let probe = driver.probe();
        assert_eq!(probe.live_shaders(), 0);
        assert_eq!(probe.live_programs(), 0);
        // The failed pair is not compiled a second time.
        assert_eq!(probe.shader_allocations(), 2);
    }

    #[test]
    fn link_failure_is_reported_with_stage() {
        let mut driver = HeadlessDriver::standalone();
        driver.probe().force_link_failure(true);
        let sources = ShaderSources::default();
        let mut cache = ShaderCache::new();

        let err = cache
            .build(&mut driver, &sources.quad_vertex, &sources.quad_fragment)
            .unwrap_err();
        assert_eq!(err.stage, BuildStage::Link);
        assert_eq!(driver.probe().live_programs(), 0);
        assert_eq!(driver.probe().live_shaders(), 0);
    }

    #[test]
    fn diagnostics_are_capped() {
        let long = "é".repeat(400);
        let err = ShaderCompileError::new(BuildStage::Vertex, long);
        assert!(err.log.len() <= DIAGNOSTIC_LIMIT);
        assert!(err.log.chars().all(|ch| ch == 'é'));
    }

    #[test]
    fn uniform_lookups_are_cached() {
        let mut driver = HeadlessDriver::standalone();
        let sources = ShaderSources::default();
        let mut cache = ShaderCache::new();
        let program = cache
            .build(&mut driver, &sources.sprite_vertex, &sources.sprite_fragment)
            .expect("sprite program");

        let offset = cache.uniform(&driver, program, "uvOffset");
        assert!(offset.is_some());
        assert_eq!(cache.uniform(&driver, program, "uvOffset"), offset);
        assert!(cache.uniform(&driver, program, "missing").is_none());
        assert_eq!(driver.probe().uniform_queries(), 2);
    }

    #[test]
    fn release_deletes_programs() {
        let mut driver = HeadlessDriver::standalone();
        let sources = ShaderSources::default();
        let mut cache = ShaderCache::new();
        cache
            .build(&mut driver, &sources.quad_vertex, &sources.quad_fragment)
            .expect("quad program");
        cache.release(&mut driver);
        assert!(cache.is_empty());
        assert_eq!(driver.probe().live_programs(), 0);
    }
}
