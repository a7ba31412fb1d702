//! The GL ES calls the renderer issues, collected behind [`GpuDriver`].
//!
//! Handles are plain GL object names. Zero is never a live object, which lets
//! the sentinel handles (`ProgramHandle::INVALID`, `TextureHandle::INVALID`)
//! flow through the compositor without an extra `Option` layer. Every call
//! that can fail reports its status; nothing here assumes success.

use std::fmt;

use bytemuck::{Pod, Zeroable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// Linked program name; `0` marks a program that failed to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

impl ProgramHandle {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Texture object name; `0` marks a texture that failed to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Vertex array plus the two buffers backing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub vertex_array: u32,
    pub vertex_buffer: u32,
    pub index_buffer: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Source/destination factor pair handed to `glBlendFunc`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Standard "over" compositing.
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    /// Brightening blend used for snow: alpha-weighted source added onto the
    /// destination.
    pub const ADDITIVE: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
    };
}

/// Upload layout for a texture, derived from the decoded channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// 1 → single channel, 3 → RGB, 4 → RGBA. Anything else is uploaded as
    /// RGB, which misreads the buffer; callers log that case.
    pub fn from_channels(channels: u8) -> Self {
        match channels {
            1 => Self::Red,
            4 => Self::Rgba,
            _ => Self::Rgb,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Everything `upload_texture` needs. Filtering is fixed: linear mipmapped
/// minification, linear magnification, mipmaps always generated.
#[derive(Clone, Copy, Debug)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub wrap: WrapMode,
    pub pixels: &'a [u8],
}

/// Interleaved quad vertex: location 0 = position, location 1 = uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("driver failed to create {kind}: {message}")]
    Create { kind: &'static str, message: String },
    #[error("GL error 0x{code:04x} after {call}")]
    Gl { call: &'static str, code: u32 },
    #[error("{kind} handle {handle} is not a live object")]
    InvalidHandle { kind: &'static str, handle: u32 },
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// GL ES 3 entry points used by the scene renderer.
///
/// The context backing a driver must be current on the calling thread for
/// every call; the renderer is single threaded and never moves it.
pub trait GpuDriver {
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderHandle, DriverError>;
    /// Sets the source and compiles; returns the compile status.
    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self) -> Result<ProgramHandle, DriverError>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    /// Links and returns the link status.
    fn link_program(&mut self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&mut self, program: ProgramHandle);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn create_texture(&mut self) -> Result<TextureHandle, DriverError>;
    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        upload: &TextureUpload<'_>,
    ) -> Result<(), DriverError>;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_mesh(
        &mut self,
        vertices: &[QuadVertex],
        indices: &[u32],
    ) -> Result<MeshHandle, DriverError>;
    fn delete_mesh(&mut self, mesh: MeshHandle);

    fn set_viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self, color: [f32; 4]);
    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<BlendFunc>);
    fn use_program(&mut self, program: ProgramHandle);
    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);
    fn set_uniform_vec2(&mut self, location: UniformLocation, value: [f32; 2]);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    fn draw_indexed(&mut self, mesh: MeshHandle, index_count: u32) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts_map_to_upload_formats() {
        assert_eq!(PixelFormat::from_channels(1), PixelFormat::Red);
        assert_eq!(PixelFormat::from_channels(3), PixelFormat::Rgb);
        assert_eq!(PixelFormat::from_channels(4), PixelFormat::Rgba);
        assert_eq!(PixelFormat::from_channels(2), PixelFormat::Rgb);
        assert_eq!(PixelFormat::from_channels(0), PixelFormat::Rgb);
    }

    #[test]
    fn quad_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn sentinel_handles_are_invalid() {
        assert!(!ProgramHandle::INVALID.is_valid());
        assert!(!TextureHandle::INVALID.is_valid());
        assert!(ProgramHandle(3).is_valid());
    }
}
