use std::fmt;

use serde::Serialize;

use crate::animation::SpriteGrid;
use crate::gpu::{BlendFunc, WrapMode};

/// The four scene layers, in draw order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerId {
    Background,
    FarSnow,
    Foreground,
    NearSnow,
}

impl LayerId {
    pub const DRAW_ORDER: [LayerId; 4] = [
        LayerId::Background,
        LayerId::FarSnow,
        LayerId::Foreground,
        LayerId::NearSnow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerId::Background => "background",
            LayerId::FarSnow => "far_snow",
            LayerId::Foreground => "foreground",
            LayerId::NearSnow => "near_snow",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a layer is composited onto what is already in the colour buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Blending disabled; the layer overwrites the buffer.
    #[default]
    Opaque,
    /// `(SRC_ALPHA, ONE_MINUS_SRC_ALPHA)`.
    Alpha,
    /// `(SRC_ALPHA, ONE)`.
    Additive,
}

impl BlendMode {
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Opaque => "opaque",
            BlendMode::Alpha => "alpha",
            BlendMode::Additive => "additive",
        }
    }

    pub fn func(self) -> Option<BlendFunc> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::Alpha => Some(BlendFunc::ALPHA),
            BlendMode::Additive => Some(BlendFunc::ADDITIVE),
        }
    }
}

/// Grid and playback rate of an animated layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteSheet {
    pub rows: u32,
    pub cols: u32,
    pub fps: u32,
}

impl SpriteSheet {
    pub fn grid(&self) -> Option<SpriteGrid> {
        SpriteGrid::new(self.rows, self.cols)
    }
}

/// Everything the compositor needs to know about one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerConfig {
    /// Asset identifier handed to the image decoder; also the texture slot.
    pub asset: String,
    pub blend: BlendMode,
    pub wrap: WrapMode,
    /// `None` for a static layer drawn with the full texture.
    pub sprite: Option<SpriteSheet>,
    /// A layer whose program fails to link aborts renderer construction.
    pub essential: bool,
}

impl LayerConfig {
    pub fn still(asset: impl Into<String>, blend: BlendMode) -> Self {
        Self {
            asset: asset.into(),
            blend,
            wrap: WrapMode::ClampToEdge,
            sprite: None,
            essential: false,
        }
    }

    pub fn animated(asset: impl Into<String>, blend: BlendMode, sheet: SpriteSheet) -> Self {
        Self {
            sprite: Some(sheet),
            ..Self::still(asset, blend)
        }
    }

    pub fn essential(mut self, essential: bool) -> Self {
        self.essential = essential;
        self
    }
}

/// GLSL ES 300 sources for the two programs the scene uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub quad_vertex: String,
    pub quad_fragment: String,
    pub sprite_vertex: String,
    pub sprite_fragment: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            quad_vertex: include_str!("../shaders/fullscreen.vert").to_owned(),
            quad_fragment: include_str!("../shaders/quad.frag").to_owned(),
            sprite_vertex: include_str!("../shaders/fullscreen.vert").to_owned(),
            sprite_fragment: include_str!("../shaders/sprite.frag").to_owned(),
        }
    }
}

/// Uniform names the bundled shaders use.
pub mod uniforms {
    pub const QUAD_TEXTURE: &str = "quadTexture";
    pub const SPRITE_TEXTURE: &str = "snowTexture";
    pub const UV_OFFSET: &str = "uvOffset";
    pub const UV_SCALE: &str = "uvScale";
}

pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.3, 0.2, 0.3, 1.0];

/// Scene description injected into [`crate::SceneRenderer::new`].
#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub background: LayerConfig,
    pub far_snow: LayerConfig,
    pub foreground: LayerConfig,
    pub near_snow: LayerConfig,
    pub clear_color: [f32; 4],
    pub shaders: ShaderSources,
}

impl SceneConfig {
    pub fn layer(&self, id: LayerId) -> &LayerConfig {
        match id {
            LayerId::Background => &self.background,
            LayerId::FarSnow => &self.far_snow,
            LayerId::Foreground => &self.foreground,
            LayerId::NearSnow => &self.near_snow,
        }
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut LayerConfig {
        match id {
            LayerId::Background => &mut self.background,
            LayerId::FarSnow => &mut self.far_snow,
            LayerId::Foreground => &mut self.foreground,
            LayerId::NearSnow => &mut self.near_snow,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        let snow = SpriteSheet {
            rows: 8,
            cols: 16,
            fps: 24,
        };
        Self {
            background: LayerConfig::still("Textures/background4.jpg", BlendMode::Opaque)
                .essential(true),
            far_snow: LayerConfig::animated("Textures/farSnow.png", BlendMode::Additive, snow),
            foreground: LayerConfig::still("Textures/house2.png", BlendMode::Alpha),
            near_snow: LayerConfig::animated("Textures/nearSnow.png", BlendMode::Additive, snow),
            clear_color: DEFAULT_CLEAR_COLOR,
            shaders: ShaderSources::default(),
        }
    }
}
