use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// The scene file written by `snowscene defaults write`.
pub const DEFAULT_SCENE_TOML: &str = include_str!("../default-scene.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendSetting {
    Opaque,
    Alpha,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapSetting {
    Clamp,
    Repeat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFile {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_color: Option<[f32; 4]>,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub simulate: SimulateSection,
    #[serde(default)]
    pub shaders: ShaderSection,
    #[serde(default)]
    pub layers: LayerSections,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimulateSection {
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    pub tick_hz: Option<u32>,
}

/// Shader source overrides, as paths relative to the scene file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSection {
    pub quad_vertex: Option<PathBuf>,
    pub quad_fragment: Option<PathBuf>,
    pub sprite_vertex: Option<PathBuf>,
    pub sprite_fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSections {
    pub background: Option<LayerSection>,
    pub far_snow: Option<LayerSection>,
    pub foreground: Option<LayerSection>,
    pub near_snow: Option<LayerSection>,
}

impl LayerSections {
    /// Present sections with their table names, in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &LayerSection)> {
        [
            ("background", self.background.as_ref()),
            ("far_snow", self.far_snow.as_ref()),
            ("foreground", self.foreground.as_ref()),
            ("near_snow", self.near_snow.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, section)| section.map(|section| (name, section)))
    }
}

/// Overrides for one layer. Unset keys keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSection {
    pub asset: Option<String>,
    pub blend: Option<BlendSetting>,
    pub wrap: Option<WrapSetting>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub fps: Option<u32>,
    pub essential: Option<bool>,
}

impl LayerSection {
    pub fn has_sprite_keys(&self) -> bool {
        self.rows.is_some() || self.cols.is_some() || self.fps.is_some()
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SceneFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(color) = self.clear_color {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(ConfigError::Invalid(
                    "clear_color components must be within 0.0..=1.0".into(),
                ));
            }
        }

        if self.window.width == Some(0) || self.window.height == Some(0) {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        if self.simulate.tick_hz == Some(0) {
            return Err(ConfigError::Invalid(
                "simulate.tick_hz must be greater than zero".into(),
            ));
        }

        for (name, layer) in self.layers.iter() {
            if let Some(asset) = &layer.asset {
                if asset.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "layer '{name}' asset may not be empty"
                    )));
                }
            }

            for (key, value) in [("rows", layer.rows), ("cols", layer.cols), ("fps", layer.fps)] {
                if value == Some(0) {
                    return Err(ConfigError::Invalid(format!(
                        "layer '{name}' {key} must be greater than zero"
                    )));
                }
            }

            if let (Some(rows), Some(cols)) = (layer.rows, layer.cols) {
                if rows.checked_mul(cols).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "layer '{name}' has too many sprite cells ({rows}x{cols})"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
clear_color = [0.1, 0.1, 0.2, 1.0]

[window]
width = 640

[simulate]
duration = "1500ms"

[shaders]
sprite_fragment = "shaders/snow.frag"

[layers.near_snow]
asset = "Textures/heavySnow.png"
rows = 4
cols = 4
fps = 12
wrap = "repeat"

[layers.background]
essential = false
"#;

    #[test]
    fn parses_sample_config() {
        let config = SceneFile::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.window.width, Some(640));
        assert_eq!(config.window.height, None);
        assert_eq!(config.simulate.duration, Some(Duration::from_millis(1500)));
        let near = config.layers.near_snow.as_ref().expect("near snow");
        assert_eq!(near.wrap, Some(WrapSetting::Repeat));
        assert_eq!((near.rows, near.cols, near.fps), (Some(4), Some(4), Some(12)));
        assert_eq!(
            config.layers.background.as_ref().and_then(|l| l.essential),
            Some(false)
        );
        assert!(config.layers.far_snow.is_none());
        assert_eq!(
            config.shaders.sprite_fragment.as_deref(),
            Some(Path::new("shaders/snow.frag"))
        );
    }

    #[test]
    fn bundled_default_scene_is_valid() {
        let config = SceneFile::from_toml_str(DEFAULT_SCENE_TOML).expect("default scene");
        let names: Vec<_> = config.layers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["background", "far_snow", "foreground", "near_snow"]);
        assert_eq!(config.simulate.tick_hz, Some(60));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SceneFile::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_sprite_dimensions() {
        for key in ["rows", "cols", "fps"] {
            let input = format!("version = 1\n[layers.far_snow]\n{key} = 0\n");
            let err = SceneFile::from_toml_str(&input).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid(message) if message.contains(key)),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn rejects_unknown_layer_and_keys() {
        assert!(matches!(
            SceneFile::from_toml_str("version = 1\n[layers.sky]\nasset = \"a.png\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SceneFile::from_toml_str("version = 1\n[layers.foreground]\nopacity = 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_bad_blend_and_colour() {
        assert!(SceneFile::from_toml_str(
            "version = 1\n[layers.foreground]\nblend = \"multiply\"\n"
        )
        .is_err());
        assert!(matches!(
            SceneFile::from_toml_str("version = 1\nclear_color = [2.0, 0.0, 0.0, 1.0]\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        for value in ["inf", "-1.5", "nan", "1e30"] {
            let input = format!("version = 1\n[simulate]\nduration = {value}\n");
            assert!(
                matches!(SceneFile::from_toml_str(&input), Err(ConfigError::Parse(_))),
                "{value}"
            );
        }
        let config =
            SceneFile::from_toml_str("version = 1\n[simulate]\nduration = 2.5\n").expect("parse");
        assert_eq!(config.simulate.duration, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn reads_from_path() {
        let dir = std::env::temp_dir().join(format!("sceneconfig-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("scene.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        let config = SceneFile::from_path(&path).expect("read");
        assert_eq!(config.window.width, Some(640));
        std::fs::remove_dir_all(&dir).ok();

        assert!(matches!(
            SceneFile::from_path(&dir.join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
