use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use renderer::gpu::WrapMode;
use renderer::{BlendMode, LayerConfig, LayerId, SceneConfig, SpriteSheet, WindowOptions};
use sceneconfig::{BlendSetting, LayerSection, SceneFile, ShaderSection, WrapSetting};

/// Applies a scene file on top of the built-in scene. Shader override paths
/// resolve against `base_dir`.
pub fn scene_from_file(file: &SceneFile, base_dir: Option<&Path>) -> Result<SceneConfig> {
    let mut scene = SceneConfig::default();
    if let Some(color) = file.clear_color {
        scene.clear_color = color;
    }

    let sections = [
        (LayerId::Background, file.layers.background.as_ref()),
        (LayerId::FarSnow, file.layers.far_snow.as_ref()),
        (LayerId::Foreground, file.layers.foreground.as_ref()),
        (LayerId::NearSnow, file.layers.near_snow.as_ref()),
    ];
    for (id, section) in sections {
        if let Some(section) = section {
            apply_layer(id, scene.layer_mut(id), section)?;
        }
    }

    apply_shaders(&mut scene, &file.shaders, base_dir)?;
    Ok(scene)
}

pub fn window_options(file: &SceneFile, size_override: Option<(u32, u32)>) -> WindowOptions {
    let mut options = WindowOptions::default();
    if let Some(title) = &file.window.title {
        options.title = title.clone();
    }
    if let Some(width) = file.window.width {
        options.size.0 = width;
    }
    if let Some(height) = file.window.height {
        options.size.1 = height;
    }
    if let Some(size) = size_override {
        options.size = size;
    }
    options
}

fn apply_layer(id: LayerId, layer: &mut LayerConfig, section: &LayerSection) -> Result<()> {
    if let Some(asset) = &section.asset {
        layer.asset = asset.clone();
    }
    if let Some(blend) = section.blend {
        layer.blend = map_blend(blend);
    }
    if let Some(wrap) = section.wrap {
        layer.wrap = map_wrap(wrap);
    }
    if let Some(essential) = section.essential {
        layer.essential = essential;
    }

    if section.has_sprite_keys() {
        layer.sprite = Some(match layer.sprite {
            Some(sheet) => SpriteSheet {
                rows: section.rows.unwrap_or(sheet.rows),
                cols: section.cols.unwrap_or(sheet.cols),
                fps: section.fps.unwrap_or(sheet.fps),
            },
            None => match (section.rows, section.cols, section.fps) {
                (Some(rows), Some(cols), Some(fps)) => SpriteSheet { rows, cols, fps },
                _ => bail!("layer '{id}' is static; animating it needs rows, cols and fps"),
            },
        });
    }

    tracing::debug!(layer = %id, asset = %layer.asset, blend = ?layer.blend, "applied layer overrides");
    Ok(())
}

fn apply_shaders(
    scene: &mut SceneConfig,
    section: &ShaderSection,
    base_dir: Option<&Path>,
) -> Result<()> {
    let shaders = &mut scene.shaders;
    let slots = [
        (&section.quad_vertex, &mut shaders.quad_vertex),
        (&section.quad_fragment, &mut shaders.quad_fragment),
        (&section.sprite_vertex, &mut shaders.sprite_vertex),
        (&section.sprite_fragment, &mut shaders.sprite_fragment),
    ];
    for (path, target) in slots {
        let Some(path) = path else {
            continue;
        };
        let resolved = match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.clone(),
        };
        *target = fs::read_to_string(&resolved)
            .with_context(|| format!("failed to read shader {}", resolved.display()))?;
        tracing::info!(path = %resolved.display(), "loaded shader override");
    }
    Ok(())
}

fn map_blend(blend: BlendSetting) -> BlendMode {
    match blend {
        BlendSetting::Opaque => BlendMode::Opaque,
        BlendSetting::Alpha => BlendMode::Alpha,
        BlendSetting::Additive => BlendMode::Additive,
    }
}

fn map_wrap(wrap: WrapSetting) -> WrapMode {
    match wrap {
        WrapSetting::Clamp => WrapMode::ClampToEdge,
        WrapSetting::Repeat => WrapMode::Repeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bundled_file_reproduces_builtin_scene() {
        let file = SceneFile::from_toml_str(sceneconfig::DEFAULT_SCENE_TOML).unwrap();
        let scene = scene_from_file(&file, None).unwrap();
        assert_eq!(scene, SceneConfig::default());
    }

    #[test]
    fn overrides_merge_onto_layers() {
        let file = SceneFile::from_toml_str(
            r#"
version = 1
clear_color = [0.0, 0.0, 0.0, 1.0]

[layers.near_snow]
fps = 12
wrap = "repeat"

[layers.foreground]
asset = "Textures/cabin.png"
rows = 2
cols = 2
fps = 4
"#,
        )
        .unwrap();
        let scene = scene_from_file(&file, None).unwrap();
        assert_eq!(scene.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            scene.near_snow.sprite,
            Some(SpriteSheet {
                rows: 8,
                cols: 16,
                fps: 12
            })
        );
        assert_eq!(scene.near_snow.wrap, WrapMode::Repeat);
        assert_eq!(scene.foreground.asset, "Textures/cabin.png");
        assert_eq!(scene.foreground.blend, BlendMode::Alpha);
        assert_eq!(
            scene.foreground.sprite,
            Some(SpriteSheet {
                rows: 2,
                cols: 2,
                fps: 4
            })
        );
    }

    #[test]
    fn partial_sprite_on_static_layer_is_rejected() {
        let file =
            SceneFile::from_toml_str("version = 1\n[layers.background]\nrows = 2\n").unwrap();
        let err = scene_from_file(&file, None).unwrap_err();
        assert!(err.to_string().contains("background"));
    }

    #[test]
    fn shader_overrides_resolve_against_base_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("snow.frag"), "#version 300 es\nvoid main() {}\n").unwrap();
        let file = SceneFile::from_toml_str(
            "version = 1\n[shaders]\nsprite_fragment = \"snow.frag\"\n",
        )
        .unwrap();

        let scene = scene_from_file(&file, Some(dir.path())).unwrap();
        assert!(scene.shaders.sprite_fragment.contains("void main"));
        assert_eq!(
            scene.shaders.quad_fragment,
            SceneConfig::default().shaders.quad_fragment
        );

        let missing = TempDir::new().unwrap();
        assert!(scene_from_file(&file, Some(missing.path())).is_err());
    }

    #[test]
    fn window_size_flag_beats_file() {
        let file = SceneFile::from_toml_str(
            "version = 1\n[window]\ntitle = \"Cabin\"\nwidth = 640\nheight = 480\n",
        )
        .unwrap();
        let options = window_options(&file, None);
        assert_eq!(options.title, "Cabin");
        assert_eq!(options.size, (640, 480));
        assert_eq!(window_options(&file, Some((320, 200))).size, (320, 200));
    }
}
