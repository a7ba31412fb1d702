use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use crate::paths::AppPaths;

/// Writes the bundled scene file to `<config dir>/scene.toml`.
pub fn write_scene_file(paths: &AppPaths, force: bool) -> Result<PathBuf> {
    let target = paths.scene_file();
    if target.exists() && !force {
        bail!(
            "{} already exists; pass --force to replace it",
            target.display()
        );
    }

    fs::create_dir_all(paths.config_dir()).with_context(|| {
        format!(
            "failed to create config directory {}",
            paths.config_dir().display()
        )
    })?;
    fs::write(&target, sceneconfig::DEFAULT_SCENE_TOML)
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(path = %target.display(), "installed bundled scene file");
    Ok(target)
}

#[derive(Debug, Serialize)]
pub struct PathsReport {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub scene_file: PathBuf,
    pub scene_file_present: bool,
    pub assets_dir: PathBuf,
}

impl PathsReport {
    pub fn new(paths: &AppPaths) -> Self {
        let scene_file = paths.scene_file();
        Self {
            config_dir: paths.config_dir().to_path_buf(),
            data_dir: paths.data_dir().to_path_buf(),
            scene_file_present: scene_file.is_file(),
            scene_file,
            assets_dir: paths.assets_dir(),
        }
    }

    pub fn print(&self) {
        println!("config: {}", self.config_dir.display());
        println!("data:   {}", self.data_dir.display());
        println!(
            "scene:  {}{}",
            self.scene_file.display(),
            if self.scene_file_present {
                ""
            } else {
                " (missing; built-in scene used)"
            }
        );
        println!("assets: {}", self.assets_dir.display());
    }
}
