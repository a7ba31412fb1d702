use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use renderer::headless::SyntheticDecoder;
use renderer::{FsImageDecoder, ImageDecoder, LayerReport, SimulationReport, SteppedTimeSource};
use sceneconfig::SceneFile;
use tracing_subscriber::EnvFilter;

use crate::bindings::{scene_from_file, window_options};
use crate::cli::{Cli, Command, DefaultsAction, GlobalArgs, SimulateArgs};
use crate::defaults::{write_scene_file, PathsReport};
use crate::paths::AppPaths;

const DEFAULT_SIMULATION: Duration = Duration::from_secs(2);
const DEFAULT_TICK_HZ: u32 = 60;
/// About four and a half hours at 60 Hz.
const MAX_SIMULATED_TICKS: u64 = 1_000_000;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        "resolved snowscene paths"
    );

    match args.command {
        None | Some(Command::Run) => run_windowed(&args.global, &paths),
        Some(Command::Simulate(sim)) => run_simulation(&args.global, &sim, &paths),
        Some(Command::Defaults(defaults)) => match defaults.action {
            DefaultsAction::Write(write) => {
                let target = write_scene_file(&paths, write.force)?;
                println!("{}", target.display());
                Ok(())
            }
            DefaultsAction::Where(where_args) => {
                let report = PathsReport::new(&paths);
                if where_args.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    report.print();
                }
                Ok(())
            }
        },
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// A loaded scene file plus the directory relative paths resolve against.
struct LoadedScene {
    file: SceneFile,
    base_dir: Option<PathBuf>,
}

fn load_scene(global: &GlobalArgs, paths: &AppPaths) -> Result<LoadedScene> {
    let explicit = global.config.as_deref();
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(paths.scene_file()).filter(|path| path.is_file()),
    };

    let Some(path) = candidate else {
        tracing::info!("no scene file found; using built-in scene");
        let file = SceneFile::from_toml_str(sceneconfig::DEFAULT_SCENE_TOML)
            .context("bundled scene file is invalid")?;
        return Ok(LoadedScene {
            file,
            base_dir: None,
        });
    };

    let file = SceneFile::from_path(&path)
        .with_context(|| format!("failed to load scene file {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded scene file");
    Ok(LoadedScene {
        file,
        base_dir: path.parent().map(Path::to_path_buf),
    })
}

fn assets_root(global: &GlobalArgs, paths: &AppPaths) -> PathBuf {
    if let Some(root) = &global.assets {
        return root.clone();
    }
    let installed = paths.assets_dir();
    if installed.is_dir() {
        installed
    } else {
        PathBuf::from(".")
    }
}

fn run_windowed(global: &GlobalArgs, paths: &AppPaths) -> Result<()> {
    let loaded = load_scene(global, paths)?;
    let scene = scene_from_file(&loaded.file, loaded.base_dir.as_deref())?;
    let options = window_options(&loaded.file, global.size);
    let root = assets_root(global, paths);
    tracing::info!(
        assets = %root.display(),
        width = options.size.0,
        height = options.size.1,
        "starting snow scene"
    );
    renderer::run_windowed(options, scene, Box::new(FsImageDecoder::new(root)))
}

fn run_simulation(global: &GlobalArgs, sim: &SimulateArgs, paths: &AppPaths) -> Result<()> {
    let loaded = load_scene(global, paths)?;
    let scene = scene_from_file(&loaded.file, loaded.base_dir.as_deref())?;

    let duration = sim
        .duration
        .or(loaded.file.simulate.duration)
        .unwrap_or(DEFAULT_SIMULATION);
    let tick_hz = sim
        .tick_hz
        .or(loaded.file.simulate.tick_hz)
        .unwrap_or(DEFAULT_TICK_HZ);
    let clock = match SteppedTimeSource::new(tick_hz) {
        Some(clock) => clock,
        None => bail!("tick rate must be greater than zero"),
    };
    let ticks = tick_count(duration, tick_hz)?;

    let decoder: Box<dyn ImageDecoder> = if sim.synthetic {
        Box::new(SyntheticDecoder::default())
    } else {
        Box::new(FsImageDecoder::new(assets_root(global, paths)))
    };

    tracing::info!(
        duration = %humantime::format_duration(duration),
        tick_hz,
        ticks,
        "simulating snow scene"
    );
    let report = renderer::simulate(&scene, decoder.as_ref(), ticks, clock)
        .context("simulation failed")?;

    if sim.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn tick_count(duration: Duration, tick_hz: u32) -> Result<u64> {
    let ticks = duration.as_nanos() * u128::from(tick_hz) / 1_000_000_000;
    match u64::try_from(ticks) {
        Ok(ticks) if ticks <= MAX_SIMULATED_TICKS => Ok(ticks),
        _ => bail!(
            "simulating {} at {tick_hz} Hz needs {ticks} ticks; the limit is {MAX_SIMULATED_TICKS}",
            humantime::format_duration(duration)
        ),
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "{} ticks at {} Hz ({} ms): {} frames presented, {} layer draws skipped, {} failed",
        report.ticks,
        report.tick_hz,
        report.simulated_ms,
        report.frames_presented,
        report.layers_skipped,
        report.draw_failures
    );
    for layer in &report.layers {
        println!("{}", layer_line(layer));
    }
    if report.leaked_objects > 0 {
        tracing::warn!(
            leaked = report.leaked_objects,
            "GPU objects outlived the renderer"
        );
    }
}

fn layer_line(layer: &LayerReport) -> String {
    let frame = layer
        .frame
        .map(|frame| format!("frame {frame} after {} advances", layer.advances))
        .unwrap_or_else(|| "static".to_string());
    let size = layer
        .texture_size
        .map(|[w, h]| format!("{w}x{h}"))
        .unwrap_or_else(|| "no texture".to_string());
    format!(
        "  {:<10} {:<8} {:<28} {} draws, {}  ({})",
        layer.layer.name(),
        layer.blend.name(),
        frame,
        layer.draws,
        size,
        layer.asset
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_count_truncates_partial_ticks() {
        assert_eq!(tick_count(Duration::from_secs(2), 60).unwrap(), 120);
        assert_eq!(tick_count(Duration::from_millis(1010), 60).unwrap(), 60);
        assert_eq!(tick_count(Duration::ZERO, 60).unwrap(), 0);
    }

    #[test]
    fn layer_lines_keep_columns_aligned() {
        let still = LayerReport {
            layer: renderer::LayerId::Foreground,
            asset: "Textures/house2.png".into(),
            blend: renderer::BlendMode::Alpha,
            frame: None,
            advances: 0,
            draws: 3,
            texture_size: Some([16, 16]),
        };
        let animated = LayerReport {
            layer: renderer::LayerId::NearSnow,
            asset: "Textures/nearSnow.png".into(),
            blend: renderer::BlendMode::Additive,
            frame: Some(5),
            advances: 5,
            draws: 3,
            texture_size: None,
        };
        let still = layer_line(&still);
        let animated = layer_line(&animated);
        assert!(still.starts_with("  foreground alpha    static"));
        assert!(animated.starts_with("  near_snow  additive frame 5 after 5 advances"));
        assert_eq!(still.find("3 draws"), animated.find("3 draws"));
    }

    #[test]
    fn tick_count_is_bounded() {
        let limit = Duration::from_secs(MAX_SIMULATED_TICKS);
        assert_eq!(tick_count(limit, 1).unwrap(), MAX_SIMULATED_TICKS);
        assert!(tick_count(limit, 2).is_err());
        assert!(tick_count(Duration::MAX, u32::MAX).is_err());
    }
}
