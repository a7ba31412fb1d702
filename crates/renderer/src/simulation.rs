use std::time::Duration;

use serde::Serialize;

use crate::assets::ImageDecoder;
use crate::compositor::{RendererError, SceneRenderer};
use crate::headless::HeadlessBackend;
use crate::runtime::{SteppedTimeSource, TimeSource};
use crate::types::{BlendMode, LayerId, SceneConfig};

/// Per-layer state at the end of a simulated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerReport {
    pub layer: LayerId,
    pub asset: String,
    pub blend: BlendMode,
    /// Final cell index; `None` for static layers.
    pub frame: Option<u32>,
    pub advances: u64,
    pub draws: u64,
    /// `[width, height]` of the resident texture.
    pub texture_size: Option<[u32; 2]>,
}

/// Result of [`simulate`], suitable for printing as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub tick_hz: u32,
    pub simulated_ms: u128,
    pub frames_presented: u64,
    pub layers_skipped: u64,
    pub draw_failures: u64,
    pub layers: Vec<LayerReport>,
    /// GPU objects still alive after the renderer was dropped.
    pub leaked_objects: usize,
}

/// Renders `ticks` frames on the in-memory backend, one per `clock` step.
pub fn simulate(
    config: &SceneConfig,
    decoder: &dyn ImageDecoder,
    ticks: u64,
    mut clock: SteppedTimeSource,
) -> Result<SimulationReport, RendererError> {
    let backend = HeadlessBackend::new();
    let probe = backend.probe();
    let mut scene = SceneRenderer::new(backend, config, decoder)?;
    clock.reset();

    let mut presented = 0;
    let mut skipped = 0;
    let mut failures = 0;
    let mut elapsed = Duration::ZERO;
    for _ in 0..ticks {
        let sample = clock.sample();
        elapsed = sample.elapsed;
        let report = scene.render_frame(sample.elapsed);
        presented += u64::from(report.presented);
        skipped += u64::from(report.skipped);
        failures += u64::from(report.failed);
    }

    let layers = LayerId::DRAW_ORDER
        .iter()
        .map(|&id| {
            let layer = config.layer(id);
            LayerReport {
                layer: id,
                asset: layer.asset.clone(),
                blend: layer.blend,
                frame: scene.layer_frame(id),
                advances: scene.layer_advances(id),
                draws: scene.layer_draws(id),
                texture_size: probe
                    .texture_info(scene.texture(id))
                    .map(|(width, height, _)| [width, height]),
            }
        })
        .collect();
    drop(scene);

    tracing::info!(ticks, presented, "simulation finished");
    Ok(SimulationReport {
        ticks,
        tick_hz: clock.hz(),
        simulated_ms: elapsed.as_millis(),
        frames_presented: presented,
        layers_skipped: skipped,
        draw_failures: failures,
        layers,
        leaked_objects: probe.live_objects(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::SyntheticDecoder;

    #[test]
    fn default_scene_for_two_seconds() {
        let clock = SteppedTimeSource::new(60).expect("rate");
        let report = simulate(
            &SceneConfig::default(),
            &SyntheticDecoder::default(),
            120,
            clock,
        )
        .expect("simulation");

        assert_eq!(report.frames_presented, 120);
        assert_eq!(report.simulated_ms, 2000);
        assert_eq!(report.leaked_objects, 0);
        let far_snow = &report.layers[1];
        assert_eq!(far_snow.layer, LayerId::FarSnow);
        assert_eq!(far_snow.frame, Some(48));
        assert_eq!(far_snow.advances, 48);
        assert_eq!(far_snow.draws, 120);
        assert_eq!(far_snow.texture_size, Some([16, 16]));
        assert_eq!(report.layers[0].frame, None);
    }

    #[test]
    fn report_serialises_with_snake_case_layers() {
        let clock = SteppedTimeSource::new(30).expect("rate");
        let report = simulate(
            &SceneConfig::default(),
            &SyntheticDecoder::default(),
            1,
            clock,
        )
        .expect("simulation");
        let layers = serde_json::to_value(&report.layers).expect("json");
        assert_eq!(layers[3]["layer"], "near_snow");
        assert_eq!(layers[2]["blend"], "alpha");
    }
}
