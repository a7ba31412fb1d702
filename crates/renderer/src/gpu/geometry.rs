use super::driver::{DriverError, GpuDriver, MeshHandle, QuadVertex};

/// Full-viewport quad, UV (0,0) at the bottom-left corner.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 1.0],
    },
];

/// Two counter-clockwise triangles.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// The one mesh every layer is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quad {
    mesh: MeshHandle,
}

impl Quad {
    pub const INDEX_COUNT: u32 = QUAD_INDICES.len() as u32;

    pub fn build<D>(driver: &mut D) -> Result<Self, DriverError>
    where
        D: GpuDriver + ?Sized,
    {
        let mesh = driver.create_mesh(&QUAD_VERTICES, &QUAD_INDICES)?;
        tracing::debug!(vao = mesh.vertex_array, "unit quad uploaded");
        Ok(Self { mesh })
    }

    pub fn draw<D>(&self, driver: &mut D) -> Result<(), DriverError>
    where
        D: GpuDriver + ?Sized,
    {
        driver.draw_indexed(self.mesh, Self::INDEX_COUNT)
    }

    pub fn release<D>(self, driver: &mut D)
    where
        D: GpuDriver + ?Sized,
    {
        driver.delete_mesh(self.mesh);
    }
}

pub fn build_unit_quad<D>(driver: &mut D) -> Result<Quad, DriverError>
where
    D: GpuDriver + ?Sized,
{
    Quad::build(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::ShaderCache;
    use crate::headless::HeadlessDriver;
    use crate::types::ShaderSources;

    fn signed_area(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
        (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
    }

    #[test]
    fn triangles_wind_counter_clockwise() {
        for tri in QUAD_INDICES.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| QUAD_VERTICES[i as usize].position);
            assert!(signed_area(a, b, c) > 0.0);
        }
    }

    #[test]
    fn quad_covers_clip_space_and_texture_space() {
        for vertex in QUAD_VERTICES {
            assert!(vertex.position.iter().all(|p| p.abs() == 1.0));
            assert_eq!(vertex.uv[0], (vertex.position[0] + 1.0) / 2.0);
            assert_eq!(vertex.uv[1], (vertex.position[1] + 1.0) / 2.0);
        }
    }

    #[test]
    fn build_and_release_round_trip_through_driver() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        let sources = ShaderSources::default();
        let program = ShaderCache::new()
            .build(&mut driver, &sources.quad_vertex, &sources.quad_fragment)
            .expect("program");
        let quad = build_unit_quad(&mut driver).expect("quad");
        assert_eq!(probe.live_meshes(), 1);
        driver.use_program(program);
        quad.draw(&mut driver).expect("draw");
        assert_eq!(probe.draws().len(), 1);
        assert_eq!(probe.draws()[0].index_count, 6);
        quad.release(&mut driver);
        assert_eq!(probe.live_meshes(), 0);
    }
}
