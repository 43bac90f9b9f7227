//! Explicit render context shared by every pass.

use conetrace_core::{
    DrawContext, Grid, MeshHandle, PipelineOptions, RenderBackend, Result, ViewTransform,
};
use glam::{Mat4, Vec3};

/// State every pass reads: the view transform, the options the pipeline was
/// built with and the reference grid.
///
/// Built once when the pipeline is created and handed to passes by reference.
pub struct RenderContext {
    /// Projection, view and viewport state.
    pub view: ViewTransform,
    options: PipelineOptions,
    grid: Grid,
    grid_mesh: MeshHandle,
}

impl RenderContext {
    /// Uploads the reference grid and sets up the view transform.
    ///
    /// The viewport starts at the target resolution until the host resizes.
    pub fn new(backend: &mut dyn RenderBackend, options: PipelineOptions) -> Result<Self> {
        let projection = options.projection;
        let mut view = ViewTransform::new(projection.fov_degrees, projection.near, projection.far);
        view.resize(options.target_width, options.target_height);

        let mut grid = Grid::new(options.grid.cells, options.grid.cells);
        let color = options.grid.color;
        grid.set_color(color.x, color.y, color.z);
        let grid_mesh = backend.upload_mesh("reference grid", &grid.mesh())?;

        Ok(Self {
            view,
            options,
            grid,
            grid_mesh,
        })
    }

    /// Pipeline options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The reference grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Draws the reference grid with the default material.
    pub fn draw_grid(&self, ctx: &mut dyn DrawContext) -> Result<()> {
        ctx.set_uniform("modelMatrix", Mat4::IDENTITY.into());
        ctx.set_uniform("material.diffuse", self.grid.color().into());
        ctx.set_uniform("material.specular", Vec3::ZERO.into());
        ctx.set_uniform("material.glow", 0.0f32.into());
        ctx.draw_mesh(self.grid_mesh)
    }

    /// Releases the grid geometry.
    pub fn destroy(&self, backend: &mut dyn RenderBackend) {
        backend.destroy_mesh(self.grid_mesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conetrace_core::Viewport;
    use conetrace_render::RecordingBackend;

    #[test]
    fn test_viewport_starts_at_target_size() {
        let mut backend = RecordingBackend::new();
        let options = PipelineOptions::default().with_target_size(320, 0);
        let context = RenderContext::new(&mut backend, options).unwrap();
        assert_eq!(context.view.viewport(), Viewport::new(320, 1));

        context.destroy(&mut backend);
        assert_eq!(backend.live_resource_count(), 0);
    }
}
