//! Scene collaborator interface.

use crate::backend::{DrawContext, RenderBackend};
use crate::error::Result;

/// A drawable scene the pipeline treats as opaque.
pub trait Scene {
    /// Draws every opaque object with the active program.
    ///
    /// `program` is the name of the program in use, so objects can send the
    /// material uniforms that program declares.
    fn draw(&self, ctx: &mut dyn DrawContext, program: &str) -> Result<()>;

    /// Draws editor overlays after the lit program has been released.
    ///
    /// Overlays open their own passes on the screen; the default draws nothing.
    fn draw_debug_overlays(&self, _backend: &mut dyn RenderBackend) -> Result<()> {
        Ok(())
    }

    /// Number of drawable objects.
    fn object_count(&self) -> usize;
}
