/// RenderPipeline - the fixed sequence of render stages
///
/// Built once per scene. The pipeline owns the slots the scene publishes
/// (viewport, field of view, world-to-eye) and the stages, constructed in
/// execution order so every input binds to an output declared before it.

use glam::Mat4;

use crate::binding::{BindingGraph, OutputSlot};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::{engine_debug, engine_info};
use crate::graphics_device::{GraphicsDevice, Rect2D};
use crate::scene::{FrameContext, SceneWorld};
use super::{
    AmbientOcclusionStage, BloomStage, FinalStage, GBufferStage, LightingStage, ParticlesStage,
    RenderStage, ShadowMapStage, SkyStage, TransparencyStage,
};
use super::slots;

pub struct RenderPipeline {
    graph: BindingGraph,
    viewport: OutputSlot<Rect2D>,
    field_of_view: OutputSlot<f32>,
    world_to_eye: OutputSlot<Mat4>,
    stages: Vec<Box<dyn RenderStage>>,
}

impl RenderPipeline {
    /// Build the stages and bind their slots
    ///
    /// Fails when a stage binds an input nobody produces or when two stages
    /// produce the same slot.
    pub fn new(device: &mut dyn GraphicsDevice, config: &SceneConfig) -> Result<Self> {
        let mut graph = BindingGraph::new();
        let viewport = graph.output(slots::SCENE, slots::VIEWPORT, config.viewport)?;
        let field_of_view = graph.output(slots::SCENE, slots::FIELD_OF_VIEW, config.field_of_view)?;
        let world_to_eye = graph.output(slots::SCENE, slots::WORLD_TO_EYE, Mat4::IDENTITY)?;

        let mut stages: Vec<Box<dyn RenderStage>> = vec![
            Box::new(GBufferStage::new(device, &mut graph, config)?),
            Box::new(SkyStage::new(device, &mut graph, config)?),
            Box::new(ShadowMapStage::new(device, &mut graph, config)?),
            Box::new(LightingStage::new(device, &mut graph, config)?),
            Box::new(TransparencyStage::new(device, &mut graph, config)?),
            Box::new(ParticlesStage::new(device, &mut graph, config)?),
            Box::new(BloomStage::new(device, &mut graph, config)?),
        ];
        if config.ambient_occlusion {
            stages.push(Box::new(AmbientOcclusionStage::new(device, &mut graph, config)?));
        }
        stages.push(Box::new(FinalStage::new(device, &mut graph, config)?));

        let unconsumed = graph.unconsumed();
        if !unconsumed.is_empty() {
            engine_debug!("scene3d::RenderPipeline", "Slots without consumers: {}", unconsumed.join(", "));
        }

        let pipeline = Self { graph, viewport, field_of_view, world_to_eye, stages };
        engine_info!("scene3d::RenderPipeline", "Pipeline ready: {}", pipeline.stage_names().join(" -> "));
        Ok(pipeline)
    }

    /// Publish the camera state for the next run
    ///
    /// Unchanged values leave the slots' change state untouched.
    pub fn publish(&mut self, viewport: Rect2D, field_of_view: f32, world_to_eye: Mat4) {
        self.viewport.set(viewport);
        self.field_of_view.set(field_of_view);
        self.world_to_eye.set(world_to_eye);
    }

    /// Run every stage in order, each bracketed by a GPU timer
    pub fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        for stage in &mut self.stages {
            ctx.commands.begin_timer(stage.name())?;
            stage.run(ctx, world)?;
            ctx.commands.end_timer()?;
        }
        Ok(())
    }

    /// Advance the time-dependent state of every stage
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, world: &mut SceneWorld, dt: f32) -> Result<()> {
        for stage in &mut self.stages {
            stage.update(device, world, dt)?;
        }
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn graph(&self) -> &BindingGraph {
        &self.graph
    }
}

#[cfg(test)]
#[path = "render_pipeline_tests.rs"]
mod tests;
