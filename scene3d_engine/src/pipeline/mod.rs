/// Render pipeline: fixed-order stages wired through the binding graph

pub mod slots;
pub mod render_stage;
pub mod render_pipeline;
pub mod gaussian_blur;
pub mod gbuffer_stage;
pub mod sky_stage;
pub mod shadow_map_stage;
pub mod lighting_stage;
pub mod transparency_stage;
pub mod particles_stage;
pub mod bloom_stage;
pub mod ambient_occlusion_stage;
pub mod final_stage;

pub use render_stage::RenderStage;
pub use render_pipeline::RenderPipeline;
pub use gaussian_blur::{BlurScratch, GaussianBlur};
pub use gbuffer_stage::GBufferStage;
pub use sky_stage::SkyStage;
pub use shadow_map_stage::{ShadowAssignment, ShadowMapStage};
pub use lighting_stage::{GpuLight, LightingStage};
pub use transparency_stage::TransparencyStage;
pub use particles_stage::ParticlesStage;
pub use bloom_stage::BloomStage;
pub use ambient_occlusion_stage::AmbientOcclusionStage;
pub use final_stage::FinalStage;
