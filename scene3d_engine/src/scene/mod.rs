/// Scene: entities, the visitation world and the composition root

pub mod object;
pub mod light;
pub mod particle_emitter;
pub mod light_probe;
pub mod scene_world;
pub mod scene;

use slotmap::new_key_type;

new_key_type! {
    /// Key of an object in its scene
    pub struct ObjectKey;
    /// Key of a light in its scene
    pub struct LightKey;
    /// Key of a particle emitter in its scene
    pub struct EmitterKey;
    /// Key of a light probe in its scene
    pub struct ProbeKey;
}

pub use object::{ObjectMut, SceneObject};
pub use light::{LightMut, LightType, SceneLight};
pub use particle_emitter::{EmitterMut, Particle, SceneParticleEmitter};
pub use light_probe::{ProbeMut, SceneLightProbe};
pub use scene_world::{FrameContext, SceneStats, SceneWorld, ViewParams};
pub use scene::Scene;
