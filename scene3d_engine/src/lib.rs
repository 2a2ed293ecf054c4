/*!
# Scene3D Engine

Real-time 3D scene renderer built on a backend-agnostic graphics device.

Scenes hold objects (instances of imported models), lights, particle
emitters and light probes. Every frame the scene culls them through a
loose octree, consolidates visible objects into one instanced draw per
model mesh range, and runs a fixed sequence of render stages wired
together through typed slots.

## Architecture

- **GraphicsDevice**: Factory trait for textures, buffers, programs and frame buffers
- **SceneIndex / OctreeSceneIndex**: Frustum queries over entity bounds
- **BindingGraph**: Named output and input slots connecting render stages
- **RenderPipeline**: G-buffer, sky, shadow maps, tiled lighting, transparency,
  particles, bloom, optional ambient occlusion and final composition
- **Scene**: Composition root owning the world, the scene cache and the pipeline

Backends implement `GraphicsDevice`; importers implement `SceneCache`.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod culling;
pub mod binding;
pub mod camera;
pub mod model;
pub mod pipeline;
pub mod scene;

// Main scene3d namespace module
pub mod scene3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Composition root and its configuration
    pub use crate::scene::Scene;
    pub use crate::config::SceneConfig;

    // Device factory trait
    pub use crate::graphics_device::GraphicsDevice;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device sub-module with all GPU resource types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Culling sub-module
    pub mod culling {
        pub use crate::culling::*;
    }

    // Binding sub-module
    pub mod binding {
        pub use crate::binding::*;
    }

    // Model sub-module
    pub mod model {
        pub use crate::model::*;
    }

    // Pipeline sub-module
    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
        pub use crate::camera::Camera;
    }
}

// Re-export math library at crate root
pub use glam;
