/// Visibility culling: bounding volumes, frusta and the spatial index

pub mod aabb;
pub mod frustum;
pub mod cullable;
pub mod scene_index;
pub mod octree_scene_index;

pub use aabb::AABB;
pub use frustum::{Frustum, FrustumTest, PLANE_LEFT, PLANE_RIGHT, PLANE_BOTTOM, PLANE_TOP, PLANE_NEAR, PLANE_FAR};
pub use cullable::{Cullable, CullHandle};
pub use scene_index::SceneIndex;
pub use octree_scene_index::OctreeSceneIndex;
