/// Spatial acceleration structures for scene queries.
///
/// A SceneIndex stores `Cullable` proxies by world-space AABB and answers
/// frustum queries. The scene owns exactly one and keeps every entity's
/// entry consistent with its transform.

use super::{AABB, Cullable, CullHandle, Frustum};

/// Trait for spatial indexing of scene proxies
pub trait SceneIndex: Send + Sync {
    /// Insert a proxy with its world-space AABB
    fn insert(&mut self, proxy: Cullable, world_aabb: &AABB) -> CullHandle;

    /// Update a proxy's AABB after its entity moved
    fn move_proxy(&mut self, handle: CullHandle, world_aabb: &AABB);

    /// Remove a proxy, returning what it stood for
    fn remove(&mut self, handle: CullHandle) -> Option<Cullable>;

    /// Append every proxy whose AABB intersects the frustum to `results`
    ///
    /// Each proxy appears at most once.
    fn query(&self, frustum: &Frustum, results: &mut Vec<Cullable>);

    /// Current AABB of a proxy
    fn aabb(&self, handle: CullHandle) -> Option<AABB>;

    fn proxy(&self, handle: CullHandle) -> Option<Cullable>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every proxy
    fn clear(&mut self);
}
