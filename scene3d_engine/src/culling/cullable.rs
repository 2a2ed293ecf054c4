/// Proxies stored in the spatial index

use slotmap::new_key_type;
use crate::scene::{ObjectKey, LightKey, EmitterKey, ProbeKey};

new_key_type! {
    /// Handle to a proxy's entry in a `SceneIndex`
    pub struct CullHandle;
}

/// What a spatial-index entry stands for
///
/// Query results are classified with a `match`; each variant carries the
/// key of the entity in the owning scene's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cullable {
    Object(ObjectKey),
    Light(LightKey),
    Emitter(EmitterKey),
    Probe(ProbeKey),
}
