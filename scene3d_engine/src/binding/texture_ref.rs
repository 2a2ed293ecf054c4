/// Texture handle with identity equality, for publishing through slots

use std::sync::Arc;
use crate::graphics_device::Texture;

/// A possibly-absent texture compared by identity
///
/// Two refs are equal when both are empty or both point at the same GPU
/// texture, so republishing an unchanged target does not mark the slot
/// changed.
#[derive(Clone, Default)]
pub struct TextureRef(Option<Arc<dyn Texture>>);

impl TextureRef {
    pub fn new(texture: Arc<dyn Texture>) -> Self {
        Self(Some(texture))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&Arc<dyn Texture>> {
        self.0.as_ref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// (width, height) of the texture, or (0, 0) when empty
    pub fn size(&self) -> (u32, u32) {
        self.0
            .as_ref()
            .map(|t| (t.info().width, t.info().height))
            .unwrap_or((0, 0))
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl std::fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(t) => write!(f, "TextureRef({}x{})", t.info().width, t.info().height),
            None => write!(f, "TextureRef(None)"),
        }
    }
}
