/// Texture trait, texture descriptor, and texture info

use bitflags::bitflags;
use crate::error::Result;

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    R16G16_SFLOAT,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_FLOAT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R16G16_SFLOAT
            | TextureFormat::R32_SFLOAT
            | TextureFormat::D24_UNORM_S8_UINT
            | TextureFormat::D32_FLOAT => 4,
            TextureFormat::R16G16B16A16_SFLOAT | TextureFormat::R32G32_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT | TextureFormat::D32_FLOAT)
    }
}

bitflags! {
    /// How a texture may be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const STORAGE = 1 << 3;
    }
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug name shown by the backend and the mock device
    pub name: String,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Number of array layers (1 = plain 2D texture)
    pub array_layers: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Optional initial contents of layer 0
    pub data: Option<Vec<u8>>,
}

impl TextureDesc {
    /// Sampled render target of the given size, one layer
    pub fn render_target(name: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        let usage = if format.is_depth() {
            TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED
        } else {
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED
        };
        Self {
            name: name.to_string(),
            width,
            height,
            array_layers: 1,
            format,
            usage,
            data: None,
        }
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend texture types. Destroyed when the last `Arc` drops.
pub trait Texture: Send + Sync {
    /// Properties fixed at creation
    fn info(&self) -> &TextureInfo;

    /// Replace the contents of one layer (row-major, tightly packed)
    fn update(&self, layer: u32, data: &[u8]) -> Result<()>;
}
