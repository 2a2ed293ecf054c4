/// Names of the slots published in the binding graph

/// Producer name of the slots the scene itself publishes
pub const SCENE: &str = "scene";

// Published by the scene
pub const VIEWPORT: &str = "Viewport";
pub const FIELD_OF_VIEW: &str = "FieldOfView";
pub const WORLD_TO_EYE: &str = "WorldToEye";

// GBuffer
pub const DIFFUSE_COLOR: &str = "DiffuseColor";
pub const SPECULAR_COLOR: &str = "SpecularColor";
pub const SPECULAR_LEVEL: &str = "SpecularLevel";
pub const SELF_ILLUMINATION: &str = "SelfIllumination";
pub const NORMAL_Z: &str = "NormalZ";
pub const Z_BUFFER: &str = "ZBuffer";

// Shadow maps
pub const SHADOW_MAPS: &str = "ShadowMaps";
pub const SHADOW_ASSIGNMENTS: &str = "ShadowAssignments";

pub const FINAL_COLOR: &str = "FinalColor";
pub const BLOOM_CONTRIBUTION: &str = "BloomContribution";
pub const AMBIENT_OCCLUSION: &str = "AmbientOcclusion";
