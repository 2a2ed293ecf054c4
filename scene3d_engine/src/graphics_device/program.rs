/// Shader program trait and descriptor
///
/// Shader sources live under the scene's shader path; compiling and linking
/// them is the device's business.

/// Shader stages making up a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStages {
    /// Vertex + fragment shader files
    Graphics { vertex: String, fragment: String },
    /// Single compute shader file
    Compute { compute: String },
}

/// Descriptor for creating a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDesc {
    /// Debug name
    pub name: String,
    /// Shader files, relative to the shader path or absolute
    pub stages: ProgramStages,
    /// Preprocessor defines (e.g. "USE_BONES", "DIFFUSE_TEXTURE")
    pub defines: Vec<String>,
}

impl ProgramDesc {
    pub fn graphics(name: &str, shader_path: &str, vertex: &str, fragment: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: ProgramStages::Graphics {
                vertex: join_path(shader_path, vertex),
                fragment: join_path(shader_path, fragment),
            },
            defines: Vec::new(),
        }
    }

    pub fn compute(name: &str, shader_path: &str, compute: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: ProgramStages::Compute {
                compute: join_path(shader_path, compute),
            },
            defines: Vec::new(),
        }
    }

    pub fn with_define(mut self, define: &str) -> Self {
        self.defines.push(define.to_string());
        self
    }
}

fn join_path(base: &str, file: &str) -> String {
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), file)
    }
}

/// Linked shader program
pub trait Program: Send + Sync {
    fn name(&self) -> &str;
}
