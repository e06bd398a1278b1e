/// Shader trait - compiled shader stages supplied by the shader provider

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}

/// One compiled stage
#[derive(Debug, Clone)]
pub struct ShaderStageDesc {
    /// Stage
    pub stage: ShaderStage,
    /// SPIR-V words
    pub code: Vec<u32>,
    /// Entry point name
    pub entry_point: String,
}

/// Descriptor for creating a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    /// Debug name
    pub name: String,
    /// Compiled stages
    pub stages: Vec<ShaderStageDesc>,
}

/// Shader resource trait
///
/// The render core never inspects bytecode; it only uses the stable
/// identity in pipeline hashes and the stage list for layout visibility.
pub trait Shader: Send + Sync {
    /// Stable identity, unique per created shader
    fn shader_id(&self) -> u64;

    /// Stages present in this shader
    fn stages(&self) -> &[ShaderStage];

    /// Debug name
    fn name(&self) -> &str;
}
