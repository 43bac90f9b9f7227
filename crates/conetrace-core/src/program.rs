//! Shader program interfaces.
//!
//! Every pass declares the exact interface it drives: uniform names and types,
//! sampler slots, vertex input and output layout. Backends validate a program
//! against that declaration when it is looked up, so a mismatch surfaces at
//! pipeline initialization instead of as undefined output.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::attachment::AttachmentFormat;

/// Name of the single fragment output every program writes at slot 0.
pub const FRAGMENT_OUTPUT: &str = "fragColor";

/// Fixed vertex attribute slots shared by every mesh program.
pub const VERTEX_ATTRIBUTES: [(u32, &str); 5] = [
    (0, "v_vertex"),
    (1, "v_texture"),
    (2, "v_normal"),
    (3, "v_tangent"),
    (4, "v_bitangent"),
];

/// Returns the attribute slot for a vertex attribute name.
#[must_use]
pub fn attribute_slot(name: &str) -> Option<u32> {
    VERTEX_ATTRIBUTES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(slot, _)| *slot)
}

/// Type of a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

/// A uniform value sent to a program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    /// The type of this value.
    #[must_use]
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::UInt(_) => UniformType::UInt,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// A declared uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: UniformType,
}

/// What a sampler slot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// A 2D color attachment.
    Texture2d,
    /// A 2D depth attachment.
    Depth2d,
    /// The 3D voxel volume.
    Volume3d,
}

/// A declared sampler slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDecl {
    pub slot: u32,
    pub name: String,
    pub kind: SamplerKind,
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    #[default]
    Triangles,
    Lines,
}

/// Vertex input a program consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInput {
    /// No vertex buffers; a full-screen triangle is generated in the shader.
    FullScreen,
    /// Interleaved mesh vertices bound at the fixed attribute slots.
    Mesh,
    /// One `v_vertex` position per instance, expanded to a quad in the shader.
    PointInstances,
}

/// Where a program's fragments go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// Offscreen attachments in color-output order.
    Target {
        color: Vec<AttachmentFormat>,
        depth: Option<AttachmentFormat>,
    },
    /// The presentation surface.
    Screen { depth: bool },
}

/// The full interface a pass expects a program to declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInterface {
    pub uniforms: Vec<UniformDecl>,
    pub samplers: Vec<SamplerDecl>,
    pub attributes: Vec<(u32, String)>,
    pub vertex_input: VertexInput,
    pub output: OutputLayout,
}

impl ProgramInterface {
    /// Creates an interface with no uniforms or samplers.
    #[must_use]
    pub fn new(vertex_input: VertexInput, output: OutputLayout) -> Self {
        let attributes = match vertex_input {
            VertexInput::FullScreen => Vec::new(),
            VertexInput::PointInstances => vec![(0, VERTEX_ATTRIBUTES[0].1.to_string())],
            VertexInput::Mesh => VERTEX_ATTRIBUTES
                .iter()
                .map(|(slot, name)| (*slot, (*name).to_string()))
                .collect(),
        };
        Self {
            uniforms: Vec::new(),
            samplers: Vec::new(),
            attributes,
            vertex_input,
            output,
        }
    }

    /// Declares a uniform.
    #[must_use]
    pub fn uniform(mut self, name: &str, ty: UniformType) -> Self {
        self.uniforms.push(UniformDecl {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// Declares a sampler slot.
    #[must_use]
    pub fn sampler(mut self, slot: u32, name: &str, kind: SamplerKind) -> Self {
        self.samplers.push(SamplerDecl {
            slot,
            name: name.to_string(),
            kind,
        });
        self
    }

    /// Looks up a uniform declaration by name.
    #[must_use]
    pub fn find_uniform(&self, name: &str) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Looks up a sampler declaration by slot.
    #[must_use]
    pub fn find_sampler(&self, slot: u32) -> Option<&SamplerDecl> {
        self.samplers.iter().find(|s| s.slot == slot)
    }

    /// Checks the interface is internally consistent.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (i, u) in self.uniforms.iter().enumerate() {
            if self.uniforms[..i].iter().any(|o| o.name == u.name) {
                return Err(format!("uniform '{}' declared twice", u.name));
            }
        }
        for (i, s) in self.samplers.iter().enumerate() {
            if self.samplers[..i].iter().any(|o| o.slot == s.slot) {
                return Err(format!("sampler slot {} declared twice", s.slot));
            }
        }
        for (slot, name) in &self.attributes {
            if attribute_slot(name) != Some(*slot) {
                return Err(format!("attribute '{name}' must not be bound at slot {slot}"));
            }
        }
        Ok(())
    }

    /// Checks that `declared` (the program's own interface) satisfies `self`
    /// (what the pass drives). Names, types and slots must match exactly.
    pub fn check_satisfied_by(&self, declared: &ProgramInterface) -> std::result::Result<(), String> {
        for u in &self.uniforms {
            match declared.find_uniform(&u.name) {
                None => return Err(format!("uniform '{}' is not declared", u.name)),
                Some(d) if d.ty != u.ty => {
                    return Err(format!(
                        "uniform '{}' declared as {:?}, pass sends {:?}",
                        u.name, d.ty, u.ty
                    ))
                }
                Some(_) => {}
            }
        }
        for s in &self.samplers {
            match declared.find_sampler(s.slot) {
                None => return Err(format!("sampler slot {} ('{}') is not declared", s.slot, s.name)),
                Some(d) if d.name != s.name || d.kind != s.kind => {
                    return Err(format!(
                        "sampler slot {} declared as '{}' {:?}, pass binds '{}' {:?}",
                        s.slot, d.name, d.kind, s.name, s.kind
                    ))
                }
                Some(_) => {}
            }
        }
        if declared.attributes != self.attributes {
            return Err("vertex attribute bindings differ".to_string());
        }
        if declared.vertex_input != self.vertex_input {
            return Err(format!(
                "vertex input {:?}, pass expects {:?}",
                declared.vertex_input, self.vertex_input
            ));
        }
        if declared.output != self.output {
            return Err("output layout differs".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blur_interface() -> ProgramInterface {
        ProgramInterface::new(
            VertexInput::FullScreen,
            OutputLayout::Target {
                color: vec![AttachmentFormat::Rgba16Float],
                depth: None,
            },
        )
        .uniform("texelSize", UniformType::Vec2)
        .sampler(0, "inputTex", SamplerKind::Texture2d)
        .sampler(1, "normalTex", SamplerKind::Texture2d)
    }

    #[test]
    fn test_fixed_attribute_slots() {
        assert_eq!(attribute_slot("v_vertex"), Some(0));
        assert_eq!(attribute_slot("v_bitangent"), Some(4));
        assert_eq!(attribute_slot("v_color"), None);
    }

    #[test]
    fn test_mesh_interface_binds_all_attributes() {
        let iface = ProgramInterface::new(VertexInput::Mesh, OutputLayout::Screen { depth: true });
        assert_eq!(iface.attributes.len(), 5);
        assert!(iface.validate().is_ok());
    }

    #[test]
    fn test_identical_interface_satisfies() {
        let iface = blur_interface();
        assert!(iface.check_satisfied_by(&iface.clone()).is_ok());
    }

    #[test]
    fn test_superset_declaration_satisfies() {
        let expected = blur_interface();
        let declared = blur_interface().uniform("sharpness", UniformType::Float);
        assert!(expected.check_satisfied_by(&declared).is_ok());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let expected = blur_interface();
        let mut declared = blur_interface();
        declared.uniforms[0].ty = UniformType::Vec3;
        let err = expected.check_satisfied_by(&declared).unwrap_err();
        assert!(err.contains("texelSize"));
    }

    #[test]
    fn test_sampler_slot_mismatch_rejected() {
        let expected = blur_interface();
        let declared = ProgramInterface::new(
            VertexInput::FullScreen,
            OutputLayout::Target {
                color: vec![AttachmentFormat::Rgba16Float],
                depth: None,
            },
        )
        .uniform("texelSize", UniformType::Vec2)
        .sampler(0, "normalTex", SamplerKind::Texture2d)
        .sampler(1, "inputTex", SamplerKind::Texture2d);
        assert!(expected.check_satisfied_by(&declared).is_err());
    }

    #[test]
    fn test_duplicate_uniform_invalid() {
        let iface = blur_interface().uniform("texelSize", UniformType::Vec2);
        assert!(iface.validate().is_err());
    }

    #[test]
    fn test_uniform_value_types() {
        assert_eq!(UniformValue::from(1.0f32).ty(), UniformType::Float);
        assert_eq!(UniformValue::from(Mat4::IDENTITY).ty(), UniformType::Mat4);
        assert_eq!(UniformValue::from(false).ty(), UniformType::Bool);
    }
}
