//! Uniform block packing.
//!
//! Programs declare their uniforms by name; the backend packs them into one
//! uniform block per program using std140 rules, which also match the WGSL
//! uniform address space for the types used here. Booleans are stored as
//! `u32` because WGSL does not allow `bool` in uniform buffers.

use conetrace_core::program::{UniformDecl, UniformType, UniformValue};

/// Alignment and size of a uniform type in bytes.
#[must_use]
pub fn std140_layout(ty: UniformType) -> (u32, u32) {
    match ty {
        UniformType::Bool | UniformType::Int | UniformType::UInt | UniformType::Float => (4, 4),
        UniformType::Vec2 => (8, 8),
        UniformType::Vec3 => (16, 12),
        UniformType::Vec4 => (16, 16),
        // Three columns, each padded to a vec4.
        UniformType::Mat3 => (16, 48),
        UniformType::Mat4 => (16, 64),
    }
}

/// One field of a packed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub ty: UniformType,
    pub offset: u32,
}

/// Field offsets of a packed uniform block, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    /// Lays out `decls` in order.
    #[must_use]
    pub fn new(decls: &[UniformDecl]) -> Self {
        let mut offset = 0u32;
        let mut fields = Vec::with_capacity(decls.len());
        for decl in decls {
            let (align, size) = std140_layout(decl.ty);
            offset = offset.next_multiple_of(align);
            fields.push(UniformField {
                name: decl.name.clone(),
                ty: decl.ty,
                offset,
            });
            offset += size;
        }
        Self {
            fields,
            // Struct size rounds up to the largest member alignment (16).
            size: offset.next_multiple_of(16).max(16),
        }
    }

    /// Block size in bytes; never zero.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields.
    #[must_use]
    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }
}

/// Why a uniform write was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformWriteError {
    /// The program does not declare the name.
    Undeclared,
    /// The program declares the name with another type.
    TypeMismatch { declared: UniformType },
}

/// CPU copy of a program's uniform block.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u32>,
}

impl UniformBlock {
    /// Creates a zeroed block.
    #[must_use]
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0; layout.size() as usize / 4];
        Self { layout, data }
    }

    /// Writes a value at its declared offset.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformWriteError> {
        let field = self.layout.field(name).ok_or(UniformWriteError::Undeclared)?;
        if field.ty != value.ty() {
            return Err(UniformWriteError::TypeMismatch { declared: field.ty });
        }
        let offset = field.offset as usize;
        match value {
            UniformValue::Bool(v) => self.write(offset, &[u32::from(v)]),
            UniformValue::Int(v) => self.write(offset, &[v]),
            UniformValue::UInt(v) => self.write(offset, &[v]),
            UniformValue::Float(v) => self.write(offset, &[v]),
            UniformValue::Vec2(v) => self.write(offset, &v.to_array()),
            UniformValue::Vec3(v) => self.write(offset, &v.to_array()),
            UniformValue::Vec4(v) => self.write(offset, &v.to_array()),
            UniformValue::Mat3(m) => {
                for (i, col) in m.to_cols_array_2d().iter().enumerate() {
                    self.write(offset + i * 16, col);
                }
            }
            UniformValue::Mat4(m) => self.write(offset, &m.to_cols_array()),
        }
        Ok(())
    }

    /// Packed bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// The block layout.
    #[must_use]
    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    fn write<T: bytemuck::Pod>(&mut self, offset: usize, values: &[T]) {
        let words: &[u32] = bytemuck::cast_slice(values);
        let start = offset / 4;
        self.data[start..start + words.len()].copy_from_slice(words);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, Mat4, Vec2, Vec3};
    use proptest::prelude::*;

    fn decl(name: &str, ty: UniformType) -> UniformDecl {
        UniformDecl {
            name: name.to_string(),
            ty,
        }
    }

    #[test]
    fn test_vec3_aligns_to_16() {
        let layout = UniformLayout::new(&[
            decl("ambient", UniformType::Float),
            decl("direction", UniformType::Vec3),
            decl("diffuse", UniformType::Float),
        ]);
        assert_eq!(layout.field("ambient").unwrap().offset, 0);
        assert_eq!(layout.field("direction").unwrap().offset, 16);
        // A scalar packs into the vec3's trailing four bytes.
        assert_eq!(layout.field("diffuse").unwrap().offset, 28);
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn test_matrix_sizes() {
        let layout = UniformLayout::new(&[
            decl("projectionMatrix", UniformType::Mat4),
            decl("normalMatrix", UniformType::Mat3),
            decl("texelSize", UniformType::Vec2),
        ]);
        assert_eq!(layout.field("normalMatrix").unwrap().offset, 64);
        assert_eq!(layout.field("texelSize").unwrap().offset, 112);
        assert_eq!(layout.size(), 128);
    }

    #[test]
    fn test_empty_layout_is_not_zero_sized() {
        assert_eq!(UniformLayout::new(&[]).size(), 16);
    }

    #[test]
    fn test_set_writes_at_offset() {
        let mut block = UniformBlock::new(UniformLayout::new(&[
            decl("worldSize", UniformType::Float),
            decl("cameraPos", UniformType::Vec3),
        ]));
        block.set("cameraPos", Vec3::new(1.0, 2.0, 3.0).into()).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(&floats[4..7], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mat3_columns_are_padded() {
        let mut block = UniformBlock::new(UniformLayout::new(&[decl("n", UniformType::Mat3)]));
        block.set("n", Mat3::IDENTITY.into()).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(&floats[0..4], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[4..8], &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&floats[8..12], &[0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bool_is_u32() {
        let mut block = UniformBlock::new(UniformLayout::new(&[decl(
            "curveGeometry",
            UniformType::Bool,
        )]));
        block.set("curveGeometry", true.into()).unwrap();
        let words: &[u32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(words[0], 1);
    }

    #[test]
    fn test_rejected_writes() {
        let mut block =
            UniformBlock::new(UniformLayout::new(&[decl("m", UniformType::Mat4)]));
        assert_eq!(
            block.set("missing", 1.0f32.into()),
            Err(UniformWriteError::Undeclared)
        );
        assert_eq!(
            block.set("m", Vec2::ONE.into()),
            Err(UniformWriteError::TypeMismatch {
                declared: UniformType::Mat4
            })
        );
        assert!(block.set("m", Mat4::IDENTITY.into()).is_ok());
    }

    fn uniform_type() -> impl Strategy<Value = UniformType> {
        prop_oneof![
            Just(UniformType::Bool),
            Just(UniformType::Int),
            Just(UniformType::UInt),
            Just(UniformType::Float),
            Just(UniformType::Vec2),
            Just(UniformType::Vec3),
            Just(UniformType::Vec4),
            Just(UniformType::Mat3),
            Just(UniformType::Mat4),
        ]
    }

    proptest! {
        #[test]
        fn prop_fields_aligned_and_disjoint(types in proptest::collection::vec(uniform_type(), 0..12)) {
            let decls: Vec<_> = types
                .iter()
                .enumerate()
                .map(|(i, ty)| decl(&format!("u{i}"), *ty))
                .collect();
            let layout = UniformLayout::new(&decls);
            prop_assert_eq!(layout.fields().len(), decls.len());

            let mut end = 0;
            for field in layout.fields() {
                let (align, size) = std140_layout(field.ty);
                prop_assert_eq!(field.offset % align, 0);
                prop_assert!(field.offset >= end);
                end = field.offset + size;
            }
            prop_assert!(layout.size() >= end);
            prop_assert_eq!(layout.size() % 16, 0);
            prop_assert!(layout.size() > 0);
        }
    }
}
