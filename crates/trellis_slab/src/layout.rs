// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record layouts: the named, typed sub-fields of one slab record.

use crate::error::{Result, SlabError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Scalar component type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 32-bit integer
    I32,
    /// 32-bit float
    F32,
}

impl FieldType {
    /// Size of one component in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }
}

/// Declaration of one field in a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDesc {
    /// Field name
    pub name: String,
    /// Component type
    pub ty: FieldType,
    /// Number of components (1 for scalars, 4 for `vec4`, ...)
    pub count: usize,
}

impl FieldDesc {
    /// Create a field declaration
    pub fn new(name: impl Into<String>, ty: FieldType, count: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            count,
        }
    }

    /// Create a single-component field
    pub fn scalar(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(name, ty, 1)
    }

    /// Size of the field in bytes
    pub fn byte_size(&self) -> usize {
        self.ty.size() * self.count
    }
}

/// Where a field lives inside a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocation {
    /// Byte offset from the start of the record
    pub offset: usize,
    /// Component type
    pub ty: FieldType,
    /// Number of components
    pub count: usize,
}

impl FieldLocation {
    /// Size of the field in bytes
    pub fn byte_size(&self) -> usize {
        self.ty.size() * self.count
    }

    /// Whether values of type `T` can be stored in this field
    pub fn holds<T: FieldValue>(&self) -> bool {
        self.ty == T::TYPE && self.count == T::COUNT
    }
}

/// Rust value type that maps onto a field's component type and width
pub trait FieldValue: bytemuck::Pod {
    /// Component type
    const TYPE: FieldType;
    /// Number of components
    const COUNT: usize;
}

macro_rules! impl_field_value {
    ($($scalar:ty => $ty:ident),* $(,)?) => {
        $(
            impl FieldValue for $scalar {
                const TYPE: FieldType = FieldType::$ty;
                const COUNT: usize = 1;
            }
            impl_field_value!(@arrays $scalar => $ty; 1 2 3 4 8 9 16);
        )*
    };
    (@arrays $scalar:ty => $ty:ident; $($n:literal)*) => {
        $(
            impl FieldValue for [$scalar; $n] {
                const TYPE: FieldType = FieldType::$ty;
                const COUNT: usize = $n;
            }
        )*
    };
}

impl_field_value!(u8 => U8, u16 => U16, u32 => U32, i32 => I32, f32 => F32);

/// Ordered, packed list of fields making up one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldDesc>", into = "Vec<FieldDesc>")]
pub struct RecordLayout {
    fields: IndexMap<String, FieldLocation>,
    record_size: usize,
}

impl RecordLayout {
    /// Build a layout from field declarations, packed in order
    pub fn new(fields: impl IntoIterator<Item = FieldDesc>) -> Result<Self> {
        let mut locations = IndexMap::new();
        let mut offset = 0;

        for desc in fields {
            if desc.count == 0 {
                return Err(SlabError::InvalidLayout(format!(
                    "field '{}' has zero components",
                    desc.name
                )));
            }
            let location = FieldLocation {
                offset,
                ty: desc.ty,
                count: desc.count,
            };
            offset += desc.byte_size();
            if locations.insert(desc.name.clone(), location).is_some() {
                return Err(SlabError::InvalidLayout(format!(
                    "duplicate field '{}'",
                    desc.name
                )));
            }
        }

        if locations.is_empty() {
            return Err(SlabError::InvalidLayout("layout has no fields".to_string()));
        }

        Ok(Self {
            fields: locations,
            record_size: offset,
        })
    }

    /// Layout of a `u32` index buffer: `{idx: u32}`
    pub fn index_buffer() -> Self {
        Self {
            fields: IndexMap::from([(
                "idx".to_string(),
                FieldLocation {
                    offset: 0,
                    ty: FieldType::U32,
                    count: 1,
                },
            )]),
            record_size: 4,
        }
    }

    /// Size of one record in bytes
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldLocation> {
        self.fields.get(name)
    }

    /// Look up a field by name, failing with [`SlabError::UnknownField`]
    pub fn require(&self, name: &str) -> Result<FieldLocation> {
        self.field(name)
            .copied()
            .ok_or_else(|| SlabError::UnknownField(name.to_string()))
    }

    /// All fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldLocation)> {
        self.fields.iter().map(|(name, loc)| (name.as_str(), loc))
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl TryFrom<Vec<FieldDesc>> for RecordLayout {
    type Error = SlabError;

    fn try_from(fields: Vec<FieldDesc>) -> Result<Self> {
        Self::new(fields)
    }
}

impl From<RecordLayout> for Vec<FieldDesc> {
    fn from(layout: RecordLayout) -> Self {
        layout
            .fields
            .into_iter()
            .map(|(name, loc)| FieldDesc::new(name, loc.ty, loc.count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_offsets() {
        let layout = RecordLayout::new([
            FieldDesc::new("position", FieldType::F32, 4),
            FieldDesc::new("color", FieldType::F32, 4),
            FieldDesc::scalar("flags", FieldType::U8),
        ])
        .unwrap();

        assert_eq!(layout.record_size(), 33);
        assert_eq!(layout.field("position").unwrap().offset, 0);
        assert_eq!(layout.field("color").unwrap().offset, 16);
        assert_eq!(layout.field("flags").unwrap().offset, 32);
        assert_eq!(layout.field_count(), 3);
    }

    #[test]
    fn test_field_value_matches_type_and_width() {
        let layout = RecordLayout::new([
            FieldDesc::new("position", FieldType::F32, 4),
            FieldDesc::scalar("idx", FieldType::U32),
        ])
        .unwrap();
        let position = layout.field("position").unwrap();
        let idx = layout.field("idx").unwrap();

        assert!(position.holds::<[f32; 4]>());
        assert!(!position.holds::<[u32; 4]>());
        assert!(!position.holds::<[f32; 2]>());
        assert!(idx.holds::<u32>());
        assert!(!idx.holds::<f32>());
        assert!(!idx.holds::<i32>());
    }

    #[test]
    fn test_rejects_bad_layouts() {
        assert!(matches!(
            RecordLayout::new(Vec::new()),
            Err(SlabError::InvalidLayout(_))
        ));
        assert!(matches!(
            RecordLayout::new([
                FieldDesc::scalar("a", FieldType::U32),
                FieldDesc::scalar("a", FieldType::F32),
            ]),
            Err(SlabError::InvalidLayout(_))
        ));
        assert!(matches!(
            RecordLayout::new([FieldDesc::new("a", FieldType::U32, 0)]),
            Err(SlabError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_index_buffer_layout() {
        let layout = RecordLayout::index_buffer();
        assert_eq!(layout.record_size(), 4);
        assert_eq!(layout.require("idx").unwrap().ty, FieldType::U32);
        assert_eq!(
            layout.require("position"),
            Err(SlabError::UnknownField("position".to_string()))
        );
    }

    #[test]
    fn test_serialization() {
        let layout = RecordLayout::new([
            FieldDesc::new("position", FieldType::F32, 3),
            FieldDesc::scalar("id", FieldType::U32),
        ])
        .unwrap();
        let ron_str = ron::ser::to_string_pretty(&layout, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: RecordLayout = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, layout);
    }
}
