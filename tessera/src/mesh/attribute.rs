//! Typed attribute arrays associated with points or cells.

use approx::{AbsDiffEq, RelativeEq};
use num::{NumCast, ToPrimitive};

/// The topology to which an attribute array is aligned.
///
/// Point attributes have one element per point and cell attributes have one
/// element per cell.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Association {
    Point,
    Cell,
}

/// Component type of an [`AttributeData`] array.
///
/// [`AttributeData`]: crate::mesh::AttributeData
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ComponentType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    Rgba8,
}

/// Homogeneous numeric array.
///
/// Each variant stores one element per point or cell. `Rgba8` stores a packed
/// color per element.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Rgba8(Vec<[u8; 4]>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::U8(values) => values.len(),
            AttributeData::I8(values) => values.len(),
            AttributeData::U16(values) => values.len(),
            AttributeData::I16(values) => values.len(),
            AttributeData::U32(values) => values.len(),
            AttributeData::I32(values) => values.len(),
            AttributeData::F32(values) => values.len(),
            AttributeData::F64(values) => values.len(),
            AttributeData::Rgba8(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            AttributeData::U8(_) => ComponentType::U8,
            AttributeData::I8(_) => ComponentType::I8,
            AttributeData::U16(_) => ComponentType::U16,
            AttributeData::I16(_) => ComponentType::I16,
            AttributeData::U32(_) => ComponentType::U32,
            AttributeData::I32(_) => ComponentType::I32,
            AttributeData::F32(_) => ComponentType::F32,
            AttributeData::F64(_) => ComponentType::F64,
            AttributeData::Rgba8(_) => ComponentType::Rgba8,
        }
    }

    /// Converts scalar data into `f32` values.
    ///
    /// Returns `None` for `Rgba8` data and for values that cannot be
    /// represented as `f32`.
    pub fn to_f32_lossy(&self) -> Option<Vec<f32>> {
        match self {
            AttributeData::U8(values) => num_cast_all(values),
            AttributeData::I8(values) => num_cast_all(values),
            AttributeData::U16(values) => num_cast_all(values),
            AttributeData::I16(values) => num_cast_all(values),
            AttributeData::U32(values) => num_cast_all(values),
            AttributeData::I32(values) => num_cast_all(values),
            AttributeData::F32(values) => Some(values.clone()),
            AttributeData::F64(values) => num_cast_all(values),
            AttributeData::Rgba8(_) => None,
        }
    }
}

/// Named attribute array.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    name: String,
    association: Association,
    data: AttributeData,
}

impl Attribute {
    pub fn new(name: impl Into<String>, association: Association, data: AttributeData) -> Self {
        Attribute {
            name: name.into(),
            association,
            data,
        }
    }

    /// Creates a per-point attribute.
    pub fn point(name: impl Into<String>, data: AttributeData) -> Self {
        Attribute::new(name, Association::Point, data)
    }

    /// Creates a per-cell attribute.
    pub fn cell(name: impl Into<String>, data: AttributeData) -> Self {
        Attribute::new(name, Association::Cell, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn association(&self) -> Association {
        self.association
    }

    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    pub fn into_data(self) -> AttributeData {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AbsDiffEq for AttributeData {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        match (self, other) {
            (AttributeData::F32(lhs), AttributeData::F32(rhs)) => {
                let epsilon = epsilon as f32;
                lhs.len() == rhs.len()
                    && lhs
                        .iter()
                        .zip(rhs)
                        .all(|(lhs, rhs)| lhs.abs_diff_eq(rhs, epsilon))
            }
            (AttributeData::F64(lhs), AttributeData::F64(rhs)) => {
                lhs.len() == rhs.len()
                    && lhs
                        .iter()
                        .zip(rhs)
                        .all(|(lhs, rhs)| lhs.abs_diff_eq(rhs, epsilon))
            }
            _ => self == other,
        }
    }
}

impl RelativeEq for AttributeData {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        match (self, other) {
            (AttributeData::F32(lhs), AttributeData::F32(rhs)) => {
                let (epsilon, max_relative) = (epsilon as f32, max_relative as f32);
                lhs.len() == rhs.len()
                    && lhs
                        .iter()
                        .zip(rhs)
                        .all(|(lhs, rhs)| lhs.relative_eq(rhs, epsilon, max_relative))
            }
            (AttributeData::F64(lhs), AttributeData::F64(rhs)) => {
                lhs.len() == rhs.len()
                    && lhs
                        .iter()
                        .zip(rhs)
                        .all(|(lhs, rhs)| lhs.relative_eq(rhs, epsilon, max_relative))
            }
            _ => self == other,
        }
    }
}

impl AbsDiffEq for Attribute {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        AttributeData::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.name == other.name
            && self.association == other.association
            && self.data.abs_diff_eq(&other.data, epsilon)
    }
}

impl RelativeEq for Attribute {
    fn default_max_relative() -> Self::Epsilon {
        AttributeData::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        self.name == other.name
            && self.association == other.association
            && self.data.relative_eq(&other.data, epsilon, max_relative)
    }
}

fn num_cast_all<T, U>(values: &[T]) -> Option<Vec<U>>
where
    T: Copy + ToPrimitive,
    U: NumCast,
{
    values.iter().map(|value| U::from(*value)).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::mesh::attribute::{Association, Attribute, AttributeData, ComponentType};

    #[test]
    fn widen_integer_scalars() {
        let data = AttributeData::I16(vec![-3, 0, 7]);
        assert_eq!(Some(vec![-3.0, 0.0, 7.0]), data.to_f32_lossy());
        assert_eq!(None, AttributeData::Rgba8(vec![[0; 4]]).to_f32_lossy());
    }

    #[test]
    fn compare_within_tolerance() {
        let lhs = Attribute::point("scalar", AttributeData::F32(vec![1.0, 2.0]));
        let rhs = Attribute::point("scalar", AttributeData::F32(vec![1.0, 2.0 + 1e-6]));
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-5);
        assert_eq!(Association::Point, rhs.association());
        assert_eq!(ComponentType::F32, rhs.data().component_type());
    }

    #[test]
    fn mismatched_types_are_unequal() {
        let lhs = AttributeData::F32(vec![1.0]);
        let rhs = AttributeData::F64(vec![1.0]);
        assert!(!approx::abs_diff_eq!(lhs, rhs, epsilon = 1.0));
    }
}
