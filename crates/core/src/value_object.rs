//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attribute values are the same value. Region and category
/// codes are the canonical examples in this domain — a `RegionCode(3)` is
/// `RegionCode(3)` wherever it appears.
///
/// To "modify" a value object, construct a new one; constructors are the
/// validation boundary (invalid values are unrepresentable afterwards).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
