//! Descriptive item fields, validated at construction.

use serde::{Deserialize, Serialize};

use lendloop_core::{DomainError, DomainResult, ValueObject};

/// Region code: small opaque integer in 1..=10.
///
/// Human-readable labels are a presentation concern outside the core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(u8);

impl RegionCode {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(code: u8) -> DomainResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(Self(code))
        } else {
            Err(DomainError::validation(format!(
                "region code must be between {} and {}, got {code}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn code(&self) -> u8 {
        self.0
    }
}

impl ValueObject for RegionCode {}

/// Category code: small opaque integer in 1..=5.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCode(u8);

impl CategoryCode {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(code: u8) -> DomainResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(Self(code))
        } else {
            Err(DomainError::validation(format!(
                "category code must be between {} and {}, got {code}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn code(&self) -> u8 {
        self.0
    }
}

impl ValueObject for CategoryCode {}

/// Validated descriptive fields for a new item.
///
/// Construction is the validation boundary: a descriptor that exists is
/// well-formed (non-blank title/description, at least one image reference).
/// Image references are opaque strings supplied by the upload collaborator;
/// the core never handles bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    title: String,
    description: String,
    images: Vec<String>,
    region: RegionCode,
    category: CategoryCode,
}

impl ItemDescriptor {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        images: Vec<String>,
        region: RegionCode,
        category: CategoryCode,
    ) -> DomainResult<Self> {
        let title = title.into();
        let description = description.into();

        if title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if description.trim().is_empty() {
            return Err(DomainError::validation("description must not be empty"));
        }
        if images.is_empty() {
            return Err(DomainError::validation(
                "an item requires at least one image",
            ));
        }
        if images.iter().any(|i| i.trim().is_empty()) {
            return Err(DomainError::validation("image references must not be empty"));
        }

        Ok(Self {
            title,
            description,
            images,
            region,
            category,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn region(&self) -> RegionCode {
        self.region
    }

    pub fn category(&self) -> CategoryCode {
        self.category
    }
}

impl ValueObject for ItemDescriptor {}

/// Partial update to an item's descriptive fields.
///
/// `None` leaves a field untouched; `add_images` appends (the original
/// listing keeps its existing photos and gains new ones).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub region: Option<RegionCode>,
    pub category: Option<CategoryCode>,
    pub add_images: Vec<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.region.is_none()
            && self.category.is_none()
            && self.add_images.is_empty()
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DomainError::validation("title must not be empty"));
            }
        }
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(DomainError::validation("description must not be empty"));
            }
        }
        if self.add_images.iter().any(|i| i.trim().is_empty()) {
            return Err(DomainError::validation("image references must not be empty"));
        }
        Ok(())
    }
}
