//! Tenant-nested resource paths.
//!
//! Every collection lives under `data/{tenant}/{collection}`; documents
//! under `data/{tenant}/{collection}/{doc}`. Paths are only constructible
//! from a validated [`TenantId`], so a flat (tenant-less) collection path
//! cannot be expressed at all — the type is the isolation guarantee.

use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::id::TenantId;

/// Root segment shared by all tenant data.
const DATA_ROOT: &str = "data";

/// Path of a tenant-scoped collection: `data/{tenant}/{collection}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Build the path for `collection` under `tenant`.
    ///
    /// The collection name is caller-declared (e.g. `"leads"`), but the
    /// tenant segment always comes from a `TenantId` value.
    pub fn new(tenant: &TenantId, collection: &str) -> Result<Self, AccessError> {
        validate_segment(collection, "collection name")?;
        Ok(Self(format!("{DATA_ROOT}/{tenant}/{collection}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tenant segment of this path.
    pub fn tenant_segment(&self) -> &str {
        // Constructor guarantees the shape data/{tenant}/{collection}.
        self.0.split('/').nth(1).unwrap_or_default()
    }

    /// The collection segment of this path.
    pub fn collection_segment(&self) -> &str {
        self.0.split('/').nth(2).unwrap_or_default()
    }

    /// Path of a document within this collection.
    pub fn document(&self, doc_id: &str) -> Result<DocumentPath, AccessError> {
        validate_segment(doc_id, "document id")?;
        Ok(DocumentPath(format!("{}/{doc_id}", self.0)))
    }
}

impl core::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a tenant-scoped document: `data/{tenant}/{collection}/{doc}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tenant_segment(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    pub fn collection_segment(&self) -> &str {
        self.0.split('/').nth(2).unwrap_or_default()
    }

    pub fn doc_id(&self) -> &str {
        self.0.split('/').nth(3).unwrap_or_default()
    }
}

impl core::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(segment: &str, what: &str) -> Result<(), AccessError> {
    if segment.is_empty() {
        return Err(AccessError::configuration(format!("{what} must not be empty")));
    }
    if segment.contains('/') {
        return Err(AccessError::configuration(format!(
            "{what} must not contain '/': {segment:?}"
        )));
    }
    Ok(())
}
