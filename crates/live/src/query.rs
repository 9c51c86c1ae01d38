//! Tenant-scoped query descriptors.
//!
//! A descriptor declares collection, filters, sort, and page window.
//! Resolution substitutes the session authority's tenant into the
//! collection path; the tenant segment never comes from caller input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crewbase_auth::Authority;
use crewbase_core::{AccessError, AccessResult, CollectionPath};

use crate::cursor::Cursor;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One filter clause: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    Desc,
}

/// One sort clause: `field` in `dir` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

/// Declarative description of a tenant collection query.
///
/// Filters and sort keys apply in the order declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    collection: String,
    filters: Vec<Filter>,
    sort: Vec<SortKey>,
    page_size: usize,
    cursor: Option<Cursor>,
}

impl QueryDescriptor {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            sort: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            dir,
        });
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Restrict the window to documents strictly after `cursor`.
    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn window(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Pin the authority's tenant into a concrete collection path.
    ///
    /// A missing tenant is a programmer error (the view was mounted
    /// without tenant context), not a denial.
    pub fn resolve(self, authority: &Authority) -> AccessResult<ResolvedQuery> {
        let tenant = authority.tenant_id.as_ref().ok_or_else(|| {
            AccessError::configuration(format!(
                "cannot open query on {:?}: session has no tenant",
                self.collection
            ))
        })?;

        let path = CollectionPath::new(tenant, &self.collection)?;
        Ok(ResolvedQuery {
            path,
            descriptor: self,
        })
    }
}

/// A descriptor bound to a concrete tenant path at open time.
///
/// The tenant stays pinned for the life of the handle; a session tenant
/// change requires closing and reopening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuery {
    pub path: CollectionPath,
    pub descriptor: QueryDescriptor,
}

impl ResolvedQuery {
    pub fn tenant_segment(&self) -> &str {
        self.path.tenant_segment()
    }

    /// Same query, windowed strictly after `cursor`. Keeps the pinned
    /// tenant path.
    pub fn with_cursor(&self, cursor: Cursor) -> Self {
        Self {
            path: self.path.clone(),
            descriptor: self.descriptor.clone().after(cursor),
        }
    }
}
