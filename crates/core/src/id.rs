//! Strongly-typed identifiers used across the boundary layer.
//!
//! Tenant and subject identifiers are issued by the external identity
//! provider and are opaque strings from our point of view. They are
//! validated on construction so that a `TenantId` can always be embedded
//! in a resource path segment.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Identifier of a tenant (the multi-tenant isolation boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of an authenticated subject (provider-issued user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

macro_rules! impl_opaque_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Validate and wrap a provider-issued identifier.
            ///
            /// Rejects empty values and values containing `/`, which would
            /// corrupt a path segment.
            pub fn new(value: impl Into<String>) -> Result<Self, AccessError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(AccessError::configuration(concat!($name, " must not be empty")));
                }
                if value.contains('/') {
                    return Err(AccessError::configuration(concat!(
                        $name,
                        " must not contain '/'"
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = AccessError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_opaque_id!(TenantId, "TenantId");
impl_opaque_id!(SubjectId, "SubjectId");
