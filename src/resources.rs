//! Reference entities and their CRUD bindings.
//!
//! Each entity is a record type plus a one-line binding onto
//! [`CrudService`]. Field sets follow the backend models; ids are opaque
//! strings assigned by the backend.

use serde::{Deserialize, Serialize};

use crate::crud::CrudService;
use crate::http::ApiClient;

pub const COUNTRIES_PATH: &str = "countries";
pub const KEYWORDS_PATH: &str = "keywords";
pub const PUBLICATION_TYPES_PATH: &str = "publication-types";

// =============================================================================
// RECORDS
// =============================================================================

/// Bookkeeping columns every backend record carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub name: String,
    /// Two-letter country code, unique per backend.
    pub code: String,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCountry {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKeyword {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublicationType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// BINDINGS
// =============================================================================

#[must_use]
pub fn countries(client: &ApiClient) -> CrudService<Country> {
    CrudService::new(client.clone(), COUNTRIES_PATH)
}

#[must_use]
pub fn keywords(client: &ApiClient) -> CrudService<Keyword> {
    CrudService::new(client.clone(), KEYWORDS_PATH)
}

#[must_use]
pub fn publication_types(client: &ApiClient) -> CrudService<PublicationType> {
    CrudService::new(client.clone(), PUBLICATION_TYPES_PATH)
}

/// The collections this client manages, for callers that work untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Countries,
    Keywords,
    PublicationTypes,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Countries, Self::Keywords, Self::PublicationTypes];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Countries => COUNTRIES_PATH,
            Self::Keywords => KEYWORDS_PATH,
            Self::PublicationTypes => PUBLICATION_TYPES_PATH,
        }
    }

    /// Untyped service over this collection.
    #[must_use]
    pub fn service(self, client: &ApiClient) -> CrudService {
        CrudService::new(client.clone(), self.path())
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_matches('/');
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod resources_test;
