//! Generic CRUD service over one REST collection.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every reference entity is served by the same five operations. A
//! `CrudService<T>` binds a collection path to those operations and the
//! entity modules only pick the path and record type. All failures come
//! back as `CrudError`, whose message names the attempted operation.
//!
//! RESPONSE SHAPES
//! ===============
//! The backend wraps lists as `{data, total, pages, current_page}` and writes
//! as `{message, data}`, while single reads return the bare record. Both
//! shapes are accepted everywhere so a bare-array backend works too.

use std::marker::PhantomData;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, CrudError};
use crate::http::ApiClient;

/// The operation a [`CrudError`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOp {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl CrudOp {
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::List | Self::Get => "fetching",
            Self::Create => "creating",
            Self::Update => "updating",
            Self::Delete => "deleting",
        }
    }

    #[must_use]
    pub fn noun(self) -> &'static str {
        match self {
            Self::List => "records",
            _ => "record",
        }
    }
}

/// Optional list parameters understood by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_desc: bool,
    pub extra: Vec<(String, String)>,
}

impl ListQuery {
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self { search: Some(term.into()), ..Self::default() }
    }

    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".to_owned(), page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            params.push(("per_page".to_owned(), per_page.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search".to_owned(), search.to_owned()));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sort_by".to_owned(), sort_by.clone()));
            params.push(("sort_dir".to_owned(), if self.sort_desc { "desc" } else { "asc" }.to_owned()));
        }
        params.extend(self.extra.iter().cloned());
        params
    }
}

/// Backend list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub pages: Option<u64>,
    #[serde(default)]
    pub current_page: Option<u64>,
}

/// Backend confirmation for a delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

pub struct CrudService<T = Value> {
    client: ApiClient,
    path: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for CrudService<T> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), path: self.path.clone(), _record: PhantomData }
    }
}

impl<T> std::fmt::Debug for CrudService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudService").field("path", &self.path).finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> CrudService<T> {
    #[must_use]
    pub fn new(client: ApiClient, path: &str) -> Self {
        Self { client, path: path.trim_matches('/').to_owned(), _record: PhantomData }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.path)
    }

    /// All records matching `query`, in backend order.
    ///
    /// # Errors
    ///
    /// Returns a [`CrudError`] for transport, backend, or decode failures.
    pub async fn get_all(&self, query: Option<&ListQuery>) -> Result<Vec<T>, CrudError> {
        let body = self.list_body(query).await?;
        let items = match body {
            Value::Object(mut map) => map.remove("data").ok_or_else(|| {
                CrudError::new(CrudOp::List, ApiError::Decode("list body has no `data` field".to_owned()))
            })?,
            other => other,
        };
        decode(CrudOp::List, items)
    }

    /// The backend list envelope with its paging metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CrudError`] for transport, backend, or decode failures.
    pub async fn get_page(&self, query: Option<&ListQuery>) -> Result<Page<T>, CrudError> {
        let body = self.list_body(query).await?;
        if body.is_array() {
            let data: Vec<T> = decode(CrudOp::List, body)?;
            let total = data.len() as u64;
            return Ok(Page { data, total: Some(total), pages: Some(1), current_page: Some(1) });
        }
        decode(CrudOp::List, body)
    }

    async fn list_body(&self, query: Option<&ListQuery>) -> Result<Value, CrudError> {
        let params = query.map(ListQuery::to_params).unwrap_or_default();
        self.client
            .request(Method::GET, &self.path, None, &params)
            .await
            .map_err(|e| CrudError::new(CrudOp::List, e))
    }

    /// # Errors
    ///
    /// Returns a [`CrudError`]; a missing record reports `is_not_found()`.
    pub async fn get_by_id(&self, id: &str) -> Result<T, CrudError> {
        let body = self
            .client
            .request(Method::GET, &self.item_path(id), None, &[])
            .await
            .map_err(|e| CrudError::new(CrudOp::Get, e))?;
        decode(CrudOp::Get, unwrap_data(body))
    }

    /// Create a record and return it as stored, including its new id.
    ///
    /// # Errors
    ///
    /// Returns a [`CrudError`] for transport, backend, or decode failures.
    pub async fn create<D: Serialize + ?Sized>(&self, data: &D) -> Result<T, CrudError> {
        let body = to_body(CrudOp::Create, data)?;
        let body = self
            .client
            .request(Method::POST, &self.path, Some(body), &[])
            .await
            .map_err(|e| CrudError::new(CrudOp::Create, e))?;
        decode(CrudOp::Create, unwrap_data(body))
    }

    /// Replace the fields of record `id`. Any `id` key in `data` is dropped
    /// from the payload; the URL alone identifies the record.
    ///
    /// # Errors
    ///
    /// Returns a [`CrudError`] for transport, backend, or decode failures.
    pub async fn update<D: Serialize + ?Sized>(&self, id: &str, data: &D) -> Result<T, CrudError> {
        let mut body = to_body(CrudOp::Update, data)?;
        if let Some(map) = body.as_object_mut() {
            map.remove("id");
        }
        let body = self
            .client
            .request(Method::PUT, &self.item_path(id), Some(body), &[])
            .await
            .map_err(|e| CrudError::new(CrudOp::Update, e))?;
        decode(CrudOp::Update, unwrap_data(body))
    }

    /// # Errors
    ///
    /// Returns a [`CrudError`] for transport, backend, or decode failures.
    pub async fn delete(&self, id: &str) -> Result<DeleteConfirmation, CrudError> {
        let body = self
            .client
            .request(Method::DELETE, &self.item_path(id), None, &[])
            .await
            .map_err(|e| CrudError::new(CrudOp::Delete, e))?;
        if body.is_null() {
            return Ok(DeleteConfirmation::default());
        }
        decode(CrudOp::Delete, body)
    }
}

/// `{message, data}` → `data`; anything else passes through.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn to_body<D: Serialize + ?Sized>(op: CrudOp, data: &D) -> Result<Value, CrudError> {
    serde_json::to_value(data).map_err(|e| CrudError::new(op, ApiError::InvalidRequest(e.to_string())))
}

fn decode<R: DeserializeOwned>(op: CrudOp, body: Value) -> Result<R, CrudError> {
    serde_json::from_value(body).map_err(|e| CrudError::new(op, ApiError::Decode(e.to_string())))
}

#[cfg(test)]
#[path = "crud_test.rs"]
mod crud_test;
