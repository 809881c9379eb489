//! # publications-client
//!
//! Client library for the academic-publication management REST backend.
//!
//! This crate contains the durable credential store, the bearer-authenticated
//! HTTP client context, the generic CRUD service with its per-entity bindings,
//! the auth service, and the navigation guard used by front ends (the `pubctl`
//! CLI in this repository) to decide where a user may go.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod crud;
pub mod error;
pub mod guard;
pub mod http;
pub mod resources;
pub mod shell;
pub mod storage;

pub use auth::AuthService;
pub use config::ClientConfig;
pub use credentials::{CredentialStore, Session, UserRecord};
pub use crud::{CrudOp, CrudService, DeleteConfirmation, ListQuery, Page};
pub use error::{ApiError, AuthError, ConfigError, CrudError, StorageError};
pub use guard::{Navigation, NavigationGuard, Route, RouteMeta};
pub use http::{ApiClient, ReqwestTransport, SessionEvent, Transport};
pub use resources::{Country, Keyword, PublicationType, ResourceKind};
pub use shell::AppShell;
pub use storage::{FileStorage, MemoryStorage, Storage};
