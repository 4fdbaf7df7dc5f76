//! Terminal handlers for the repository management API
//!
//! - [`repos`] - repository operations and the API root (create, list)
//! - [`groups`] - group operations
//! - [`tags`] - tag operations on a repository
//!
//! Handlers reached through the wildcard routes are plain async functions
//! called by [`crate::api::dispatch`] with the names taken from the
//! resolved path. Store calls run on the blocking thread pool.

pub mod groups;
pub mod repos;
pub mod tags;


use actix_web::web;
use serde::de::DeserializeOwned;

pub use groups::*;
pub use repos::*;
pub use tags::*;

use crate::api::error::{ApiError, ApiResult};
use crate::manager::{ManagerResult, RepositoryManager};

/// Runs a store operation off the async executor.
pub(crate) async fn blocking<T, F>(manager: web::Data<RepositoryManager>, f: F) -> ApiResult<T>
where
    F: FnOnce(&RepositoryManager) -> ManagerResult<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || f(manager.get_ref()))
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .map_err(ApiError::from)
}

/// Decodes a JSON request body captured by a wildcard route.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}
