//! Wildcard routes and late classification of request paths
//!
//! The route table only sees `{prefix}/{name:.*}`. Whether the captured
//! path is a repository, a group or one of a repository's tags is decided
//! here against the live store, after which the request runs through the
//! pipeline of the matching [`Operation`].

use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, delete, get, post, web};
use log::debug;

use crate::api::error::ApiError;
use crate::api::pipeline::{Invocation, Operation, PipelineConfig};
use crate::api::routes::{self, CreateTagRequest};
use crate::manager::RepositoryManager;
use crate::namespace::{ResolvedRequest, resolve};

/// `GET {prefix}/{name}`: get repository, get group, list tags, get tag
#[get("/{name:.*}")]
pub async fn get_resource(
    req: HttpRequest,
    path: web::Path<String>,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    dispatch(req, &path.into_inner(), None, manager, pipelines).await
}

/// `POST {prefix}/{name}/tags`: create tag
#[post("/{name:.*}")]
pub async fn post_resource(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    dispatch(req, &path.into_inner(), Some(body), manager, pipelines).await
}

/// `DELETE {prefix}/{name}`: delete repository, group or tag
#[delete("/{name:.*}")]
pub async fn delete_resource(
    req: HttpRequest,
    path: web::Path<String>,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    dispatch(req, &path.into_inner(), None, manager, pipelines).await
}

async fn dispatch(
    req: HttpRequest,
    path: &str,
    body: Option<web::Bytes>,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    let resolved = match resolve(path, manager.get_ref()) {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            debug!("{} {path:?} did not resolve", req.method());
            return ApiError::NotFound.error_response();
        }
        Err(e) => return ApiError::from(e).error_response(),
    };

    let Some(operation) = Operation::for_request(req.method(), resolved.kind()) else {
        debug!("{} not served on {} {:?}", req.method(), resolved.kind(), resolved.name());
        return ApiError::NotFound.error_response();
    };

    req.extensions_mut().insert(resolved.clone());
    let invocation = Invocation::new(operation, Some(resolved.clone()));

    pipelines
        .run(&req, &invocation, move || async move {
            match run_operation(operation, resolved, body, manager).await {
                Ok(response) => response,
                Err(e) => e.error_response(),
            }
        })
        .await
}

async fn run_operation(
    operation: Operation,
    resolved: ResolvedRequest,
    body: Option<web::Bytes>,
    manager: web::Data<RepositoryManager>,
) -> Result<HttpResponse, ApiError> {
    let name = resolved.name().to_string();
    let tag = resolved.tag().unwrap_or_default().to_string();

    match operation {
        Operation::GetRepository => routes::get_repository(manager, name).await,
        Operation::DeleteRepository => routes::delete_repository(manager, name).await,
        Operation::GetGroup => routes::get_group(manager, name).await,
        Operation::DeleteGroup => routes::delete_group(manager, name).await,
        Operation::ListTags => routes::list_tags(manager, name).await,
        Operation::GetTag => routes::get_tag(manager, name, tag).await,
        Operation::DeleteTag => routes::delete_tag(manager, name, tag).await,
        Operation::CreateTag => {
            let request: CreateTagRequest = routes::parse_body(body.as_deref().unwrap_or_default())?;
            routes::create_tag(manager, name, request).await
        }
        Operation::CreateRepository
        | Operation::ListRepositories
        | Operation::CreateGroup
        | Operation::ListGroups => Err(ApiError::NotFound),
    }
}
