//! Repository routes and the API root

use actix_web::{HttpRequest, HttpResponse, ResponseError, get, post, web};
use serde::{Deserialize, Serialize};

use super::blocking;
use crate::api::error::{ApiResult, MessageResponse};
use crate::api::pipeline::{Invocation, Operation, PipelineConfig};
use crate::manager::RepositoryManager;

/// Kind of resource addressed on the API root
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    #[default]
    Repository,
    Group,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateResourceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: RootKind,
}

#[derive(Debug, Deserialize)]
pub struct ListResourcesQuery {
    #[serde(rename = "type", default)]
    kind: RootKind,
}

/// Create repository or group - `POST {prefix}`
#[post("")]
pub async fn create_resource(
    req: HttpRequest,
    body: web::Json<CreateResourceRequest>,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    let CreateResourceRequest { name, description, kind } = body.into_inner();
    let operation = match kind {
        RootKind::Repository => Operation::CreateRepository,
        RootKind::Group => Operation::CreateGroup,
    };

    let invocation = Invocation::new(operation, None);
    pipelines
        .run(&req, &invocation, move || async move {
            let result = match kind {
                RootKind::Repository => create_repository(manager, name, description).await,
                RootKind::Group => super::create_group(manager, name, description).await,
            };
            result.unwrap_or_else(|e| e.error_response())
        })
        .await
}

/// List repositories or groups - `GET {prefix}[?type=group]`
#[get("")]
pub async fn list_resources(
    req: HttpRequest,
    query: web::Query<ListResourcesQuery>,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
) -> HttpResponse {
    let kind = query.kind;
    let operation = match kind {
        RootKind::Repository => Operation::ListRepositories,
        RootKind::Group => Operation::ListGroups,
    };

    let invocation = Invocation::new(operation, None);
    pipelines
        .run(&req, &invocation, move || async move {
            let result = match kind {
                RootKind::Repository => list_repositories(manager).await,
                RootKind::Group => super::list_groups(manager).await,
            };
            result.unwrap_or_else(|e| e.error_response())
        })
        .await
}

pub async fn create_repository(
    manager: web::Data<RepositoryManager>,
    name: String,
    description: String,
) -> ApiResult<HttpResponse> {
    let repository = blocking(manager, move |m| m.create_repository(&name, &description)).await?;
    Ok(HttpResponse::Created().json(repository))
}

pub async fn list_repositories(manager: web::Data<RepositoryManager>) -> ApiResult<HttpResponse> {
    let repositories = blocking(manager, |m| m.list_repositories()).await?;
    Ok(HttpResponse::Ok().json(repositories))
}

pub async fn get_repository(manager: web::Data<RepositoryManager>, name: String) -> ApiResult<HttpResponse> {
    let repository = blocking(manager, move |m| m.get_repository(&name)).await?;
    Ok(HttpResponse::Ok().json(repository))
}

pub async fn delete_repository(manager: web::Data<RepositoryManager>, name: String) -> ApiResult<HttpResponse> {
    blocking(manager, move |m| m.delete_repository(&name)).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Repository deleted successfully")))
}
