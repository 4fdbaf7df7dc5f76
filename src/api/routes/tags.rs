//! Tag routes

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use super::blocking;
use crate::api::error::{ApiResult, MessageResponse};
use crate::manager::RepositoryManager;

/// Body of `POST {prefix}/<repo>/tags`
///
/// A non-empty `message` makes an annotated tag. Without `commit_hash` the
/// tag points at HEAD.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateTagRequest {
    pub tag_name: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tagger: Option<String>,
}

pub async fn create_tag(
    manager: web::Data<RepositoryManager>,
    repo_name: String,
    request: CreateTagRequest,
) -> ApiResult<HttpResponse> {
    let tag = blocking(manager, move |m| {
        m.create_tag(
            &repo_name,
            &request.tag_name,
            request.commit_hash.as_deref(),
            request.message.as_deref(),
            request.tagger.as_deref(),
        )
    })
    .await?;

    Ok(HttpResponse::Created().json(tag))
}

pub async fn list_tags(manager: web::Data<RepositoryManager>, repo_name: String) -> ApiResult<HttpResponse> {
    let tags = blocking(manager, move |m| m.list_tags(&repo_name)).await?;
    Ok(HttpResponse::Ok().json(tags))
}

pub async fn get_tag(
    manager: web::Data<RepositoryManager>,
    repo_name: String,
    tag_name: String,
) -> ApiResult<HttpResponse> {
    let tag = blocking(manager, move |m| m.get_tag(&repo_name, &tag_name)).await?;
    Ok(HttpResponse::Ok().json(tag))
}

pub async fn delete_tag(
    manager: web::Data<RepositoryManager>,
    repo_name: String,
    tag_name: String,
) -> ApiResult<HttpResponse> {
    blocking(manager, move |m| m.delete_tag(&repo_name, &tag_name)).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Tag deleted successfully")))
}
