//! Group routes

use actix_web::{HttpResponse, web};

use super::blocking;
use crate::api::error::{ApiResult, MessageResponse};
use crate::manager::RepositoryManager;

pub async fn create_group(
    manager: web::Data<RepositoryManager>,
    name: String,
    description: String,
) -> ApiResult<HttpResponse> {
    let group = blocking(manager, move |m| m.create_group(&name, &description)).await?;
    Ok(HttpResponse::Created().json(group))
}

pub async fn list_groups(manager: web::Data<RepositoryManager>) -> ApiResult<HttpResponse> {
    let groups = blocking(manager, |m| m.list_groups()).await?;
    Ok(HttpResponse::Ok().json(groups))
}

pub async fn get_group(manager: web::Data<RepositoryManager>, name: String) -> ApiResult<HttpResponse> {
    let group = blocking(manager, move |m| m.get_group(&name)).await?;
    Ok(HttpResponse::Ok().json(group))
}

/// Only empty groups can be deleted; a `.groupinfo` file does not count.
pub async fn delete_group(manager: web::Data<RepositoryManager>, name: String) -> ApiResult<HttpResponse> {
    blocking(manager, move |m| m.delete_group(&name)).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Group deleted successfully")))
}
