//! Repository management API
//!
//! JSON endpoints for repositories, groups and tags, all served below one
//! configurable prefix.

pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod routes;

use actix_web::{Scope, web};
use log::warn;

pub use error::*;
pub use pipeline::*;

/// Configures the API routes
///
/// # Endpoints
///
/// | Method   | API Endpoint                      | Operation                       | Success |
/// | -------- | --------------------------------- | ------------------------------- | ------- |
/// | `POST`   | `<prefix>`                        | create repository / group       | `201`   |
/// | `GET`    | `<prefix>[?type=group]`           | list repositories / groups      | `200`   |
/// | `GET`    | `<prefix>/<repo>`                 | get repository                  | `200`   |
/// | `DELETE` | `<prefix>/<repo>`                 | delete repository               | `200`   |
/// | `GET`    | `<prefix>/<group>`                | get group                       | `200`   |
/// | `DELETE` | `<prefix>/<group>`                | delete group                    | `200`   |
/// | `GET`    | `<prefix>/<repo>/tags`            | list tags                       | `200`   |
/// | `POST`   | `<prefix>/<repo>/tags`            | create tag                      | `201`   |
/// | `GET`    | `<prefix>/<repo>/tags/<tag>`      | get tag                         | `200`   |
/// | `DELETE` | `<prefix>/<repo>/tags/<tag>`      | delete tag                      | `200`   |
///
/// Root routes must be registered before the wildcard ones.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::create_resource)
        .service(routes::list_resources)
        .service(dispatch::get_resource)
        .service(dispatch::post_resource)
        .service(dispatch::delete_resource);
}

/// The API mounted below `prefix`
pub fn scope(prefix: &str) -> Scope {
    web::scope(prefix).app_data(json_config()).configure(configure)
}

/// JSON extractor settings answering malformed bodies with a 400 error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1 << 20) // 1 MB JSON limit
        .error_handler(|err, _| {
            warn!("JSON payload error: {err}");
            let response = actix_web::HttpResponse::from_error(ApiError::BadRequest(err.to_string()));
            actix_web::error::InternalError::from_response(err, response).into()
        })
}
