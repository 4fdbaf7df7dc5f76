//! Hierarchical Git repository hosting
//!
//! - [`namespace`] - name validation and classification of request paths
//! - [`manager`] - repositories, groups and tags on disk
//! - [`api`] - the JSON management API and its per-operation pipelines
//! - [`git_http`] - Git Smart HTTP for clone, fetch and push

pub mod api;
pub mod config;
pub mod git_http;
pub mod manager;
pub mod namespace;

#[cfg(test)]
pub mod testing;

use actix_web::web;

pub use config::Config;

/// Registers both HTTP surfaces. The application must provide
/// `web::Data<RepositoryManager>` and `web::Data<PipelineConfig>`.
///
/// The Git scope is registered first and must have a non-empty prefix,
/// otherwise its catch-all route shadows the API.
pub fn configure(config: &Config) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    move |cfg| {
        cfg.service(git_http::scope(&config.git_prefix))
            .service(api::scope(&config.url_prefix));
    }
}
