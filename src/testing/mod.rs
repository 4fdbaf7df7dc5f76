//! Testing utilities for the repository API
//!
//! [`TestClient`] owns a throwaway repository root and builds a fresh
//! application for every request, so state lives only on disk.

use std::path::Path;

use actix_web::http::header::HeaderMap;
use actix_web::{App, test, web};
use git2::{Oid, Signature};
use serde_json::Value;
use tempfile::TempDir;

use crate::Config;
use crate::api::PipelineConfig;
use crate::manager::RepositoryManager;

/// Commits a one-file tree on HEAD of the bare repository at `path`,
/// parented on the current HEAD commit if there is one.
pub fn seed_commit(path: &Path, message: &str) -> Oid {
    let repo = git2::Repository::open_bare(path).unwrap();
    let signature = Signature::now("Test User", "test@example.com").unwrap();

    let blob = repo.blob(message.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    builder.insert("README", blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

/// Test client for making requests against the API prefix
pub struct TestClient {
    _root: TempDir,
    config: Config,
    manager: web::Data<RepositoryManager>,
    pipelines: web::Data<PipelineConfig>,
}

impl TestClient {
    /// Creates a client over an empty root with no pipeline steps
    pub fn new() -> Self {
        Self::with_pipelines(PipelineConfig::default())
    }

    pub fn with_pipelines(pipelines: PipelineConfig) -> Self {
        let root = TempDir::new().unwrap();
        let config = Config::new(root.path());
        let manager = RepositoryManager::new(root.path());

        Self {
            _root: root,
            config,
            manager: web::Data::new(manager),
            pipelines: web::Data::new(pipelines),
        }
    }

    pub fn manager(&self) -> &RepositoryManager {
        self.manager.get_ref()
    }

    /// Makes a GET request to `path` below the API prefix
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(test::TestRequest::get(), path).await
    }

    /// Makes a POST request with a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        self.request(test::TestRequest::post().set_json(body), path).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(test::TestRequest::delete(), path).await
    }

    async fn request(&self, req: test::TestRequest, path: &str) -> TestResponse {
        let app = test::init_service(
            App::new()
                .wrap(actix_web::middleware::NormalizePath::trim())
                .app_data(self.manager.clone())
                .app_data(self.pipelines.clone())
                .configure(crate::configure(&self.config)),
        )
        .await;

        let uri = format!("{}{path}", self.config.url_prefix);
        let response = test::call_service(&app, req.uri(&uri).to_request()).await;

        TestResponse::from_response(response).await
    }
}

/// Wrapper for HTTP responses with helper methods for testing
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn from_response(response: actix_web::dev::ServiceResponse) -> Self {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = test::read_body(response).await.to_vec();

        Self { status, headers, body }
    }

    /// Returns the response body as a UTF-8 string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Asserts that the response status matches the expected status
    pub fn assert_status(&self, expected: u16) {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
    }

    /// Asserts that the response is valid JSON
    pub fn assert_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!("Response is not valid JSON: {}. Body: {}", e, self.text());
        })
    }

    /// Asserts the uniform not-found answer
    pub fn assert_not_found(&self) {
        self.assert_status(404);
        assert_eq!(self.assert_json(), serde_json::json!({ "error": "not found" }));
    }
}
