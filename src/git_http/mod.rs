//! Git Smart HTTP transport
//!
//! Serves clone, fetch and push for the managed repositories below a
//! separate prefix:
//!
//! - `GET  <prefix>/<repo>.git/info/refs?service=git-upload-pack`
//! - `GET  <prefix>/<repo>.git/info/refs?service=git-receive-pack`
//! - `POST <prefix>/<repo>.git/git-upload-pack`
//! - `POST <prefix>/<repo>.git/git-receive-pack`
//!
//! The pack protocol itself is spoken by the `git` executable in
//! stateless-rpc mode; this module only routes and frames.

pub mod service;

use std::io::{self, Write};
use std::path::Path;
use std::pin::pin;
use std::process::Stdio;

use actix_web::error::PayloadError;
use actix_web::http::{Method, StatusCode};
use actix_web::http::header::{CACHE_CONTROL, CONTENT_ENCODING, HeaderMap};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Scope, route, web};
use flate2::write::GzDecoder;
use futures_util::{Stream, StreamExt, stream};
use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

pub use service::*;

use crate::api::ErrorResponse;
use crate::manager::{ManagerError, RepositoryManager};

const GIT_SUFFIX: &str = ".git";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest request body accepted, counted before decompression (1 GB)
pub const MAX_BODY_SIZE: usize = 1 << 30;

#[derive(Error, Debug)]
pub enum GitHttpError {
    #[error("invalid git protocol path, expected path with .git")]
    InvalidPath,

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("not found")]
    UnknownEndpoint,

    #[error("unsupported service: {0}")]
    UnsupportedService(String),

    #[error("pushing over HTTP is disabled for {0}")]
    ReceivePackDisabled(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("failed to read request body: {0}")]
    Payload(#[from] PayloadError),

    #[error("failed to {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("git {service} exited with {status}")]
    ServiceFailed { service: Service, status: std::process::ExitStatus },

    #[error(transparent)]
    Manager(ManagerError),
}

impl GitHttpError {
    fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| GitHttpError::Io { op, source }
    }
}

impl From<ManagerError> for GitHttpError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::NotFound { name, .. } => GitHttpError::RepositoryNotFound(name),
            ManagerError::InvalidName { .. } | ManagerError::ReservedName(_) => GitHttpError::InvalidPath,
            err => GitHttpError::Manager(err),
        }
    }
}

impl ResponseError for GitHttpError {
    fn status_code(&self) -> StatusCode {
        match self {
            GitHttpError::InvalidPath | GitHttpError::UnsupportedService(_) => StatusCode::BAD_REQUEST,
            GitHttpError::RepositoryNotFound(_) | GitHttpError::UnknownEndpoint => StatusCode::NOT_FOUND,
            GitHttpError::ReceivePackDisabled(_) => StatusCode::FORBIDDEN,
            GitHttpError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GitHttpError::Payload(_) => StatusCode::BAD_REQUEST,
            GitHttpError::Io { .. } | GitHttpError::ServiceFailed { .. } | GitHttpError::Manager(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Git request failed: {self}");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Splits `org/app.git/info/refs` into `("org/app", "info/refs")`.
/// A bare `org/app.git` yields an empty remainder.
pub fn split_git_path(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_start_matches('/');
    if let Some(idx) = path.find(".git/") {
        return Some((&path[..idx], &path[idx + GIT_SUFFIX.len() + 1..]));
    }

    path.strip_suffix(GIT_SUFFIX).map(|name| (name, ""))
}

#[derive(Debug, Deserialize)]
pub struct InfoRefsQuery {
    service: Option<String>,
}

/// Git protocol endpoint - `GET|POST <prefix>/<repo>.git/...`
#[route("/{path:.*}", method = "GET", method = "POST")]
pub async fn git_protocol(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<InfoRefsQuery>,
    body: web::Payload,
    manager: web::Data<RepositoryManager>,
) -> Result<HttpResponse, GitHttpError> {
    let full_path = path.into_inner();
    let (repo_name, endpoint) = split_git_path(&full_path).ok_or(GitHttpError::InvalidPath)?;
    let repo_dir = manager.repository_dir(repo_name)?;

    info!("Git protocol request: {} {repo_name} {endpoint}", req.method());

    let is_get = *req.method() == Method::GET;
    match (is_get, endpoint) {
        (true, "info/refs") => {
            let name = query.service.as_deref().unwrap_or_default();
            let service = Service::from_name(name).ok_or_else(|| GitHttpError::UnsupportedService(name.to_string()))?;
            check_access(&manager, repo_name, service)?;

            let refs = run_service(service, &repo_dir, true, stream::empty(), BodyDecoder::Plain).await?;
            let mut advertisement = advertisement_preamble(service);
            advertisement.extend_from_slice(&refs);

            Ok(HttpResponse::Ok()
                .content_type(service.content_type())
                .insert_header((CACHE_CONTROL, "no-cache"))
                .body(advertisement))
        }
        (false, "git-upload-pack" | "git-receive-pack") => {
            let service = Service::from_name(endpoint).ok_or(GitHttpError::UnknownEndpoint)?;
            check_access(&manager, repo_name, service)?;

            let decoder = BodyDecoder::new(req.headers());
            let result = run_service(service, &repo_dir, false, body, decoder).await?;

            Ok(HttpResponse::Ok()
                .content_type(service.result_content_type())
                .insert_header((CACHE_CONTROL, "no-cache"))
                .body(result))
        }
        _ => Err(GitHttpError::UnknownEndpoint),
    }
}

fn check_access(manager: &RepositoryManager, repo_name: &str, service: Service) -> Result<(), GitHttpError> {
    if service == Service::ReceivePack && !manager.receive_pack_enabled(repo_name)? {
        warn!("Push refused for {repo_name}: http.receivepack is not enabled");
        return Err(GitHttpError::ReceivePackDisabled(repo_name.to_string()));
    }
    Ok(())
}

/// Strips gzip content encoding from a streamed request body. Bodies the
/// transport already decompressed pass through unchanged, which is only
/// known once the first two bytes have arrived.
enum BodyDecoder {
    Sniffing(Vec<u8>),
    Plain,
    Gzip(GzDecoder<Vec<u8>>),
}

impl BodyDecoder {
    fn new(headers: &HeaderMap) -> Self {
        let gzip = headers
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("gzip"));

        if gzip { BodyDecoder::Sniffing(Vec::new()) } else { BodyDecoder::Plain }
    }

    /// Decoded bytes that became available with `chunk`
    fn feed(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            BodyDecoder::Plain => Ok(chunk.to_vec()),
            BodyDecoder::Gzip(decoder) => {
                decoder.write_all(chunk)?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            BodyDecoder::Sniffing(head) => {
                head.extend_from_slice(chunk);
                if head.len() < GZIP_MAGIC.len() {
                    return Ok(Vec::new());
                }

                let head = std::mem::take(head);
                *self = if head.starts_with(&GZIP_MAGIC) {
                    BodyDecoder::Gzip(GzDecoder::new(Vec::new()))
                } else {
                    BodyDecoder::Plain
                };
                self.feed(&head)
            }
        }
    }

    /// Whatever is left once the body has ended
    fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            BodyDecoder::Plain => Ok(Vec::new()),
            BodyDecoder::Sniffing(head) => Ok(head),
            BodyDecoder::Gzip(decoder) => decoder.finish(),
        }
    }
}

/// Runs `git <service> --stateless-rpc` on a repository while the request
/// body is streamed into its stdin.
async fn run_service<S>(
    service: Service,
    repo_dir: &Path,
    advertise: bool,
    body: S,
    decoder: BodyDecoder,
) -> Result<Vec<u8>, GitHttpError>
where
    S: Stream<Item = Result<web::Bytes, PayloadError>>,
{
    let mut command = Command::new("git");
    command.arg(service.subcommand()).arg("--stateless-rpc");
    if advertise {
        command.arg("--advertise-refs");
    }
    command
        .arg(repo_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(GitHttpError::io("spawn git"))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| GitHttpError::Io {
            op: "open git stdin",
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        })?;

    let (fed, output) = tokio::join!(feed_stdin(stdin, body, decoder, MAX_BODY_SIZE), child.wait_with_output());
    let output = output.map_err(GitHttpError::io("wait for git"))?;
    fed?;

    if !output.status.success() {
        warn!(
            "git {service} failed on {}: {}",
            repo_dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Err(GitHttpError::ServiceFailed {
            service,
            status: output.status,
        });
    }

    Ok(output.stdout)
}

/// Copies the decoded body into git's stdin chunk by chunk and closes it.
async fn feed_stdin<S>(mut stdin: ChildStdin, body: S, mut decoder: BodyDecoder, limit: usize) -> Result<(), GitHttpError>
where
    S: Stream<Item = Result<web::Bytes, PayloadError>>,
{
    let mut body = pin!(body);
    let mut received = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        received += chunk.len();
        if received > limit {
            return Err(GitHttpError::PayloadTooLarge(limit));
        }

        let decoded = decoder.feed(&chunk).map_err(GitHttpError::io("decompress request body"))?;
        if let Err(e) = stdin.write_all(&decoded).await {
            return stopped_reading(e);
        }
    }

    let rest = decoder.finish().map_err(GitHttpError::io("decompress request body"))?;
    if let Err(e) = stdin.write_all(&rest).await {
        return stopped_reading(e);
    }
    stdin.shutdown().await.or_else(stopped_reading)
}

/// git may stop reading early, e.g. when the client only wants refs
fn stopped_reading(e: io::Error) -> Result<(), GitHttpError> {
    if e.kind() == io::ErrorKind::BrokenPipe {
        Ok(())
    } else {
        Err(GitHttpError::io("write to git")(e))
    }
}

/// The Git transport mounted below `prefix`
pub fn scope(prefix: &str) -> Scope {
    web::scope(prefix).service(git_protocol)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use actix_web::http::header::CONTENT_TYPE;
    use actix_web::{App, test as actix_test};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use git2::Oid;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::seed_commit;

    macro_rules! git_app {
        ($manager:expr) => {
            actix_test::init_service(App::new().app_data(web::Data::new($manager)).service(scope("/git"))).await
        };
    }

    /// org/app with one commit on its default branch
    fn seeded_manager() -> (TempDir, RepositoryManager, Oid) {
        let temp_dir = TempDir::new().unwrap();
        let manager = RepositoryManager::new(temp_dir.path());
        let repository = manager.create_repository("org/app", "").unwrap();
        let head = seed_commit(&repository.path, "initial");
        (temp_dir, manager, head)
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// A v0 fetch request: one want line, flush, done
    fn fetch_request(want: Oid) -> Vec<u8> {
        let mut request = pkt_line(&format!("want {want} ofs-delta\n"));
        request.extend_from_slice(FLUSH_PKT);
        request.extend_from_slice(&pkt_line("done\n"));
        request
    }

    fn decode_chunks(headers: &HeaderMap, chunks: &[&[u8]]) -> Vec<u8> {
        let mut decoder = BodyDecoder::new(headers);
        let mut decoded = Vec::new();
        for chunk in chunks {
            decoded.extend(decoder.feed(chunk).unwrap());
        }
        decoded.extend(decoder.finish().unwrap());
        decoded
    }

    #[test]
    fn test_split_git_path() {
        let cases = vec![
            ("user/repo.git/info/refs", Some(("user/repo", "info/refs"))),
            ("org/team/project.git", Some(("org/team/project", ""))),
            ("/org/app.git/git-upload-pack", Some(("org/app", "git-upload-pack"))),
            ("org/app.github/x.git/info/refs", Some(("org/app.github/x", "info/refs"))),
            ("org/app", None),
            ("org/app.gitx", None),
        ];

        for (path, expected) in cases {
            assert_eq!(split_git_path(path), expected, "split of {path}");
        }
    }

    #[test]
    fn test_body_decoder() {
        let compressed = gzip(b"0009done\n");
        let mut gzip_headers = HeaderMap::new();
        gzip_headers.insert(CONTENT_ENCODING, "gzip".parse().unwrap());

        assert_eq!(decode_chunks(&gzip_headers, &[compressed.as_slice()]), b"0009done\n");

        // the magic bytes may arrive split across chunks
        let single_bytes: Vec<&[u8]> = compressed.chunks(1).collect();
        assert_eq!(decode_chunks(&gzip_headers, &single_bytes), b"0009done\n");

        // already decompressed by the transport
        assert_eq!(decode_chunks(&gzip_headers, &[&b"0009"[..], &b"done\n"[..]]), b"0009done\n");
        assert_eq!(decode_chunks(&gzip_headers, &[&b"0"[..]]), b"0");

        assert_eq!(decode_chunks(&HeaderMap::new(), &[&b"00"[..], &b"00"[..]]), b"0000");
        assert!(decode_chunks(&HeaderMap::new(), &[]).is_empty());
    }

    #[actix_web::test]
    async fn test_git_routes_reject_unknown_paths() {
        let temp_dir = TempDir::new().unwrap();
        let manager = RepositoryManager::new(temp_dir.path());
        manager.create_repository("org/app", "").unwrap();
        let app = git_app!(manager);

        let cases = vec![
            ("/git/org/app/info/refs?service=git-upload-pack", 400),
            ("/git/org/missing.git/info/refs?service=git-upload-pack", 404),
            ("/git/org/bad%20name.git/info/refs?service=git-upload-pack", 400),
            ("/git/org/app.git/info/refs?service=git-frobnicate", 400),
            ("/git/org/app.git/objects/info/packs", 404),
            ("/git/org/app.git/hooks/evil.git/info/refs?service=git-upload-pack", 404),
        ];

        for (uri, expected) in cases {
            let req = actix_test::TestRequest::get().uri(uri).to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), expected, "GET {uri}");
        }
    }

    #[actix_web::test]
    async fn test_receive_pack_requires_opt_in() {
        let temp_dir = TempDir::new().unwrap();
        let manager = RepositoryManager::new(temp_dir.path());
        let repository = manager.create_repository("org/locked", "").unwrap();

        let repo = git2::Repository::open_bare(&repository.path).unwrap();
        repo.config()
            .unwrap()
            .open_level(git2::ConfigLevel::Local)
            .unwrap()
            .set_bool("http.receivepack", false)
            .unwrap();

        let app = git_app!(manager);

        let req = actix_test::TestRequest::get()
            .uri("/git/org/locked.git/info/refs?service=git-receive-pack")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 403);

        let req = actix_test::TestRequest::post()
            .uri("/git/org/locked.git/git-receive-pack")
            .set_payload("0000")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 403);
    }

    #[actix_web::test]
    async fn test_info_refs_advertises_head() {
        let (_temp_dir, manager, head) = seeded_manager();
        let app = git_app!(manager);

        let req = actix_test::TestRequest::get()
            .uri("/git/org/app.git/info/refs?service=git-upload-pack")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            Service::UploadPack.content_type()
        );
        assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap().to_str().unwrap(), "no-cache");

        let body = actix_test::read_body(resp).await;
        let preamble = advertisement_preamble(Service::UploadPack);
        assert!(body.starts_with(&preamble), "missing service preamble");

        let refs = String::from_utf8_lossy(&body[preamble.len()..]).to_string();
        assert!(refs.contains(&format!("{head} HEAD")), "HEAD not advertised: {refs}");
        assert!(refs.contains(&format!("{head} refs/heads/")), "branch not advertised: {refs}");
        assert!(refs.ends_with("0000"), "advertisement must end with a flush: {refs}");
    }

    #[actix_web::test]
    async fn test_upload_pack_serves_fetch() {
        let (_temp_dir, manager, head) = seeded_manager();
        let app = git_app!(manager);

        let plain = fetch_request(head);
        let cases: Vec<(&str, Vec<u8>, Option<&str>)> = vec![
            ("plain", plain.clone(), None),
            ("gzip", gzip(&plain), Some("gzip")),
        ];

        for (name, payload, encoding) in cases {
            let mut req = actix_test::TestRequest::post()
                .uri("/git/org/app.git/git-upload-pack")
                .insert_header((CONTENT_TYPE, "application/x-git-upload-pack-request"));
            if let Some(encoding) = encoding {
                req = req.insert_header((CONTENT_ENCODING, encoding));
            }

            let resp = actix_test::call_service(&app, req.set_payload(payload).to_request()).await;
            assert_eq!(resp.status().as_u16(), 200, "{name} fetch");
            assert_eq!(
                resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap(),
                Service::UploadPack.result_content_type(),
                "{name} fetch"
            );

            let body = actix_test::read_body(resp).await;
            assert!(body.starts_with(b"0008NAK\n"), "{name} fetch: missing NAK");
            assert!(body[8..].starts_with(b"PACK"), "{name} fetch: missing pack data");
        }
    }

    #[actix_web::test]
    async fn test_body_limit_is_enforced_while_streaming() {
        let mut child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();

        let request = fetch_request(Oid::zero());
        let chunks: Vec<Result<web::Bytes, PayloadError>> = request
            .chunks(16)
            .map(|chunk| Ok(web::Bytes::copy_from_slice(chunk)))
            .collect();

        let result = feed_stdin(stdin, stream::iter(chunks), BodyDecoder::Plain, 32).await;
        assert!(matches!(result, Err(GitHttpError::PayloadTooLarge(32))));
        assert_eq!(GitHttpError::PayloadTooLarge(32).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        child.wait().await.unwrap();
    }
}
