//! Per-operation pre-processing pipelines
//!
//! Each of the twelve API operations owns an ordered list of [`Step`]s that
//! run before its terminal handler. Any step may answer the request itself,
//! in which case later steps and the handler are skipped. The configuration
//! is assembled once with [`PipelineConfigBuilder`] and is read-only after
//! [`PipelineConfigBuilder::build`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use actix_web::http::Method;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use log::debug;

use crate::namespace::{ResolvedRequest, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateRepository,
    ListRepositories,
    GetRepository,
    DeleteRepository,
    CreateTag,
    ListTags,
    GetTag,
    DeleteTag,
    CreateGroup,
    ListGroups,
    GetGroup,
    DeleteGroup,
}

const OPERATION_COUNT: usize = 12;

impl Operation {
    pub const ALL: [Operation; OPERATION_COUNT] = [
        Operation::CreateRepository,
        Operation::ListRepositories,
        Operation::GetRepository,
        Operation::DeleteRepository,
        Operation::CreateTag,
        Operation::ListTags,
        Operation::GetTag,
        Operation::DeleteTag,
        Operation::CreateGroup,
        Operation::ListGroups,
        Operation::GetGroup,
        Operation::DeleteGroup,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Operation served by a wildcard request with the given verb on a
    /// resolved path, if any.
    pub fn for_request(method: &Method, kind: ResourceKind) -> Option<Self> {
        let operation = match (method.as_str(), kind) {
            ("GET", ResourceKind::Repository) => Operation::GetRepository,
            ("GET", ResourceKind::Group) => Operation::GetGroup,
            ("GET", ResourceKind::TagCollection) => Operation::ListTags,
            ("GET", ResourceKind::TagItem) => Operation::GetTag,
            ("POST", ResourceKind::TagCollection) => Operation::CreateTag,
            ("DELETE", ResourceKind::Repository) => Operation::DeleteRepository,
            ("DELETE", ResourceKind::Group) => Operation::DeleteGroup,
            ("DELETE", ResourceKind::TagItem) => Operation::DeleteTag,
            _ => return None,
        };

        Some(operation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateRepository => "create_repository",
            Operation::ListRepositories => "list_repositories",
            Operation::GetRepository => "get_repository",
            Operation::DeleteRepository => "delete_repository",
            Operation::CreateTag => "create_tag",
            Operation::ListTags => "list_tags",
            Operation::GetTag => "get_tag",
            Operation::DeleteTag => "delete_tag",
            Operation::CreateGroup => "create_group",
            Operation::ListGroups => "list_groups",
            Operation::GetGroup => "get_group",
            Operation::DeleteGroup => "delete_group",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pipeline is about to do. `resolved` is absent for the operations
/// served on the API root (create, list).
#[derive(Debug, Clone)]
pub struct Invocation {
    operation: Operation,
    resolved: Option<ResolvedRequest>,
}

impl Invocation {
    pub fn new(operation: Operation, resolved: Option<ResolvedRequest>) -> Self {
        Self { operation, resolved }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn resolved(&self) -> Option<&ResolvedRequest> {
        self.resolved.as_ref()
    }
}

/// Result of a pre-processing step
pub enum Flow {
    Continue,
    Respond(HttpResponse),
}

#[async_trait(?Send)]
pub trait Step: Send + Sync + 'static {
    async fn call(&self, req: &HttpRequest, invocation: &Invocation) -> Flow;
}

struct FnStep<F>(F);

#[async_trait(?Send)]
impl<F> Step for FnStep<F>
where
    F: Fn(&HttpRequest, &Invocation) -> Flow + Send + Sync + 'static,
{
    async fn call(&self, req: &HttpRequest, invocation: &Invocation) -> Flow {
        (self.0)(req, invocation)
    }
}

/// Turns a synchronous closure into a [`Step`].
pub fn from_fn<F>(f: F) -> impl Step
where
    F: Fn(&HttpRequest, &Invocation) -> Flow + Send + Sync + 'static,
{
    FnStep(f)
}

type Steps = [Vec<Arc<dyn Step>>; OPERATION_COUNT];

/// Collects steps before serving starts.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    steps: Steps,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step to every operation.
    pub fn use_all(mut self, step: impl Step) -> Self {
        let step: Arc<dyn Step> = Arc::new(step);
        for steps in self.steps.iter_mut() {
            steps.push(Arc::clone(&step));
        }
        self
    }

    /// Appends a step to a single operation.
    pub fn add(mut self, operation: Operation, step: impl Step) -> Self {
        self.steps[operation.index()].push(Arc::new(step));
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig { steps: self.steps }
    }
}

/// Sealed step configuration shared by all workers.
#[derive(Default)]
pub struct PipelineConfig {
    steps: Steps,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    pub fn steps(&self, operation: Operation) -> &[Arc<dyn Step>] {
        &self.steps[operation.index()]
    }

    /// Runs the operation's steps in order, then `terminal` unless a step
    /// answered first.
    pub async fn run<F, Fut>(&self, req: &HttpRequest, invocation: &Invocation, terminal: F) -> HttpResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HttpResponse>,
    {
        for (position, step) in self.steps(invocation.operation()).iter().enumerate() {
            if let Flow::Respond(response) = step.call(req, invocation).await {
                debug!(
                    "{} answered by step {position} with {}",
                    invocation.operation(),
                    response.status()
                );
                return response;
            }
        }

        terminal().await
    }
}
