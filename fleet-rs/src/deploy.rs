//! Scheduling of remote deploy and repair jobs on the build service.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::api::buildbucket::{
    Build, BuilderId, RequestedDimension, ScheduleBuildRequest, StringPair, BUILDS_SERVICE,
};
use crate::config::{BuildConfig, RecipeServices};
use crate::prpc::{PrpcClient, PrpcError};
use crate::util::bot_id;

pub const DEFAULT_PRIORITY: i32 = 24;

/// Dimension key that pins a job to the bot of a single unit.
pub const ID_DIMENSION: &str = "id";

/// Tag that names the unit a job operates on.
pub const DUT_NAME_TAG: &str = "dut-name";

/// Tag grouping the jobs of one admin session.
pub const ADMIN_SESSION_TAG: &str = "admin-session";

/// Steps of a full deploy that are skipped unless a full deploy is asked for.
pub const DEFAULT_SKIP_ACTIONS: &[&str] = &[
    "download-image",
    "install-os",
    "install-firmware",
    "recovery-mode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskName {
    Deploy,
    Recovery,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Deploy => f.write_str("deploy"),
            TaskName::Recovery => f.write_str("recovery"),
        }
    }
}

/// What to run against which unit.
#[derive(Debug, Clone)]
pub struct DeployParams {
    pub unit_name: String,
    pub task_name: TaskName,
    pub enable_recovery: bool,
    pub admin_service: String,
    pub inventory_service: String,
    pub update_inventory: bool,
    pub no_stepper: bool,
    pub no_metrics: bool,
    /// Opaque recipe configuration, passed through as given.
    pub configuration: Option<String>,
    pub deploy_skip_actions: Vec<String>,
    /// `key:value` tags added after the `dut-name` tag.
    pub extra_tags: Vec<String>,
    /// Dimensions added next to the `id` dimension. An `id` entry here is
    /// ignored.
    pub extra_dimensions: BTreeMap<String, String>,
    /// Overrides the configured builder.
    pub builder: Option<BuilderId>,
    /// Overrides the configured priority.
    pub priority: Option<i32>,
}

impl DeployParams {
    pub fn new(unit_name: &str, task_name: TaskName, services: &RecipeServices) -> Self {
        DeployParams {
            unit_name: unit_name.to_string(),
            task_name,
            enable_recovery: true,
            admin_service: services.admin.clone(),
            inventory_service: services.inventory.clone(),
            update_inventory: true,
            no_stepper: false,
            no_metrics: false,
            configuration: None,
            deploy_skip_actions: vec![],
            extra_tags: vec![],
            extra_dimensions: BTreeMap::new(),
            builder: None,
            priority: None,
        }
    }
}

/// Input properties of the deploy recipe.
#[derive(Debug, Serialize)]
struct RecipeProperties<'a> {
    unit_name: &'a str,
    task_name: TaskName,
    enable_recovery: bool,
    admin_service: &'a str,
    inventory_service: &'a str,
    update_inventory: bool,
    no_stepper: bool,
    no_metrics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuration: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    deploy_skip_actions: &'a [String],
}

impl<'a> From<&'a DeployParams> for RecipeProperties<'a> {
    fn from(p: &'a DeployParams) -> Self {
        RecipeProperties {
            unit_name: &p.unit_name,
            task_name: p.task_name,
            enable_recovery: p.enable_recovery,
            admin_service: &p.admin_service,
            inventory_service: &p.inventory_service,
            update_inventory: p.update_inventory,
            no_stepper: p.no_stepper,
            no_metrics: p.no_metrics,
            configuration: p.configuration.as_deref(),
            deploy_skip_actions: &p.deploy_skip_actions,
        }
    }
}

/// A scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("malformed tag {0:?}, expected key:value")]
    MalformedTag(String),
    #[error("failed to encode recipe properties: {0}")]
    Properties(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] PrpcError),
}

#[async_trait]
pub trait BuildService: Send + Sync {
    async fn schedule_build(&self, request: &ScheduleBuildRequest) -> Result<Build, PrpcError>;
}

#[async_trait]
impl BuildService for PrpcClient {
    async fn schedule_build(&self, request: &ScheduleBuildRequest) -> Result<Build, PrpcError> {
        self.call(BUILDS_SERVICE, "ScheduleBuild", request).await
    }
}

/// Split a `key:value` tag at the first colon.
pub fn parse_tag(tag: &str) -> Result<StringPair, DeployError> {
    match tag.split_once(':') {
        Some((key, value)) if !key.is_empty() => Ok(StringPair {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => Err(DeployError::MalformedTag(tag.to_string())),
    }
}

pub fn build_url(ci_host: &str, builder: &BuilderId, id: i64) -> String {
    format!(
        "https://{ci_host}/p/{}/builders/{}/{}/b{id}",
        builder.project, builder.bucket, builder.builder
    )
}

/// Link to all jobs tagged with an admin session.
pub fn session_url(ci_host: &str, builder: &BuilderId, session: &str) -> String {
    format!(
        "https://{ci_host}/p/{}/builders/{}/{}?tag={ADMIN_SESSION_TAG}:{session}",
        builder.project, builder.bucket, builder.builder
    )
}

pub fn session_tag(session: &str) -> String {
    format!("{ADMIN_SESSION_TAG}:{session}")
}

pub struct DeployDispatcher {
    service: Arc<dyn BuildService>,
    config: BuildConfig,
}

impl DeployDispatcher {
    pub fn new(service: Arc<dyn BuildService>, config: BuildConfig) -> Self {
        DeployDispatcher { service, config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn request(&self, params: &DeployParams) -> Result<ScheduleBuildRequest, DeployError> {
        let mut tags = vec![StringPair {
            key: DUT_NAME_TAG.to_string(),
            value: params.unit_name.clone(),
        }];
        for tag in &params.extra_tags {
            tags.push(parse_tag(tag)?);
        }

        let mut dimensions = vec![RequestedDimension {
            key: ID_DIMENSION.to_string(),
            value: bot_id(&params.unit_name),
        }];
        for (key, value) in &params.extra_dimensions {
            if key == ID_DIMENSION {
                event!(Level::WARN, %value, "Ignoring extra `id` dimension");
                continue;
            }
            dimensions.push(RequestedDimension {
                key: key.clone(),
                value: value.clone(),
            });
        }

        let properties = serde_json::from_value(serde_json::to_value(RecipeProperties::from(
            params,
        ))?)?;

        Ok(ScheduleBuildRequest {
            request_id: Uuid::new_v4().to_string(),
            builder: params
                .builder
                .clone()
                .unwrap_or_else(|| self.config.builder_id()),
            properties,
            tags,
            dimensions,
            priority: params.priority.unwrap_or(self.config.priority),
            scheduling_timeout: self.config.scheduling_timeout,
            execution_timeout: self.config.execution_timeout,
        })
    }

    /// Schedule one job. Nothing is sent if a tag is malformed, and a failed
    /// request is not retried.
    #[instrument(skip(self, params), fields(unit = %params.unit_name, task = %params.task_name))]
    pub async fn schedule_deploy(&self, params: &DeployParams) -> Result<JobHandle, DeployError> {
        let request = self.request(params)?;
        let build = self.service.schedule_build(&request).await?;
        let url = build_url(&self.config.ci_host, &request.builder, build.id);
        event!(Level::INFO, id = build.id, %url, "Scheduled job");
        Ok(JobHandle { id: build.id, url })
    }
}
