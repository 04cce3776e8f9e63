//! `satlab add dut`: register a DUT of this appliance end to end.
//!
//! The DUT's DNS record is written first, then its rack, asset and DUT
//! entries in that order, then a deploy job is scheduled. When anything
//! after the DNS update fails, the hosts file is put back the way it was.

use clap::Args;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use fleet_rs::api::inventory::AssetType;
use fleet_rs::deploy::{
    parse_tag, session_tag, BuildService, DeployDispatcher, DeployParams, JobHandle, TaskName,
    DEFAULT_SKIP_ACTIONS,
};
use fleet_rs::dut::{DutArgs, ValidationError};
use fleet_rs::prpc::PrpcClient;

use crate::config::SatlabConfig;
use crate::dns::{ContainerRuntime, DnsMutator, Docker, HostsSnapshot};
use crate::error::Error;
use crate::inventory::{FleetBinary, FleetCommand, InventoryDriver};
use crate::name::{looks_like_site_device, Site};
use crate::site::{resolve_site_id, HostIdentifier, IdentifierScript};
use crate::summary::{Stage, Summary};

pub const DEFAULT_RACK: &str = "rack";

/// Port servod listens on inside its container.
pub const SERVOD_CONTAINER_PORT: u16 = 9999;

#[derive(Args, Debug, Clone, Default)]
pub struct AddDutRequest {
    #[command(flatten)]
    pub dut: DutArgs,

    /// IP address of the DUT, for its DNS record.
    #[arg(long, default_value_t)]
    pub address: String,

    /// Model of the asset, needed when the asset is new.
    #[arg(long, default_value_t)]
    pub model: String,

    /// Board of the asset, needed when the asset is new.
    #[arg(long, default_value_t)]
    pub board: String,

    /// Leave the DNS records alone.
    #[arg(long = "skip-dns")]
    pub skip_dns: bool,

    /// Reimage and reflash the DUT as part of the deploy.
    #[arg(long = "full-deploy")]
    pub full_deploy: bool,

    /// Satlab ID, instead of asking the appliance.
    #[arg(long = "satlab-id", default_value_t)]
    pub satlab_id: String,

    /// Inventory namespace.
    #[arg(long, default_value_t)]
    pub namespace: String,

    /// Register the DUT without scheduling a deploy job.
    #[arg(long = "skip-deploy")]
    pub skip_deploy: bool,

    /// Comma-separated key:value tags for the deploy job.
    #[arg(long = "deploy-tags", value_delimiter = ',')]
    pub deploy_tags: Vec<String>,
}

impl AddDutRequest {
    /// Checks that need nothing but the request itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.dut.validate()?;
        if !self.skip_dns && self.address.is_empty() {
            return Err(ValidationError::Usage(
                "need an address for the DNS record, or --skip-dns".to_string(),
            ));
        }
        for tag in &self.deploy_tags {
            parse_tag(tag).map_err(|e| ValidationError::Usage(e.to_string()))?;
        }
        Ok(())
    }
}

/// What `add_dut` registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDutReport {
    pub hostname: String,
    pub rack: String,
    pub servo: String,
    pub job: Option<JobHandle>,
}

/// The request with defaults filled in and names qualified.
#[derive(Debug)]
struct Plan {
    dut: DutArgs,
    namespace: String,
}

pub struct Satlab {
    config: SatlabConfig,
    identifier: Arc<dyn HostIdentifier>,
    dns: DnsMutator,
    inventory: InventoryDriver,
    dispatcher: DeployDispatcher,
}

impl Satlab {
    pub fn new(
        config: SatlabConfig,
        identifier: Arc<dyn HostIdentifier>,
        container: Arc<dyn ContainerRuntime>,
        fleet: Arc<dyn FleetCommand>,
        builds: Arc<dyn BuildService>,
    ) -> Self {
        Satlab {
            dns: DnsMutator::new(container, config.dns.clone()),
            inventory: InventoryDriver::new(fleet),
            dispatcher: DeployDispatcher::new(builds, config.fleet.build.clone()),
            identifier,
            config,
        }
    }

    /// Wire up the real collaborators: the identifier script, docker, the
    /// `fleet` binary and the build service.
    pub fn from_config(config: SatlabConfig, token: Option<String>) -> Result<Self, Error> {
        let timeout = config.process.timeout;
        let builds = PrpcClient::new(&config.fleet.build.host, token, config.fleet.build.timeout)
            .map_err(|e| Error::Deploy(e.into()))?;
        Ok(Satlab::new(
            config.clone(),
            Arc::new(IdentifierScript::new(
                config.site.identifier_script.clone(),
                timeout,
            )),
            Arc::new(Docker::new(config.dns.docker_binary.clone(), timeout)),
            Arc::new(FleetBinary::new(
                config.inventory.fleet_binary.clone(),
                timeout,
            )),
            Arc::new(builds),
        ))
    }

    pub fn dns(&self) -> &DnsMutator {
        &self.dns
    }

    pub fn inventory(&self) -> &InventoryDriver {
        &self.inventory
    }

    pub fn config(&self) -> &SatlabConfig {
        &self.config
    }

    /// The site of this appliance, from `explicit_id` if given.
    pub async fn site(&self, explicit_id: &str) -> Result<Site, Error> {
        let id = resolve_site_id(explicit_id, &*self.identifier).await?;
        Ok(Site::new(&self.config.site.prefix, &id))
    }

    fn plan(&self, site: &Site, request: &AddDutRequest) -> Plan {
        let mut dut = request.dut.clone();
        if dut.pools.is_empty() {
            dut.pools = vec![site.pool()];
        }
        if dut.rack.is_empty() {
            dut.rack = DEFAULT_RACK.to_string();
        }
        if dut.servo.is_empty() {
            if dut.servod_docker.is_empty() {
                dut.servod_docker = site.qualify(&format!("{}-docker_servod", dut.name));
            }
            dut.servo = site.qualify(&format!(
                "{}-docker_servod:{SERVOD_CONTAINER_PORT}",
                dut.name
            ));
        } else {
            dut.servo = site.qualify(&dut.servo);
        }
        dut.name = site.qualify(&dut.name);
        dut.rack = site.qualify(&dut.rack);
        if dut.zone.is_empty() {
            dut.zone = self.config.site.default_zone.clone();
        }

        let namespace = if request.namespace.is_empty() {
            self.config.site.namespace.clone()
        } else {
            request.namespace.clone()
        };
        Plan { dut, namespace }
    }

    /// Register `request` and schedule its deploy, recording the outcome of
    /// each stage in `summary`.
    #[instrument(skip_all, fields(dut = %request.dut.name))]
    pub async fn add_dut(
        &self,
        request: &AddDutRequest,
        summary: &mut Summary,
    ) -> Result<AddDutReport, Error> {
        request.validate()?;
        let site = self.site(&request.satlab_id).await?;
        let plan = self.plan(&site, request);
        let host = plan.dut.name.clone();
        event!(Level::INFO, %host, rack = %plan.dut.rack, servo = %plan.dut.servo, "Adding DUT");
        if !looks_like_site_device(&host) {
            event!(Level::WARN, %host, "Hostname does not look like a satlab device");
        }

        let mut snapshot = None;
        if request.skip_dns {
            event!(Level::INFO, "Skipping DNS update");
        } else {
            match self.dns.update_record(&host, &request.address).await {
                Ok(s) => {
                    if !s.restorable() {
                        event!(
                            Level::WARN,
                            existed = s.existed,
                            "DNS records were empty before the update, they will not be restored on failure"
                        );
                    }
                    snapshot = Some(s);
                }
                Err(failure) => {
                    let err = Error::stage("dns", failure.error);
                    summary.record(Stage::InventoryWrite, &host, Some(&err));
                    summary.skip(Stage::Deploy, &host, "dns update failed");
                    return Err(self.compensate(failure.snapshot.as_ref(), err).await);
                }
            }
        }

        match self.register_and_deploy(request, &plan, summary).await {
            Ok(job) => Ok(AddDutReport {
                hostname: host,
                rack: plan.dut.rack,
                servo: plan.dut.servo,
                job,
            }),
            Err(err) => Err(self.compensate(snapshot.as_ref(), err).await),
        }
    }

    async fn register(&self, request: &AddDutRequest, plan: &Plan) -> Result<(), Error> {
        let dut = &plan.dut;
        self.inventory
            .ensure_rack(&dut.rack, &plan.namespace, &dut.zone)
            .await
            .map_err(|e| Error::stage("rack", e))?;
        self.inventory
            .ensure_asset(
                &dut.asset,
                &dut.rack,
                &dut.zone,
                &request.model,
                &request.board,
                &plan.namespace,
                AssetType::Dut,
            )
            .await
            .map_err(|e| Error::stage("asset", e))?;
        self.inventory
            .ensure_dut(
                &dut.name,
                &plan.namespace,
                &dut.zone,
                &dut.rack,
                &dut.servo,
                &dut.to_flags(),
            )
            .await
            .map_err(|e| Error::stage("dut", e))?;
        Ok(())
    }

    async fn register_and_deploy(
        &self,
        request: &AddDutRequest,
        plan: &Plan,
        summary: &mut Summary,
    ) -> Result<Option<JobHandle>, Error> {
        let host = &plan.dut.name;
        if let Err(e) = self.register(request, plan).await {
            summary.record(Stage::InventoryWrite, host, Some(&e));
            summary.skip(Stage::Deploy, host, "inventory write failed");
            return Err(e);
        }
        summary.record(Stage::InventoryWrite, host, None);

        if request.skip_deploy {
            summary.skip(Stage::Deploy, host, "--skip-deploy");
            return Ok(None);
        }

        let mut params = DeployParams::new(host, TaskName::Deploy, &self.config.fleet.services);
        params.extra_tags = std::iter::once(session_tag(&Uuid::new_v4().to_string()))
            .chain(request.deploy_tags.iter().cloned())
            .collect();
        if !request.full_deploy {
            params.deploy_skip_actions = DEFAULT_SKIP_ACTIONS.iter().map(|a| a.to_string()).collect();
        }

        match self.dispatcher.schedule_deploy(&params).await {
            Ok(job) => {
                summary.record(Stage::Deploy, host, None);
                Ok(Some(job))
            }
            Err(e) => {
                let e = Error::stage("deploy", e);
                summary.record(Stage::Deploy, host, Some(&e));
                Err(e)
            }
        }
    }

    /// Restore the hosts file after `primary` failed a later step. Failures
    /// to restore are returned after `primary`.
    async fn compensate(&self, snapshot: Option<&HostsSnapshot>, primary: Error) -> Error {
        let Some(snapshot) = snapshot else {
            return primary;
        };
        if !snapshot.restorable() {
            event!(Level::WARN, "Not restoring empty DNS records");
            return primary;
        }

        event!(Level::INFO, "Restoring DNS records");
        let mut errors = vec![primary];
        if let Err(e) = self.dns.set_content(&snapshot.content).await {
            errors.push(Error::Rollback(Box::new(e)));
        }
        if let Err(e) = self.dns.force_reload().await {
            errors.push(Error::Rollback(Box::new(e)));
        }
        Error::aggregate(errors)
    }
}
