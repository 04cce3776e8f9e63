use async_trait::async_trait;
use clap::Parser;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use fleet_rs::api::buildbucket::{Build, ScheduleBuildRequest};
use fleet_rs::deploy::BuildService;
use fleet_rs::dut::DutArgs;
use fleet_rs::prpc::PrpcError;
use satlab::add_dut::{AddDutRequest, Satlab};
use satlab::config::SatlabConfig;
use satlab::dns::{ContainerRuntime, ExecOutput};
use satlab::inventory::FleetCommand;
use satlab::site::HostIdentifier;
use satlab::summary::{Outcome, Stage, Summary};
use satlab::Error;

const HOSTS: &str = "/etc/dut_hosts/hosts";
const BACKUP: &str = "/etc/dut_hosts/hosts.BAK";
const ORIGINAL_HOSTS: &str = "# satlab DUTs\n10.0.0.1\tsatlab-ab-host0\n";

#[derive(Default)]
struct FakeContainer {
    files: Mutex<BTreeMap<String, String>>,
    commands: Mutex<Vec<String>>,
    hosts_writes: Mutex<usize>,
    /// Writes to the hosts file after this many succeed fail.
    fail_hosts_write_after: Option<usize>,
    /// Number of upcoming hosts file writes that fail.
    failing_hosts_writes: Mutex<usize>,
    /// Number of upcoming reloads that fail.
    failing_reloads: Mutex<usize>,
}

impl FakeContainer {
    fn with_hosts(content: &str) -> Self {
        let fake = FakeContainer::default();
        fake.files
            .lock()
            .unwrap()
            .insert(HOSTS.to_string(), content.to_string());
        fake
    }

    fn hosts(&self) -> Option<String> {
        self.files.lock().unwrap().get(HOSTS).cloned()
    }

    fn reloads(&self) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("killall"))
            .count()
    }

    fn failing(count: &Mutex<usize>) -> bool {
        let mut count = count.lock().unwrap();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn touched(&self) -> bool {
        !self.commands.lock().unwrap().is_empty() || *self.hosts_writes.lock().unwrap() > 0
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainer {
    async fn exec(&self, _container: &str, argv: &[&str]) -> Result<ExecOutput, Error> {
        self.commands.lock().unwrap().push(argv.join(" "));
        if argv.first() == Some(&"killall") && Self::failing(&self.failing_reloads) {
            return Ok(ExecOutput {
                success: false,
                stderr: "dnsmasq: no process found\n".to_string(),
                ..Default::default()
            });
        }
        let files = self.files.lock().unwrap();
        Ok(match argv {
            ["test", "-e", path] => ExecOutput {
                success: files.contains_key(*path),
                ..Default::default()
            },
            ["cat", path] => ExecOutput {
                success: true,
                stdout: files.get(*path).cloned().unwrap_or_default(),
                ..Default::default()
            },
            _ => ExecOutput {
                success: true,
                ..Default::default()
            },
        })
    }

    async fn copy_into(&self, container: &str, source: &Path, dest: &str) -> Result<(), Error> {
        if dest == HOSTS {
            let mut writes = self.hosts_writes.lock().unwrap();
            if self.fail_hosts_write_after.is_some_and(|n| *writes >= n)
                || Self::failing(&self.failing_hosts_writes)
            {
                return Err(Error::ContainerExec {
                    container: container.to_string(),
                    command: format!("cp {} {container}:{dest}", source.display()),
                    message: "read-only file system".to_string(),
                });
            }
            *writes += 1;
        }
        let content = std::fs::read_to_string(source)?;
        self.files.lock().unwrap().insert(dest.to_string(), content);
        Ok(())
    }
}

/// The argument parser of `fleet add dut`.
#[derive(Parser, Debug)]
struct AddDutCommand {
    #[command(flatten)]
    dut: DutArgs,
}

/// An inventory that remembers what `add` created. `add dut` arguments are
/// parsed and validated like the `fleet` binary does.
#[derive(Default)]
struct FakeFleet {
    entities: Mutex<BTreeSet<(String, String)>>,
    calls: Mutex<Vec<Vec<String>>>,
    fail_add: Option<&'static str>,
}

impl FakeFleet {
    fn with(entities: &[(&str, &str)]) -> Self {
        let fake = FakeFleet::default();
        fake.entities.lock().unwrap().extend(
            entities
                .iter()
                .map(|(kind, id)| (kind.to_string(), id.to_string())),
        );
        fake
    }

    fn has(&self, kind: &str, id: &str) -> bool {
        self.entities
            .lock()
            .unwrap()
            .contains(&(kind.to_string(), id.to_string()))
    }

    fn adds(&self, kind: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c[2] == "add" && c[3] == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FleetCommand for FakeFleet {
    async fn run(&self, args: &[String]) -> Result<String, Error> {
        self.calls.lock().unwrap().push(args.to_vec());
        let kind = args[3].clone();
        match args[2].as_str() {
            "get" => {
                if self.has(&kind, &args[4]) {
                    Ok(format!("{{\n  \"name\": \"{}\"\n}}\n", args[4]))
                } else {
                    Ok(String::new())
                }
            }
            "add" => {
                if self.fail_add == Some(kind.as_str()) {
                    return Err(Error::Inventory {
                        command: args.join(" "),
                        message: "exited with exit status: 1".to_string(),
                    });
                }
                if kind == "dut" {
                    let argv = std::iter::once("fleet").chain(args[4..].iter().map(String::as_str));
                    let parsed = AddDutCommand::try_parse_from(argv).map_err(|e| Error::Inventory {
                        command: args.join(" "),
                        message: e.to_string(),
                    })?;
                    parsed.dut.validate().map_err(|e| Error::Inventory {
                        command: args.join(" "),
                        message: e.to_string(),
                    })?;
                }
                let name = args
                    .iter()
                    .find_map(|a| a.strip_prefix("--name="))
                    .unwrap_or_default()
                    .to_string();
                self.entities.lock().unwrap().insert((kind, name));
                Ok(String::new())
            }
            other => panic!("unexpected fleet command {other}"),
        }
    }
}

#[derive(Default)]
struct FakeBuilds {
    requests: Mutex<Vec<ScheduleBuildRequest>>,
    fail: bool,
}

#[async_trait]
impl BuildService for FakeBuilds {
    async fn schedule_build(&self, request: &ScheduleBuildRequest) -> Result<Build, PrpcError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if self.fail {
            return Err(PrpcError::Status {
                method: "buildbucket.v2.Builds.ScheduleBuild".to_string(),
                code: 7,
                message: "permission denied".to_string(),
            });
        }
        Ok(Build {
            id: 8800000000 + requests.len() as i64,
            status: Some("SCHEDULED".to_string()),
        })
    }
}

struct FakeIdentifier(Option<&'static str>);

#[async_trait]
impl HostIdentifier for FakeIdentifier {
    async fn identify(&self) -> Result<String, Error> {
        self.0
            .map(String::from)
            .ok_or_else(|| Error::IdentityUnknown("script exited with exit status: 127".into()))
    }
}

struct Harness {
    container: Arc<FakeContainer>,
    fleet: Arc<FakeFleet>,
    builds: Arc<FakeBuilds>,
    satlab: Satlab,
}

impl Harness {
    fn new(container: FakeContainer, fleet: FakeFleet, builds: FakeBuilds) -> Self {
        Self::with_identifier(container, fleet, builds, FakeIdentifier(Some("ab\n")))
    }

    fn with_identifier(
        container: FakeContainer,
        fleet: FakeFleet,
        builds: FakeBuilds,
        identifier: FakeIdentifier,
    ) -> Self {
        let container = Arc::new(container);
        let fleet = Arc::new(fleet);
        let builds = Arc::new(builds);
        let satlab = Satlab::new(
            SatlabConfig::default(),
            Arc::new(identifier),
            container.clone(),
            fleet.clone(),
            builds.clone(),
        );
        Harness {
            container,
            fleet,
            builds,
            satlab,
        }
    }

    fn scheduled(&self) -> usize {
        self.builds.requests.lock().unwrap().len()
    }

    fn untouched(&self) -> bool {
        !self.container.touched()
            && self.fleet.calls.lock().unwrap().is_empty()
            && self.scheduled() == 0
    }
}

/// The request of the basic scenario: a new DUT on a new rack.
fn request() -> AddDutRequest {
    let mut req = AddDutRequest {
        address: "10.0.0.5".into(),
        model: "m".into(),
        board: "b".into(),
        satlab_id: "ab".into(),
        ..Default::default()
    };
    req.dut.name = "host1".into();
    req.dut.asset = "A1".into();
    req.dut.rack = "r1".into();
    req.dut.zone = "satlab".into();
    req
}

fn has_flag(call: &[String], flag: &str) -> bool {
    call.iter().any(|a| a == flag)
}

#[tokio::test]
async fn test_add_dut_happy_path() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let report = h.satlab.add_dut(&request(), &mut summary).await.unwrap();

    assert_eq!(report.hostname, "satlab-ab-host1");
    assert_eq!(report.rack, "satlab-ab-r1");
    let job = report.job.unwrap();
    assert_eq!(job.id, 8800000001);
    assert_eq!(
        job.url,
        "https://ci.chromium.org/p/chromeos/builders/labpack/labpack/b8800000001"
    );

    assert_eq!(
        h.container.hosts().unwrap(),
        format!("{ORIGINAL_HOSTS}10.0.0.5\tsatlab-ab-host1\n")
    );
    assert_eq!(
        h.container.files.lock().unwrap()[BACKUP],
        ORIGINAL_HOSTS.to_string()
    );
    assert_eq!(h.container.reloads(), 1);

    assert!(h.fleet.has("rack", "satlab-ab-r1"));
    assert!(h.fleet.has("asset", "A1"));
    assert!(h.fleet.has("dut", "satlab-ab-host1"));
    let asset = &h.fleet.adds("asset")[0];
    assert!(has_flag(asset, "--rack=satlab-ab-r1"));
    assert!(has_flag(asset, "--zone=satlab"));
    assert!(has_flag(asset, "--type=dut"));

    let dut = &h.fleet.adds("dut")[0];
    assert!(has_flag(dut, "--asset=A1"));
    assert!(has_flag(dut, "--rack=satlab-ab-r1"));
    assert!(has_flag(dut, "--pools=satlab-ab"));
    assert!(has_flag(dut, "--servo=satlab-ab-host1-docker_servod:9999"));
    assert!(has_flag(dut, "--servod-docker=satlab-ab-host1-docker_servod"));

    assert_eq!(h.scheduled(), 1);
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::InventoryWrite),
        Some(&Outcome::Success)
    );
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(&Outcome::Success)
    );
}

#[tokio::test]
async fn test_inventory_calls_are_ordered() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    h.satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap();

    let order: Vec<String> = h
        .fleet
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| format!("{} {}", c[2], c[3]))
        .collect();
    assert_eq!(
        order,
        vec!["get rack", "add rack", "get asset", "add asset", "get dut", "add dut"]
    );
}

#[tokio::test]
async fn test_existing_rack_is_reused() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::with(&[("rack", "satlab-ab-r1")]),
        FakeBuilds::default(),
    );
    h.satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap();

    assert!(h.fleet.adds("rack").is_empty());
    assert_eq!(h.fleet.adds("asset").len(), 1);
    assert_eq!(h.fleet.adds("dut").len(), 1);
    assert_eq!(h.scheduled(), 1);
}

#[tokio::test]
async fn test_inventory_failure_restores_dns() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet {
            fail_add: Some("dut"),
            ..Default::default()
        },
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&request(), &mut summary).await.unwrap_err();

    assert!(matches!(err.primary(), Error::Inventory { .. }));
    assert_eq!(h.container.hosts().unwrap(), ORIGINAL_HOSTS);
    assert_eq!(h.container.reloads(), 2);
    assert_eq!(h.scheduled(), 0);
    assert!(matches!(
        summary.outcome("satlab-ab-host1", Stage::InventoryWrite),
        Some(Outcome::Error(_))
    ));
    assert!(matches!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(Outcome::Skipped(_))
    ));
}

#[tokio::test]
async fn test_deploy_failure_restores_dns() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds {
            fail: true,
            ..Default::default()
        },
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&request(), &mut summary).await.unwrap_err();

    assert!(matches!(err.primary(), Error::Deploy(_)));
    assert_eq!(h.container.hosts().unwrap(), ORIGINAL_HOSTS);
    assert_eq!(h.container.reloads(), 2);
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::InventoryWrite),
        Some(&Outcome::Success)
    );
    assert!(matches!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(Outcome::Error(_))
    ));
}

#[tokio::test]
async fn test_failed_restore_is_reported_after_primary_error() {
    let h = Harness::new(
        FakeContainer {
            fail_hosts_write_after: Some(1),
            ..FakeContainer::with_hosts(ORIGINAL_HOSTS)
        },
        FakeFleet {
            fail_add: Some("rack"),
            ..Default::default()
        },
        FakeBuilds::default(),
    );

    let err = h
        .satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap_err();

    let Error::Aggregate(errors) = &err else {
        panic!("expected an aggregate error, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0].primary(), Error::Inventory { .. }));
    assert!(errors[1].is_rollback());
    // The reload is attempted even though the restore failed.
    assert_eq!(h.container.reloads(), 2);
}

#[tokio::test]
async fn test_failed_dns_write_restores_records() {
    let h = Harness::new(
        FakeContainer {
            failing_hosts_writes: Mutex::new(1),
            ..FakeContainer::with_hosts(ORIGINAL_HOSTS)
        },
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&request(), &mut summary).await.unwrap_err();

    assert!(matches!(err, Error::Stage { stage: "dns", .. }));
    assert!(matches!(err.primary(), Error::ContainerExec { .. }));
    assert_eq!(h.container.hosts().unwrap(), ORIGINAL_HOSTS);
    assert_eq!(h.container.reloads(), 1);
    assert!(h.fleet.calls.lock().unwrap().is_empty());
    assert_eq!(h.scheduled(), 0);
    assert!(matches!(
        summary.outcome("satlab-ab-host1", Stage::InventoryWrite),
        Some(Outcome::Error(_))
    ));
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(&Outcome::Skipped("dns update failed".into()))
    );
}

#[tokio::test]
async fn test_failed_dns_reload_restores_records() {
    let h = Harness::new(
        FakeContainer {
            failing_reloads: Mutex::new(1),
            ..FakeContainer::with_hosts(ORIGINAL_HOSTS)
        },
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&request(), &mut summary).await.unwrap_err();

    assert!(matches!(err, Error::Stage { stage: "dns", .. }));
    // The new record was written, then put back.
    assert_eq!(h.container.hosts().unwrap(), ORIGINAL_HOSTS);
    assert_eq!(*h.container.hosts_writes.lock().unwrap(), 2);
    assert_eq!(h.container.reloads(), 2);
    assert!(h.fleet.calls.lock().unwrap().is_empty());
    assert_eq!(h.scheduled(), 0);
    assert!(matches!(
        summary.outcome("satlab-ab-host1", Stage::InventoryWrite),
        Some(Outcome::Error(_))
    ));
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(&Outcome::Skipped("dns update failed".into()))
    );
}

#[tokio::test]
async fn test_physical_servo_without_serial_is_rejected_by_fleet() {
    let fleet = FakeFleet::default();
    let args = [
        "--namespace",
        "os",
        "add",
        "dut",
        "--name=satlab-ab-host1",
        "--asset=A1",
        "--servo=satlab-ab-rack1-servo:9999",
    ]
    .map(String::from);

    let err = fleet.run(&args).await.unwrap_err();

    assert!(matches!(err, Error::Inventory { .. }));
    assert!(!fleet.has("dut", "satlab-ab-host1"));
}

#[tokio::test]
async fn test_skip_dns() {
    let mut req = request();
    req.skip_dns = true;
    req.address.clear();
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    assert!(!h.container.touched());
    assert!(h.fleet.has("dut", "satlab-ab-host1"));
    assert_eq!(h.scheduled(), 1);
}

#[tokio::test]
async fn test_qualified_names_are_not_prefixed_twice() {
    let mut req = request();
    req.dut.name = "satlab-ab-host7".into();
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    let report = h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    assert_eq!(report.hostname, "satlab-ab-host7");
    assert!(h.fleet.has("dut", "satlab-ab-host7"));
    assert!(h
        .container
        .hosts()
        .unwrap()
        .contains("10.0.0.5\tsatlab-ab-host7\n"));
    let requests = h.builds.requests.lock().unwrap();
    assert_eq!(requests[0].dimensions[0].value, "crossk-satlab-ab-host7");
}

#[tokio::test]
async fn test_non_v3_servo_needs_serial() {
    let mut req = request();
    req.dut.servo = "rack1-servo:9999".into();
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&req, &mut summary).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(h.untouched());
    assert!(summary.is_empty());
}

#[tokio::test]
async fn test_physical_servo_is_qualified() {
    let mut req = request();
    req.dut.servo = "host1-servo-v3:9999".into();
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    let report = h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    assert_eq!(report.servo, "satlab-ab-host1-servo-v3:9999");
    let dut = &h.fleet.adds("dut")[0];
    assert!(!dut.iter().any(|a| a.starts_with("--servod-docker")));
}

#[tokio::test]
async fn test_empty_hostname_has_no_side_effects() {
    let mut req = request();
    req.dut.name.clear();
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    let err = h
        .satlab
        .add_dut(&req, &mut Summary::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(h.untouched());
}

#[tokio::test]
async fn test_empty_dns_records_are_not_restored() {
    let h = Harness::new(
        FakeContainer::with_hosts(""),
        FakeFleet {
            fail_add: Some("asset"),
            ..Default::default()
        },
        FakeBuilds::default(),
    );

    let err = h
        .satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Stage { stage: "asset", .. }));
    assert_eq!(h.container.hosts().unwrap(), "10.0.0.5\tsatlab-ab-host1\n");
    assert_eq!(h.container.reloads(), 1);
}

#[tokio::test]
async fn test_missing_dns_records_are_not_restored() {
    let h = Harness::new(
        FakeContainer::default(),
        FakeFleet {
            fail_add: Some("rack"),
            ..Default::default()
        },
        FakeBuilds::default(),
    );

    h.satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap_err();

    assert_eq!(h.container.hosts().unwrap(), "10.0.0.5\tsatlab-ab-host1\n");
    assert_eq!(h.container.reloads(), 1);
}

#[tokio::test]
async fn test_repeated_add_creates_nothing_new() {
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    h.satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap();
    let hosts = h.container.hosts();
    h.satlab
        .add_dut(&request(), &mut Summary::new())
        .await
        .unwrap();

    assert_eq!(h.fleet.adds("rack").len(), 1);
    assert_eq!(h.fleet.adds("asset").len(), 1);
    assert_eq!(h.fleet.adds("dut").len(), 1);
    assert_eq!(h.container.hosts(), hosts);
    assert_eq!(h.scheduled(), 2);
}

#[tokio::test]
async fn test_site_id_from_identifier() {
    let mut req = request();
    req.satlab_id.clear();
    let h = Harness::with_identifier(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
        FakeIdentifier(Some(" CD\n")),
    );

    let report = h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    assert_eq!(report.hostname, "satlab-cd-host1");
    assert!(h.fleet.has("rack", "satlab-cd-r1"));
}

#[tokio::test]
async fn test_unknown_identity() {
    let mut req = request();
    req.satlab_id.clear();
    let h = Harness::with_identifier(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
        FakeIdentifier(None),
    );
    let mut summary = Summary::new();

    let err = h.satlab.add_dut(&req, &mut summary).await.unwrap_err();

    assert!(matches!(err, Error::IdentityUnknown(_)));
    assert!(h.untouched());
    assert!(summary.is_empty());
}

#[tokio::test]
async fn test_deploy_request() {
    let mut req = request();
    req.deploy_tags = vec!["ticket:b/123".into()];
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    let requests = h.builds.requests.lock().unwrap();
    let build = &requests[0];
    assert_eq!(build.tags[0].key, "dut-name");
    assert_eq!(build.tags[0].value, "satlab-ab-host1");
    assert_eq!(build.tags[1].key, "admin-session");
    assert_eq!(build.tags[2].key, "ticket");
    assert_eq!(build.properties["unit_name"], "satlab-ab-host1");
    assert_eq!(build.properties["task_name"], "deploy");
    assert_eq!(build.properties["enable_recovery"], true);
    assert_eq!(build.properties["update_inventory"], true);
    assert_eq!(
        build.properties["deploy_skip_actions"],
        serde_json::json!(["download-image", "install-os", "install-firmware", "recovery-mode"])
    );
}

#[tokio::test]
async fn test_full_deploy_skips_nothing() {
    let mut req = request();
    req.full_deploy = true;
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );

    h.satlab.add_dut(&req, &mut Summary::new()).await.unwrap();

    let requests = h.builds.requests.lock().unwrap();
    assert!(requests[0].properties.get("deploy_skip_actions").is_none());
}

#[tokio::test]
async fn test_skip_deploy() {
    let mut req = request();
    req.skip_deploy = true;
    let h = Harness::new(
        FakeContainer::with_hosts(ORIGINAL_HOSTS),
        FakeFleet::default(),
        FakeBuilds::default(),
    );
    let mut summary = Summary::new();

    let report = h.satlab.add_dut(&req, &mut summary).await.unwrap();

    assert!(report.job.is_none());
    assert_eq!(h.scheduled(), 0);
    assert_eq!(
        summary.outcome("satlab-ab-host1", Stage::Deploy),
        Some(&Outcome::Skipped("--skip-deploy".into()))
    );
}
