//! DUT registration arguments shared by the `fleet` and `satlab` tools.
//!
//! `satlab` does not write DUTs itself: it forwards these arguments to
//! `fleet add dut` as flags. [`DutArgs::to_flags`] therefore serializes the
//! arguments such that `fleet` parses them back to the same values.

use clap::Args;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::api::inventory::{
    resource_name, AntennaConnection, Cable, CableType, Camera, CameraType, ChameleonType, Facing,
    Light, MachineLse, ResourceState, Router, Rpm, Servo, ServoSetupType, UnknownValue, Zone,
    MACHINE_LSE_COLLECTION,
};

/// Flag name to value(s). A flag without values is a boolean switch.
pub type Flagmap = BTreeMap<String, Vec<String>>;

/// Pools a DUT joins when none are given.
pub const DEFAULT_POOLS: &[&str] = &["DUT_POOL_QUOTA"];

/// Hostnames of servo v3 boards, which carry no separate serial number.
fn servo_v3_hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\S+-servo-?v3(\.cros)?$").expect("static regex"))
}

pub fn is_servo_v3_host(host: &str) -> bool {
    servo_v3_hostname_regex().is_match(host)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    UnknownValue(#[from] UnknownValue),
}

fn usage<T>(msg: impl Into<String>) -> Result<T, ValidationError> {
    Err(ValidationError::Usage(msg.into()))
}

/// Split `host:port`. The port is optional and left to the inventory
/// service to assign when missing.
pub fn parse_servo(servo: &str) -> Result<(String, Option<i32>), ValidationError> {
    match servo.split_once(':') {
        None => Ok((servo.to_string(), None)),
        Some((host, port)) => {
            if host.is_empty() || port.contains(':') {
                return usage(format!("servo {servo:?} is not of the form host:port"));
            }
            let port = port
                .parse::<i32>()
                .map_err(|_| ValidationError::Usage(format!("invalid servo port in {servo:?}")))?;
            Ok((host.to_string(), Some(port)))
        }
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct DutArgs {
    /// Hostname of the DUT.
    #[arg(long = "name", default_value_t)]
    pub name: String,

    /// Asset tag of the machine.
    #[arg(long, default_value_t)]
    pub asset: String,

    /// Rack that the asset is in.
    #[arg(long, default_value_t)]
    pub rack: String,

    /// Zone that the asset is in.
    #[arg(long, default_value_t)]
    pub zone: String,

    /// Servo hostname and port as hostname:port.
    #[arg(long, default_value_t)]
    pub servo: String,

    /// Serial number of the servo. May be skipped for servo v3.
    #[arg(long = "servo-serial", default_value_t)]
    pub servo_serial: String,

    /// Servo setup type.
    #[arg(long = "servo-setup", default_value_t)]
    pub servo_setup: String,

    /// Name of the container running servod, if servod runs in one.
    #[arg(long = "servod-docker", default_value_t)]
    pub servod_docker: String,

    /// Comma separated pools assigned to the DUT.
    #[arg(long, value_delimiter = ',')]
    pub pools: Vec<String>,

    /// RPM assigned to the DUT.
    #[arg(long, default_value_t)]
    pub rpm: String,

    /// RPM outlet used for the DUT.
    #[arg(long = "rpm-outlet", default_value_t)]
    pub rpm_outlet: String,

    /// Deployment ticket for this machine.
    #[arg(long, default_value_t)]
    pub ticket: String,

    /// Comma separated tags.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Description of the machine.
    #[arg(long = "desc", default_value_t)]
    pub description: String,

    /// Resource state of the DUT.
    #[arg(long, default_value_t)]
    pub state: String,

    /// Comma separated chameleon types.
    #[arg(long, value_delimiter = ',')]
    pub chameleons: Vec<String>,

    /// Comma separated camera types.
    #[arg(long, value_delimiter = ',')]
    pub cameras: Vec<String>,

    /// Comma separated cable types.
    #[arg(long, value_delimiter = ',')]
    pub cables: Vec<String>,

    /// Wifi antenna connection.
    #[arg(long = "antennaconnection", default_value_t)]
    pub antenna_connection: String,

    /// Wifi router.
    #[arg(long, default_value_t)]
    pub router: String,

    /// Camerabox facing.
    #[arg(long, default_value_t)]
    pub facing: String,

    /// Camerabox light.
    #[arg(long, default_value_t)]
    pub light: String,

    /// Name of the carrier.
    #[arg(long, default_value_t)]
    pub carrier: String,

    #[arg(long = "audioboard")]
    pub audio_board: bool,
    #[arg(long = "audiobox")]
    pub audio_box: bool,
    #[arg(long)]
    pub atrus: bool,
    #[arg(long = "wificell")]
    pub wifi_cell: bool,
    #[arg(long = "touchmimo")]
    pub touch_mimo: bool,
    #[arg(long = "camerabox")]
    pub camera_box: bool,
    #[arg(long)]
    pub chaos: bool,
    #[arg(long = "audiocable")]
    pub audio_cable: bool,
    #[arg(long = "smartusbhub")]
    pub smart_usb_hub: bool,
}

fn parse_opt<T>(value: &str) -> Result<Option<T>, ValidationError>
where
    T: std::str::FromStr<Err = UnknownValue>,
{
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.parse()?))
    }
}

fn parse_all<T>(values: &[String]) -> Result<Vec<T>, ValidationError>
where
    T: std::str::FromStr<Err = UnknownValue>,
{
    values
        .iter()
        .map(|v| v.parse().map_err(ValidationError::from))
        .collect()
}

impl DutArgs {
    /// Check the arguments of a new DUT.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return usage("need hostname to create a DUT");
        }
        if self.asset.is_empty() {
            return usage("need asset ID to create a DUT");
        }
        self.validate_fields()
    }

    /// Checks that apply to both creating and updating a DUT.
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if !self.servo.is_empty() {
            let (host, _) = parse_servo(&self.servo)?;
            // Containerised servod has no board serial.
            if self.servo_serial.is_empty()
                && self.servod_docker.is_empty()
                && !is_servo_v3_host(&host)
            {
                return usage(format!(
                    "cannot skip servo serial, {host:?} is not a servo v3 device"
                ));
            }
        } else if !self.servo_serial.is_empty()
            || !self.servo_setup.is_empty()
            || !self.servod_docker.is_empty()
        {
            return usage("provided servo details without a servo hostname");
        }
        parse_opt::<ServoSetupType>(&self.servo_setup)?;

        if self.rpm.is_empty() != self.rpm_outlet.is_empty() {
            return usage(format!(
                "need both rpm and its outlet, {:?}:{:?} is invalid",
                self.rpm, self.rpm_outlet
            ));
        }

        parse_opt::<Zone>(&self.zone)?;
        parse_opt::<ResourceState>(&self.state)?;
        parse_all::<ChameleonType>(&self.chameleons)?;
        parse_all::<CameraType>(&self.cameras)?;
        parse_all::<CableType>(&self.cables)?;
        parse_opt::<AntennaConnection>(&self.antenna_connection)?;
        parse_opt::<Router>(&self.router)?;
        parse_opt::<Facing>(&self.facing)?;
        parse_opt::<Light>(&self.light)?;
        Ok(())
    }

    /// Build the inventory record for these arguments.
    pub fn to_machine_lse(&self) -> Result<MachineLse, ValidationError> {
        let mut lse = MachineLse {
            name: resource_name(MACHINE_LSE_COLLECTION, &self.name),
            hostname: self.name.clone(),
            rack: self.rack.clone(),
            zone: parse_opt(&self.zone)?,
            deployment_ticket: self.ticket.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            resource_state: parse_opt(&self.state)?,
            ..Default::default()
        };
        if !self.asset.is_empty() {
            lse.machines = vec![self.asset.clone()];
        }

        let dut = lse.dut_mut();
        dut.hostname = self.name.clone();
        dut.pools = if self.pools.iter().any(|p| !p.is_empty()) {
            self.pools.clone()
        } else {
            DEFAULT_POOLS.iter().map(|p| p.to_string()).collect()
        };

        let peripherals = &mut dut.peripherals;
        if !self.servo.is_empty() {
            let (host, port) = parse_servo(&self.servo)?;
            peripherals.servo = Some(Servo {
                servo_hostname: host,
                servo_port: port.unwrap_or(0),
                servo_serial: self.servo_serial.clone(),
                servo_setup: parse_opt(&self.servo_setup)?,
                docker_container_name: self.servod_docker.clone(),
            });
        }
        if !self.rpm.is_empty() {
            peripherals.rpm = Some(Rpm {
                powerunit_name: self.rpm.clone(),
                powerunit_outlet: self.rpm_outlet.clone(),
            });
        }
        peripherals.chameleon.chameleon_peripherals = parse_all(&self.chameleons)?;
        peripherals.chameleon.audio_board = self.audio_board;
        peripherals.connected_camera = parse_all::<CameraType>(&self.cameras)?
            .into_iter()
            .map(|camera_type| Camera { camera_type })
            .collect();
        peripherals.cable = parse_all::<CableType>(&self.cables)?
            .into_iter()
            .map(|kind| Cable { kind })
            .collect();
        peripherals.wifi.antenna_conn = parse_opt(&self.antenna_connection)?;
        peripherals.wifi.router = parse_opt(&self.router)?;
        peripherals.wifi.wificell = self.wifi_cell;
        peripherals.camerabox_info.facing = parse_opt(&self.facing)?;
        peripherals.camerabox_info.light = parse_opt(&self.light)?;
        peripherals.audio.audio_box = self.audio_box;
        peripherals.audio.atrus = self.atrus;
        peripherals.audio.audio_cable = self.audio_cable;
        peripherals.touch.mimo = self.touch_mimo;
        peripherals.carrier = self.carrier.clone();
        peripherals.camerabox = self.camera_box;
        peripherals.chaos = self.chaos;
        peripherals.smart_usbhub = self.smart_usb_hub;

        Ok(lse)
    }

    /// Field mask paths covering the arguments that were actually given.
    pub fn update_mask(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        let mut set = |given: bool, path: &'static str| {
            if given {
                paths.push(path);
            }
        };
        set(!self.asset.is_empty(), "machines");
        set(!self.rack.is_empty(), "rack");
        set(!self.zone.is_empty(), "zone");
        set(!self.servo.is_empty(), "dut.servo.hostname");
        set(!self.servo_serial.is_empty(), "dut.servo.serial");
        set(!self.servo_setup.is_empty(), "dut.servo.setup");
        set(!self.servod_docker.is_empty(), "dut.servo.docker_container");
        set(!self.pools.is_empty(), "dut.pools");
        set(!self.rpm.is_empty(), "dut.rpm.host");
        set(!self.rpm_outlet.is_empty(), "dut.rpm.outlet");
        set(!self.ticket.is_empty(), "deploymentTicket");
        set(!self.tags.is_empty(), "tags");
        set(!self.description.is_empty(), "description");
        set(!self.state.is_empty(), "resourceState");
        set(!self.chameleons.is_empty(), "dut.chameleon.type");
        set(!self.cameras.is_empty(), "dut.camera.type");
        set(!self.cables.is_empty(), "dut.cable.type");
        set(!self.antenna_connection.is_empty(), "dut.antennaconnection");
        set(!self.router.is_empty(), "dut.router");
        set(!self.facing.is_empty(), "dut.facing");
        set(!self.light.is_empty(), "dut.light");
        set(!self.carrier.is_empty(), "dut.carrier");
        set(self.audio_board, "dut.chameleon.audioboard");
        set(self.audio_box, "dut.audio.box");
        set(self.atrus, "dut.audio.atrus");
        set(self.wifi_cell, "dut.wifi.wificell");
        set(self.touch_mimo, "dut.touch.mimo");
        set(self.camera_box, "dut.camerabox");
        set(self.chaos, "dut.chaos");
        set(self.audio_cable, "dut.audio.cable");
        set(self.smart_usb_hub, "dut.usb.smarthub");
        paths
    }

    /// Serialize the arguments back into `fleet` flags. Unset arguments are
    /// left out.
    pub fn to_flags(&self) -> Flagmap {
        let mut out = Flagmap::new();
        let mut string = |flag: &str, value: &str| {
            if !value.is_empty() {
                out.insert(flag.to_string(), vec![value.to_string()]);
            }
        };
        string("name", &self.name);
        string("asset", &self.asset);
        string("rack", &self.rack);
        string("zone", &self.zone);
        string("servo", &self.servo);
        string("servo-serial", &self.servo_serial);
        string("servo-setup", &self.servo_setup);
        string("servod-docker", &self.servod_docker);
        string("pools", &self.pools.join(","));
        string("rpm", &self.rpm);
        string("rpm-outlet", &self.rpm_outlet);
        string("ticket", &self.ticket);
        string("tags", &self.tags.join(","));
        string("desc", &self.description);
        string("state", &self.state);
        string("chameleons", &self.chameleons.join(","));
        string("cameras", &self.cameras.join(","));
        string("cables", &self.cables.join(","));
        string("antennaconnection", &self.antenna_connection);
        string("router", &self.router);
        string("facing", &self.facing);
        string("light", &self.light);
        string("carrier", &self.carrier);

        let switches = [
            ("audioboard", self.audio_board),
            ("audiobox", self.audio_box),
            ("atrus", self.atrus),
            ("wificell", self.wifi_cell),
            ("touchmimo", self.touch_mimo),
            ("camerabox", self.camera_box),
            ("chaos", self.chaos),
            ("audiocable", self.audio_cable),
            ("smartusbhub", self.smart_usb_hub),
        ];
        for (flag, on) in switches {
            if on {
                out.insert(flag.to_string(), vec![]);
            }
        }
        out
    }
}

/// Render a [`Flagmap`] as command line arguments, `--flag=value` per value
/// and a bare `--flag` for switches.
pub fn flag_args(flags: &Flagmap) -> Vec<String> {
    let mut args = Vec::new();
    for (flag, values) in flags {
        if values.is_empty() {
            args.push(format!("--{flag}"));
        }
        for value in values {
            args.push(format!("--{flag}={value}"));
        }
    }
    args
}
