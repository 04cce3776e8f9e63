//! Wire types of the fleet inventory service.
//!
//! Entities are exchanged as pRPC JSON, i.e. proto3 JSON with camelCase
//! field names and enum values spelled as their proto identifiers. Every
//! name crossing the wire is of the form `<collection>/<id>`; use
//! [`resource_name`] and [`strip_collection`] at the boundary so that short
//! names never leak into requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RACK_COLLECTION: &str = "racks";
pub const ASSET_COLLECTION: &str = "assets";
pub const MACHINE_LSE_COLLECTION: &str = "machineLSEs";

/// Build the wire name of `id` within `collection`.
pub fn resource_name(collection: &str, id: &str) -> String {
    format!("{collection}/{}", strip_collection(id))
}

/// Drop the collection part of a wire name. Short names pass through.
pub fn strip_collection(name: &str) -> &str {
    name.split_once('/').map(|(_, id)| id).unwrap_or(name)
}

/// A user-supplied string did not name any known value of an enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{value:?} is not a valid {kind}, valid values are [{allowed}]", allowed = .allowed.join(", "))]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
    pub allowed: Vec<&'static str>,
}

// Enumerations accepted on the command line. Each variant has the short,
// lowercase spelling users type and the proto identifier used on the wire.
// Parsing accepts either, case-insensitively.
macro_rules! lab_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $($variant:ident => $cli:literal / $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn cli_name(self) -> &'static str {
                match self {
                    $($name::$variant => $cli,)+
                }
            }

            pub fn wire_name(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.cli_name() == lowered || v.wire_name().eq_ignore_ascii_case(&lowered))
                    .ok_or_else(|| UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                        allowed: $name::ALL.iter().map(|v| v.cli_name()).collect(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.cli_name())
            }
        }
    };
}

lab_enum! {
    /// Physical lab zone an asset lives in.
    pub enum Zone ("zone") {
        Atlanta => "atlanta" / "ZONE_ATLANTA",
        Chromeos1 => "chromeos1" / "ZONE_CHROMEOS1",
        Chromeos2 => "chromeos2" / "ZONE_CHROMEOS2",
        Chromeos3 => "chromeos3" / "ZONE_CHROMEOS3",
        Chromeos4 => "chromeos4" / "ZONE_CHROMEOS4",
        Chromeos5 => "chromeos5" / "ZONE_CHROMEOS5",
        Chromeos6 => "chromeos6" / "ZONE_CHROMEOS6",
        Chromeos7 => "chromeos7" / "ZONE_CHROMEOS7",
        Chromeos15 => "chromeos15" / "ZONE_CHROMEOS15",
        Satlab => "satlab" / "ZONE_SATLAB",
        Sfo36Os => "sfo36_os" / "ZONE_SFO36_OS",
        Iad65Os => "iad65_os" / "ZONE_IAD65_OS",
        Mtv97 => "mtv97" / "ZONE_MTV97",
        Mtv1950Testing => "mtv1950_testing" / "ZONE_MTV1950_TESTING",
    }
}

lab_enum! {
    pub enum AssetType ("asset type") {
        Dut => "dut" / "DUT",
        Servo => "servo" / "SERVO",
        Labstation => "labstation" / "LABSTATION",
    }
}

lab_enum! {
    pub enum ResourceState ("resource state") {
        Registered => "registered" / "STATE_REGISTERED",
        Deploying => "deploying" / "STATE_DEPLOYING",
        Serving => "serving" / "STATE_SERVING",
        NeedsRepair => "needs_repair" / "STATE_NEEDS_REPAIR",
        Disabled => "disabled" / "STATE_DISABLED",
        Reserved => "reserved" / "STATE_RESERVED",
        Decommissioned => "decommissioned" / "STATE_DECOMMISSIONED",
    }
}

lab_enum! {
    pub enum ServoSetupType ("servo setup") {
        Regular => "regular" / "SERVO_SETUP_REGULAR",
        DualV4 => "dual_v4" / "SERVO_SETUP_DUAL_V4",
        Debug => "debug" / "SERVO_SETUP_DEBUG",
    }
}

lab_enum! {
    pub enum ChameleonType ("chameleon type") {
        Dp => "dp" / "CHAMELEON_TYPE_DP",
        Hdmi => "hdmi" / "CHAMELEON_TYPE_HDMI",
        V2 => "v2" / "CHAMELEON_TYPE_V2",
        V3 => "v3" / "CHAMELEON_TYPE_V3",
        Rpi => "rpi" / "CHAMELEON_TYPE_RPI",
    }
}

lab_enum! {
    pub enum CameraType ("camera type") {
        Huddly => "huddly" / "CAMERA_HUDDLY",
        Ptzpro2 => "ptzpro2" / "CAMERA_PTZPRO2",
    }
}

lab_enum! {
    pub enum CableType ("cable type") {
        AudioJack => "audiojack" / "CABLE_AUDIOJACK",
        UsbAudio => "usbaudio" / "CABLE_USBAUDIO",
        UsbPrinting => "usbprinting" / "CABLE_USBPRINTING",
        HdmiAudio => "hdmiaudio" / "CABLE_HDMIAUDIO",
    }
}

lab_enum! {
    pub enum AntennaConnection ("antenna connection") {
        Conductive => "conductive" / "CONN_CONDUCTIVE",
        Ota => "ota" / "CONN_OTA",
    }
}

lab_enum! {
    pub enum Router ("router") {
        Ac => "802_11ac" / "ROUTER_802_11AC",
        Ax => "802_11ax" / "ROUTER_802_11AX",
    }
}

lab_enum! {
    pub enum Facing ("facing") {
        Back => "back" / "FACING_BACK",
        Front => "front" / "FACING_FRONT",
    }
}

lab_enum! {
    pub enum Light ("light") {
        Led => "led" / "LIGHT_LED",
        NoLed => "noled" / "LIGHT_NOLED",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rack {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub realm: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AssetType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<AssetInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Servo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub servo_hostname: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub servo_port: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub servo_serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servo_setup: Option<ServoSetupType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_container_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rpm {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub powerunit_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub powerunit_outlet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Chameleon {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chameleon_peripherals: Vec<ChameleonType>,
    pub audio_board: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub camera_type: CameraType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cable {
    #[serde(rename = "type")]
    pub kind: CableType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Wifi {
    pub wificell: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antenna_conn: Option<AntennaConnection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<Router>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Camerabox {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<Light>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Audio {
    pub audio_box: bool,
    pub atrus: bool,
    pub audio_cable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Touch {
    pub mimo: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Peripherals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servo: Option<Servo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<Rpm>,
    pub chameleon: Chameleon,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connected_camera: Vec<Camera>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cable: Vec<Cable>,
    pub wifi: Wifi,
    pub camerabox_info: Camerabox,
    pub audio: Audio,
    pub touch: Touch,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub carrier: String,
    pub camerabox: bool,
    pub chaos: bool,
    pub smart_usbhub: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceUnderTest {
    pub hostname: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<String>,
    pub peripherals: Peripherals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceLse {
    pub dut: DeviceUnderTest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChromeOsMachineLse {
    pub device_lse: DeviceLse,
}

/// A DUT as recorded by the inventory service.
///
/// The DUT references its asset (`machines`) and rack by name; the service
/// never hands out the referenced objects themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineLse {
    pub name: String,
    pub hostname: String,
    pub machines: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    #[serde(rename = "chromeosMachineLse")]
    pub chromeos_machine_lse: ChromeOsMachineLse,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deployment_ticket: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_state: Option<ResourceState>,
}

impl MachineLse {
    pub fn dut(&self) -> &DeviceUnderTest {
        &self.chromeos_machine_lse.device_lse.dut
    }

    pub fn dut_mut(&mut self) -> &mut DeviceUnderTest {
        &mut self.chromeos_machine_lse.device_lse.dut
    }
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRackRequest {
    pub rack: Rack,
    pub rack_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub asset: Asset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMachineLseRequest {
    #[serde(rename = "machineLSE")]
    pub machine_lse: MachineLse,
    #[serde(rename = "machineLSEId")]
    pub machine_lse_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMachineLseRequest {
    #[serde(rename = "machineLSE")]
    pub machine_lse: MachineLse,
    /// Field mask, encoded the proto3 JSON way as a comma separated list.
    pub update_mask: String,
}
