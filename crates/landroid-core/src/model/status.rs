// ── Mower status report ──
//
// Decoded form of the JSON a mower publishes on its `command_out` topic.
// Firmware generations omit different fields, so everything below the
// `cfg`/`dat` blocks is optional and unknown keys are kept in `extra`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

type Extra = serde_json::Map<String, serde_json::Value>;

const REPORT_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Full status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MowerStatus {
    pub cfg: StatusConfig,
    pub dat: StatusData,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MowerStatus {
    /// Decode a raw reply payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn battery_percent(&self) -> Option<i64> {
        self.dat.bt.as_ref().and_then(|bt| bt.p)
    }

    /// Command id echoed back by the device.
    pub fn command_id(&self) -> Option<i64> {
        self.cfg.id
    }

    pub fn activity(&self) -> Option<MowerActivity> {
        self.dat.ls.map(MowerActivity::from)
    }

    pub fn error(&self) -> Option<MowerError> {
        self.dat.le.map(MowerError::from)
    }

    /// Device-local time of the report (`cfg.dt` + `cfg.tm`).
    pub fn reported_at(&self) -> Option<NaiveDateTime> {
        let date = self.cfg.dt.as_deref()?;
        let time = self.cfg.tm.as_deref()?;
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), REPORT_TIME_FORMAT).ok()
    }
}

// ── cfg ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub id: Option<i64>,
    /// Language code.
    pub lg: Option<String>,
    /// Time, `HH:MM:SS`.
    pub tm: Option<String>,
    /// Date, `DD/MM/YYYY`.
    pub dt: Option<String>,
    pub sc: Option<Schedule>,
    pub cmd: Option<i64>,
    /// Zone start points in metres.
    pub mz: Vec<i64>,
    /// Zone rotation, ten slots of zone indexes.
    pub mzv: Vec<i64>,
    pub mzk: Option<i64>,
    /// Rain delay in minutes.
    pub rd: Option<i64>,
    pub sn: Option<String>,
    pub al: Option<Alert>,
    /// Torque percentage.
    pub tq: Option<i64>,
    pub modules: Option<ConfigModules>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Schedule mode.
    pub m: Option<i64>,
    pub distm: Option<i64>,
    /// One-time schedule.
    pub ots: Option<OneTimeSchedule>,
    /// Work time adjustment in percent.
    pub p: Option<i64>,
    /// Primary weekly slots, Sunday first.
    pub d: Vec<ScheduleSlot>,
    /// Secondary weekly slots.
    pub dd: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneTimeSchedule {
    /// Border cut flag.
    pub bc: Option<i64>,
    /// Work time in minutes.
    pub wtm: Option<i64>,
}

/// `[start "HH:MM", duration minutes, border cut flag]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot(pub String, pub i64, pub i64);

impl ScheduleSlot {
    pub fn start(&self) -> &str {
        &self.0
    }

    pub fn duration_minutes(&self) -> i64 {
        self.1
    }

    pub fn border_cut(&self) -> bool {
        self.2 != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub lvl: Option<i64>,
    pub t: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigModules {
    #[serde(rename = "US")]
    pub ultrasonic: Option<UltrasonicConfig>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicConfig {
    pub enabled: Option<i64>,
}

// ── dat ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusData {
    pub mac: Option<String>,
    pub fw: Option<f64>,
    pub fwb: Option<i64>,
    pub bt: Option<Battery>,
    /// Pitch, roll, yaw in degrees.
    pub dmp: Vec<f64>,
    pub st: Option<Statistics>,
    /// Activity code, see [`MowerActivity`].
    pub ls: Option<i64>,
    /// Error code, see [`MowerError`].
    pub le: Option<i64>,
    /// Current zone index.
    pub lz: Option<i64>,
    /// Wi-Fi RSSI in dBm.
    pub rsi: Option<i64>,
    /// Lock flag.
    pub lk: Option<i64>,
    pub act: Option<i64>,
    pub tr: Option<i64>,
    pub conn: Option<String>,
    pub rain: Option<Rain>,
    pub modules: Option<DataModules>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    /// Temperature in °C.
    pub t: Option<f64>,
    /// Voltage.
    pub v: Option<f64>,
    /// Charge in percent.
    pub p: Option<i64>,
    /// Charge cycles.
    pub nr: Option<i64>,
    /// Charging flag.
    pub c: Option<i64>,
    pub m: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    /// Blade work time in minutes.
    pub b: Option<i64>,
    /// Distance in metres.
    pub d: Option<i64>,
    /// Work time in minutes.
    pub wt: Option<i64>,
    /// Blade work time since last reset.
    pub bl: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rain {
    /// Rain sensor state.
    pub s: Option<i64>,
    /// Remaining delay counter.
    pub cnt: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataModules {
    #[serde(rename = "US")]
    pub ultrasonic: Option<UltrasonicStatus>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicStatus {
    pub stat: Option<String>,
}

// ── Status codes ─────────────────────────────────────────────────────

/// What the mower is doing (`dat.ls`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MowerActivity {
    Idle,
    Home,
    StartSequence,
    LeavingHome,
    FollowWire,
    SearchingHome,
    SearchingWire,
    Mowing,
    Lifted,
    Trapped,
    BladeBlocked,
    Debug,
    RemoteControl,
    GoingHome,
    ZoneTraining,
    BorderCut,
    SearchingZone,
    Paused,
    Unknown(i64),
}

impl From<i64> for MowerActivity {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Home,
            2 => Self::StartSequence,
            3 => Self::LeavingHome,
            4 => Self::FollowWire,
            5 => Self::SearchingHome,
            6 => Self::SearchingWire,
            7 => Self::Mowing,
            8 => Self::Lifted,
            9 => Self::Trapped,
            10 => Self::BladeBlocked,
            11 => Self::Debug,
            12 => Self::RemoteControl,
            30 => Self::GoingHome,
            31 => Self::ZoneTraining,
            32 => Self::BorderCut,
            33 => Self::SearchingZone,
            34 => Self::Paused,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for MowerActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Home => "home",
            Self::StartSequence => "start sequence",
            Self::LeavingHome => "leaving home",
            Self::FollowWire => "following wire",
            Self::SearchingHome => "searching home",
            Self::SearchingWire => "searching wire",
            Self::Mowing => "mowing",
            Self::Lifted => "lifted",
            Self::Trapped => "trapped",
            Self::BladeBlocked => "blade blocked",
            Self::Debug => "debug",
            Self::RemoteControl => "remote control",
            Self::GoingHome => "going home",
            Self::ZoneTraining => "zone training",
            Self::BorderCut => "border cut",
            Self::SearchingZone => "searching zone",
            Self::Paused => "paused",
            Self::Unknown(code) => return write!(f, "unknown ({code})"),
        };
        f.write_str(label)
    }
}

/// Fault reported by the mower (`dat.le`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MowerError {
    None,
    Trapped,
    Lifted,
    WireMissing,
    OutsideWire,
    Raining,
    CloseDoorToMow,
    CloseDoorToGoHome,
    BladeMotorBlocked,
    WheelMotorBlocked,
    TrappedTimeout,
    UpsideDown,
    BatteryLow,
    ReverseWire,
    ChargeError,
    HomeSearchTimeout,
    Locked,
    BatteryTemperature,
    Unknown(i64),
}

impl MowerError {
    pub fn is_fault(self) -> bool {
        self != Self::None
    }
}

impl From<i64> for MowerError {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Trapped,
            2 => Self::Lifted,
            3 => Self::WireMissing,
            4 => Self::OutsideWire,
            5 => Self::Raining,
            6 => Self::CloseDoorToMow,
            7 => Self::CloseDoorToGoHome,
            8 => Self::BladeMotorBlocked,
            9 => Self::WheelMotorBlocked,
            10 => Self::TrappedTimeout,
            11 => Self::UpsideDown,
            12 => Self::BatteryLow,
            13 => Self::ReverseWire,
            14 => Self::ChargeError,
            15 => Self::HomeSearchTimeout,
            16 => Self::Locked,
            17 => Self::BatteryTemperature,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for MowerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Trapped => "trapped",
            Self::Lifted => "lifted",
            Self::WireMissing => "wire missing",
            Self::OutsideWire => "outside wire",
            Self::Raining => "raining",
            Self::CloseDoorToMow => "close door to mow",
            Self::CloseDoorToGoHome => "close door to go home",
            Self::BladeMotorBlocked => "blade motor blocked",
            Self::WheelMotorBlocked => "wheel motor blocked",
            Self::TrappedTimeout => "trapped timeout",
            Self::UpsideDown => "upside down",
            Self::BatteryLow => "battery low",
            Self::ReverseWire => "reverse wire",
            Self::ChargeError => "charge error",
            Self::HomeSearchTimeout => "timeout finding home",
            Self::Locked => "locked",
            Self::BatteryTemperature => "battery temperature out of range",
            Self::Unknown(code) => return write!(f, "unknown ({code})"),
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::{Datelike, Timelike};

    const REPORT: &str = r#"{
        "cfg": {
            "id": 4711, "lg": "de", "tm": "14:05:09", "dt": "21/06/2024",
            "sc": { "m": 1, "distm": 0, "ots": { "bc": 0, "wtm": 0 }, "p": 0,
                    "d": [["10:00", 120, 1], ["00:00", 0, 0]], "dd": [] },
            "cmd": 0, "mz": [0, 0, 0, 0], "mzv": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            "mzk": 0, "rd": 180, "sn": "20213018xxxx",
            "al": { "lvl": 0, "t": 60 }, "tq": 0,
            "modules": { "US": { "enabled": 1 } }
        },
        "dat": {
            "mac": "AABBCCDDEEFF", "fw": 3.26, "fwb": 1,
            "bt": { "t": 21.4, "v": 19.87, "p": 96, "nr": 412, "c": 0, "m": 1 },
            "dmp": [1.2, -0.4, 180.0],
            "st": { "b": 61234, "d": 870123, "wt": 70011, "bl": 1234 },
            "ls": 7, "le": 0, "lz": 2, "rsi": -62, "lk": 0, "act": 1, "tr": 0,
            "conn": "wifi", "rain": { "s": 0, "cnt": 0 },
            "modules": { "US": { "stat": "ok" } },
            "head": 12
        }
    }"#;

    #[test]
    fn decode_full_report() {
        let status = MowerStatus::from_slice(REPORT.as_bytes()).unwrap();

        assert_eq!(status.battery_percent(), Some(96));
        assert_eq!(status.command_id(), Some(4711));
        assert_eq!(status.activity(), Some(MowerActivity::Mowing));
        assert_eq!(status.error(), Some(MowerError::None));

        let schedule = status.cfg.sc.as_ref().unwrap();
        assert_eq!(schedule.d[0].start(), "10:00");
        assert_eq!(schedule.d[0].duration_minutes(), 120);
        assert!(schedule.d[0].border_cut());

        let us = status.dat.modules.as_ref().unwrap().ultrasonic.as_ref().unwrap();
        assert_eq!(us.stat.as_deref(), Some("ok"));
        assert_eq!(status.dat.extra["head"], 12);
    }

    #[test]
    fn decode_sparse_report() {
        let status = MowerStatus::from_slice(br#"{"cfg":{},"dat":{"bt":{"p":77}}}"#).unwrap();
        assert_eq!(status.battery_percent(), Some(77));
        assert!(status.activity().is_none());
        assert!(status.reported_at().is_none());
        assert!(status.dat.dmp.is_empty());
    }

    #[test]
    fn missing_blocks_are_rejected() {
        assert!(MowerStatus::from_slice(br#"{"dat":{}}"#).is_err());
        assert!(MowerStatus::from_slice(br#"{"cfg":{}}"#).is_err());
        assert!(MowerStatus::from_slice(b"not json").is_err());
    }

    #[test]
    fn reported_at_combines_date_and_time() {
        let status = MowerStatus::from_slice(REPORT.as_bytes()).unwrap();
        let at = status.reported_at().unwrap();
        assert_eq!((at.day(), at.month(), at.year()), (21, 6, 2024));
        assert_eq!((at.hour(), at.minute(), at.second()), (14, 5, 9));
    }

    #[test]
    fn unknown_codes_are_preserved() {
        assert_eq!(MowerActivity::from(99), MowerActivity::Unknown(99));
        assert_eq!(MowerError::from(42).to_string(), "unknown (42)");
        assert!(MowerError::from(2).is_fault());
        assert_eq!(MowerActivity::from(30).to_string(), "going home");
    }
}
