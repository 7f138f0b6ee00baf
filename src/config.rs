// ==============================================================================
// config.rs — TRUCK + LEVEL RECORDS AND THE REGISTRY THAT OWNS THEM
// ------------------------------------------------------------------------------
// Plain value records (serde) for everything the vehicle/terrain core consumes:
// - ChassisSpec / WheelSpec / SuspensionSpec / DrivetrainSpec -> TruckSpec
// - GeometrySource / LevelSpec
//
// Registry is built once at startup (built-in set or a JSON document) and is
// passed by reference to whoever needs lookup by name. Every record is
// validated on the way in so out-of-range numbers fail fast with ConfigError
// before any physics world exists.
//
// Derived values (diameter, rest length, top wheel rate, ...) are methods and
// are never stored.
// ==============================================================================

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --------------------------------------------------
// Truck records
// --------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpec {
    pub dimensions: [f32; 2], // meters (width, height)
    pub mass: f32,            // kg
    pub friction: f32,        // collision friction coefficient
}

impl ChassisSpec {
    pub fn half_extents(&self) -> [f32; 2] {
        [self.dimensions[0] * 0.5, self.dimensions[1] * 0.5]
    }

    /// Moment of inertia of a solid box about its center.
    pub fn moment(&self) -> f32 {
        let [w, h] = self.dimensions;
        self.mass * (w * w + h * h) / 12.0
    }

    fn validate(&self, at: &str) -> Result<()> {
        positive(&format!("{at}.mass"), self.mass)?;
        positive(&format!("{at}.dimensions[0]"), self.dimensions[0])?;
        positive(&format!("{at}.dimensions[1]"), self.dimensions[1])?;
        non_negative(&format!("{at}.friction"), self.friction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionSpec {
    pub up_travel: f32,   // meters above the wheel offset
    pub down_travel: f32, // meters below the wheel offset
    pub stiffness: f32,   // N/m
    pub damping: f32,     // N*s/m
    /// How far above the upper travel stop the spring is anchored on the chassis.
    #[serde(default = "default_spring_lift")]
    pub spring_lift: f32,
}

fn default_spring_lift() -> f32 {
    0.2
}

impl SuspensionSpec {
    /// Spring rest length: the full travel span.
    pub fn rest_length(&self) -> f32 {
        (self.up_travel - (-self.down_travel)).abs()
    }

    pub fn is_rigid(&self) -> bool {
        self.up_travel == 0.0 && self.down_travel == 0.0
    }

    fn validate(&self, at: &str) -> Result<()> {
        non_negative(&format!("{at}.up_travel"), self.up_travel)?;
        non_negative(&format!("{at}.down_travel"), self.down_travel)?;
        positive(&format!("{at}.stiffness"), self.stiffness)?;
        non_negative(&format!("{at}.damping"), self.damping)?;
        non_negative(&format!("{at}.spring_lift"), self.spring_lift)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSpec {
    pub radius: f32,      // meters
    pub mass: f32,        // kg (whole axle)
    pub friction: f32,
    pub offset: [f32; 2], // chassis local, meters
    pub suspension: SuspensionSpec,
}

impl WheelSpec {
    pub fn diameter(&self) -> f32 {
        self.radius * 2.0
    }

    pub fn dimensions(&self) -> [f32; 2] {
        let d = self.diameter();
        [d, d]
    }

    /// Moment of inertia of a solid disk.
    pub fn moment(&self) -> f32 {
        0.5 * self.mass * self.radius * self.radius
    }

    fn validate(&self, at: &str) -> Result<()> {
        positive(&format!("{at}.radius"), self.radius)?;
        positive(&format!("{at}.mass"), self.mass)?;
        non_negative(&format!("{at}.friction"), self.friction)?;
        finite(&format!("{at}.offset[0]"), self.offset[0])?;
        finite(&format!("{at}.offset[1]"), self.offset[1])?;
        self.suspension.validate(&format!("{at}.suspension"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// Direct torque each tick, no persistent rate state.
    #[default]
    Torque,
    /// Slewed motor rate chased by a torque-limited servo.
    Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainSpec {
    pub top_speed: f32,          // m/s at the tire
    pub torque: f32,             // N*m
    pub brake_torque: f32,       // N*m
    pub rolling_resistance: f32, // dimensionless

    #[serde(default)]
    pub mode: DriveMode,

    // Rate mode slew rates, rad/s^2
    #[serde(default = "default_accel_rate")]
    pub accel_rate: f32,
    #[serde(default = "default_decel_rate")]
    pub decel_rate: f32,
    #[serde(default = "default_brake_rate")]
    pub brake_rate: f32,
}

fn default_accel_rate() -> f32 {
    12.0
}

fn default_decel_rate() -> f32 {
    4.0
}

fn default_brake_rate() -> f32 {
    40.0
}

impl DrivetrainSpec {
    /// Wheel angular rate (rad/s) equivalent to top speed for a wheel of `radius`.
    pub fn top_rate(&self, radius: f32) -> f32 {
        self.top_speed / radius
    }

    fn validate(&self, at: &str) -> Result<()> {
        positive(&format!("{at}.top_speed"), self.top_speed)?;
        non_negative(&format!("{at}.torque"), self.torque)?;
        non_negative(&format!("{at}.brake_torque"), self.brake_torque)?;
        non_negative(&format!("{at}.rolling_resistance"), self.rolling_resistance)?;
        positive(&format!("{at}.accel_rate"), self.accel_rate)?;
        positive(&format!("{at}.decel_rate"), self.decel_rate)?;
        positive(&format!("{at}.brake_rate"), self.brake_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckSpec {
    pub name: String,
    pub chassis: ChassisSpec,
    pub wheel_rear: WheelSpec,
    pub wheel_front: WheelSpec,
    pub drivetrain: DrivetrainSpec,
    /// rear angular velocity / front angular velocity
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f32,
}

fn default_gear_ratio() -> f32 {
    1.0
}

impl TruckSpec {
    pub fn validate(&self) -> Result<()> {
        let at = format!("truck[{}]", self.name);
        self.chassis.validate(&format!("{at}.chassis"))?;
        self.wheel_rear.validate(&format!("{at}.wheel_rear"))?;
        self.wheel_front.validate(&format!("{at}.wheel_front"))?;
        self.drivetrain.validate(&format!("{at}.drivetrain"))?;
        // a shared driveshaft turns both axles the same way
        positive(&format!("{at}.gear_ratio"), self.gear_ratio)?;
        Ok(())
    }
}

/// "Simple Green": the stock truck.
pub fn simple_green() -> TruckSpec {
    let chassis = ChassisSpec {
        dimensions: [4.7, 2.0],
        mass: 3500.0,
        friction: 0.15,
    };

    let suspension = SuspensionSpec {
        up_travel: 0.2,
        down_travel: 0.6,
        stiffness: 70_000.0,
        damping: 9_000.0,
        spring_lift: default_spring_lift(),
    };

    let [w, h] = chassis.dimensions;
    let wheel_rear = WheelSpec {
        radius: 0.9,
        mass: 600.0,
        friction: 0.75,
        offset: [-w / 3.0, -h / 1.8],
        suspension,
    };
    let wheel_front = WheelSpec {
        offset: [w / 3.0, -h / 1.8],
        ..wheel_rear.clone()
    };

    TruckSpec {
        name: "Simple Green".to_string(),
        chassis,
        wheel_rear,
        wheel_front,
        drivetrain: DrivetrainSpec {
            top_speed: 25.0,
            torque: 22_000.0,
            brake_torque: 35_000.0,
            rolling_resistance: 0.3,
            mode: DriveMode::Torque,
            accel_rate: default_accel_rate(),
            decel_rate: default_decel_rate(),
            brake_rate: default_brake_rate(),
        },
        gear_ratio: 1.0,
    }
}

// --------------------------------------------------
// Level records
// --------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpSpec {
    pub start_x: f32,
    pub width: f32,
    pub amplitude: f32,
    #[serde(default = "default_cutoff")]
    pub cutoff: f32, // fraction of the full ramp, 0..1
    #[serde(default = "default_jump_steps")]
    pub steps: usize,
}

fn default_cutoff() -> f32 {
    1.0
}

fn default_jump_steps() -> usize {
    16
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSpec {
    pub length: f32,
    pub floor_y: f32,
    #[serde(default)]
    pub jumps: Vec<JumpSpec>,
    /// Extra jumps scattered from a seeded RNG.
    #[serde(default)]
    pub random_jumps: usize,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GeometrySource {
    Svg {
        path: PathBuf,
    },
    Heightmap {
        path: PathBuf,
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
    Course(CourseSpec),
}

fn default_threshold() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub name: String,
    pub geometry: GeometrySource,
    pub units_per_meter: f32,
    pub samples_per_meter: f32,
    pub ground_friction: f32,
    #[serde(default = "default_segment_radius")]
    pub segment_radius: f32, // collision thickness of each terrain segment
    pub gravity: [f32; 2],
    pub start_position: [f32; 2], // level units
    pub finish_line: f32,         // level units, x
    #[serde(default)]
    pub checkpoints: Vec<f32>, // level units, x
}

fn default_segment_radius() -> f32 {
    0.2
}

impl LevelSpec {
    pub fn validate(&self) -> Result<()> {
        let at = format!("level[{}]", self.name);
        positive(&format!("{at}.units_per_meter"), self.units_per_meter)?;
        positive(&format!("{at}.samples_per_meter"), self.samples_per_meter)?;
        non_negative(&format!("{at}.ground_friction"), self.ground_friction)?;
        non_negative(&format!("{at}.segment_radius"), self.segment_radius)?;
        finite(&format!("{at}.gravity[0]"), self.gravity[0])?;
        finite(&format!("{at}.gravity[1]"), self.gravity[1])?;
        finite(&format!("{at}.finish_line"), self.finish_line)?;

        match &self.geometry {
            GeometrySource::Svg { .. } => {}
            GeometrySource::Heightmap { threshold, .. } => {
                if !(*threshold > 0.0 && *threshold < 1.0) {
                    return Err(Error::config(format!("{at}.geometry.threshold"), "must be in (0, 1)"));
                }
            }
            GeometrySource::Course(course) => {
                positive(&format!("{at}.geometry.length"), course.length)?;
                for (i, jump) in course.jumps.iter().enumerate() {
                    let jat = format!("{at}.geometry.jumps[{i}]");
                    positive(&format!("{jat}.width"), jump.width)?;
                    non_negative(&format!("{jat}.amplitude"), jump.amplitude)?;
                    if !(0.0..=1.0).contains(&jump.cutoff) {
                        return Err(Error::config(format!("{jat}.cutoff"), "must be in [0, 1]"));
                    }
                    if jump.steps == 0 {
                        return Err(Error::config(format!("{jat}.steps"), "must be > 0"));
                    }
                }
            }
        }
        Ok(())
    }
}

// --------------------------------------------------
// Registry
// --------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub trucks: Vec<TruckSpec>,
    pub levels: Vec<LevelSpec>,
}

impl Registry {
    pub fn new(trucks: Vec<TruckSpec>, levels: Vec<LevelSpec>) -> Result<Self> {
        let registry = Self { trucks, levels };
        registry.validate()?;
        Ok(registry)
    }

    /// Stock truck + levels. Level 0 is procedural and needs no asset files.
    pub fn builtin() -> Self {
        let trucks = vec![simple_green()];
        let levels = vec![
            LevelSpec {
                name: "Proving Grounds".to_string(),
                geometry: GeometrySource::Course(CourseSpec {
                    length: 400.0,
                    floor_y: 1.0,
                    jumps: vec![
                        JumpSpec { start_x: 20.0, width: 3.0, amplitude: 2.0, cutoff: 1.0, steps: 16 },
                        JumpSpec { start_x: 50.0, width: 2.0, amplitude: 1.5, cutoff: 0.7, steps: 16 },
                    ],
                    random_jumps: 6,
                    seed: 7,
                }),
                units_per_meter: 1.0,
                samples_per_meter: 2.0,
                ground_friction: 1.0,
                segment_radius: default_segment_radius(),
                gravity: [0.0, -9.81],
                start_position: [5.0, 3.0],
                finish_line: 380.0,
                checkpoints: vec![100.0, 200.0, 300.0],
            },
            LevelSpec {
                name: "A 'lil Muddy".to_string(),
                geometry: GeometrySource::Svg {
                    path: PathBuf::from("levels/level_1.svg"),
                },
                units_per_meter: 5.0,
                samples_per_meter: 2.0,
                ground_friction: 1.0,
                segment_radius: default_segment_radius(),
                gravity: [0.0, -8.81],
                start_position: [230.0, 440.0],
                finish_line: 3815.0,
                checkpoints: vec![1433.0, 2493.0],
            },
            LevelSpec {
                name: "Hills-n-Gaps".to_string(),
                geometry: GeometrySource::Svg {
                    path: PathBuf::from("levels/level_2.svg"),
                },
                units_per_meter: 5.0,
                samples_per_meter: 2.0,
                ground_friction: 1.2,
                segment_radius: default_segment_radius(),
                gravity: [0.0, -6.81],
                start_position: [130.0, 440.0],
                finish_line: 3950.0,
                checkpoints: vec![930.0, 1700.0, 2100.0, 3350.0],
            },
        ];
        Self { trucks, levels }
    }

    pub fn from_json_str(text: &str, source_name: &str) -> Result<Self> {
        let registry: Registry = serde_json::from_str(text).map_err(|e| {
            Error::parse(source_name, None, format!("line {} column {}: {}", e.line(), e.column(), e))
        })?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config("registry", format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.trucks.is_empty() {
            return Err(Error::config("registry.trucks", "no trucks defined"));
        }
        if self.levels.is_empty() {
            return Err(Error::config("registry.levels", "no levels defined"));
        }
        for truck in &self.trucks {
            truck.validate()?;
        }
        for level in &self.levels {
            level.validate()?;
        }
        Ok(())
    }

    /// Lookup by name; `None` picks the first truck.
    pub fn truck(&self, name: Option<&str>) -> Result<&TruckSpec> {
        match name {
            None => self
                .trucks
                .first()
                .ok_or_else(|| Error::config("registry.trucks", "no trucks defined")),
            Some(name) => self
                .trucks
                .iter()
                .find(|t| t.name == name)
                .ok_or_else(|| Error::config("truck", format!("truck '{name}' not found"))),
        }
    }

    pub fn level(&self, index: usize) -> Result<&LevelSpec> {
        self.levels
            .get(index)
            .ok_or_else(|| Error::config("level", format!("no level at index {index}")))
    }

    pub fn level_by_name(&self, name: &str) -> Result<&LevelSpec> {
        self.levels
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::config("level", format!("level '{name}' not found")))
    }
}

// --------------------------------------------------
// Server settings (env driven)
// --------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub registry_path: Option<PathBuf>,
    pub asset_root: PathBuf,
    pub truck: Option<String>,
    pub level: usize,
    pub tick_hz: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9001".to_string(),
            registry_path: None,
            asset_root: PathBuf::from("assets"),
            truck: None,
            level: 0,
            tick_hz: 60.0,
        }
    }
}

impl ServerConfig {
    /// Reads TRUCK_ADDR, TRUCK_REGISTRY, TRUCK_ASSETS, TRUCK_NAME, TRUCK_LEVEL, TRUCK_TICK_HZ.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(addr) = get("TRUCK_ADDR") {
            cfg.bind_addr = addr;
        }
        cfg.registry_path = get("TRUCK_REGISTRY").map(PathBuf::from);
        if let Some(root) = get("TRUCK_ASSETS") {
            cfg.asset_root = PathBuf::from(root);
        }
        cfg.truck = get("TRUCK_NAME");
        if let Some(level) = get("TRUCK_LEVEL") {
            cfg.level = level
                .parse()
                .map_err(|_| Error::config("TRUCK_LEVEL", format!("'{level}' is not an index")))?;
        }
        if let Some(hz) = get("TRUCK_TICK_HZ") {
            cfg.tick_hz = hz
                .parse()
                .map_err(|_| Error::config("TRUCK_TICK_HZ", format!("'{hz}' is not a number")))?;
            positive("TRUCK_TICK_HZ", cfg.tick_hz)?;
        }
        Ok(cfg)
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }
}

// --------------------------------------------------
// invariant helpers
// --------------------------------------------------

fn positive(field: &str, v: f32) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be > 0 (got {v})")))
    }
}

fn non_negative(field: &str, v: f32) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be >= 0 (got {v})")))
    }
}

fn finite(field: &str, v: f32) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be finite (got {v})")))
    }
}
