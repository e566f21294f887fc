//! Startup configuration of the diorama.
//!
//! Two named presets describe the variants the scene ships in. Neither is the
//! canonical one: [`Preset::Credits`] shows the credits text under a higher
//! hemisphere light with orbit and zoom only, [`Preset::Harbor`] drops the
//! text, lowers the hemisphere light, shrinks the moon and allows slow
//! panning. Every field can also be overridden from JSON.

use std::{f32::consts::PI, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{
        animation::AnimationRule,
        instance::Instance,
        material::{Color, Wrap},
    },
    resources::{AssetKind, AssetRequest},
};

const MOON_BLUE: Color = Color::rgb(0x98 as f32 / 255.0, 0xa6 as f32 / 255.0, 0xbb as f32 / 255.0);
const DEEP_SEA: Color = Color::rgb(0x19 as f32 / 255.0, 0x2e as f32 / 255.0, 0x46 as f32 / 255.0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Credits,
    Harbor,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Credits, Preset::Harbor];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Credits => "credits",
            Preset::Harbor => "harbor",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset `{0}`, expected one of: credits, harbor")]
pub struct UnknownPreset(String);

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed diorama config")]
    Json(#[from] serde_json::Error),
    #[error("camera polar limits {min}..={max} are not an ordered range within 0..=PI")]
    PolarLimits { min: f32, max: f32 },
    #[error("camera distance limits {min}..={max} are not an ordered, non-negative range")]
    DistanceLimits { min: f32, max: f32 },
}

/// Paths of every file the scene needs, relative to the asset root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManifest {
    pub boat: String,
    pub moon: String,
    pub sky: String,
    pub water_normals: String,
    pub font: Option<String>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            boat: "models/sailboat/scene.gltf".to_string(),
            moon: "images/moon.jpg".to_string(),
            sky: "images/sky.webp".to_string(),
            water_normals: "images/water.jpg".to_string(),
            font: Some("fonts/comfortaa.json".to_string()),
        }
    }
}

impl AssetManifest {
    /// One request per file, in a fixed order: boat, moon, sky, water, font.
    pub fn requests(&self) -> Vec<AssetRequest> {
        let mut requests = vec![
            AssetRequest::new(AssetKind::Mesh, &self.boat),
            AssetRequest::new(AssetKind::Texture, &self.moon),
            AssetRequest::new(AssetKind::Texture, &self.sky),
            AssetRequest::new(AssetKind::Texture, &self.water_normals),
        ];
        if let Some(font) = &self.font {
            requests.push(AssetRequest::new(AssetKind::Font, font));
        }
        requests
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl TransformConfig {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn rotated(rotation: [f32; 3]) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    pub fn to_instance(&self) -> Instance {
        Instance::new()
            .with_position(self.position)
            .with_rotation(self.rotation)
            .with_scale(self.scale)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub min_polar: f32,
    pub max_polar: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub enable_pan: bool,
    pub pan_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 60.0,
            near: 0.1,
            far: 20000.0,
            position: [1.0, 0.7, 7.8],
            target: [0.0, 1.5, 0.0],
            min_polar: 0.0,
            max_polar: PI * 0.55,
            min_distance: 0.0,
            max_distance: f32::MAX,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 0.8,
            zoom_speed: 1.0,
            enable_pan: false,
            pan_speed: 1.0,
        }
    }
}

impl CameraConfig {
    /// The orbit controller clamps against these limits every frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_polar, self.max_polar);
        if !(0.0 <= min && min <= max && max <= PI) {
            return Err(ConfigError::PolarLimits { min, max });
        }
        let (min, max) = (self.min_distance, self.max_distance);
        if !(0.0 <= min && min <= max) {
            return Err(ConfigError::DistanceLimits { min, max });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoatConfig {
    pub transform: TransformConfig,
    pub rock: AnimationRule,
}

impl Default for BoatConfig {
    fn default() -> Self {
        Self {
            transform: TransformConfig {
                position: [0.0; 3],
                rotation: [0.0, -PI / 2.0, 0.0],
                scale: [0.0025; 3],
            },
            rock: AnimationRule::Rock {
                period_ms: 650.0,
                amplitude: 1.0 / 750.0,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub position: [f32; 3],
}

impl Default for MoonConfig {
    fn default() -> Self {
        Self {
            radius: 7.0,
            width_segments: 75,
            height_segments: 75,
            position: [-10.0, 29.0, -42.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonLightConfig {
    pub color: Color,
    pub intensity: f32,
    pub distance: f32,
    pub decay: f32,
    pub cast_shadow: bool,
    pub shadow_map_size: u32,
    pub position: [f32; 3],
}

impl Default for MoonLightConfig {
    fn default() -> Self {
        Self {
            color: MOON_BLUE,
            intensity: 1.0,
            distance: 200.0,
            decay: 1.5,
            cast_shadow: true,
            shadow_map_size: 2048,
            position: [-10.0, 29.0, -42.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HemisphereConfig {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for HemisphereConfig {
    fn default() -> Self {
        Self {
            sky_color: MOON_BLUE,
            ground_color: DEEP_SEA,
            intensity: 0.3,
            position: [0.0, 3.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub wrap: Wrap,
    pub repeat: [f32; 2],
    pub rotation: [f32; 3],
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            radius: 10000.0,
            width_segments: 200,
            height_segments: 200,
            wrap: Wrap::MirroredRepeat,
            repeat: [6.0, 6.0],
            rotation: [2.7, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeaConfig {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub sun_direction: [f32; 3],
    pub sun_color: Color,
    pub water_color: Color,
    pub distortion_scale: f32,
    pub size: f32,
    pub rotation: [f32; 3],
}

impl Default for SeaConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            width_segments: 50,
            height_segments: 50,
            sun_direction: [-10.0, 29.0, -42.0],
            sun_color: Color::BLACK,
            water_color: DEEP_SEA,
            distortion_scale: 3.0,
            size: 2.0,
            rotation: [-PI / 2.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditsConfig {
    pub text: String,
    pub size: f32,
    pub depth: f32,
    pub curve_segments: u32,
    pub color: Color,
    pub transform: TransformConfig,
    pub bob: AnimationRule,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            text: "Created by Sohail".to_string(),
            size: 2.5,
            depth: 0.5,
            curve_segments: 12,
            color: Color::WHITE,
            transform: TransformConfig {
                position: [25.0, 0.0, 27.0],
                rotation: [0.0, PI, 0.0],
                scale: [1.0; 3],
            },
            bob: AnimationRule::Bob {
                period_ms: 600.0,
                amplitude: 0.25,
                offset: -0.175,
            },
        }
    }
}

/// Everything the assembler and the camera need to build the diorama.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DioramaConfig {
    pub assets: AssetManifest,
    pub camera: CameraConfig,
    pub boat: BoatConfig,
    pub moon: MoonConfig,
    pub moon_light: MoonLightConfig,
    pub hemisphere: HemisphereConfig,
    pub sky: SkyConfig,
    pub sea: SeaConfig,
    pub credits: Option<CreditsConfig>,
    /// Water clock advance per rendered frame.
    pub water_time_step: f32,
    /// Whether meshes write into the moon light's shadow map.
    pub meshes_cast_shadows: bool,
}

impl Default for DioramaConfig {
    fn default() -> Self {
        Self::preset(Preset::Credits)
    }
}

impl DioramaConfig {
    pub fn preset(preset: Preset) -> Self {
        let credits = Self {
            assets: AssetManifest::default(),
            camera: CameraConfig::default(),
            boat: BoatConfig::default(),
            moon: MoonConfig::default(),
            moon_light: MoonLightConfig::default(),
            hemisphere: HemisphereConfig::default(),
            sky: SkyConfig::default(),
            sea: SeaConfig::default(),
            credits: Some(CreditsConfig::default()),
            water_time_step: 1.0 / 50.0,
            meshes_cast_shadows: false,
        };
        match preset {
            Preset::Credits => credits,
            Preset::Harbor => Self {
                assets: AssetManifest {
                    font: None,
                    ..credits.assets
                },
                camera: CameraConfig {
                    enable_pan: true,
                    pan_speed: 0.4,
                    ..credits.camera
                },
                moon: MoonConfig {
                    radius: 5.0,
                    ..credits.moon
                },
                hemisphere: HemisphereConfig {
                    position: [0.0, 1.0, 0.0],
                    ..credits.hemisphere
                },
                credits: None,
                ..credits
            },
        }
    }

    /// Parses a JSON document; missing fields keep the [`Preset::Credits`] values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()
    }
}
