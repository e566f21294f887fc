//! Surface descriptions shared between scene nodes.
//!
//! Materials never change after assembly. Anything that animates (the water
//! clock, its distortion) lives in [`crate::data_structures::scene_graph::WaterParameters`]
//! on the scene instead.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::data_structures::texture::TextureData;

/// An sRGB colour as written in hex notation (`#192e46`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorParseError(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|value| value as f32 / 255.0)
                .map_err(|_| ColorParseError(hex.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", to_u8(self.r), to_u8(self.g), to_u8(self.b))
    }

    /// Inverse of [`Color::to_linear`], for factors stored linearly (glTF).
    pub fn from_linear(linear: [f32; 3]) -> Self {
        let convert = |c: f32| {
            let c = c.clamp(0.0, 1.0);
            if c <= 0.0031308 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            }
        };
        Self::rgb(convert(linear[0]), convert(linear[1]), convert(linear[2]))
    }

    /// Shaders work in linear space; the surface converts back to sRGB.
    pub fn to_linear(&self) -> [f32; 3] {
        let convert = |c: f32| {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        [convert(self.r), convert(self.g), convert(self.b)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a colour of the form #rrggbb")]
pub struct ColorParseError(String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Color::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Which faces of a mesh are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Front,
    /// Only the inside is visible, used for the sky dome around the camera.
    Back,
    Double,
}

impl Side {
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        match self {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

/// Texture addressing outside of `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl From<Wrap> for wgpu::AddressMode {
    fn from(wrap: Wrap) -> Self {
        match wrap {
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
            Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// A texture together with how it is sampled.
#[derive(Clone, Debug)]
pub struct TextureBinding {
    pub texture: Arc<TextureData>,
    pub wrap: Wrap,
    pub repeat: [f32; 2],
}

impl TextureBinding {
    pub fn new(texture: Arc<TextureData>) -> Self {
        Self {
            texture,
            wrap: Wrap::default(),
            repeat: [1.0, 1.0],
        }
    }

    pub fn wrapped(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn repeated(mut self, repeat: [f32; 2]) -> Self {
        self.repeat = repeat;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SurfaceMaterial {
    pub name: String,
    pub color: Color,
    pub map: Option<TextureBinding>,
    pub side: Side,
}

impl SurfaceMaterial {
    pub fn new(name: &str, color: Color) -> Self {
        Self {
            name: name.to_string(),
            color,
            map: None,
            side: Side::Front,
        }
    }

    pub fn with_map(mut self, map: TextureBinding) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }
}

/// Static inputs of the water surface shader.
#[derive(Clone, Debug)]
pub struct WaterMaterial {
    pub normal_map: TextureBinding,
    pub sun_direction: cgmath::Vector3<f32>,
    pub sun_color: Color,
    pub water_color: Color,
}

#[derive(Clone, Debug)]
pub enum Material {
    /// Unaffected by lights (moon, sky).
    Basic(SurfaceMaterial),
    /// Diffuse + specular shading with shadows (boat, credits).
    Phong(SurfaceMaterial),
    Water(WaterMaterial),
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Material::Basic(surface) | Material::Phong(surface) => &surface.name,
            Material::Water(_) => "water",
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Material::Basic(surface) | Material::Phong(surface) => surface.side,
            Material::Water(_) => Side::Front,
        }
    }
}
