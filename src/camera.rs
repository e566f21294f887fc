//! Camera, projection and the orbit controller.
//!
//! The controller orbits the camera around a target point on a sphere. Input
//! only accumulates deltas; [`OrbitController::update`] applies them once per
//! frame, and with damping enabled keeps easing the motion out over the next
//! frames even when no input arrives.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Rad, Vector2, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 0.000_001;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new(position: impl Into<Point3<f32>>, target: impl Into<Point3<f32>>) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.position, config.target)
    }

    pub fn calc_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Angle between the up axis and the direction from the target to the camera.
    pub fn polar_angle(&self) -> f32 {
        let offset = self.position - self.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return 0.0;
        }
        (offset.y / radius).clamp(-1.0, 1.0).acos()
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(
            width,
            height,
            cgmath::Deg(config.fov_deg),
            config.near,
            config.far,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Orbit, pan and zoom around a target point.
#[derive(Clone, Debug)]
pub struct OrbitController {
    pub settings: CameraConfig,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
    pending_pan: Vector2<f32>,
    viewport_height: f32,
    rotating: bool,
    panning: bool,
    cursor: Option<Vector2<f32>>,
}

impl OrbitController {
    pub fn new(settings: CameraConfig) -> Self {
        Self {
            settings,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            pending_pan: Vector2::new(0.0, 0.0),
            viewport_height: 1.0,
            rotating: false,
            panning: false,
            cursor: None,
        }
    }

    /// Pixel deltas are measured against the viewport height.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Rotates by a cursor movement of `dx`, `dy` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let per_pixel = 2.0 * PI / self.viewport_height * self.settings.rotate_speed;
        self.theta_delta -= dx * per_pixel;
        self.phi_delta -= dy * per_pixel;
    }

    /// Moves the target by a cursor movement of `dx`, `dy` pixels. Ignored
    /// while panning is disabled.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !self.settings.enable_pan {
            return;
        }
        self.pending_pan += Vector2::new(dx, dy) * self.settings.pan_speed;
    }

    /// Positive steps move towards the target.
    pub fn zoom(&mut self, steps: f32) {
        let zoom_scale = 0.95f32.powf(self.settings.zoom_speed);
        self.scale *= zoom_scale.powf(steps);
    }

    /// Whether any motion is still pending.
    pub fn is_moving(&self) -> bool {
        self.theta_delta.abs() > EPS
            || self.phi_delta.abs() > EPS
            || self.pan_offset.magnitude2() > EPS * EPS
            || self.pending_pan.magnitude2() > 0.0
            || (self.scale - 1.0).abs() > EPS
    }

    /// Feeds a window event into the controller. Returns `true` if it was used.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.rotating = pressed,
                    MouseButton::Right => self.panning = pressed && self.settings.enable_pan,
                    _ => return false,
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = Vector2::new(position.x as f32, position.y as f32);
                let previous = self.cursor.replace(current);
                let Some(previous) = previous else {
                    return false;
                };
                let delta = current - previous;
                if self.rotating {
                    self.rotate(delta.x, delta.y);
                } else if self.panning {
                    self.pan(delta.x, delta.y);
                } else {
                    return false;
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.rotating = false;
                self.panning = false;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if y == 0.0 {
                    return false;
                }
                self.zoom(y.signum());
                true
            }
            _ => false,
        }
    }

    /// Applies the accumulated motion to `camera`. Call once per frame.
    pub fn update(&mut self, camera: &mut Camera) {
        let settings = &self.settings;
        let mut offset = camera.position - camera.target;

        if self.pending_pan.magnitude2() > 0.0 {
            let target_distance = offset.magnitude() * (self.settings.fov_deg.to_radians() / 2.0).tan();
            let forward = (-offset).normalize();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward);
            let scale = 2.0 * target_distance / self.viewport_height;
            self.pan_offset += right * (-self.pending_pan.x * scale) + up * (self.pending_pan.y * scale);
            self.pending_pan = Vector2::new(0.0, 0.0);
        }

        let mut radius = offset.magnitude();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        let factor = if settings.enable_damping {
            settings.damping_factor
        } else {
            1.0
        };
        theta += self.theta_delta * factor;
        phi += self.phi_delta * factor;

        phi = phi
            .clamp(settings.min_polar, settings.max_polar)
            .clamp(EPS, PI - EPS);
        radius = (radius * self.scale).clamp(settings.min_distance, settings.max_distance);

        camera.target += self.pan_offset * factor;

        let sin_phi_radius = phi.sin() * radius;
        offset = Vector3::new(
            sin_phi_radius * theta.sin(),
            phi.cos() * radius,
            sin_phi_radius * theta.cos(),
        );
        camera.position = camera.target + offset;

        if settings.enable_damping {
            self.theta_delta *= 1.0 - factor;
            self.phi_delta *= 1.0 - factor;
            self.pan_offset *= 1.0 - factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;
    }
}
