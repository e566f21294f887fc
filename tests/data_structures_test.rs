use std::f64::consts::TAU;

use nightsail::{
    config::{ConfigError, DioramaConfig, Preset},
    data_structures::{
        animation::{AnimationRule, TransformDelta},
        geometry::Geometry,
        instance::{Instance, euler_to_quaternion, quaternion_to_euler},
        material::{Color, Side, Wrap},
        text::{TextOptions, ear_clip, shapes_from_contours, signed_area, text_geometry},
    },
    resources::font::parse_typeface,
};

use crate::common::test_utils::typeface_json;

mod common;

fn triangle_area(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> f32 {
    ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])) / 2.0
}

#[test]
fn colors_parse_from_hex() {
    let color: Color = "#192e46".parse().unwrap();
    assert!((color.r - 0x19 as f32 / 255.0).abs() < 1e-6);
    assert!((color.b - 0x46 as f32 / 255.0).abs() < 1e-6);
    assert_eq!(color.to_hex(), "#192e46");
    assert_eq!(Color::from_hex("98a6bb").unwrap().to_string(), "#98a6bb");

    assert!(Color::from_hex("#12345").is_err());
    assert!(Color::from_hex("#zz0000").is_err());
}

#[test]
fn colors_serialize_as_hex_strings() {
    assert_eq!(serde_json::to_string(&Color::WHITE).unwrap(), "\"#ffffff\"");
    let parsed: Color = serde_json::from_str("\"#000000\"").unwrap();
    assert_eq!(parsed, Color::BLACK);
    assert!(serde_json::from_str::<Color>("\"white\"").is_err());
}

#[test]
fn linear_conversion_round_trips() {
    let color = Color::rgb(0.2, 0.5, 0.9);
    let back = Color::from_linear(color.to_linear());
    assert!((back.r - color.r).abs() < 1e-4);
    assert!((back.g - color.g).abs() < 1e-4);
    assert!((back.b - color.b).abs() < 1e-4);
}

#[test]
fn sides_map_to_cull_modes() {
    assert_eq!(Side::Front.cull_mode(), Some(wgpu::Face::Back));
    assert_eq!(Side::Back.cull_mode(), Some(wgpu::Face::Front));
    assert_eq!(Side::Double.cull_mode(), None);
    assert_eq!(wgpu::AddressMode::from(Wrap::MirroredRepeat), wgpu::AddressMode::MirrorRepeat);
}

#[test]
fn euler_angles_survive_a_quaternion() {
    let euler = cgmath::Vector3::new(0.3f32, -0.5, 1.1);
    let back = quaternion_to_euler(euler_to_quaternion(euler));
    assert!((back.x - euler.x).abs() < 1e-5);
    assert!((back.y - euler.y).abs() < 1e-5);
    assert!((back.z - euler.z).abs() < 1e-5);
}

#[test]
fn local_rotation_accumulates() {
    let mut instance = Instance::new().with_rotation([0.0, -std::f32::consts::FRAC_PI_2, 0.0]);
    instance.rotate_local(cgmath::Vector3::unit_x(), 0.01);
    instance.rotate_local(cgmath::Vector3::unit_x(), 0.01);

    let expected = euler_to_quaternion(cgmath::Vector3::new(0.0, -std::f32::consts::FRAC_PI_2, 0.0))
        * cgmath::Quaternion::from(cgmath::Euler::new(
            cgmath::Rad(0.02f32),
            cgmath::Rad(0.0),
            cgmath::Rad(0.0),
        ));
    let actual = instance.quaternion();
    // q and -q are the same rotation
    let dot = cgmath::InnerSpace::dot(actual, expected).abs();
    assert!((dot - 1.0).abs() < 1e-5);
}

#[test]
fn bob_follows_a_sine() {
    let rule = AnimationRule::Bob {
        period_ms: 600.0,
        amplitude: 0.25,
        offset: -0.175,
    };
    assert_eq!(rule.evaluate(0.0), TransformDelta::SetPositionY(-0.175));
    let TransformDelta::SetPositionY(peak) = rule.evaluate(600.0 * TAU / 4.0) else {
        panic!("bob sets the height");
    };
    assert!((peak - 0.075).abs() < 1e-6);
    assert!((rule.period() - 600.0 * TAU).abs() < 1e-9);

    let mut instance = Instance::new().with_position([25.0, 0.0, 27.0]);
    rule.evaluate(0.0).apply(&mut instance);
    assert_eq!(instance.position, cgmath::Vector3::new(25.0, -0.175, 27.0));
}

#[test]
fn rock_keeps_axes_a_quarter_period_apart() {
    let rule = AnimationRule::Rock {
        period_ms: 650.0,
        amplitude: 1.0 / 750.0,
    };
    let TransformDelta::RotateLocal { x, z } = rule.evaluate(0.0) else {
        panic!("rock rotates");
    };
    assert_eq!(x, 0.0);
    assert!((z - 1.0 / 750.0).abs() < 1e-9);
}

#[test]
fn animation_rules_deserialize_by_kind() {
    let rule: AnimationRule =
        serde_json::from_str(r#"{"kind": "rock", "period_ms": 500.0, "amplitude": 0.01}"#).unwrap();
    assert_eq!(
        rule,
        AnimationRule::Rock {
            period_ms: 500.0,
            amplitude: 0.01
        }
    );
}

#[test]
fn sphere_has_no_degenerate_pole_triangles() {
    let sphere = Geometry::sphere("moon", 7.0, 8, 6);
    assert_eq!(sphere.vertices.len(), 9 * 7);
    assert_eq!(sphere.triangle_count(), 8 * 2 * 6 - 2 * 8);
    for vertex in &sphere.vertices {
        let [x, y, z] = vertex.position;
        assert!(((x * x + y * y + z * z).sqrt() - 7.0).abs() < 1e-4);
    }
}

#[test]
fn plane_faces_up_its_z_axis() {
    let plane = Geometry::plane("sea", 10.0, 6.0, 2, 3);
    assert_eq!(plane.vertices.len(), 3 * 4);
    assert_eq!(plane.triangle_count(), 2 * 2 * 3);
    let [a, b, c] = [0, 1, 2].map(|i| plane.vertices[plane.indices[i] as usize].position);
    assert!(triangle_area(a, b, c) > 0.0);
    assert!(plane.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
}

#[test]
fn computed_normals_follow_winding() {
    let mut quad = Geometry::plane("quad", 1.0, 1.0, 1, 1);
    for vertex in &mut quad.vertices {
        vertex.normal = [0.0; 3];
    }
    quad.compute_vertex_normals();
    for vertex in &quad.vertices {
        assert!((vertex.normal[2] - 1.0).abs() < 1e-6);
    }
}

#[test]
fn ear_clipping_a_square() {
    let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let triangles = ear_clip(&square);
    assert_eq!(triangles.len(), 2);
    let area: f32 = triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.map(|i| [square[i][0], square[i][1], 0.0]);
            triangle_area(a, b, c)
        })
        .sum();
    assert!((area - 1.0).abs() < 1e-6);
}

#[test]
fn nested_contours_become_holes() {
    // Outer authored clockwise, hole counter-clockwise: both get normalised
    let outer = vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0]];
    let hole = vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]];
    let island = vec![[10.0, 0.0], [11.0, 0.0], [11.0, 1.0]];

    let shapes = shapes_from_contours(vec![outer, hole, island]);

    assert_eq!(shapes.len(), 2);
    assert_eq!(shapes[0].holes.len(), 1);
    assert!(signed_area(&shapes[0].outer) > 0.0);
    assert!(signed_area(&shapes[0].holes[0]) < 0.0);
    assert!(shapes[1].holes.is_empty());
}

#[test]
fn glyph_with_a_hole_is_extruded() {
    let font = parse_typeface(&typeface_json()).unwrap();
    let options = TextOptions {
        size: 1.0,
        depth: 0.5,
        curve_segments: 4,
    };

    let geometry = text_geometry("O", &font, &options).unwrap();

    // Two caps of eight triangles plus eight wall quads
    assert_eq!(geometry.triangle_count(), 32);
    let front: f32 = geometry
        .indices
        .chunks_exact(3)
        .map(|t| t.iter().map(|&i| geometry.vertices[i as usize]).collect::<Vec<_>>())
        .filter(|t| t.iter().all(|v| v.normal == [0.0, 0.0, 1.0]))
        .map(|t| triangle_area(t[0].position, t[1].position, t[2].position))
        .sum();
    assert!((front - 0.75).abs() < 1e-4, "front cap area {}", front);
    assert!(geometry.vertices.iter().all(|v| (0.0..=0.5).contains(&v.position[2])));
}

#[test]
fn unknown_characters_fall_back_to_the_question_mark() {
    let font = parse_typeface(&typeface_json()).unwrap();
    let options = TextOptions {
        size: 1.0,
        depth: 0.1,
        curve_segments: 4,
    };

    let unknown = text_geometry("x", &font, &options).unwrap();
    let fallback = text_geometry("?", &font, &options).unwrap();
    let blank = text_geometry(" ", &font, &options).unwrap();

    assert_eq!(unknown.triangle_count(), fallback.triangle_count());
    assert_eq!(fallback.triangle_count(), 2 + 3 * 2);
    assert_eq!(blank.triangle_count(), 0);

    // Advances come from `ha`: the second glyph starts after 0.6 units
    let pair = font.contours("??", &options).unwrap();
    assert_eq!(pair.len(), 2);
    assert!((pair[1][0][0] - 0.6).abs() < 1e-6);
}

#[test]
fn malformed_outlines_are_errors() {
    let mut font = parse_typeface(&typeface_json()).unwrap();
    font.glyphs.get_mut("?").unwrap().o = Some("m 0 0 l 10".to_string());
    assert!(text_geometry("?", &font, &TextOptions::default()).is_err());

    font.glyphs.get_mut("?").unwrap().o = Some("m 0 0 k 1 1".to_string());
    assert!(text_geometry("?", &font, &TextOptions::default()).is_err());
}

#[test]
fn presets_differ_where_documented() {
    let credits = DioramaConfig::preset(Preset::Credits);
    let harbor = DioramaConfig::preset(Preset::Harbor);

    assert!(credits.credits.is_some());
    assert!(credits.assets.font.is_some());
    assert!(!credits.camera.enable_pan);
    assert_eq!(credits.hemisphere.position, [0.0, 3.0, 0.0]);
    assert_eq!(credits.moon.radius, 7.0);

    assert!(harbor.credits.is_none());
    assert!(harbor.assets.font.is_none());
    assert!(harbor.camera.enable_pan);
    assert_eq!(harbor.camera.pan_speed, 0.4);
    assert_eq!(harbor.hemisphere.position, [0.0, 1.0, 0.0]);
    assert_eq!(harbor.moon.radius, 5.0);

    assert_eq!(credits.water_time_step, 1.0 / 50.0);
    assert_eq!(credits.camera.max_polar, std::f32::consts::PI * 0.55);
    assert!(!credits.meshes_cast_shadows);
}

#[test]
fn json_overrides_keep_the_defaults() {
    assert_eq!(DioramaConfig::from_json("{}").unwrap(), DioramaConfig::default());
    assert_eq!(DioramaConfig::default(), DioramaConfig::preset(Preset::Credits));

    let config = DioramaConfig::from_json(
        r##"{"credits": null, "camera": {"enable_pan": true}, "sea": {"water_color": "#000000"}}"##,
    )
    .unwrap();
    assert!(config.credits.is_none());
    assert!(config.camera.enable_pan);
    assert_eq!(config.camera.fov_deg, 60.0);
    assert_eq!(config.sea.water_color, Color::BLACK);
    assert_eq!(config.sea.distortion_scale, 3.0);

    let harbor = DioramaConfig::preset(Preset::Harbor);
    let json = serde_json::to_string(&harbor).unwrap();
    assert_eq!(DioramaConfig::from_json(&json).unwrap(), harbor);

    assert!(DioramaConfig::from_json(r#"{"sea": {"water_color": "blue"}}"#).is_err());
}

#[test]
fn camera_limits_are_validated() {
    match DioramaConfig::from_json(r#"{"camera": {"min_polar": 2.0, "max_polar": 1.0}}"#) {
        Err(ConfigError::PolarLimits { min, max }) => assert_eq!((min, max), (2.0, 1.0)),
        other => panic!("expected inverted polar limits, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        DioramaConfig::from_json(r#"{"camera": {"min_distance": 9.0, "max_distance": 5.0}}"#),
        Err(ConfigError::DistanceLimits { .. })
    ));
    assert!(matches!(
        DioramaConfig::from_json(r#"{"camera": {"max_polar": 4.0}}"#),
        Err(ConfigError::PolarLimits { .. })
    ));
    assert!(matches!(
        DioramaConfig::from_json(r#"{"camera": {"min_distance": -1.0}}"#),
        Err(ConfigError::DistanceLimits { .. })
    ));
    assert!(matches!(
        DioramaConfig::from_json(r#"{"camera": "#),
        Err(ConfigError::Json(_))
    ));

    let pinned = DioramaConfig::from_json(
        r#"{"camera": {"min_polar": 1.0, "max_polar": 1.0, "min_distance": 6.0, "max_distance": 6.0}}"#,
    )
    .unwrap();
    assert_eq!(pinned.camera.min_polar, pinned.camera.max_polar);
    for preset in Preset::ALL {
        assert!(DioramaConfig::preset(preset).validate().is_ok());
    }

    let mut built = DioramaConfig::default();
    built.camera.min_polar = f32::NAN;
    assert!(built.validate().is_err());
}

#[test]
fn presets_parse_by_name() {
    assert_eq!("harbor".parse::<Preset>().unwrap(), Preset::Harbor);
    assert_eq!(" Credits ".parse::<Preset>().unwrap(), Preset::Credits);
    assert!("night".parse::<Preset>().is_err());
    assert_eq!(Preset::Harbor.to_string(), "harbor");
}
