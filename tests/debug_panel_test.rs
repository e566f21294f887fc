#![cfg(feature = "debug-panel")]

use nightsail::{
    config::Preset,
    debug::{DebugBinding, DebugPanel, DebugPanelError, LogPanelHost, PanelHost},
};

use crate::common::test_utils::scene_context;

mod common;

#[test]
fn standard_table_covers_the_scene() {
    let ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);

    assert_eq!(panel.len(), 25);
    let folders: Vec<&str> = {
        let mut folders: Vec<&str> = panel.bindings().iter().map(|b| b.folder.as_str()).collect();
        folders.dedup();
        folders
    };
    assert_eq!(
        folders,
        vec!["camera", "sea", "boat", "moon", "moon-light-hemisphere", "sky", "water", "credits"]
    );
    assert!(panel.find("boat", "rotation.z").is_some());
    assert!(panel.find("moon", "position.y").is_some());
    assert!(panel.find("water", "distortion scale").is_some());
}

#[test]
fn harbor_table_has_no_credits_rows() {
    let ctx = scene_context(Preset::Harbor);
    let panel = DebugPanel::standard(&ctx);

    assert_eq!(panel.len(), 19);
    assert!(panel.find("credits", "position.x").is_none());
    assert!(panel.bindings().iter().all(|b| b.folder != "credits"));
}

#[test]
fn animated_values_are_listened_to() {
    let ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);

    for binding in panel.bindings() {
        let expected = !matches!(binding.folder.as_str(), "credits" | "water");
        assert_eq!(binding.listen, expected, "{}/{}", binding.folder, binding.label);
    }
}

#[test]
fn writes_are_clamped_to_the_range() {
    let mut ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);
    let index = panel.find("camera", "position.x").unwrap();

    assert_eq!(panel.write(&mut ctx, index, 100.0), Ok(50.0));
    assert_eq!(ctx.camera.position.x, 50.0);
    assert_eq!(panel.write(&mut ctx, index, -75.0), Ok(-50.0));
    assert_eq!(ctx.camera.position.x, -50.0);
}

#[test]
fn writes_reach_scene_nodes() {
    let mut ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);

    let moon_y = panel.find("moon", "position.y").unwrap();
    panel.write(&mut ctx, moon_y, 12.5).unwrap();
    assert_eq!(ctx.scene.node("moon").unwrap().local.position.y, 12.5);

    let distortion = panel.find("water", "distortion scale").unwrap();
    panel.write(&mut ctx, distortion, 20.0).unwrap();
    assert_eq!(ctx.scene.water.distortion_scale, 8.0);
}

#[test]
fn last_edit_before_a_frame_wins() {
    let mut ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);
    let index = panel.find("sky", "rotation.x").unwrap();

    let mut host = LogPanelHost::new();
    host.queue(index, 1.0);
    host.queue(index, -2.0);
    host.queue(index, 0.5);
    panel.apply(&mut ctx, host.take_edits());

    assert_eq!(ctx.scene.node("sky").unwrap().local.rotation.x, 0.5);
    assert!(host.take_edits().is_empty());
}

#[test]
fn invalid_edits_are_skipped() {
    let mut ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);
    let index = panel.find("camera", "position.y").unwrap();
    let before = ctx.camera.position.y;

    assert_eq!(
        panel.write(&mut ctx, 999, 1.0),
        Err(DebugPanelError::UnknownBinding(999))
    );
    assert!(matches!(
        panel.write(&mut ctx, index, f32::NAN),
        Err(DebugPanelError::NotFinite { .. })
    ));
    panel.apply(&mut ctx, [(999, 3.0), (index, f32::INFINITY)]);

    assert_eq!(ctx.camera.position.y, before);
}

#[test]
fn snapshot_reads_current_values() {
    let mut ctx = scene_context(Preset::Credits);
    let panel = DebugPanel::standard(&ctx);
    let index = panel.find("credits", "position.z").unwrap();
    panel.write(&mut ctx, index, 12.0).unwrap();

    let snapshot = panel.snapshot(&ctx);

    assert_eq!(snapshot.len(), panel.len());
    let row = &snapshot[index];
    assert_eq!((row.folder.as_str(), row.label.as_str()), ("credits", "position.z"));
    assert_eq!(row.value, 12.0);
    let camera_x = &snapshot[panel.find("camera", "position.x").unwrap()];
    assert_eq!(camera_x.value, ctx.camera.position.x);
}

#[test]
fn custom_bindings_can_be_added() {
    let mut ctx = scene_context(Preset::Harbor);
    let mut panel = DebugPanel::new();
    assert!(panel.is_empty());

    let index = panel.add(DebugBinding::new(
        "camera",
        "fov",
        10.0..=120.0,
        |ctx| ctx.controller.settings.fov_deg,
        |ctx, value| ctx.controller.settings.fov_deg = value,
    ));

    assert_eq!(index, 0);
    assert_eq!(panel.write(&mut ctx, index, 5.0), Ok(10.0));
    assert_eq!(ctx.controller.settings.fov_deg, 10.0);
    assert!(panel.bindings()[0].listen);
}
