use std::f64::consts::TAU;

use nightsail::{
    config::Preset,
    context::ViewportState,
    flow::{AnimationLoop, FrameError, ReadySignal, StartupError, startup},
};

use crate::common::test_utils::{
    CountingScheduler, Entry, ManualClock, RecordingRenderer, journal, rendered, scene_context, source_for,
    test_config, test_loop, viewport,
};

mod common;

#[test]
fn next_frame_is_scheduled_before_rendering() {
    let clock = ManualClock::at(1_000.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);

    diorama.step().unwrap();
    diorama.step().unwrap();

    let kinds: Vec<&str> = journal
        .borrow()
        .iter()
        .map(|entry| match entry {
            Entry::Scheduled => "scheduled",
            Entry::Rendered { .. } => "rendered",
            Entry::Resized(_) => "resized",
        })
        .collect();
    assert_eq!(kinds, vec!["scheduled", "rendered", "scheduled", "rendered"]);
    assert_eq!(diorama.frames(), 2);
}

#[test]
fn camera_is_updated_before_the_frame_is_drawn() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);
    let before: [f32; 3] = diorama.ctx.camera.position.into();

    diorama.ctx.controller.rotate(120.0, 0.0);
    diorama.step().unwrap();

    let Entry::Rendered { camera, .. } = rendered(&journal)[0].clone() else {
        unreachable!()
    };
    assert_ne!(camera, before);
    assert_eq!(camera, Into::<[f32; 3]>::into(diorama.ctx.camera.position));
}

#[test]
fn water_time_counts_frames_not_milliseconds() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Harbor), &clock, &journal);

    for frame in 0..10 {
        // A stalled tab delivers frames seconds apart
        clock.advance(if frame == 4 { 5_000.0 } else { 16.0 });
        diorama.step().unwrap();
    }

    let times: Vec<f32> = rendered(&journal)
        .into_iter()
        .map(|entry| match entry {
            Entry::Rendered { water_time, .. } => water_time,
            _ => unreachable!(),
        })
        .collect();
    for (n, time) in times.iter().enumerate() {
        let expected = (n + 1) as f32 / 50.0;
        assert!((time - expected).abs() < 1e-5, "frame {}: {} != {}", n, time, expected);
    }
}

#[test]
fn credits_bob_repeats_every_period() {
    let start = 12_345.0;
    let clock = ManualClock::at(start);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);

    diorama.step().unwrap();
    clock.set(start + 600.0 * TAU);
    diorama.step().unwrap();
    clock.set(start + 600.0 * TAU / 2.0);
    diorama.step().unwrap();

    let heights: Vec<f32> = rendered(&journal)
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Rendered { credits_y, .. } => credits_y,
            _ => None,
        })
        .collect();
    assert_eq!(heights.len(), 3);
    assert!((heights[0] - heights[1]).abs() < 1e-4);
    // Half a period later the offset from the rest height flips sign
    let rest = -0.175;
    assert!(((heights[0] - rest) + (heights[2] - rest)).abs() < 1e-4);
    for height in heights {
        assert!((rest - 0.25..=rest + 0.25).contains(&height));
    }
}

#[test]
fn boat_keeps_rocking() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);

    for _ in 0..3 {
        clock.advance(100.0);
        diorama.step().unwrap();
    }

    let rotations: Vec<[f32; 3]> = rendered(&journal)
        .into_iter()
        .map(|entry| match entry {
            Entry::Rendered { boat_rotation, .. } => boat_rotation,
            _ => unreachable!(),
        })
        .collect();
    assert_ne!(rotations[0], rotations[1]);
    assert_ne!(rotations[1], rotations[2]);
}

#[test]
fn run_stops_when_told() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Harbor), &clock, &journal);

    let mut remaining = 5;
    let frames = diorama
        .run(|_| {
            remaining -= 1;
            remaining >= 0
        })
        .unwrap();

    assert_eq!(frames, 5);
    assert_eq!(diorama.frames(), 5);
    assert_eq!(rendered(&journal).len(), 5);
}

#[test]
fn render_failure_ends_the_loop() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = AnimationLoop::new(
        scene_context(Preset::Credits),
        clock.clone(),
        CountingScheduler::new(&journal),
        RecordingRenderer::new(&journal).failing_at(2),
        1.0 / 50.0,
    );

    let err = diorama.run(|_| true).unwrap_err();

    let FrameError::Render { frame, source } = &err;
    assert_eq!(*frame, 2);
    assert_eq!(source.to_string(), "device lost");
    assert_eq!(diorama.frames(), 2);
    assert_eq!(rendered(&journal).len(), 2);
}

#[test]
fn repeated_resizes_are_forwarded_once() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);

    assert!(diorama.resize(1024, 768, 2.0));
    assert!(!diorama.resize(1024, 768, 2.0));
    assert!(!diorama.resize(0, 768, 2.0));
    assert!(!diorama.resize(1024, 0, 2.0));

    let resized: Vec<Entry> = journal
        .borrow()
        .iter()
        .filter(|entry| matches!(entry, Entry::Resized(_)))
        .cloned()
        .collect();
    assert_eq!(resized, vec![Entry::Resized(ViewportState::new(1024, 768, 2.0))]);
    assert_eq!(diorama.ctx.viewport, ViewportState::new(1024, 768, 2.0));
    assert!((diorama.ctx.projection.aspect() - 1024.0 / 768.0).abs() < 1e-6);
}

#[test]
fn pixel_ratio_change_is_a_resize() {
    let clock = ManualClock::at(0.0);
    let journal = journal();
    let mut diorama = test_loop(scene_context(Preset::Credits), &clock, &journal);

    assert!(!diorama.resize(800, 600, 1.0));
    assert!(diorama.resize(800, 600, 1.5));
}

#[derive(Default)]
struct ReadyFlag {
    calls: u32,
}

impl ReadySignal for ReadyFlag {
    fn ready(&mut self) {
        self.calls += 1;
    }
}

#[test]
fn startup_then_frames() {
    let config = test_config(Preset::Credits);
    let source = source_for(&config);
    let journal = journal();
    let mut ready = ReadyFlag::default();

    let (ctx, renderer) = futures::executor::block_on(startup(
        &config,
        &source,
        viewport(),
        async { Ok(()) },
        |(), scene| {
            assert_eq!(scene.root().children().len(), 7);
            Ok(RecordingRenderer::new(&journal))
        },
        &mut ready,
    ))
    .unwrap();
    assert_eq!(ready.calls, 1);

    let clock = ManualClock::at(0.0);
    let mut diorama = AnimationLoop::new(ctx, clock, CountingScheduler::new(&journal), renderer, 1.0 / 50.0);
    diorama.run(|ctx| ctx.scene.water.time < 0.5 - 1e-4).unwrap();

    assert_eq!(ready.calls, 1);
    assert_eq!(diorama.frames(), 25);
    assert!(!diorama.ctx.controller.is_moving());
}

#[test]
fn failed_startup_never_signals_ready() {
    let config = test_config(Preset::Credits);
    let mut source = source_for(&config);
    source.remove(&config.assets.water_normals);
    let mut ready = ReadyFlag::default();
    let mut uploaded = false;

    let result = futures::executor::block_on(startup(
        &config,
        &source,
        viewport(),
        async { Ok(()) },
        |(), _scene| {
            uploaded = true;
            Ok(())
        },
        &mut ready,
    ));

    let error = result.err().expect("startup must fail");
    assert!(matches!(
        error.downcast_ref::<StartupError>(),
        Some(StartupError::Load(_))
    ));
    assert!(!uploaded);
    assert_eq!(ready.calls, 0);
}

#[test]
fn failed_upload_never_signals_ready() {
    let config = test_config(Preset::Harbor);
    let source = source_for(&config);
    let mut ready = ReadyFlag::default();

    let result = futures::executor::block_on(startup(
        &config,
        &source,
        viewport(),
        async { Ok(()) },
        |(), _scene| -> anyhow::Result<()> { Err(anyhow::anyhow!("no adapter")) },
        &mut ready,
    ));

    assert!(result.is_err());
    assert_eq!(ready.calls, 0);
}
