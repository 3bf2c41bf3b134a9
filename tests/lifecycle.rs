//! Lifecycle tests across every toy, driven through the engine the way the
//! front end drives it.

use rand::rngs::StdRng;
use rand::SeedableRng;

use saavy_toys::engine::scheduler::TimerQueue;
use saavy_toys::graph::AudioContext;
use saavy_toys::io::gesture::Point;
use saavy_toys::io::loader::{AssetLoader, SynthesizedLoader};
use saavy_toys::io::view::{Snapshot, ViewSlot};
use saavy_toys::synth::{AnySynth, Synth, SynthCtx};
use saavy_toys::{Engine, EngineConfig, Status, SynthKind};

const SR: f32 = 16_000.0;
/// Long enough for the longest release in any toy to finish.
const SETTLE: f64 = 3.0;

fn ready(kind: SynthKind) -> Engine {
    let mut engine = Engine::new(EngineConfig::default().sample_rate(SR).seed(3));
    engine.select(kind);
    assert_eq!(
        engine.init_with(&SynthesizedLoader::new(SR, 3)),
        Status::Ready,
        "{kind} did not become ready"
    );
    engine
}

#[test]
fn test_every_toy_returns_to_baseline_after_gestures() {
    let spots = [(0.0, 0.0), (0.7, 0.3), (1.0, 1.0)];
    for kind in SynthKind::ALL {
        let mut engine = ready(kind);
        let baseline = engine.live_nodes();

        for &(x, y) in &spots {
            engine.pointer_down(x, y);
            engine.run_for(0.6);
            engine.pointer_move(1.0 - x, y);
            engine.run_for(0.4);
            engine.pointer_up();
            engine.run_for(SETTLE);

            assert_eq!(engine.status(), Status::Ready, "{kind} halted");
            assert_eq!(engine.pending_timers(), 0, "{kind} left timers armed");
            assert_eq!(engine.live_nodes(), baseline, "{kind} leaked nodes");
        }

        engine.teardown();
        assert_eq!(engine.live_nodes(), 0, "{kind} kept nodes past teardown");
    }
}

#[test]
fn test_updates_across_the_pad_never_halt() {
    for kind in SynthKind::ALL {
        let mut engine = ready(kind);
        engine.pointer_down(0.0, 0.0);
        for i in 0..=10 {
            for j in 0..=10 {
                engine.pointer_move(i as f32 / 10.0, j as f32 / 10.0);
            }
            engine.run_for(0.02);
        }
        // out-of-range positions clamp
        engine.pointer_move(-3.0, 7.5);
        engine.pointer_move(f32::NAN, 0.5);
        engine.run_for(0.1);
        engine.pointer_up();
        assert_eq!(engine.status(), Status::Ready, "{kind} halted");
        engine.teardown();
    }
}

#[test]
fn test_ending_twice_is_harmless() {
    let mut audio = AudioContext::new(SR);
    let mut timers = TimerQueue::new();
    let mut rng = StdRng::seed_from_u64(1);
    let mut view = ViewSlot::new();

    for (owner, kind) in SynthKind::ALL.into_iter().enumerate() {
        let mut ctx = SynthCtx {
            audio: &mut audio,
            timers: &mut timers,
            rng: &mut rng,
            view: &mut view,
            owner: owner as u64 + 1,
            host_now: 0.0,
            lead: 0.1,
        };
        let mut synth = AnySynth::new(kind, &mut ctx).unwrap();
        if let Some(request) = synth.assets() {
            let assets = SynthesizedLoader::new(SR, 1).load(&request).unwrap();
            synth.install(&mut ctx, assets).unwrap();
        }
        synth.start(&mut ctx, Point::new(0.4, 0.6)).unwrap();
        synth.end(&mut ctx).unwrap();
        synth.end(&mut ctx).unwrap();
        synth.teardown(&mut ctx);
        assert_eq!(ctx.audio.live_nodes(), 0, "{kind}");
        assert!(ctx.timers.is_empty(), "{kind}");
    }
}

#[test]
fn test_gesture_while_loading_is_ignored_then_playable() {
    let mut engine = Engine::new(EngineConfig::default().sample_rate(SR));
    engine.select(SynthKind::Dna);
    let request = engine.init().expect("dna asks for samples");
    assert_eq!(engine.status(), Status::Loading);

    engine.pointer_down(0.5, 0.5);
    engine.pointer_up();
    engine.pointer_up();
    assert_eq!(engine.pending_timers(), 0);

    engine.complete_load(SynthesizedLoader::new(SR, 0).load(&request));
    assert_eq!(engine.status(), Status::Ready);
    engine.pointer_down(0.5, 0.5);
    engine.run_for(1.5);
    assert!(engine.is_gesture_active());
    assert!(engine.pending_timers() > 0);
    match engine.frame() {
        Some(Snapshot::Dna { runs, .. }) => assert_eq!(runs.len(), 1),
        other => panic!("expected a dna view, got {other:?}"),
    }
}

#[test]
fn test_switching_mid_gesture_leaves_nothing_behind() {
    let mut engine = ready(SynthKind::Percolator);
    engine.pointer_down(0.8, 0.8);
    engine.run_for(0.3);

    engine.select(SynthKind::Breath);
    assert!(!engine.is_gesture_active());
    assert_eq!(engine.status(), Status::Idle);
    assert_eq!(engine.live_nodes(), 0);
    assert_eq!(engine.pending_timers(), 0);

    // the old drop timer must not wake the new toy
    engine.run_for(0.5);
    assert_eq!(engine.live_nodes(), 0);
}

#[test]
fn test_fast_pulse_is_silent_soon_after_release() {
    // longer than one note plus the filter's ring
    let quiet_after = (0.07 * SR) as usize;
    let tail = (0.25 * SR) as usize;
    for k in 0..60 {
        let mut engine = ready(SynthKind::Minimalism);
        engine.pointer_down(1.0, 0.0);
        engine.run_for(0.2 + k as f64 * 0.004);
        engine.pointer_up();

        let mut left = vec![0.0; tail];
        let mut right = vec![0.0; tail];
        engine.run_into(&mut left, &mut right);
        let late = left[quiet_after..]
            .iter()
            .chain(&right[quiet_after..])
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(late < 1e-3, "released at step {k}, still sounding: {late}");
        assert_eq!(engine.pending_timers(), 0);
    }
}

#[test]
fn test_same_seed_renders_the_same_audio() {
    let render = || {
        let mut engine = ready(SynthKind::Percolator);
        let mut left = vec![0.0; SR as usize];
        let mut right = vec![0.0; SR as usize];
        engine.pointer_down(0.3, 0.6);
        engine.run_into(&mut left, &mut right);
        engine.pointer_up();
        (left, right)
    };
    let (a, b) = (render(), render());
    assert!(a.0.iter().any(|&s| s != 0.0));
    assert_eq!(a, b);
}

#[test]
fn test_frame_reports_the_latest_view_only() {
    let mut engine = ready(SynthKind::Modes);
    assert_eq!(engine.frame(), None);
    engine.pointer_down(0.9, 0.1);
    engine.run_for(0.1);
    assert!(engine.frame().is_some());
    engine.pointer_up();
    assert_eq!(engine.frame(), Some(Snapshot::Cleared));
    assert_eq!(engine.frame(), None);
}
