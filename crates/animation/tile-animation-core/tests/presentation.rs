mod common;

use common::{approx, Harness};
use tile_animation_core::{EventKind, FrameState, ShowOutcome};

fn loaded(begin: i64, end: i64) -> Harness {
    let mut h = Harness::with_window(begin, end, 1000.0);
    h.animation.load_animation().unwrap();
    h.finish_all();
    h.drain();
    h
}

#[test]
fn next_visits_every_frame_then_wraps() {
    let mut h = loaded(0, 4000);
    let visited: Vec<ShowOutcome> = (0..6).map(|_| h.animation.show_next_frame()).collect();
    assert_eq!(
        visited,
        vec![
            ShowOutcome::Changed(0),
            ShowOutcome::Changed(1),
            ShowOutcome::Changed(2),
            ShowOutcome::Changed(3),
            ShowOutcome::Changed(4),
            ShowOutcome::Changed(0),
        ]
    );
    let changes: Vec<Vec<i64>> = h
        .drain()
        .into_iter()
        .filter(|e| e.kind == EventKind::FrameChanged)
        .map(|e| e.times())
        .collect();
    assert_eq!(changes.len(), 6);
    assert_eq!(changes[5], vec![0]);
}

#[test]
fn previous_wraps_to_the_last_frame() {
    let mut h = loaded(0, 4000);
    assert_eq!(h.animation.show_previous_frame(), ShowOutcome::Changed(4));
    assert_eq!(h.animation.show_previous_frame(), ShowOutcome::Changed(3));
}

#[test]
fn stride_follows_completed_groups() {
    let mut h = Harness::with_window(0, 7000, 1000.0);
    h.animation.load_animation().unwrap();
    assert_eq!(h.animation.group_load_step(), 4);
    h.finish(0);
    h.finish(4);
    assert_eq!(h.animation.group_load_step(), 2);

    assert_eq!(h.animation.show_next_frame(), ShowOutcome::Changed(0));
    assert_eq!(h.animation.show_next_frame(), ShowOutcome::Changed(4));
    assert_eq!(h.animation.show_next_frame(), ShowOutcome::Changed(0));
    assert_eq!(h.animation.show_previous_frame(), ShowOutcome::Changed(4));

    // loaded, but its group is not complete yet
    h.finish(2);
    assert_eq!(h.animation.show_frame(2000i64), ShowOutcome::Rejected);
    assert_eq!(h.animation.current_index(), Some(4));
}

#[test]
fn nothing_to_show_before_the_first_frame_loads() {
    let mut h = Harness::with_window(0, 3000, 1000.0);
    h.animation.load_animation().unwrap();
    assert_eq!(h.animation.show_next_frame(), ShowOutcome::Rejected);
    assert!(h.animation.fade_stack().is_empty());
}

#[test]
fn show_frame_outside_the_sequence_fades_out() {
    let mut h = loaded(0, 3000);

    assert_eq!(h.animation.show_frame(1000i64), ShowOutcome::Changed(1));
    assert_eq!(h.animation.show_frame(1500i64), ShowOutcome::NotFound);
    assert_eq!(h.animation.show_frame("soon"), ShowOutcome::NotFound);
    assert_eq!(h.animation.current_index(), Some(1));

    assert_eq!(h.animation.show_frame(-1000i64), ShowOutcome::FadedOut);
    assert!(h.animation.fade_stack().is_empty());
    approx(h.opacity(1), 0.0, 1e-9);

    assert_eq!(h.animation.show_frame(4000i64), ShowOutcome::FadedOut);
    assert_eq!(h.animation.show_frame(3500i64), ShowOutcome::NotFound);

    // just past the end while the first frame is up means the time wrapped
    assert_eq!(h.animation.show_frame(0i64), ShowOutcome::Changed(0));
    assert_eq!(h.animation.show_frame(3500i64), ShowOutcome::FadedOut);

    assert_eq!(
        h.animation.show_frame("1970-01-01T00:00:03Z"),
        ShowOutcome::Changed(3)
    );
    assert_eq!(h.animation.show_frame(-500i64), ShowOutcome::FadedOut);
}

#[test]
fn showing_the_current_frame_again_is_not_a_change() {
    let mut h = loaded(0, 2000);
    h.animation.show_frame(1000i64);
    h.drain();
    assert_eq!(h.animation.show_frame(1000i64), ShowOutcome::Refreshed(1));
    assert!(h.events.is_empty());
}

#[test]
fn trail_fades_departing_frames_step_by_step() {
    let mut h = Harness::from_fixture("trail");
    h.finish_all();
    assert_eq!(
        h.animation.fade_out_opacities(),
        Some(vec![0.5, 0.25, 0.0])
    );

    for _ in 0..4 {
        h.animation.show_next_frame();
    }
    assert_eq!(h.animation.fade_stack(), &[1, 2, 3]);
    approx(h.opacity(0), 0.0, 1e-9);
    approx(h.opacity(1), 0.25, 1e-9);
    approx(h.opacity(2), 0.5, 1e-9);
    approx(h.opacity(3), 1.0, 1e-9);

    // reversing direction collapses the trail
    assert_eq!(h.animation.show_previous_frame(), ShowOutcome::Changed(2));
    assert_eq!(h.animation.fade_stack(), &[2]);
    approx(h.opacity(1), 0.0, 1e-9);
    approx(h.opacity(3), 0.0, 1e-9);
    approx(h.opacity(2), 1.0, 1e-9);
}

#[test]
fn second_show_starts_further_into_the_trail() {
    let mut h = Harness::from_fixture("trail");
    h.finish_all();
    h.animation.show_next_frame();
    h.animation.show_next_frame();
    assert_eq!(h.animation.fade_stack(), &[0, 1]);
    approx(h.opacity(0), 0.5, 1e-9);
    approx(h.opacity(1), 1.0, 1e-9);
}

#[test]
fn fade_stack_stays_bounded_and_unique() {
    let mut h = Harness::from_fixture("trail");
    h.finish_all();
    let bound = 3;

    let mut seed: u64 = 0x5eed;
    for _ in 0..500 {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let roll = (seed >> 33) as i64;
        let outcome = match roll % 4 {
            0 | 1 => h.animation.show_next_frame(),
            2 => h.animation.show_previous_frame(),
            _ => h.animation.show_frame((roll % 10 - 1) * 1000),
        };

        let stack = h.animation.fade_stack();
        assert!(stack.len() <= bound, "stack {stack:?}");
        let mut sorted = stack.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), stack.len(), "duplicate in {stack:?}");
        if let Some(index) = outcome.changed() {
            assert_eq!(h.animation.current_index(), Some(index));
        }
    }
}

#[test]
fn hiding_drops_content_and_showing_reloads() {
    let mut h = loaded(0, 3000);
    h.animation.show_next_frame();
    h.animation.start();
    h.drain();

    h.animation.set_visibility(false);
    assert!(!h.animation.is_visible());
    assert!(!h.animation.is_running());
    assert!(h.animation.fade_stack().is_empty());
    assert!(h
        .animation
        .frames()
        .iter()
        .all(|f| f.state() == FrameState::Unloaded));
    assert!(h
        .animation
        .frames()
        .iter()
        .all(|f| h.renderer().layer(f.handle().unwrap()).is_some_and(|l| !l.visible)));
    let released = h
        .drain()
        .into_iter()
        .filter(|e| e.kind == EventKind::AnimationFrameContentReleased)
        .count();
    assert_eq!(released, 4);

    h.animation.set_visibility(true);
    assert_eq!(h.drain_kinds(), vec![EventKind::AnimationLoadStarted]);
    assert!(h.animation.frames().iter().all(|f| f.is_loading()));

    h.animation.set_visibility(true);
    assert!(h.events.is_empty());
}

#[test]
fn opacity_rescales_visible_frames_only() {
    let mut h = loaded(0, 2000);
    h.animation.show_next_frame();
    approx(h.opacity(0), 1.0, 1e-9);
    approx(h.opacity(1), 0.0, 1e-9);

    assert!(h.animation.set_opacity(0.4));
    approx(h.animation.opacity(), 0.4, 1e-9);
    approx(h.opacity(0), 0.4, 1e-9);
    approx(h.opacity(1), 0.0, 1e-9);

    assert!(!h.animation.set_opacity(0.4));
    assert!(!h.animation.set_opacity(f64::NAN));
    assert!(h.animation.set_opacity(3.0));
    approx(h.animation.opacity(), 1.0, 1e-9);

    // the next frame fades in to the stored opacity
    h.animation.set_opacity(0.6);
    h.animation.show_next_frame();
    approx(h.opacity(1), 0.6, 1e-9);
}

#[test]
fn z_index_reaches_existing_and_new_layers() {
    let mut h = loaded(0, 1000);
    h.animation.set_z_index(7);
    assert_eq!(h.renderer().layer(h.handle(0)).unwrap().z_index, 7);
    h.animation.load_animation().unwrap();
    assert_eq!(h.renderer().layer(h.handle(1)).unwrap().z_index, 7);
}

#[test]
fn invalid_trail_keeps_the_previous_one() {
    let mut h = Harness::from_fixture("trail");
    assert!(!h.animation.set_fade_out_opacities(Some(&[0.5, 1.5])));
    assert_eq!(
        h.animation.fade_out_opacities(),
        Some(vec![0.5, 0.25, 0.0])
    );
    assert!(h.animation.set_fade_out_opacities(None));
    assert_eq!(h.animation.fade_out_opacities(), None);
}

#[test]
fn config_without_fade_out_keeps_the_trail() {
    let mut h = Harness::from_fixture("trail");
    h.animation
        .set_config_json(r#"{ "frameRate": 250, "fadeIn": { "time": 0 } }"#)
        .unwrap();
    assert_eq!(h.animation.frame_rate(), 250.0);
    assert_eq!(
        h.animation.fade_out_opacities(),
        Some(vec![0.5, 0.25, 0.0])
    );

    // a fade-out block without opacities removes it
    h.animation
        .set_config_json(r#"{ "fadeOut": { "time": 0 } }"#)
        .unwrap();
    assert_eq!(h.animation.fade_out_opacities(), None);
}
