use bevy::prelude::*;

use super::fixtures::{Harness, TestScene, moving, pressing};
use crate::animation::{AnimBool, AnimEvent, AnimSegment, AnimTrigger, RollDirection};
use crate::input::FrameInput;
use crate::noise::NoiseEvent;
use crate::query::SurfaceLayer;

fn standing() -> Harness {
    Harness::on_floor(TestScene::with_floor(0.0), Vec3::new(0.0, 0.01, 0.0))
}

fn jump() -> FrameInput {
    pressing(|i| i.jump = true)
}

fn roll(x: f32, y: f32) -> FrameInput {
    FrameInput {
        roll: true,
        ..moving(x, y)
    }
}

fn run(x: f32, y: f32) -> FrameInput {
    FrameInput {
        run: true,
        ..moving(x, y)
    }
}

/// Walk off the +X edge of a platform and stop as soon as the body leaves it.
fn walk_off_edge() -> Harness {
    let mut scene = TestScene::default();
    scene.add_box(Vec3::new(-5.0, -1.0, -5.0), Vec3::new(0.0, 0.0, 5.0), SurfaceLayer::Ground);
    let mut h = Harness::on_floor(scene, Vec3::new(-0.5, 0.01, 0.0));
    assert!(h.body.grounded);

    for _ in 0..120 {
        h.step(moving(1.0, 0.0));
        if !h.body.grounded {
            return h;
        }
    }
    panic!("never left the platform, x = {}", h.body.position.x);
}

// ============================================================================
// GROUNDING AND GRAVITY
// ============================================================================

#[test]
fn test_body_settles_on_floor() {
    let h = standing();
    assert!(h.body.grounded);
    assert!(h.body.position.y >= 0.0 && h.body.position.y < 0.05);
    assert_eq!(h.body.step_offset, h.controller.locomotion.config.step_offset);
    assert!(h.rig.bool(AnimBool::Grounded));
}

#[test]
fn test_first_landing_is_reported_once() {
    let mut h = Harness::new(TestScene::with_floor(0.0), Vec3::new(0.0, 1.0, 0.0));
    let reports = h.hold(FrameInput::default(), 60);

    assert_eq!(reports.iter().filter(|r| r.landed).count(), 1);
    assert_eq!(h.noise, vec![NoiseEvent::Land]);
}

#[test]
fn test_fall_speed_is_clamped_to_terminal() {
    let mut h = Harness::new(TestScene::default(), Vec3::new(0.0, 100.0, 0.0));
    h.idle(300);

    let terminal = h.controller.locomotion.config.terminal_fall_speed;
    assert_eq!(h.body.vertical_velocity, -terminal);
    assert!(!h.body.grounded);
    assert_eq!(h.body.step_offset, 0.0, "no step-up while airborne");
}

#[test]
fn test_fall_trigger_fires_once_per_fall() {
    let mut h = walk_off_edge();
    h.idle(3);
    assert!(h.rig.is_triggered(AnimTrigger::Fall));

    h.rig.take_triggers();
    h.idle(20);
    assert!(!h.rig.is_triggered(AnimTrigger::Fall));
}

// ============================================================================
// JUMP
// ============================================================================

#[test]
fn test_jump_from_ground() {
    let mut h = standing();
    let report = h.step(jump());

    assert!(report.jumped);
    assert!(h.body.vertical_velocity > 0.0);
    assert!(h.rig.is_triggered(AnimTrigger::Jump));
    assert_eq!(h.noise, vec![NoiseEvent::Jump]);

    let config = &h.controller.locomotion.config;
    let expected = config.jump_velocity() - config.ascend_gravity * super::fixtures::DT;
    assert!((h.body.vertical_velocity - expected).abs() < 1e-4);
}

#[test]
fn test_ascending_body_is_not_grounded() {
    let mut h = standing();
    h.step(jump());
    h.step(FrameInput::default());

    // The probe still overlaps the floor right after take-off
    assert!(h.body.position.y < 0.3);
    assert!(!h.body.grounded);
}

#[test]
fn test_jump_lands_and_reports() {
    let mut h = standing();
    h.step(jump());
    let reports = h.hold(FrameInput::default(), 90);

    assert_eq!(reports.iter().filter(|r| r.landed).count(), 1);
    assert!(reports.iter().all(|r| !r.jumped));
    assert!(h.body.grounded);
    assert_eq!(h.noise, vec![NoiseEvent::Jump, NoiseEvent::Land]);
}

#[test]
fn test_jump_is_buffered_until_landing() {
    let mut h = standing();
    h.step(jump());
    h.step(FrameInput::default());

    for _ in 0..120 {
        h.step(FrameInput::default());
        if h.body.vertical_velocity < 0.0 && h.body.position.y < 0.15 {
            break;
        }
    }

    let mut reports = vec![h.step(jump())];
    reports.extend(h.hold(FrameInput::default(), 7));
    assert_eq!(reports.iter().filter(|r| r.jumped).count(), 1);
}

#[test]
fn test_jump_blocked_during_transition() {
    let mut h = standing();
    h.rig.transitioning = true;
    assert!(!h.step(jump()).jumped);

    h.rig.transitioning = false;
    assert!(h.step(FrameInput::default()).jumped, "press stays buffered");
}

#[test]
fn test_coyote_jump_after_leaving_edge() {
    let mut h = walk_off_edge();
    let report = h.step(jump());
    assert!(report.jumped);
    assert!(h.body.vertical_velocity > 0.0);
}

#[test]
fn test_no_jump_after_coyote_expires() {
    let mut h = walk_off_edge();
    h.idle(12);

    let report = h.step(jump());
    assert!(!report.jumped);
    assert!(h.hold(FrameInput::default(), 10).iter().all(|r| !r.jumped));
}

#[test]
fn test_coyote_is_consumed_by_jump() {
    let mut h = walk_off_edge();
    assert!(h.step(jump()).jumped);

    // Past the cooldown but still inside the first coyote window
    h.idle(4);
    assert!(!h.step(jump()).jumped);
}

fn jump_times(h: &mut Harness, ticks: usize) -> Vec<f32> {
    let mut times = Vec::new();
    for _ in 0..ticks {
        if h.step(jump()).jumped {
            times.push(h.now);
        }
    }
    times
}

fn assert_spaced(times: &[f32], cooldown: f32) {
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= cooldown - 1e-6,
            "jumps at {} and {} closer than {}",
            pair[0],
            pair[1],
            cooldown
        );
    }
}

#[test]
fn test_held_jump_respects_cooldown() {
    let mut h = standing();
    let cooldown = h.controller.locomotion.config.jump_cooldown;
    let times = jump_times(&mut h, 120);
    assert!(times.len() >= 2, "jumps at {:?}", times);
    assert_spaced(&times, cooldown);

    let mut h = walk_off_edge();
    let times = jump_times(&mut h, 120);
    assert!(!times.is_empty(), "no coyote jump");
    assert_spaced(&times, cooldown);
}

// ============================================================================
// RUN AND STAMINA
// ============================================================================

#[test]
fn test_running_drains_stamina() {
    let mut h = standing();
    h.hold(run(0.0, 1.0), 60);

    assert!(h.controller.locomotion.is_running());
    let stamina = h.controller.locomotion.stamina();
    assert!(stamina > 70.0 && stamina < 80.0, "stamina {stamina}");
    assert!(h.rig.bool(AnimBool::Running));
}

#[test]
fn test_stamina_regenerates_after_delay() {
    let mut h = standing();
    h.hold(run(0.0, 1.0), 30);
    let drained = h.controller.locomotion.stamina();

    h.idle(30);
    assert_eq!(h.controller.locomotion.stamina(), drained);

    h.idle(60);
    assert!(h.controller.locomotion.stamina() > drained);
}

#[test]
fn test_run_stops_when_exhausted() {
    let mut h = standing();
    h.controller.locomotion.set_stamina(1.0);
    h.hold(run(0.0, 1.0), 10);

    assert_eq!(h.controller.locomotion.stamina(), 0.0);
    assert!(!h.controller.locomotion.is_running());
    assert!(!h.rig.bool(AnimBool::Running));
}

#[test]
fn test_run_needs_movement() {
    let mut h = standing();
    h.hold(run(0.0, 0.0), 10);
    assert!(!h.controller.locomotion.is_running());
    assert_eq!(h.controller.locomotion.stamina(), 100.0);
}

#[test]
fn test_run_is_faster_than_walk() {
    let mut walker = standing();
    walker.hold(moving(0.0, 1.0), 30);
    let mut runner = standing();
    runner.hold(run(0.0, 1.0), 30);

    let walked = -walker.body.position.z;
    let ran = -runner.body.position.z;
    assert!((walked - 2.5).abs() < 0.05, "walked {walked}");
    assert!((ran - 4.0).abs() < 0.05, "ran {ran}");
}

// ============================================================================
// ROLL
// ============================================================================

#[test]
fn test_roll_direction_follows_local_input() {
    let mut h = standing();
    let report = h.step(roll(1.0, 0.0));

    assert_eq!(report.rolled, Some(RollDirection::Right));
    assert_eq!(h.rig.roll_direction(), RollDirection::Right);
    assert!(h.rig.is_triggered(AnimTrigger::Roll));
    assert_eq!(h.noise, vec![NoiseEvent::Roll]);
    assert_eq!(h.controller.locomotion.stamina(), 80.0);
}

#[test]
fn test_roll_without_input_goes_forward() {
    let mut h = standing();
    assert_eq!(h.step(roll(0.0, 0.0)).rolled, Some(RollDirection::Front));
}

#[test]
fn test_roll_cooldown() {
    let mut h = standing();
    assert!(h.step(roll(0.0, 1.0)).rolled.is_some());
    assert!(h.step(roll(0.0, 1.0)).rolled.is_none());

    h.idle(10);
    assert!(h.step(roll(0.0, 1.0)).rolled.is_some());
}

#[test]
fn test_roll_needs_stamina() {
    let mut h = standing();
    // One running tick holds off regeneration
    h.step(run(0.0, 1.0));
    h.controller.locomotion.set_stamina(5.0);

    assert!(h.step(roll(0.0, 1.0)).rolled.is_none());
    assert_eq!(h.controller.locomotion.stamina(), 5.0);
    assert!(h.noise.is_empty());
}

#[test]
fn test_roll_costs_exact_stamina() {
    let mut h = standing();
    h.step(run(0.0, 1.0));
    h.controller.locomotion.set_stamina(50.0);

    assert!(h.step(roll(0.0, 1.0)).rolled.is_some());
    assert_eq!(h.controller.locomotion.stamina(), 30.0);
}

#[test]
fn test_roll_blocked_by_animation_state() {
    let mut h = standing();
    h.rig.next = Some(AnimSegment::Roll);
    assert!(h.step(roll(0.0, 1.0)).rolled.is_none());

    h.rig.next = None;
    h.rig.transitioning = true;
    assert!(h.step(roll(0.0, 1.0)).rolled.is_none());

    h.rig.transitioning = false;
    assert!(h.step(roll(0.0, 1.0)).rolled.is_some());
}

#[test]
fn test_no_roll_in_the_air() {
    let mut h = Harness::new(TestScene::default(), Vec3::new(0.0, 10.0, 0.0));
    h.idle(2);
    assert!(h.step(roll(0.0, 1.0)).rolled.is_none());
}

// ============================================================================
// FACING AND BLEND
// ============================================================================

#[test]
fn test_turns_towards_camera_relative_forward() {
    let mut h = standing();
    let input = FrameInput {
        camera_yaw: std::f32::consts::FRAC_PI_2,
        ..moving(0.0, 1.0)
    };
    h.hold(input, 60);

    assert!(h.body.forward().dot(Vec3::NEG_X) > 0.99);
    assert!(h.body.position.x < -4.0);
}

#[test]
fn test_strafe_keeps_facing() {
    let mut h = standing();
    h.hold(moving(1.0, 0.0), 30);

    assert!(h.body.forward().dot(Vec3::NEG_Z) > 0.999);
    assert!(h.body.position.x > 2.0);
}

#[test]
fn test_backpedal_keeps_facing() {
    let mut h = standing();
    h.hold(moving(0.0, -1.0), 30);

    assert!(h.body.forward().dot(Vec3::NEG_Z) > 0.999);
    assert!(h.rig.bool(AnimBool::MoveBack));
    assert!(!h.rig.bool(AnimBool::MoveForward));
    assert!(h.controller.locomotion.blend().y < -0.9);
}

#[test]
fn test_diagonal_back_turns() {
    let mut h = standing();
    h.hold(moving(0.7, -0.7), 60);
    assert!(h.body.forward().dot(Vec3::NEG_Z) < 0.5);
}

#[test]
fn test_blend_approaches_input_and_boosts_when_running() {
    let mut h = standing();
    h.hold(moving(0.0, 1.0), 60);
    let walk = h.controller.locomotion.blend();
    assert!(walk.y > 0.95 && walk.y <= 1.0 + 1e-4, "walk blend {walk:?}");
    assert!(h.rig.bool(AnimBool::MoveForward));

    h.hold(run(0.0, 1.0), 30);
    let boost = h.controller.locomotion.config.run_blend_boost;
    let running = h.controller.locomotion.blend();
    assert!(running.y > 1.3 && running.y <= boost + 1e-4, "run blend {running:?}");
}

#[test]
fn test_blend_decays_without_input() {
    let mut h = standing();
    h.hold(moving(0.0, 1.0), 30);
    h.idle(60);
    assert!(h.controller.locomotion.blend().length() < 0.01);
    assert!(!h.rig.bool(AnimBool::MoveForward));
}

// ============================================================================
// CONTROLLER ROUTING
// ============================================================================

#[test]
fn test_equip_toggles_armed() {
    let mut h = standing();
    h.step(pressing(|i| i.equip = true));
    assert!(h.controller.is_armed());
    assert!(h.rig.bool(AnimBool::Armed));
    assert!(h.rig.is_triggered(AnimTrigger::Equip));

    h.step(pressing(|i| i.equip = true));
    assert!(!h.controller.is_armed());
    assert!(!h.rig.bool(AnimBool::Armed));
}

#[test]
fn test_footstep_notify_emits_noise_when_grounded() {
    let mut h = standing();
    assert!(h.notify(AnimEvent::Footstep(0.0)));
    assert!(h.notify(AnimEvent::Footstep(3.0)));
    assert!(h.notify(AnimEvent::Footstep(0.4)));

    assert_eq!(
        h.noise,
        vec![
            NoiseEvent::Footstep { strength: 0.8 },
            NoiseEvent::Footstep { strength: 1.0 },
            NoiseEvent::Footstep { strength: 0.4 },
        ]
    );
}

#[test]
fn test_footstep_notify_ignored_in_the_air() {
    let mut h = Harness::new(TestScene::default(), Vec3::new(0.0, 10.0, 0.0));
    h.idle(2);
    assert!(!h.notify(AnimEvent::Footstep(0.5)));
    assert!(h.noise.is_empty());
}

#[test]
fn test_climb_notifies_ignored_while_walking() {
    let mut h = standing();
    let before = h.body.clone();
    for event in [
        AnimEvent::MantleFinished,
        AnimEvent::DropFinished,
        AnimEvent::LadderTopReached,
        AnimEvent::LadderBottomReached,
    ] {
        assert!(!h.notify(event), "{event:?} should be ignored");
    }
    assert_eq!(h.body, before);
}
