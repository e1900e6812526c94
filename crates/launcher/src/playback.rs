//! Minimal animation player standing in for a real animation graph.
//!
//! It turns the triggers the traversal core writes into timed segments,
//! reports what is playing back into the [`AnimationRig`], and raises the
//! completion and footstep notifications the core waits on.

use bevy::prelude::*;
use traversal::animation::{
    AnimBool, AnimEvent, AnimFloat, AnimSegment, AnimTrigger, AnimationNotify, AnimationRig,
};
use traversal::systems::{apply_animation_notifies, tick_traversal};

/// Cross-fade time between two segments.
pub const BLEND_TIME: f32 = 0.1;
/// Blend distance covered between two footfalls.
pub const STRIDE: f32 = 0.45;
/// Blend magnitude of a full run.
pub const RUN_BLEND: f32 = 1.4;
const MIN_STEP_BLEND: f32 = 0.1;

pub struct PlaybackPlugin;

impl Plugin for PlaybackPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<ClipPlayback>();
        app.add_systems(
            FixedUpdate,
            advance_playback
                .after(tick_traversal)
                .before(apply_animation_notifies),
        );
    }
}

/// Length of a one-shot clip, `None` for looping segments.
pub fn clip_length(segment: AnimSegment) -> Option<f32> {
    match segment {
        AnimSegment::Jump => Some(0.5),
        AnimSegment::Land => Some(0.2),
        AnimSegment::Roll => Some(0.6),
        AnimSegment::Mantle => Some(0.9),
        AnimSegment::Drop => Some(0.35),
        AnimSegment::Locomotion | AnimSegment::Fall | AnimSegment::Ladder | AnimSegment::Hang => {
            None
        }
    }
}

fn segment_for(trigger: AnimTrigger) -> Option<AnimSegment> {
    match trigger {
        AnimTrigger::Jump => Some(AnimSegment::Jump),
        AnimTrigger::Roll => Some(AnimSegment::Roll),
        AnimTrigger::Fall | AnimTrigger::LadderJumpOut => Some(AnimSegment::Fall),
        AnimTrigger::LadderEnter => Some(AnimSegment::Ladder),
        AnimTrigger::LadderTopExit | AnimTrigger::LadderBottomExit => {
            Some(AnimSegment::Locomotion)
        }
        AnimTrigger::Mantle => Some(AnimSegment::Mantle),
        AnimTrigger::Drop => Some(AnimSegment::Drop),
        // Layered over whatever is playing.
        AnimTrigger::WallDash | AnimTrigger::Equip => None,
    }
}

#[derive(Component, Reflect, Clone, Debug, PartialEq)]
pub struct ClipPlayback {
    pub segment: AnimSegment,
    /// Segment being blended out, if any
    pub previous: Option<AnimSegment>,
    pub elapsed: f32,
    pub blend_left: f32,
    stride: f32,
}

impl Default for ClipPlayback {
    fn default() -> Self {
        Self {
            segment: AnimSegment::Locomotion,
            previous: None,
            elapsed: 0.0,
            blend_left: 0.0,
            stride: 0.0,
        }
    }
}

impl ClipPlayback {
    pub fn start(&mut self, segment: AnimSegment) {
        if segment == self.segment && clip_length(segment).is_none() {
            return;
        }
        trace!("playing {:?} after {:?}", segment, self.segment);
        self.previous = Some(self.segment);
        self.segment = segment;
        self.elapsed = 0.0;
        self.blend_left = BLEND_TIME;
        self.stride = 0.0;
    }

    fn idle_segment(rig: &AnimationRig) -> AnimSegment {
        if rig.bool(AnimBool::Grounded) {
            AnimSegment::Locomotion
        } else {
            AnimSegment::Fall
        }
    }

    /// Advance by `dt`, returning the notifications raised on the way.
    pub fn advance(&mut self, rig: &mut AnimationRig, dt: f32) -> Vec<AnimEvent> {
        let mut events = Vec::new();

        for trigger in rig.take_triggers() {
            if let Some(segment) = segment_for(trigger) {
                self.start(segment);
            }
        }

        let grounded = rig.bool(AnimBool::Grounded);
        match self.segment {
            AnimSegment::Fall if grounded => self.start(AnimSegment::Land),
            AnimSegment::Ladder if !rig.bool(AnimBool::OnLadder) => {
                self.start(Self::idle_segment(rig))
            }
            AnimSegment::Hang if !rig.bool(AnimBool::Climbing) => {
                self.start(Self::idle_segment(rig))
            }
            AnimSegment::Mantle | AnimSegment::Drop | AnimSegment::Hang => {}
            _ if rig.bool(AnimBool::Climbing) => self.start(AnimSegment::Hang),
            _ => {}
        }

        self.elapsed += dt;
        self.blend_left = (self.blend_left - dt).max(0.0);

        if let Some(length) = clip_length(self.segment)
            && self.elapsed >= length
        {
            match self.segment {
                AnimSegment::Mantle => {
                    events.push(AnimEvent::MantleFinished);
                    self.start(AnimSegment::Locomotion);
                }
                AnimSegment::Drop => {
                    events.push(AnimEvent::DropFinished);
                    self.start(AnimSegment::Fall);
                }
                _ => self.start(Self::idle_segment(rig)),
            }
        }

        if self.segment == AnimSegment::Locomotion && grounded {
            let blend = Vec2::new(rig.float(AnimFloat::MoveX), rig.float(AnimFloat::MoveY)).length();
            if blend > MIN_STEP_BLEND {
                self.stride += blend * dt;
                if self.stride >= STRIDE {
                    self.stride -= STRIDE;
                    events.push(AnimEvent::Footstep((blend / RUN_BLEND).min(1.0)));
                }
            } else {
                self.stride = 0.0;
            }
        }

        if self.blend_left > 0.0 {
            rig.current = self.previous;
            rig.next = Some(self.segment);
            rig.transitioning = true;
        } else {
            rig.current = Some(self.segment);
            rig.next = None;
            rig.transitioning = false;
        }

        events
    }
}

pub fn advance_playback(
    time: Res<Time>,
    mut characters: Query<(Entity, &mut AnimationRig, &mut ClipPlayback)>,
    mut notifies: MessageWriter<AnimationNotify>,
) {
    let dt = time.delta_secs();
    for (entity, mut rig, mut playback) in characters.iter_mut() {
        for event in playback.advance(&mut rig, dt) {
            notifies.write(AnimationNotify {
                target: entity,
                event,
            });
        }
    }
}
