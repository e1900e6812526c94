//! Animation control signals the traversal core writes, and the read-back it gates on.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SIGNALS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AnimBool {
    Grounded,
    Running,
    Armed,
    OnLadder,
    Climbing,
    MoveForward,
    MoveBack,
}

impl AnimBool {
    pub const ALL: [AnimBool; 7] = [
        AnimBool::Grounded,
        AnimBool::Running,
        AnimBool::Armed,
        AnimBool::OnLadder,
        AnimBool::Climbing,
        AnimBool::MoveForward,
        AnimBool::MoveBack,
    ];

    fn bit(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AnimFloat {
    /// Body-local strafe blend
    MoveX,
    /// Body-local forward blend
    MoveY,
    /// Ladder lateral input
    WallX,
    /// Ladder vertical input
    WallY,
    /// Ledge shimmy input
    ClimbX,
}

impl AnimFloat {
    pub const ALL: [AnimFloat; 5] = [
        AnimFloat::MoveX,
        AnimFloat::MoveY,
        AnimFloat::WallX,
        AnimFloat::WallY,
        AnimFloat::ClimbX,
    ];

    fn bit(self) -> u32 {
        1 << (8 + self as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AnimTrigger {
    Jump,
    Roll,
    Fall,
    LadderEnter,
    LadderTopExit,
    LadderBottomExit,
    LadderJumpOut,
    WallDash,
    Mantle,
    Drop,
    Equip,
}

impl AnimTrigger {
    pub const ALL: [AnimTrigger; 11] = [
        AnimTrigger::Jump,
        AnimTrigger::Roll,
        AnimTrigger::Fall,
        AnimTrigger::LadderEnter,
        AnimTrigger::LadderTopExit,
        AnimTrigger::LadderBottomExit,
        AnimTrigger::LadderJumpOut,
        AnimTrigger::WallDash,
        AnimTrigger::Mantle,
        AnimTrigger::Drop,
        AnimTrigger::Equip,
    ];

    fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Any control signal, used to describe what a rig supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AnimSignal {
    Bool(AnimBool),
    Float(AnimFloat),
    Trigger(AnimTrigger),
    RollDirection,
}

impl AnimSignal {
    pub fn all() -> impl Iterator<Item = AnimSignal> {
        AnimBool::ALL
            .into_iter()
            .map(AnimSignal::Bool)
            .chain(AnimFloat::ALL.into_iter().map(AnimSignal::Float))
            .chain(AnimTrigger::ALL.into_iter().map(AnimSignal::Trigger))
            .chain(std::iter::once(AnimSignal::RollDirection))
    }
}

/// Roll variant selected from body-local input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum RollDirection {
    #[default]
    Front = 0,
    Back = 1,
    Left = 2,
    Right = 3,
}

impl RollDirection {
    /// Classify a body-local planar vector (`x` right, `z` forward).
    /// Ties go to the lateral axis; no input rolls forward.
    pub fn classify(local: Vec3) -> Self {
        if local.x == 0.0 && local.z == 0.0 {
            return RollDirection::Front;
        }
        if local.x.abs() >= local.z.abs() {
            if local.x >= 0.0 {
                RollDirection::Right
            } else {
                RollDirection::Left
            }
        } else if local.z >= 0.0 {
            RollDirection::Front
        } else {
            RollDirection::Back
        }
    }
}

/// Identity of a playing animation segment, read back for gating only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum AnimSegment {
    Locomotion,
    Jump,
    Fall,
    Land,
    Roll,
    Ladder,
    Hang,
    Mantle,
    Drop,
}

/// The animation collaborator as seen from the state machines.
pub trait AnimationGraph {
    fn set_bool(&mut self, signal: AnimBool, value: bool);
    fn set_float(&mut self, signal: AnimFloat, value: f32);
    fn set_trigger(&mut self, signal: AnimTrigger);
    fn reset_trigger(&mut self, signal: AnimTrigger);
    fn set_roll_direction(&mut self, direction: RollDirection);

    fn current_segment(&self) -> Option<AnimSegment>;
    fn next_segment(&self) -> Option<AnimSegment>;
    fn in_transition(&self) -> bool;

    fn is_playing(&self, segment: AnimSegment) -> bool {
        self.current_segment() == Some(segment) || self.next_segment() == Some(segment)
    }
}

// ============================================================================
// RIG
// ============================================================================

/// Signal storage an animation driver reads from and reports back into.
///
/// Writes to signals outside `supported` are dropped; the plugin warns about
/// them once when the rig is added.
#[derive(Component, Reflect, Clone, Debug, PartialEq)]
pub struct AnimationRig {
    supported: u32,
    supported_triggers: u32,
    bools: u32,
    floats: [f32; 5],
    pending_triggers: u32,
    roll_direction: RollDirection,
    pub current: Option<AnimSegment>,
    pub next: Option<AnimSegment>,
    pub transitioning: bool,
}

const ROLL_DIRECTION_BIT: u32 = 1 << 16;

impl Default for AnimationRig {
    fn default() -> Self {
        Self::with_signals(AnimSignal::all())
    }
}

impl AnimationRig {
    pub fn with_signals(signals: impl IntoIterator<Item = AnimSignal>) -> Self {
        let mut supported = 0;
        let mut supported_triggers = 0;
        for signal in signals {
            match signal {
                AnimSignal::Bool(b) => supported |= b.bit(),
                AnimSignal::Float(f) => supported |= f.bit(),
                AnimSignal::Trigger(t) => supported_triggers |= t.bit(),
                AnimSignal::RollDirection => supported |= ROLL_DIRECTION_BIT,
            }
        }
        Self {
            supported,
            supported_triggers,
            bools: 0,
            floats: [0.0; 5],
            pending_triggers: 0,
            roll_direction: RollDirection::Front,
            current: Some(AnimSegment::Locomotion),
            next: None,
            transitioning: false,
        }
    }

    pub fn supports(&self, signal: AnimSignal) -> bool {
        match signal {
            AnimSignal::Bool(b) => self.supported & b.bit() != 0,
            AnimSignal::Float(f) => self.supported & f.bit() != 0,
            AnimSignal::Trigger(t) => self.supported_triggers & t.bit() != 0,
            AnimSignal::RollDirection => self.supported & ROLL_DIRECTION_BIT != 0,
        }
    }

    pub fn missing_signals(&self) -> Vec<AnimSignal> {
        AnimSignal::all().filter(|s| !self.supports(*s)).collect()
    }

    pub fn bool(&self, signal: AnimBool) -> bool {
        self.bools & signal.bit() != 0
    }

    pub fn float(&self, signal: AnimFloat) -> f32 {
        self.floats[signal as usize]
    }

    pub fn is_triggered(&self, signal: AnimTrigger) -> bool {
        self.pending_triggers & signal.bit() != 0
    }

    pub fn roll_direction(&self) -> RollDirection {
        self.roll_direction
    }

    /// Drain pending triggers in declaration order.
    pub fn take_triggers(&mut self) -> Vec<AnimTrigger> {
        let pending = self.pending_triggers;
        self.pending_triggers = 0;
        AnimTrigger::ALL
            .into_iter()
            .filter(|t| pending & t.bit() != 0)
            .collect()
    }
}

impl AnimationGraph for AnimationRig {
    fn set_bool(&mut self, signal: AnimBool, value: bool) {
        if !self.supports(AnimSignal::Bool(signal)) {
            return;
        }
        if value {
            self.bools |= signal.bit();
        } else {
            self.bools &= !signal.bit();
        }
    }

    fn set_float(&mut self, signal: AnimFloat, value: f32) {
        if self.supports(AnimSignal::Float(signal)) {
            self.floats[signal as usize] = value;
        }
    }

    fn set_trigger(&mut self, signal: AnimTrigger) {
        if self.supports(AnimSignal::Trigger(signal)) {
            self.pending_triggers |= signal.bit();
        }
    }

    fn reset_trigger(&mut self, signal: AnimTrigger) {
        self.pending_triggers &= !signal.bit();
    }

    fn set_roll_direction(&mut self, direction: RollDirection) {
        if self.supports(AnimSignal::RollDirection) {
            self.roll_direction = direction;
        }
    }

    fn current_segment(&self) -> Option<AnimSegment> {
        self.current
    }

    fn next_segment(&self) -> Option<AnimSegment> {
        self.next
    }

    fn in_transition(&self) -> bool {
        self.transitioning
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Events raised by the animation layer back into the traversal core.
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub enum AnimEvent {
    MantleFinished,
    DropFinished,
    LadderTopReached,
    LadderBottomReached,
    Footstep(f32),
}

#[derive(Message, Clone, Debug, Serialize, Deserialize)]
pub struct AnimationNotify {
    pub target: Entity,
    pub event: AnimEvent,
}

/// Warn once about signals a freshly added rig cannot drive.
pub fn validate_animation_rigs(rigs: Query<(Entity, &AnimationRig), Added<AnimationRig>>) {
    for (entity, rig) in rigs.iter() {
        for signal in rig.missing_signals() {
            warn!("animation rig on {:?} does not support {:?}", entity, signal);
        }
    }
}
