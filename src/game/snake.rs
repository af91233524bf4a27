use super::constants::{
    BASE_SPEED, BOOST_COST, BOOST_MIN_LENGTH, BOOST_MULTIPLIER, GROWTH_STEP, HISTORY_MARGIN,
    INITIAL_SEGMENTS, MIN_SEGMENTS, SEGMENT_SPACING, TURN_SMOOTHING,
};
use super::math::{angle_delta, wrap};
use super::types::Vec2;
use serde::Deserialize;
use std::collections::VecDeque;

/// One client input payload. Absent fields leave the previous value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SnakeInput {
    pub angle: Option<f64>,
    pub boost: Option<bool>,
}

/// Single-slot input mailbox. Fresh inputs overwrite it field by field;
/// ticks without traffic keep steering toward the last target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingInput {
    pub angle: Option<f64>,
    pub boost: bool,
}

#[derive(Debug, Clone)]
pub struct Snake {
    pub head: Vec2,
    pub angle: f64,
    pub speed: f64,
    /// Recent head positions, newest first. Trimmed each tick against
    /// the target length plus a margin.
    pub positions: VecDeque<Vec2>,
    pub length: f64,
    pub target_length: f64,
    pub boosting: bool,
    pub pending: PendingInput,
    pub dead: bool,
}

impl Snake {
    pub fn new(head: Vec2, angle: f64) -> Self {
        let length = INITIAL_SEGMENTS as f64 * SEGMENT_SPACING;
        let history = length as usize;
        let mut positions = VecDeque::with_capacity(history + 1);
        for _ in 0..history {
            positions.push_back(head);
        }
        Self {
            head,
            angle,
            speed: BASE_SPEED,
            positions,
            length,
            target_length: length,
            boosting: false,
            pending: PendingInput::default(),
            dead: false,
        }
    }

    /// Latest-wins overlay of an input onto the mailbox. Non-finite
    /// angles are ignored.
    pub fn apply_input(&mut self, input: &SnakeInput) {
        if let Some(angle) = input.angle {
            if angle.is_finite() {
                self.pending.angle = Some(angle);
            }
        }
        if let Some(boost) = input.boost {
            self.pending.boost = boost;
        }
    }

    /// Advances the snake one tick: steer, resolve boost, move, record
    /// history, relax length toward its target.
    pub fn simulate(&mut self, width: f64, height: f64) {
        if let Some(target) = self.pending.angle {
            self.angle += TURN_SMOOTHING * angle_delta(target, self.angle);
        }

        let boosting = self.pending.boost && self.length > BOOST_MIN_LENGTH;
        if boosting {
            self.speed = BASE_SPEED * BOOST_MULTIPLIER;
            self.length = (self.length - BOOST_COST).max(0.0);
        } else {
            self.speed = BASE_SPEED;
        }
        self.boosting = boosting;

        self.head = Vec2 {
            x: wrap(self.head.x + self.speed * self.angle.cos(), width),
            y: wrap(self.head.y + self.speed * self.angle.sin(), height),
        };
        self.positions.push_front(self.head);
        let max_positions =
            (self.target_length / SEGMENT_SPACING).ceil() as usize + HISTORY_MARGIN;
        while self.positions.len() > max_positions {
            self.positions.pop_back();
        }

        let step = GROWTH_STEP.min((self.target_length - self.length).abs());
        if self.length < self.target_length {
            self.length += step;
        } else {
            self.length -= step;
        }
        self.length = self.length.max(0.0);
    }

    /// Body points sampled from the position history at the segment
    /// stride, stopping early if the history runs out. Shared by
    /// snapshots, collision checks and corpse drops.
    pub fn segments(&self) -> Vec<Vec2> {
        let count = ((self.length / SEGMENT_SPACING) as usize).max(MIN_SEGMENTS);
        let stride = SEGMENT_SPACING as usize;
        let mut out = Vec::with_capacity(count);
        for index in 0..count {
            match self.positions.get(index * stride) {
                Some(point) => out.push(*point),
                None => break,
            }
        }
        out
    }
}
