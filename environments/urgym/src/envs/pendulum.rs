//! Inverted pendulum swing-up.
//!
//! Classic continuous control task: apply a torque to swing a pendulum upright
//! and keep it balanced. There is no terminal state; episodes end through the
//! registry's time limit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::env::{check_action, Env, Rgb, Scene, Shape, Step, StepInfo};
use crate::error::{EnvError, EnvResult};
use crate::space::BoxSpace;

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const G: f32 = 10.0;
const M: f32 = 1.0;
const L: f32 = 1.0;

/// Single-instance pendulum.
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,
    last_torque: f32,
    rng: StdRng,
    started: bool,
}

impl Pendulum {
    pub const ID: &'static str = "Pendulum-v1";

    pub fn new() -> Self {
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            last_torque: 0.0,
            rng: StdRng::from_entropy(),
            started: false,
        }
    }

    fn observation(&self) -> Vec<f32> {
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for Pendulum {
    fn id(&self) -> &str {
        Self::ID
    }

    fn observation_space(&self) -> BoxSpace {
        BoxSpace::new(vec![-1.0, -1.0, -MAX_SPEED], vec![1.0, 1.0, MAX_SPEED])
    }

    fn action_space(&self) -> BoxSpace {
        BoxSpace::uniform(1, -MAX_TORQUE, MAX_TORQUE)
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.theta = self.rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.last_torque = 0.0;
        self.started = true;
        self.observation()
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        if !self.started {
            return Err(EnvError::NeedsReset);
        }
        let torque = check_action(&self.action_space(), action)?[0];

        let theta = self.theta;
        let theta_dot = self.theta_dot;
        let cost = theta * theta + 0.1 * theta_dot * theta_dot + 0.001 * torque * torque;

        let new_theta_dot = theta_dot
            + (3.0 * G / (2.0 * L) * theta.sin() + 3.0 / (M * L * L) * torque) * DT;
        let new_theta_dot = new_theta_dot.clamp(-MAX_SPEED, MAX_SPEED);

        self.theta = angle_normalize(theta + new_theta_dot * DT);
        self.theta_dot = new_theta_dot;
        self.last_torque = torque;

        Ok(Step {
            observation: self.observation(),
            reward: -cost,
            terminated: false,
            truncated: false,
            info: StepInfo::default(),
        })
    }

    fn scene(&self) -> Scene {
        let mut scene = Scene::new((-1.3, 1.3), (-1.3, 1.3));
        let tip = (L * self.theta.sin(), L * self.theta.cos());
        scene.push(Shape::Segment {
            from: (0.0, 0.0),
            to: tip,
            width: 6,
            color: Rgb(204, 77, 77),
        });
        scene.push(Shape::Circle {
            center: (0.0, 0.0),
            radius: 0.05,
            color: Rgb(30, 30, 30),
        });
        // Torque indicator along the bottom edge.
        scene.push(Shape::Rect {
            min: (0.0_f32.min(self.last_torque / MAX_TORQUE), -1.25),
            max: (0.0_f32.max(self.last_torque / MAX_TORQUE), -1.15),
            color: Rgb(70, 110, 200),
        });
        scene
    }
}

fn angle_normalize(angle: f32) -> f32 {
    let pi = std::f32::consts::PI;
    let two_pi = 2.0 * pi;
    ((angle + pi) % two_pi + two_pi) % two_pi - pi
}
