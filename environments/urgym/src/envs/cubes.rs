//! Kinematic cube manipulation tasks for a 6-joint arm with a parallel gripper.
//!
//! These are lightweight stand-ins for the physics-backed tasks: the arm moves
//! kinematically, a grasp succeeds when the closed gripper is near the cube and
//! pointing down, and a grasped cube follows the end effector.
//!
//! Two control modes are supported:
//! - `Joint`: 6 joint-angle deltas in `[-1, 1]` plus a gripper closure in `[0, 1]`.
//! - `EndEffector`: 3 position deltas plus a 4-component orientation target
//!   (quaternion, normalized internally) plus a gripper command, all in `[-1, 1]`.

use std::f32::consts::{FRAC_PI_2, PI};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::env::{check_action, Env, Rgb, Scene, Shape, Step, StepInfo};
use crate::error::{EnvError, EnvResult};
use crate::space::BoxSpace;

const CUBE_HALF: f32 = 0.025;
const REST_Z: f32 = CUBE_HALF;
const LIFT_HEIGHT: f32 = 0.15;
const GRASP_RADIUS: f32 = 0.04;
const PUSH_RADIUS: f32 = 0.06;
const GOAL_RADIUS: f32 = 0.05;
const ALIGN_MIN: f32 = 0.8;
const EE_STEP: f32 = 0.05;
const JOINT_STEP: f32 = 0.1;
const GRIPPER_RATE: f32 = 0.5;
const ORIENT_RATE: f32 = 0.3;
const SUCCESS_BONUS: f32 = 10.0;

// Arm geometry: base yaw, then a planar shoulder/elbow chain.
const BASE_Z: f32 = 0.1;
const UPPER_ARM: f32 = 0.3;
const FOREARM: f32 = 0.25;
const JOINT_LOW: [f32; 6] = [-PI, -0.5, -2.5, -PI, -PI, -PI];
const JOINT_HIGH: [f32; 6] = [PI, 1.5, 0.0, PI, PI, PI];
const HOME_JOINTS: [f32; 6] = [0.0, 0.8, -1.6, -0.8, 0.0, 0.0];

/// Gripper pointing straight down: 180 degree rotation about x, as (w, x, y, z).
const Q_DOWN: [f32; 4] = [0.0, 1.0, 0.0, 0.0];

/// How the agent commands the arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Joint,
    EndEffector,
}

/// What the agent must achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Grasp the cube and lift it above `LIFT_HEIGHT`.
    Grasp,
    /// Push the cube into a goal disc on the table.
    Push,
}

/// Kinematic cube environment.
pub struct CubesEnv {
    id: &'static str,
    task: Task,
    control: Control,
    joints: [f32; 6],
    ee: [f32; 3],
    quat: [f32; 4],
    gripper: f32,
    cube: [f32; 3],
    goal: [f32; 2],
    grasped: bool,
    rng: StdRng,
    started: bool,
}

impl CubesEnv {
    pub fn new(id: &'static str, task: Task, control: Control) -> Self {
        let mut env = Self {
            id,
            task,
            control,
            joints: HOME_JOINTS,
            ee: [0.0; 3],
            quat: Q_DOWN,
            gripper: 0.0,
            cube: [0.3, 0.0, REST_Z],
            goal: [0.0, 0.3],
            grasped: false,
            rng: StdRng::from_entropy(),
            started: false,
        };
        env.ee = forward_kinematics(&env.joints);
        env
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn control(&self) -> Control {
        self.control
    }

    /// Cosine-like measure in `[0, 1]` of how close the gripper is to pointing down.
    fn alignment(&self) -> f32 {
        match self.control {
            Control::Joint => {
                let pitch = self.joints[1] + self.joints[2] + self.joints[3];
                (pitch + FRAC_PI_2).cos().max(0.0)
            }
            Control::EndEffector => dot4(&self.quat, &Q_DOWN).abs(),
        }
    }

    fn observation(&self) -> Vec<f32> {
        let mut obs = Vec::with_capacity(19);
        match self.control {
            Control::Joint => obs.extend_from_slice(&self.joints),
            Control::EndEffector => obs.extend_from_slice(&self.quat),
        }
        obs.push(self.gripper);
        obs.extend_from_slice(&self.ee);
        obs.extend_from_slice(&self.cube);
        obs.extend((0..3).map(|i| self.cube[i] - self.ee[i]));
        obs.push(if self.grasped { 1.0 } else { 0.0 });
        obs.extend_from_slice(&self.goal);
        obs
    }

    fn sample_table_point(&mut self) -> [f32; 2] {
        let r = self.rng.gen_range(0.15..0.4);
        let phi = self.rng.gen_range(-PI..PI);
        [r * phi.cos(), r * phi.sin()]
    }

    /// Apply the arm part of the action; returns the end-effector xy displacement.
    fn move_arm(&mut self, action: &[f32]) -> [f32; 2] {
        let before = self.ee;
        match self.control {
            Control::Joint => {
                for i in 0..6 {
                    self.joints[i] =
                        (self.joints[i] + JOINT_STEP * action[i]).clamp(JOINT_LOW[i], JOINT_HIGH[i]);
                }
                self.ee = forward_kinematics(&self.joints);
            }
            Control::EndEffector => {
                self.ee[0] = (self.ee[0] + EE_STEP * action[0]).clamp(-0.5, 0.5);
                self.ee[1] = (self.ee[1] + EE_STEP * action[1]).clamp(-0.5, 0.5);
                self.ee[2] = (self.ee[2] + EE_STEP * action[2]).clamp(0.01, 0.5);

                let target = [action[3], action[4], action[5], action[6]];
                if norm4(&target) > 1e-3 {
                    let mut target = normalize4(&target);
                    // q and -q encode the same rotation; interpolate along the short arc.
                    if dot4(&self.quat, &target) < 0.0 {
                        target.iter_mut().for_each(|c| *c = -*c);
                    }
                    let blended: [f32; 4] =
                        std::array::from_fn(|i| self.quat[i] + ORIENT_RATE * (target[i] - self.quat[i]));
                    self.quat = normalize4(&blended);
                }
            }
        }
        [self.ee[0] - before[0], self.ee[1] - before[1]]
    }

    fn gripper_target(&self, command: f32) -> f32 {
        match self.control {
            Control::Joint => command,
            Control::EndEffector => 0.5 * (command + 1.0),
        }
    }
}

impl Env for CubesEnv {
    fn id(&self) -> &str {
        self.id
    }

    fn observation_space(&self) -> BoxSpace {
        let dim = match self.control {
            Control::Joint => 19,
            Control::EndEffector => 17,
        };
        BoxSpace::uniform(dim, f32::NEG_INFINITY, f32::INFINITY)
    }

    fn action_space(&self) -> BoxSpace {
        match self.control {
            Control::Joint => {
                let mut low = vec![-1.0; 6];
                let mut high = vec![1.0; 6];
                low.push(0.0);
                high.push(1.0);
                BoxSpace::new(low, high)
            }
            Control::EndEffector => BoxSpace::uniform(8, -1.0, 1.0),
        }
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.joints = HOME_JOINTS;
        self.ee = forward_kinematics(&self.joints);
        self.quat = Q_DOWN;
        self.gripper = 0.0;
        self.grasped = false;

        let [cx, cy] = self.sample_table_point();
        self.cube = [cx, cy, REST_Z];
        self.goal = match self.task {
            Task::Grasp => [0.0, 0.0],
            Task::Push => loop {
                let g = self.sample_table_point();
                if dist2(&g, &[cx, cy]) > 3.0 * GOAL_RADIUS {
                    break g;
                }
            },
        };
        self.started = true;
        self.observation()
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        if !self.started {
            return Err(EnvError::NeedsReset);
        }
        let action = check_action(&self.action_space(), action)?;

        let ee_delta = self.move_arm(&action);
        let target = self.gripper_target(action[action.len() - 1]);
        self.gripper += GRIPPER_RATE * (target - self.gripper);
        let closed = self.gripper > 0.5;

        let effort: f32 = action.iter().map(|a| a * a).sum::<f32>() / action.len() as f32;
        let (reward, success) = match self.task {
            Task::Grasp => {
                if !self.grasped
                    && closed
                    && dist3(&self.ee, &self.cube) < GRASP_RADIUS
                    && self.alignment() >= ALIGN_MIN
                {
                    self.grasped = true;
                } else if self.grasped && !closed {
                    self.grasped = false;
                    self.cube[2] = REST_Z;
                }
                if self.grasped {
                    self.cube = [self.ee[0], self.ee[1], self.ee[2].max(REST_Z)];
                }

                let mut reward = -dist3(&self.ee, &self.cube);
                if self.grasped {
                    reward += 1.0 + 5.0 * (self.cube[2] - REST_Z);
                }
                let success = self.grasped && self.cube[2] >= LIFT_HEIGHT;
                (reward, success)
            }
            Task::Push => {
                let horizontal = dist2(&[self.ee[0], self.ee[1]], &[self.cube[0], self.cube[1]]);
                if self.ee[2] < PUSH_RADIUS && horizontal < PUSH_RADIUS {
                    self.cube[0] = (self.cube[0] + ee_delta[0]).clamp(-0.5, 0.5);
                    self.cube[1] = (self.cube[1] + ee_delta[1]).clamp(-0.5, 0.5);
                }
                let to_goal = dist2(&[self.cube[0], self.cube[1]], &self.goal);
                let reward = -to_goal - 0.5 * dist3(&self.ee, &self.cube);
                (reward, to_goal < GOAL_RADIUS)
            }
        };

        Ok(Step {
            observation: self.observation(),
            reward: reward - 0.01 * effort + if success { SUCCESS_BONUS } else { 0.0 },
            terminated: success,
            truncated: false,
            info: StepInfo {
                is_success: success,
                episode: None,
            },
        })
    }

    fn scene(&self) -> Scene {
        let mut scene = Scene::new((-0.55, 0.55), (-0.55, 0.55));
        scene.push(Shape::Rect {
            min: (-0.5, -0.5),
            max: (0.5, 0.5),
            color: Rgb(196, 170, 130),
        });
        if self.task == Task::Push {
            scene.push(Shape::Circle {
                center: (self.goal[0], self.goal[1]),
                radius: GOAL_RADIUS,
                color: Rgb(120, 200, 120),
            });
        }
        let cube_color = if self.grasped { Rgb(60, 160, 60) } else { Rgb(200, 60, 60) };
        let half = CUBE_HALF * (1.0 + self.cube[2]);
        scene.push(Shape::Rect {
            min: (self.cube[0] - half, self.cube[1] - half),
            max: (self.cube[0] + half, self.cube[1] + half),
            color: cube_color,
        });
        scene.push(Shape::Segment {
            from: (0.0, 0.0),
            to: (self.ee[0], self.ee[1]),
            width: 4,
            color: Rgb(90, 90, 110),
        });
        let spread = 0.01 + 0.03 * (1.0 - self.gripper);
        for side in [-1.0, 1.0] {
            scene.push(Shape::Circle {
                center: (self.ee[0] + side * spread, self.ee[1]),
                radius: 0.008 + 0.02 * self.ee[2],
                color: Rgb(40, 40, 60),
            });
        }
        scene
    }
}

/// End-effector position of the arm for the given joint angles.
fn forward_kinematics(q: &[f32; 6]) -> [f32; 3] {
    let reach = UPPER_ARM * q[1].cos() + FOREARM * (q[1] + q[2]).cos();
    let z = BASE_Z + UPPER_ARM * q[1].sin() + FOREARM * (q[1] + q[2]).sin();
    [reach * q[0].cos(), reach * q[0].sin(), z.max(0.0)]
}

fn dot4(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm4(a: &[f32; 4]) -> f32 {
    dot4(a, a).sqrt()
}

fn normalize4(a: &[f32; 4]) -> [f32; 4] {
    let n = norm4(a).max(1e-8);
    std::array::from_fn(|i| a[i] / n)
}

fn dist2(a: &[f32; 2], b: &[f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn dist3(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grasp_ee() -> CubesEnv {
        CubesEnv::new("URGym/CubesGrasp-v1", Task::Grasp, Control::EndEffector)
    }

    #[test]
    fn test_spaces() {
        let joint = CubesEnv::new("URGym/CubesGrasp-v0", Task::Grasp, Control::Joint);
        assert_eq!(joint.action_space().dim(), 7);
        assert_eq!(joint.observation_space().dim(), 19);
        assert_eq!(joint.action_space().low[6], 0.0);

        let ee = grasp_ee();
        assert_eq!(ee.action_space().dim(), 8);
        assert_eq!(ee.observation_space().dim(), 17);
    }

    #[test]
    fn test_observation_matches_space() {
        for control in [Control::Joint, Control::EndEffector] {
            let mut env = CubesEnv::new("test", Task::Push, control);
            let obs = env.reset(Some(3));
            assert_eq!(obs.len(), env.observation_space().dim());
            let step = env.step(&vec![0.1; env.action_space().dim()]).unwrap();
            assert_eq!(step.observation.len(), env.observation_space().dim());
        }
    }

    #[test]
    fn test_home_pose_points_down() {
        let env = CubesEnv::new("test", Task::Grasp, Control::Joint);
        assert!(env.alignment() > 0.99);
        let ee = forward_kinematics(&HOME_JOINTS);
        assert!(ee[2] > 0.0 && ee[2] < 0.3);
    }

    #[test]
    fn test_scripted_grasp_and_lift_succeeds() {
        let mut env = grasp_ee();
        env.reset(Some(11));

        let mut success = false;
        for _ in 0..60 {
            let to_cube = [
                env.cube[0] - env.ee[0],
                env.cube[1] - env.ee[1],
                env.cube[2] - env.ee[2],
            ];
            let near = dist3(&env.ee, &env.cube) < GRASP_RADIUS * 0.5;
            let mut action = vec![0.0; 8];
            if env.grasped {
                action[2] = 1.0;
                action[7] = 1.0;
            } else if near {
                action[7] = 1.0;
            } else {
                for i in 0..3 {
                    action[i] = (to_cube[i] / EE_STEP).clamp(-1.0, 1.0);
                }
                action[7] = -1.0;
            }
            action[3..7].copy_from_slice(&Q_DOWN);
            let step = env.step(&action).unwrap();
            if step.terminated {
                assert!(step.info.is_success);
                assert!(step.reward > 5.0);
                success = true;
                break;
            }
        }
        assert!(success, "scripted policy should lift the cube");
    }

    #[test]
    fn test_open_gripper_never_grasps() {
        let mut env = grasp_ee();
        env.reset(Some(5));
        env.ee = env.cube;
        let mut action = vec![0.0; 8];
        action[7] = -1.0;
        env.step(&action).unwrap();
        assert!(!env.grasped);
    }

    #[test]
    fn test_push_moves_cube() {
        let mut env = CubesEnv::new("URGym/CubesPush-v0", Task::Push, Control::EndEffector);
        env.reset(Some(2));
        let before = env.cube;
        env.ee = [before[0] - 0.03, before[1], 0.02];
        let mut action = vec![0.0; 8];
        action[0] = 1.0;
        env.step(&action).unwrap();
        assert!(env.cube[0] > before[0]);
        assert_eq!(env.cube[1], before[1]);
    }
}
