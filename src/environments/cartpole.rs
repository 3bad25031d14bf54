//! Cart-pole with a continuous force and friction.
//!
//! Dynamics follow R. V. Florian, "Correct equations for the dynamics of the
//! cart-pole system" (2007), integrated with explicit Euler steps. The action
//! is the force as a fraction of `max_force`, the reward is `cos(theta)`, and
//! the system resets whenever the cart leaves the track.

use ndarray::{array, Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::environment::{Environment, StepOutcome};
use crate::error::{Result, TandemError};

#[derive(Clone, Debug, PartialEq)]
pub struct CartPoleParameters {
    pub cart_mass: f32,
    pub pole_mass: f32,
    pub gravity: f32,
    /// Half of the pole length.
    pub half_length: f32,
    pub cart_friction: f32,
    pub pole_friction: f32,
    pub max_force: f32,
    pub track_limit: f32,
    pub dt: f32,
    /// Standard deviation of the initial pole angle.
    pub reset_noise: f32,
}

impl Default for CartPoleParameters {
    fn default() -> Self {
        CartPoleParameters {
            cart_mass: 1.0,
            pole_mass: 0.1,
            gravity: 9.81,
            half_length: 0.5,
            cart_friction: 0.0005,
            pole_friction: 0.000002,
            max_force: 10.0,
            track_limit: 2.4,
            dt: 0.02,
            reset_noise: 0.1,
        }
    }
}

pub struct CartPole {
    params: CartPoleParameters,
    x: f32,
    x_dot: f32,
    theta: f32,
    theta_dot: f32,
    normal_force: f32,
    resets: usize,
    rng: StdRng,
}

impl CartPole {
    pub fn new() -> Self {
        Self::with_parameters(CartPoleParameters::default(), StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_parameters(CartPoleParameters::default(), StdRng::seed_from_u64(seed))
    }

    pub fn with_parameters(params: CartPoleParameters, rng: StdRng) -> Self {
        let mut cartpole = CartPole {
            params,
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            normal_force: 0.0,
            resets: 0,
            rng,
        };
        cartpole.reset();
        cartpole.resets = 0;
        cartpole
    }

    pub fn parameters(&self) -> &CartPoleParameters {
        &self.params
    }

    /// Times the cart left the track.
    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.x_dot = 0.0;
        self.theta_dot = 0.0;
        self.theta = match Normal::new(0.0, self.params.reset_noise) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        };
        self.normal_force = (self.params.cart_mass + self.params.pole_mass) * self.params.gravity;
        self.resets += 1;
    }

    fn observation(&self) -> Array1<f32> {
        array![self.x, self.x_dot, self.theta, self.theta_dot]
    }

    fn angular_acceleration(&self, force: f32, friction_sign: f32) -> f32 {
        let p = &self.params;
        let total = p.cart_mass + p.pole_mass;
        let (sin, cos) = self.theta.sin_cos();

        let cart_term = (-force
            - p.pole_mass * p.half_length * self.theta_dot.powi(2) * (sin + p.cart_friction * friction_sign * cos))
            / total
            + p.cart_friction * p.gravity * friction_sign;
        let numerator = p.gravity * sin + cos * cart_term
            - p.pole_friction * self.theta_dot / (p.pole_mass * p.half_length);
        let denominator =
            p.half_length * (4.0 / 3.0 - p.pole_mass * cos / total * (cos - p.cart_friction * friction_sign));
        numerator / denominator
    }

    fn step(&mut self, force: f32) {
        let p = self.params.clone();
        let total = p.cart_mass + p.pole_mass;
        let (sin, cos) = self.theta.sin_cos();

        let mut friction_sign = sign(self.normal_force * self.x_dot);
        let mut theta_acc = self.angular_acceleration(force, friction_sign);
        let mut normal_force =
            total * p.gravity - p.pole_mass * p.half_length * (theta_acc * sin + self.theta_dot.powi(2) * cos);
        if sign(normal_force * self.x_dot) != friction_sign {
            friction_sign = sign(normal_force * self.x_dot);
            theta_acc = self.angular_acceleration(force, friction_sign);
            normal_force =
                total * p.gravity - p.pole_mass * p.half_length * (theta_acc * sin + self.theta_dot.powi(2) * cos);
        }

        let x_acc = (force + p.pole_mass * p.half_length * (self.theta_dot.powi(2) * sin - theta_acc * cos)
            - p.cart_friction * normal_force * friction_sign)
            / total;

        self.x += self.x_dot * p.dt;
        self.x_dot += x_acc * p.dt;
        self.theta += self.theta_dot * p.dt;
        self.theta_dot += theta_acc * p.dt;
        self.normal_force = normal_force;
    }
}

fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for CartPole {
    fn state_dim(&self) -> usize {
        4
    }

    fn action_dim(&self) -> usize {
        1
    }

    fn state(&mut self) -> Result<Array1<f32>> {
        Ok(self.observation())
    }

    fn perform_action(&mut self, action: ArrayView1<f32>) -> Result<StepOutcome> {
        if action.len() != 1 {
            return Err(TandemError::dimension_mismatch("1 action".to_string(), format!("{} actions", action.len())));
        }
        let force = action[0].clamp(-1.0, 1.0) * self.params.max_force;
        self.step(force);

        if !self.x.is_finite() || !self.theta.is_finite() {
            self.reset();
            return Err(TandemError::EnvironmentUnavailable("cart-pole state diverged".to_string()));
        }

        let reward = self.theta.cos();
        if self.x.abs() > self.params.track_limit {
            self.reset();
        }
        Ok(StepOutcome { next_state: self.observation(), reward })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright() -> CartPole {
        let params = CartPoleParameters { reset_noise: 0.0, ..Default::default() };
        CartPole::with_parameters(params, StdRng::seed_from_u64(1))
    }

    #[test]
    fn test_upright_pole_earns_full_reward() {
        let mut cartpole = upright();
        let outcome = cartpole.perform_action(array![0.0].view()).unwrap();
        assert!((outcome.reward - 1.0).abs() < 1e-6);
        assert_eq!(outcome.next_state.len(), 4);
    }

    #[test]
    fn test_tilted_pole_falls_further() {
        let mut cartpole = upright();
        cartpole.theta = 0.1;
        for _ in 0..10 {
            cartpole.perform_action(array![0.0].view()).unwrap();
        }
        assert!(cartpole.theta > 0.1);
    }

    #[test]
    fn test_force_pushes_cart() {
        let mut cartpole = upright();
        for _ in 0..5 {
            cartpole.perform_action(array![1.0].view()).unwrap();
        }
        assert!(cartpole.x > 0.0);
    }

    #[test]
    fn test_resets_when_leaving_track() {
        let mut cartpole = upright();
        cartpole.x = 2.39;
        cartpole.x_dot = 5.0;
        cartpole.perform_action(array![1.0].view()).unwrap();
        assert_eq!(cartpole.resets(), 1);
        assert_eq!(cartpole.state().unwrap()[0], 0.0);
    }

    #[test]
    fn test_rejects_wrong_action_size() {
        let mut cartpole = upright();
        assert!(cartpole.perform_action(array![0.0, 1.0].view()).is_err());
    }
}
