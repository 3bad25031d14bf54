//! Built-in environments.

pub mod cartpole;

pub use cartpole::{CartPole, CartPoleParameters};
