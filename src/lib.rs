//! # Tandem - Asynchronous Actor/Learner Reinforcement Learning
//!
//! Tandem runs an agent in a continuous-state, continuous-action environment
//! while it learns. A single control-loop thread keeps acting; value and
//! policy training run in the background and their results are swapped into
//! the live estimators as whole parameter sets.
//!
//! ## Key Features
//!
//! - **Experience buffer**: bounded, shared, random-replacement eviction
//! - **Estimators**: lock-guarded value and policy models with input/output normalization
//! - **Background training**: cancellable dataset builders and async optimizers
//! - **Epoch gating**: the value side stays at most one epoch ahead of the policy side
//! - **Persistence**: four artifacts per save, written and loaded as a unit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::builders::LearnerBuilder;
//! use tandem::environments::CartPole;
//!
//! let mut learner = LearnerBuilder::new()
//!     .environment(CartPole::new())
//!     .sample_size(500)
//!     .build()?;
//! learner.start()?;
//! // ... later
//! learner.stop()?;
//! learner.save("cartpole")?;
//! # Ok::<(), tandem::error::TandemError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`actions`] - Action clipping, exploration and candidate actions
//! - [`activations`] - Activation functions
//! - [`builders`] - Fluent construction of a learner
//! - [`config`] - Learner and optimizer settings
//! - [`dataset`] - Training sets with fitted normalization
//! - [`dataset_builder`] - Background dataset construction
//! - [`environment`] - The environment capability
//! - [`environments`] - Built-in environments
//! - [`error`] - Error types and result handling
//! - [`estimator`] - Value and policy estimators
//! - [`layers`] - Dense layers and weight initialization
//! - [`learner`] - The actor/learner coordinator
//! - [`loss`] - Regression losses
//! - [`network`] - Feed-forward network
//! - [`normalization`] - Mean/variance preprocessing
//! - [`optimizer`] - Parameter update rules and gradient clipping
//! - [`replay_buffer`] - Experience buffer
//! - [`training`] - Background optimizers

pub mod actions;
pub mod activations;
pub mod builders;
pub mod config;
pub mod dataset;
pub mod dataset_builder;
pub mod environment;
pub mod environments;
pub mod error;
pub mod estimator;
pub mod layers;
pub mod learner;
pub mod loss;
pub mod network;
pub mod normalization;
pub mod optimizer;
pub mod replay_buffer;
pub mod training;

#[cfg(test)]
mod tests;
