pub mod learner;

pub use learner::LearnerBuilder;
