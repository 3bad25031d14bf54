pub mod test_estimators;
pub mod test_layers;
pub mod test_replay_buffer;
