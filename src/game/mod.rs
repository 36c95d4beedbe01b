pub mod constants;
pub mod settings;
pub mod error;
pub mod events;
pub mod state;
pub mod systems;
pub mod match_result;
pub mod engine;
pub mod input_buffer;
