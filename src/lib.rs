pub mod config;
pub mod input;
pub mod intent;
pub mod motor;
pub mod runtime;
