pub mod buttons;
pub mod config;
pub mod input;
pub mod macros;
pub mod motor;
pub mod protocol;
pub mod runtime;
pub mod state;
pub mod transport;
