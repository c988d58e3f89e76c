//! Actuator and input drivers, plus one-shot GPIO initialisation.

pub mod button;
pub mod hw_init;
pub mod indicator;
pub mod spray;
