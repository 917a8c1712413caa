pub mod check_trigger;
pub mod generate;
pub mod resolve;
