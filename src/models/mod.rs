pub mod attempt;
pub mod class;
pub mod quiz;
pub mod user;
