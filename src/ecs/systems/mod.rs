pub mod combat;
pub mod status;
