pub mod collision;
pub mod gates;
pub mod geometry;
pub mod movement;
pub mod rooms;
