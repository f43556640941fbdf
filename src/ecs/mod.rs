pub mod components;
pub mod registry;
pub mod systems;
pub mod world;
