pub mod hostile_ai;
