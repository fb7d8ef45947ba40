pub mod collectors;
pub mod generators;
pub mod health;
pub mod sweep;
