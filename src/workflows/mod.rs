pub mod bonus;
pub mod divergence;
