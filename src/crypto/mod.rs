/// Modular arithmetic primitives.
pub mod field;
