pub mod check;
pub mod index;
