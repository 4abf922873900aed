pub mod genotyper;
pub mod support;
