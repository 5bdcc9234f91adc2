//! Reading training matrices and writing sampled matrices.

#[cfg(feature = "csv")]
pub mod csv;
