//! Group kernels executed on the host grid.

pub mod reduction;

pub use reduction::*;
