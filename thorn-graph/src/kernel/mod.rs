//! Per-operator kernels (spec §4.3). Each submodule implements the
//! `K(args, out, op_params, type, batch_size, context)` contract for one
//! family of operators; [`crate::executor`] owns the dispatch table that
//! routes an [`crate::op::OpId`] to the right function here.

pub mod batch_norm;
pub mod context;
pub mod elementwise;
pub mod nonlinear;
pub mod reduce;
pub mod structural;

pub use context::KernelContext;
