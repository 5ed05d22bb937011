//! The closed set of supported operators (spec §6). Any graph referencing an
//! id outside this set fails the compilation check with
//! [`crate::error::Error::UnsupportedOp`], replacing the teacher's
//! virtual-dispatch-over-a-class-hierarchy style
//! (`thorn-core/src/protocol/*.rs`'s closed generated message enums) with a
//! plain Rust enum plus a `match`-based dispatch table, per the Design Note
//! asking for "a closed tagged set of operator ids plus a dispatch table."

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One of the 26 operators the executor can compile and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpId {
	Add,
	AvgPool,
	BatchNormInference,
	BoundedRelu,
	Broadcast,
	Concat,
	Constant,
	Convolution,
	Divide,
	Dot,
	Exp,
	Max,
	MaxPool,
	Minimum,
	Multiply,
	Negative,
	Pad,
	Parameter,
	Power,
	Relu,
	Reshape,
	Result,
	Reverse,
	Slice,
	Softmax,
	Subtract,
	Sum,
}

impl OpId {
	/// True for ops whose output must be `rescale`d after the kernel runs
	/// (spec §4.3: "for multiplicative kernels, apply rescale to every
	/// output slot").
	pub fn is_multiplicative(&self) -> bool {
		matches!(
			self,
			OpId::Multiply | OpId::Divide | OpId::Dot | OpId::Convolution | OpId::BatchNormInference | OpId::Power
		)
	}

	/// True for ops whose ciphertext operands must be offloaded to the
	/// client rather than approximated locally (spec §4.3, §4.5).
	pub fn requires_client_offload_on_cipher(&self) -> bool {
		matches!(self, OpId::Relu | OpId::BoundedRelu | OpId::MaxPool)
	}

	/// True for ops spec §4.3 calls out as not privacy-preserving without a
	/// client: evaluated in plaintext and expected to warn when any operand
	/// is encrypted.
	pub fn warns_if_encrypted(&self) -> bool {
		matches!(self, OpId::Exp | OpId::Power | OpId::Softmax | OpId::Max)
	}

	/// True for ops that preserve the `packed` annotation across their
	/// inputs (spec §9 Design Notes / annotation propagation): elementwise
	/// and reduction ops that don't reinterpret the batch axis.
	pub fn preserves_packing(&self) -> bool {
		!matches!(self, OpId::Reshape | OpId::Broadcast | OpId::Slice | OpId::Concat | OpId::Reverse)
	}
}

impl FromStr for OpId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Ok(match s {
			"Add" => OpId::Add,
			"AvgPool" => OpId::AvgPool,
			"BatchNormInference" => OpId::BatchNormInference,
			"BoundedRelu" => OpId::BoundedRelu,
			"Broadcast" => OpId::Broadcast,
			"Concat" => OpId::Concat,
			"Constant" => OpId::Constant,
			"Convolution" => OpId::Convolution,
			"Divide" => OpId::Divide,
			"Dot" => OpId::Dot,
			"Exp" => OpId::Exp,
			"Max" => OpId::Max,
			"MaxPool" => OpId::MaxPool,
			"Minimum" => OpId::Minimum,
			"Multiply" => OpId::Multiply,
			"Negative" => OpId::Negative,
			"Pad" => OpId::Pad,
			"Parameter" => OpId::Parameter,
			"Power" => OpId::Power,
			"Relu" => OpId::Relu,
			"Reshape" => OpId::Reshape,
			"Result" => OpId::Result,
			"Reverse" => OpId::Reverse,
			"Slice" => OpId::Slice,
			"Softmax" => OpId::Softmax,
			"Subtract" => OpId::Subtract,
			"Sum" => OpId::Sum,
			other => return Err(Error::UnsupportedOp(other.to_string())),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_unknown_operator_id() {
		assert!(matches!(OpId::from_str("Transpose"), Err(Error::UnsupportedOp(_))));
	}

	#[test]
	fn accepts_every_supported_operator_id() {
		let names = [
			"Add", "AvgPool", "BatchNormInference", "BoundedRelu", "Broadcast", "Concat", "Constant",
			"Convolution", "Divide", "Dot", "Exp", "Max", "MaxPool", "Minimum", "Multiply", "Negative",
			"Pad", "Parameter", "Power", "Relu", "Reshape", "Result", "Reverse", "Slice", "Softmax",
			"Subtract", "Sum",
		];
		for name in names {
			assert!(OpId::from_str(name).is_ok(), "{name} should parse");
		}
	}

	#[test]
	fn multiplicative_ops_require_rescale() {
		assert!(OpId::Multiply.is_multiplicative());
		assert!(!OpId::Add.is_multiplicative());
	}

	#[test]
	fn reshape_does_not_preserve_packing() {
		assert!(!OpId::Reshape.preserves_packing());
		assert!(OpId::Add.preserves_packing());
	}
}
