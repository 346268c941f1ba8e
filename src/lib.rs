//! Symbolic program generator for spin-free multireference electron
//! correlation methods: second-quantized operator algebra, Wick
//! contraction, reduced-density-matrix resolution, binary-contraction
//! factorization, and task-graph code emission.

mod config;
mod diagram;
mod emit;
mod equation;
mod error;
mod index;
mod list_tensor;
mod operator;
mod rdm;
mod tensor;
mod tree;
mod wick;

pub use config::MethodConfig;
pub use diagram::{DeltaPair, Diagram};
pub use emit::prefac;
pub use equation::{Equation, TreeType};
pub use error::{Error, Result};
pub use index::{Index, Space};
pub use list_tensor::ListTensor;
pub use operator::{DaggerKind, Operator, OperatorSlot};
pub use tensor::Tensor;
pub use tree::{BinaryContraction, PrintTree, Tree};
