//! Selects the target quantum-chemistry method the emitted code is built
//! for. In the original generator this was a compile-time `#define` in
//! `constants.h`; here it is a runtime parameter to the emitter, since it
//! only changes the text the emitter produces (scalar type name, BLAS
//! symbol triple, the `fac2` double-occupancy constant), not this crate's
//! own control flow.

/// Real and relativistic variants of the supported methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodConfig {
    Caspt2,
    CasA,
    MultiDeriv,
    Mrci,
    RelCaspt2,
    RelCasA,
    RelMrci,
}

impl MethodConfig {
    /// True for the relativistic (complex-scalar) variants.
    pub fn is_relativistic(&self) -> bool {
        matches!(self, Self::RelCaspt2 | Self::RelCasA | Self::RelMrci)
    }

    /// Scalar type name used in emitted declarations.
    pub fn data_type(&self) -> &'static str {
        if self.is_relativistic() { "std::complex<double>" } else { "double" }
    }

    pub fn matrix_type(&self) -> &'static str {
        if self.is_relativistic() { "ZMatrix" } else { "Matrix" }
    }

    /// Double-occupancy factor: 2.0 for real (non-relativistic) methods,
    /// 1.0 for complex (relativistic) ones.
    pub fn fac2(&self) -> f64 {
        if self.is_relativistic() { 1.0 } else { 2.0 }
    }

    pub fn gemm(&self) -> &'static str {
        if self.is_relativistic() { "zgemm3m_" } else { "dgemm_" }
    }

    pub fn dot(&self) -> &'static str {
        if self.is_relativistic() { "zdotu_" } else { "ddot_" }
    }

    pub fn scal(&self) -> &'static str {
        if self.is_relativistic() { "zscal_" } else { "dscal_" }
    }
}
