//! Backend selection for the Burn framework.
//!
//! NdArray (CPU) is the default backend; enabling the `cuda` feature swaps
//! in the CUDA backend for GPU execution. Fine-tuning always runs on the
//! autodiff wrapper; inference uses the inner backend.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for fine-tuning.
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Default device of the compiled backend.
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Human-readable name of the compiled backend.
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
