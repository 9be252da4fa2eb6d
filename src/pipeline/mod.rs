pub mod acoustic;
pub mod builder;
pub mod defaults;
pub mod duration;
pub(crate) mod model_runtime;
pub mod pitch;
pub mod runtime;
pub(crate) mod session;
pub mod traits;
pub mod variance;

pub use model_runtime::build_engine;
#[cfg(feature = "onnx")]
pub use model_runtime::OrtEngine;
