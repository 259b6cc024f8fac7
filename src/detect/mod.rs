mod backend;
mod backends;
mod decode;
mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use decode::decode_rows;
pub use result::RawDetection;
