//! Token decoding: transforms, key strategies, the codec registry and the result validator

pub mod builtin;
pub mod key;
pub mod registry;
pub mod remote;
pub mod strategy;
pub mod transform;
pub mod validator;

pub use key::{ContextField, HashAlgo, KeyError, KeyStrategy};
pub use registry::{CodecRegistry, CodecRegistryBuilder, DecodeAttempt, DecodeRun, DecodedUrl};
pub use remote::{RemoteCodec, RemoteCodecConfig};
pub use strategy::{Codec, ContextSelector, Decoder};
pub use transform::{Transform, TransformError};
pub use validator::{infer_stream_type, ResultValidator};
