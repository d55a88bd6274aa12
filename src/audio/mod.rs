//! Audio input: decoding and resampling

pub mod decoder;

pub use decoder::decode;
