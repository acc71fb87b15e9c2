//! Storage-word codecs shared by the hook and the snapshot edge.

pub mod conversions;
