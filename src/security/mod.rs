//! Secret hygiene utilities
//!
//! Private key bytes that are decoded transiently (imports, exports) are
//! carried in zeroize-on-drop buffers.

pub mod zeroize;

pub use zeroize::{new_secret_string, SecureBytes};
