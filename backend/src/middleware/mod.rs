//! Request middleware: trace identifiers and origin admission.

pub mod origin;
pub mod trace;

pub use origin::{AllowedOrigins, OriginGate, OriginParseError};
pub use trace::Trace;
