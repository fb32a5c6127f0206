//! Fact-check verification: prompt assembly, upstream call and response
//! normalization.
//!
//! - [`prompt`]: builds the system instruction and ordered content parts
//! - [`normalize`]: converts raw model text into a [`VerdictRecord`]; total
//! - [`Verifier`]: runs one [`VerificationRequest`] end to end
pub mod error;
pub mod normalize;
pub mod prompt;
pub mod service;
pub mod types;

pub use error::VerifyError;
pub use service::{demo_record, Verifier, VerifierOptions};
pub use types::{ImageUpload, InputKind, Verdict, VerdictRecord, VerificationRequest};
