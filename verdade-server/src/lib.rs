//! HTTP surface of the fact-check service: `POST /api/verify` (multipart)
//! and `GET /health`.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use router::create_router;
pub use state::AppState;
