mod axum_layer;
mod bypass;
mod claims;
mod error;

pub use axum_layer::{AuthzState, authz_middleware};
pub use be_auth_core::*;
pub use bypass::is_public_route;
pub use claims::AuthUser;
pub use error::{AuthzError, ErrorBody, error_response};
