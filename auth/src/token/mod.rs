pub mod claims;
pub mod errors;
pub mod issuer;

pub use claims::Claims;
pub use claims::TokenPurpose;
pub use errors::TokenError;
pub use issuer::TokenIssuer;
