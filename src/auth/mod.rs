mod helpers;
mod middleware;
mod token;

pub use helpers::{
    TokenValidationError, ValidatedToken, extract_token_from_header, issue_token, validate_token,
};
pub use middleware::{AuthError, Authenticated, RequireAdmin, RequireHookSecret};
pub use token::{IssuedToken, TokenGenerator, generate_hook_secret, parse_token, secrets_match};
