mod auth_service;
mod credential_hasher;
mod token_codec;
mod user_service;

pub use auth_service::*;
pub use credential_hasher::*;
pub use token_codec::*;
pub use user_service::*;
