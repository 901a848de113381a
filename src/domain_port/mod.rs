mod credential_repo;
mod refresh_token_store;
mod secret;
mod store_error;

pub use credential_repo::*;
pub use refresh_token_store::*;
pub use secret::*;
pub use store_error::*;
