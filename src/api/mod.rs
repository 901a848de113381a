pub mod v1;

mod middleware;
pub use middleware::*;
