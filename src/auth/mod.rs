pub mod middleware;
pub mod role;

pub use middleware::Caller;
pub use role::Role;
