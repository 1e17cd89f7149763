pub mod code_store;
pub mod domain_policy;
pub mod guest_account_service;
pub mod rate_limiter;
pub mod verification_service;

pub use code_store::*;
pub use domain_policy::*;
pub use guest_account_service::*;
pub use rate_limiter::*;
pub use verification_service::*;
