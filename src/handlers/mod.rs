pub mod guest;

pub use guest::guest_config;
