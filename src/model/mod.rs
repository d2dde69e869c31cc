pub mod context;
pub mod event;
pub mod function_config;
pub mod key;
pub mod spec;
