pub mod config;
pub mod error;
pub mod forward;
pub mod interceptor;
pub mod postprocess;
pub mod proxy;
pub mod remap;
pub mod sse;
