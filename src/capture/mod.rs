//! Capture Module
//!
//! Decides which completed exchanges are cached and feeds them to the
//! cache engine through the host's interceptor chain.

mod adapter;
mod filter;
mod interceptor;

pub use adapter::CaptureAdapter;
pub use filter::{CaptureFilter, FilterConfig};
pub use interceptor::{Exchange, ExchangeBody, ExchangeInterceptor, InterceptorChain};
