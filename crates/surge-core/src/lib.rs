pub mod check;
pub mod engine;
pub mod error;
pub mod http;
pub mod results;
pub mod scenario;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::SurgeError;
