pub mod client;

pub use client::{HttpExecutor, HttpExecutorBuilder};
