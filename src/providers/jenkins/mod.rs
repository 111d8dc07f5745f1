mod cache;
mod client;
mod fetcher;
mod types;

pub use cache::DownstreamCache;
pub use client::JenkinsClient;
