//! Static website generator for a git repository.
//!
//! One page per branch with the ancestry graph, one directory per commit with
//! its file tree and diffs to every parent, and rendered blob pages shared
//! between commits through a content-addressed store. Reruns only build
//! commits that are new since the last run.

pub mod backend;
pub mod config;
pub mod gix_backend;
pub mod graph;
mod html;
mod lanes;
pub mod objects;
mod patch;
pub mod planner;
pub mod render;
pub mod site;

#[cfg(test)]
mod test_helpers;

pub use backend::{Backend, BackendError};
pub use config::{Config, ConfigError, Overrides};
pub use gix_backend::GixBackend;
pub use site::RunSummary;

/// Builds the site for `config`, reading the repository with `gix`.
pub fn build_site(config: &Config) -> anyhow::Result<RunSummary> {
    let backend = GixBackend::open(&config.repository)?;
    site::run(config, &backend)
}
