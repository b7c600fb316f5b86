//! Zhaloba — locally-run legal document analysis and complaint generation.
//!
//! A free-form legal text is analyzed by a local Ollama model into a
//! structured result (summary, key excerpts, detected violations, sender
//! agency and date), and a formal complaint letter addressed to a named
//! agency is generated from that analysis, optionally informed by related
//! documents from the store.
//!
//! The HTTP route layer, file upload / PDF extraction, UI and document
//! export live outside this crate; they talk to it through
//! [`pipeline::DocumentAnalyzer`], [`pipeline::ComplaintPipeline`] and the
//! [`store::DocumentStore`] trait.

pub mod config;
pub mod models;
pub mod pipeline; // prompt building, Ollama orchestration, complaint aggregation
pub mod store; // external record-store collaborator, specified at its interface

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate.
///
/// Honors `RUST_LOG`; falls back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
