//! Transparency module for the CTA sensor agent.
//!
//! Keeps an auditable count of what was observed and how often the user
//! was interrupted.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
