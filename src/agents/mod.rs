//! Agent System
//!
//! Narrative-source agents used by the report pipeline:
//!
//! - **News Agent**: Fetches recent SRAG news for the requested location
//! - **Clinical Protocol Agent**: Extracts diseases from the news and runs one
//!   protocol lookup + summary per disease
//!
//! ```text
//! News items
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Disease    │  → "Influenza A, Covid-19, ..."
//! │ extraction  │
//! └─────────────┘
//!      │  (one per disease, in order)
//!      ▼
//! ┌─────────────┐
//! │  Protocol   │  → search (trusted sources) + summary
//! │   lookup    │
//! └─────────────┘
//! ```

pub mod clinical;
pub mod news;

pub use clinical::{ClinicalProtocolAgent, ProtocolResolution};
pub use news::NewsAgent;
