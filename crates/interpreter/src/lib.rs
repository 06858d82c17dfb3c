//! Natural-language command interpretation.
//!
//! Free text becomes a structured [`Command`](webpilot_core_types::Command)
//! through a fixed cascade: workflow markers, connective splitting, an
//! ordered single-command rule table, and finally a model-service fallback.
//! This is deliberately a bounded rule table, not a grammar.

mod interpreter;
mod llm;
mod rules;
mod sites;
mod suggest;
mod time;

pub use interpreter::CommandInterpreter;
pub use sites::{canonical_site_url, lookup_site};
pub use suggest::command_suggestions;
pub use time::TimeResolver;
