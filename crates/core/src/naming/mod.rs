//! Episode naming: numeric token extraction and canonical name rendering.
//!
//! Everything in this module is pure. Interactive episode-index selection is
//! injected by callers as an [`EpisodeIndexResolver`] so the core never talks
//! to a console.

mod scheme;
mod tokens;

use std::sync::Arc;

pub use scheme::NamingScheme;
pub use tokens::{
    base_name, extension, extract_numbers, shift_episode, top_folder, with_file_name,
};

/// Resolves which extracted numeric token is the episode number.
///
/// Receives the tokens extracted from a representative filename and returns
/// the zero-based index of the episode token plus a signed adjustment applied
/// to every computed episode number. `None` means the caller declined to
/// choose and the operation cannot proceed.
pub type EpisodeIndexResolver = Arc<dyn Fn(&[String]) -> Option<(usize, i64)> + Send + Sync>;
