//! Bundled game-type plugins.

pub mod tally;
