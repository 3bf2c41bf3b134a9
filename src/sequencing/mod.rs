pub mod seed;
pub mod theory;

pub use seed::Bucket;
pub use theory::{midi_to_freq, parse_note, Mode, TheoryError};
