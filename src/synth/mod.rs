pub mod chords;
pub mod drums;
pub mod note;
