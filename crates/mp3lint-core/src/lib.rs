//! mp3lint Core - ID3 rule engine
//!
//! This crate provides the checks for a structured MP3 library: tag
//! field schema, value normalization, cover art policy, canonical path
//! derivation and the walker that applies them to a folder tree.

pub mod artwork;
pub mod check;
pub mod library;
pub mod metadata;
pub mod normalize;
pub mod paths;
pub mod probe;
pub mod report;
pub mod schema;
pub mod siblings;
pub mod tags;

pub use artwork::{ ArtworkCodec, ArtworkError, ImageCodec };
pub use check::{ CheckError, CheckedEntry, Checker, LintOptions };
pub use library::{ LibraryError, LibraryScanner, LibraryWalker };
pub use metadata::{ EmbeddedImage, LibraryEntry, TrackMetadata };
pub use paths::PathRules;
pub use probe::{ BitrateProbe, SymphoniaProbe };
pub use report::{ FileReport, FixRecord, Issue, Relocation, Reporter, RunStats };
pub use schema::FieldPolicy;
pub use tags::{ Id3Store, TagError, TagStore };
