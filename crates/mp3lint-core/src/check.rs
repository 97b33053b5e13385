//! Per-file check orchestration
//!
//! Runs every rule against one [`LibraryEntry`] in a fixed order and,
//! in fix mode, persists the corrected metadata once at the end.

use std::path::PathBuf;

use thiserror::Error;

use crate::artwork::{ self, ArtworkCodec, ArtworkError };
use crate::metadata::{ LibraryEntry, TrackMetadata };
use crate::normalize;
use crate::paths::{ self, PathRules };
use crate::probe::{ BitrateProbe, DEFAULT_BITRATE_KBPS };
use crate::report::{ Findings, FixRecord, Issue };
use crate::schema::{ self, FieldPolicy };
use crate::siblings::SiblingSet;
use crate::tags::{ TagError, TagStore };


/// Tag version every file is expected to carry.
const EXPECTED_TAG_VERSION: u8 = 3;


/// Errors that abort the check of a single file.
#[derive( Debug, Error )]
pub enum CheckError {
    #[error( "Cover art error: {0}" )]
    Artwork( #[from] ArtworkError ),

    #[error( "Tag error: {0}" )]
    Tag( #[from] TagError ),
}


/// Options shared by every check of a run.
#[derive( Debug, Clone, Default )]
pub struct LintOptions {
    /// Apply fixes instead of only reporting them.
    pub fix: bool,
    pub paths: PathRules,
    pub fields: FieldPolicy,
}


/// Everything the checks found for one file.
#[derive( Debug, Clone, Default )]
pub struct CheckOutcome {
    pub issues: Vec<Issue>,
    pub fixes: Vec<FixRecord>,
    /// `None` when the file already sits at its canonical path.
    pub canonical_path: Option<PathBuf>,
    pub bitrate_kbps: u32,
}


/// A library entry after checking.
#[derive( Debug, Clone )]
pub struct CheckedEntry {
    pub path: PathBuf,
    pub metadata: TrackMetadata,
    pub outcome: CheckOutcome,
}


/// Applies all rules to library entries.
pub struct Checker<'a> {
    options: &'a LintOptions,
    tags: &'a dyn TagStore,
    artwork: &'a dyn ArtworkCodec,
    probe: &'a dyn BitrateProbe,
}


impl<'a> Checker<'a> {
    pub fn new(
        options: &'a LintOptions,
        tags: &'a dyn TagStore,
        artwork: &'a dyn ArtworkCodec,
        probe: &'a dyn BitrateProbe,
    ) -> Self {
        Self { options, tags, artwork, probe }
    }


    pub fn options( &self ) -> &LintOptions {
        self.options
    }


    /// Checks one entry against the rules, fixing it when enabled.
    pub fn check( &self, entry: LibraryEntry, siblings: &SiblingSet ) -> Result<CheckedEntry, CheckError> {
        let LibraryEntry { path, mut metadata } = entry;
        let fix = self.options.fix;
        let mut findings = Findings::new();

        if metadata.version != EXPECTED_TAG_VERSION {
            findings.issue( format!( "Incorrect tag version {}", metadata.version ) );
        }

        let has_album = metadata.has_album();
        if has_album {
            findings.extend( normalize::check_numbers( &mut metadata, fix ) );
            findings.extend( normalize::check_album_values( &metadata ) );
        }

        findings.extend( normalize::check_characters( &mut metadata, fix ) );
        findings.extend( artwork::check_cover( &mut metadata, self.artwork, fix )? );
        findings.extend( schema::check_fields( &mut metadata, &self.options.fields, fix ) );

        if has_album {
            findings.extend( check_siblings( &metadata, siblings ) );
        }

        let derived = paths::derive( &path, &metadata, &self.options.paths );
        findings.extend( derived.findings );

        if fix && !findings.fixes.is_empty() {
            self.tags.write( &path, &metadata )?;
            tracing::debug!( "Applied {} fixes to {:?}", findings.fixes.len(), path );
        }

        let bitrate_kbps = self.probe.bitrate_kbps( &path ).unwrap_or( DEFAULT_BITRATE_KBPS );

        Ok( CheckedEntry {
            path,
            metadata,
            outcome: CheckOutcome {
                issues: findings.issues,
                fixes: findings.fixes,
                canonical_path: derived.canonical,
                bitrate_kbps,
            },
        })
    }
}


/// Compares the folder contents with the declared track numbering.
fn check_siblings( meta: &TrackMetadata, siblings: &SiblingSet ) -> Findings {
    let mut findings = Findings::new();

    let total = meta.track_total() as usize;
    let folder_size = siblings.folder_size();
    if total > 0 && folder_size != total {
        findings.issue( format!(
            "Found {} files in folder, but expected {} tracks", folder_size, total
        ) );
    }

    let prefix = format!( "{:02} - ", meta.track_number() );
    match siblings.count_named_with_prefix( &prefix ) {
        0 => findings.fix( "Found no tracks with current track number, expected exactly 1" ),
        1 => {}
        n => findings.issue( format!(
            "Found {} tracks with current track number, but expected exactly 1", n
        ) ),
    }

    findings
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;

    use id3::frame::PictureType;

    use crate::metadata::{ EmbeddedImage, ALBUM, DISC, TRACK };


    /// Tag store that records writes instead of touching files.
    #[derive( Default )]
    struct MemoryStore {
        written: RefCell<BTreeMap<PathBuf, TrackMetadata>>,
    }


    impl TagStore for MemoryStore {
        fn read( &self, path: &Path ) -> Result<TrackMetadata, TagError> {
            self.written
                .borrow()
                .get( path )
                .cloned()
                .ok_or_else( || TagError::NotFound( path.to_path_buf() ) )
        }


        fn write( &self, path: &Path, metadata: &TrackMetadata ) -> Result<(), TagError> {
            self.written.borrow_mut().insert( path.to_path_buf(), metadata.clone() );
            Ok(())
        }
    }


    struct EchoCodec;


    impl ArtworkCodec for EchoCodec {
        fn reencode( &self, data: &[u8], _mime_type: &str, _shrink: bool ) -> Result<Vec<u8>, ArtworkError> {
            Ok( data.to_vec() )
        }
    }


    struct FixedProbe( Option<u32> );


    impl BitrateProbe for FixedProbe {
        fn bitrate_kbps( &self, _path: &Path ) -> Option<u32> {
            self.0
        }
    }


    fn album_track( track: &str ) -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Tired of Being Alone".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            album: Some( vec![ "Gets Next to You".into() ] ),
            year: Some( vec![ "1971".into() ] ),
            track: Some( vec![ track.into() ] ),
            disc: Some( vec![ "1/1".into() ] ),
            images: vec![ EmbeddedImage::front_cover( vec![ 0xff, 0xd8 ], "image/jpeg" ) ],
            ..Default::default()
        }
    }


    fn run(
        options: &LintOptions,
        store: &MemoryStore,
        files: &[PathBuf],
        index: usize,
        metadata: TrackMetadata,
    ) -> CheckedEntry {
        let probe = FixedProbe( Some( 320 ) );
        let checker = Checker::new( options, store, &EchoCodec, &probe );
        let siblings = SiblingSet::new( files, &files[ index ] );
        let entry = LibraryEntry { path: files[ index ].clone(), metadata };
        checker.check( entry, &siblings ).unwrap()
    }


    fn album_folder( names: &[&str] ) -> Vec<PathBuf> {
        names
            .iter()
            .map( |n| PathBuf::from( format!( "/m/Al Green/[1971] Gets Next to You/{}", n ) ) )
            .collect()
    }


    #[test]
    fn test_compliant_album_track() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let checked = run( &LintOptions::default(), &store, &files, 0, album_track( "1/1" ) );

        assert!( checked.outcome.issues.is_empty(), "{:?}", checked.outcome.issues );
        assert!( checked.outcome.fixes.is_empty(), "{:?}", checked.outcome.fixes );
        assert_eq!( checked.outcome.canonical_path, None );
        assert_eq!( checked.outcome.bitrate_kbps, 320 );
    }


    #[test]
    fn test_zero_padded_track_is_fixed_and_written() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let options = LintOptions { fix: true, ..Default::default() };
        let checked = run( &options, &store, &files, 0, album_track( "01/1" ) );

        assert!( checked.outcome.issues.is_empty(), "{:?}", checked.outcome.issues );
        assert_eq!( checked.outcome.fixes.len(), 1 );
        assert_eq!( checked.outcome.fixes[ 0 ].as_str(), "Zero padded track number" );
        assert_eq!( checked.metadata.text( TRACK ), Some( &vec![ "1/1".to_string() ] ) );

        let written = store.read( &files[ 0 ] ).unwrap();
        assert_eq!( written.text( TRACK ), Some( &vec![ "1/1".to_string() ] ) );
    }


    #[test]
    fn test_dry_run_never_writes() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let checked = run( &LintOptions::default(), &store, &files, 0, album_track( "01/1" ) );

        assert_eq!( checked.outcome.fixes.len(), 1 );
        assert_eq!( checked.metadata.text( TRACK ), Some( &vec![ "01/1".to_string() ] ) );
        assert!( store.written.borrow().is_empty() );
    }


    #[test]
    fn test_missing_total_and_disc() {
        // Album track without totals and without a disc frame
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let mut meta = album_track( "1" );
        meta.remove_field( DISC );
        let checked = run( &LintOptions::default(), &store, &files, 0, meta );

        let issues: Vec<&str> = checked.outcome.issues.iter().map( Issue::as_str ).collect();
        assert_eq!( issues, vec![ "No total track specified", "Missing required TPOS field" ] );
        assert!( checked.outcome.fixes.is_empty() );
    }


    #[test]
    fn test_wrong_tag_version() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let mut meta = album_track( "1/1" );
        meta.version = 4;
        let checked = run( &LintOptions::default(), &store, &files, 0, meta );

        assert_eq!( checked.outcome.issues[ 0 ].as_str(), "Incorrect tag version 4" );
    }


    #[test]
    fn test_fix_keeps_tag_version() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let options = LintOptions { fix: true, ..Default::default() };
        let mut meta = album_track( "01/1" );
        meta.version = 4;
        let checked = run( &options, &store, &files, 0, meta );

        assert_eq!( checked.outcome.issues[ 0 ].as_str(), "Incorrect tag version 4" );
        assert_eq!( checked.outcome.fixes[ 0 ].as_str(), "Zero padded track number" );
        assert_eq!( store.read( &files[ 0 ] ).unwrap().version, 4 );
    }


    #[test]
    fn test_folder_size_mismatch() {
        let files = album_folder( &[
            "01 - Tired of Being Alone.mp3",
            "02 - Let's Stay Together.mp3",
        ] );
        let store = MemoryStore::default();
        let checked = run( &LintOptions::default(), &store, &files, 0, album_track( "1/3" ) );

        let issues: Vec<&str> = checked.outcome.issues.iter().map( Issue::as_str ).collect();
        assert_eq!( issues, vec![ "Found 2 files in folder, but expected 3 tracks" ] );
    }


    #[test]
    fn test_duplicate_track_numbers() {
        let files = album_folder( &[
            "01 - Tired of Being Alone.mp3",
            "01 - Let's Stay Together.mp3",
        ] );
        let store = MemoryStore::default();
        let checked = run( &LintOptions::default(), &store, &files, 0, album_track( "1/2" ) );

        assert!( checked.outcome.issues.iter().any( |i| {
            i.as_str() == "Found 2 tracks with current track number, but expected exactly 1"
        }) );
    }


    #[test]
    fn test_misnamed_track_is_fixable_and_moved() {
        let files = album_folder( &[ "track one.mp3" ] );
        let store = MemoryStore::default();
        let checked = run( &LintOptions::default(), &store, &files, 0, album_track( "1/1" ) );

        assert!( checked.outcome.issues.is_empty(), "{:?}", checked.outcome.issues );
        assert_eq!(
            checked.outcome.fixes[ 0 ].as_str(),
            "Found no tracks with current track number, expected exactly 1"
        );
        assert_eq!(
            checked.outcome.canonical_path,
            Some( PathBuf::from( "/m/Al Green/[1971] Gets Next to You/01 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_solo_track_in_wrong_artist_folder() {
        // Redundant track frame is fixable, the folder name is not
        let files = vec![ PathBuf::from( "/m/Soul/old name.mp3" ) ];
        let store = MemoryStore::default();
        let mut meta = album_track( "1/1" );
        meta.remove_field( ALBUM );
        meta.remove_field( DISC );
        let checked = run( &LintOptions::default(), &store, &files, 0, meta );

        let fixes: Vec<&str> = checked.outcome.fixes.iter().map( FixRecord::as_str ).collect();
        assert_eq!( fixes, vec![ "Redundant field TRCK present" ] );
        assert_eq!( checked.outcome.issues.len(), 1 );
        assert!( checked.outcome.issues[ 0 ].as_str().starts_with( "File might not be stored in the right artist folder" ) );
        assert_eq!(
            checked.outcome.canonical_path,
            Some( PathBuf::from( "/m/Soul/Al Green - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_images_without_front_cover_are_left_alone() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let options = LintOptions { fix: true, ..Default::default() };
        let mut meta = album_track( "1/1" );
        let mut back = EmbeddedImage::front_cover( vec![ 1, 2, 3 ], "image/jpeg" );
        back.picture_type = PictureType::CoverBack;
        let mut other = back.clone();
        other.picture_type = PictureType::Other;
        meta.images = vec![ back, other ];
        let images = meta.images.clone();

        let checked = run( &options, &store, &files, 0, meta );

        assert!( checked.outcome.issues.iter().any( |i| {
            i.as_str() == "Multiple embedded images found, none of them front"
        }) );
        assert!( checked.outcome.fixes.is_empty() );
        assert_eq!( checked.metadata.images.len(), images.len() );
        assert_eq!( checked.metadata.images[ 0 ].picture_type, images[ 0 ].picture_type );
        assert_eq!( checked.metadata.images[ 1 ].picture_type, images[ 1 ].picture_type );
        assert!( store.written.borrow().is_empty() );
    }


    #[test]
    fn test_default_bitrate() {
        let files = album_folder( &[ "01 - Tired of Being Alone.mp3" ] );
        let store = MemoryStore::default();
        let options = LintOptions::default();
        let probe = FixedProbe( None );
        let checker = Checker::new( &options, &store, &EchoCodec, &probe );
        let siblings = SiblingSet::new( &files, &files[ 0 ] );
        let entry = LibraryEntry { path: files[ 0 ].clone(), metadata: album_track( "1/1" ) };

        let checked = checker.check( entry, &siblings ).unwrap();
        assert_eq!( checked.outcome.bitrate_kbps, DEFAULT_BITRATE_KBPS );
    }
}
