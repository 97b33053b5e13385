//! Library scanning and linting
//!
//! Discovers MP3 files below a root folder, runs the checker on each of
//! them and relocates files whose canonical path differs, when asked to.

use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::check::{ CheckError, Checker };
use crate::metadata::LibraryEntry;
use crate::paths::CANONICAL_EXTENSION;
use crate::report::{ FileReport, Relocation, Reporter, RunStats };
use crate::siblings::SiblingSet;
use crate::tags::{ TagError, TagStore };


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Failed to read ID3 tag" )]
    Tag( #[from] TagError ),

    #[error( "{0}" )]
    Check( #[from] CheckError ),

    #[error( "Failed to move to {to}: {source}" )]
    Move {
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error( "Destination already exists: {0}" )]
    DestinationExists( PathBuf ),
}


/// Library scanner for discovering MP3 files.
#[derive( Debug, Clone )]
pub struct LibraryScanner {
    root: PathBuf,
    exclusions: Vec<PathBuf>,
}


impl LibraryScanner {
    /// Creates a scanner for the folder at `root`.
    pub fn new( root: impl Into<PathBuf> ) -> Self {
        Self {
            root: root.into(),
            exclusions: Vec::new(),
        }
    }


    /// Skips every file whose path starts with `prefix`.
    ///
    /// The comparison is on the path text, so `/music/Abba` also excludes
    /// `/music/Abba Gold`.
    pub fn exclude( &mut self, prefix: impl Into<PathBuf> ) {
        let prefix = prefix.into();
        if !self.exclusions.contains( &prefix ) {
            self.exclusions.push( prefix );
        }
    }


    pub fn root( &self ) -> &Path {
        &self.root
    }


    /// Returns every candidate file below the root, sorted by path.
    pub fn scan( &self ) -> Result<Vec<PathBuf>, LibraryError> {
        tracing::info!( "Scanning: {:?}", self.root );

        let mut files = Vec::new();
        self.scan_recursive( &self.root, &mut files )?;
        files.retain( |f| !self.is_excluded( f ) );
        files.sort();

        tracing::info!( "Found {} files", files.len() );
        Ok( files )
    }


    fn scan_recursive( &self, dir: &Path, files: &mut Vec<PathBuf> ) -> Result<(), LibraryError> {
        let entries = match fs::read_dir( dir ) {
            Ok( e ) => e,
            Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!( "Access denied: {:?}", dir );
                return Ok(());
            }
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( LibraryError::NotFound( dir.to_path_buf() ) );
            }
            Err( e ) => return Err( LibraryError::Io( e ) ),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if is_hidden( &path ) {
                continue;
            }

            if path.is_dir() {
                self.scan_recursive( &path, files )?;
            } else if is_candidate( &path ) {
                files.push( path );
            }
        }

        Ok(())
    }


    fn is_excluded( &self, path: &Path ) -> bool {
        let text = path.to_string_lossy();
        self.exclusions
            .iter()
            .any( |prefix| text.starts_with( prefix.to_string_lossy().as_ref() ) )
    }
}


fn is_hidden( path: &Path ) -> bool {
    path.file_name()
        .and_then( |n| n.to_str() )
        .is_some_and( |n| n.starts_with( '.' ) )
}


fn is_candidate( path: &Path ) -> bool {
    path.extension().and_then( |e| e.to_str() ) == Some( CANONICAL_EXTENSION )
}


/// Runs the checker over every scanned file and keeps the totals.
pub struct LibraryWalker<'a> {
    scanner: &'a LibraryScanner,
    checker: &'a Checker<'a>,
    tags: &'a dyn TagStore,
}


impl<'a> LibraryWalker<'a> {
    pub fn new( scanner: &'a LibraryScanner, checker: &'a Checker<'a>, tags: &'a dyn TagStore ) -> Self {
        Self { scanner, checker, tags }
    }


    /// Lints the whole library, handing every result to `reporter`.
    ///
    /// Only a failing scan aborts the run. Files that cannot be read,
    /// written or moved are reported as unreadable and skipped.
    pub fn run( &self, reporter: &mut dyn Reporter ) -> Result<RunStats, LibraryError> {
        let files = self.scanner.scan()?;
        let fix = self.checker.options().fix;
        let mut stats = RunStats {
            total_files: files.len(),
            ..Default::default()
        };

        for path in &files {
            tracing::debug!( "Checking: {:?}", path );

            let report = match self.process( path, &files, fix ) {
                Ok( report ) => report,
                Err( e ) => {
                    tracing::warn!( "Unreadable file {:?}: {}", path, e );
                    stats.total_unreadable += 1;
                    reporter.unreadable( path, &e.to_string() );
                    continue;
                }
            };

            match &report.relocation {
                Some( Relocation::Moved( _ ) ) | Some( Relocation::Proposed { safe: true, .. } ) => {
                    stats.safe_file_moves += 1;
                }
                Some( Relocation::Proposed { safe: false, .. } ) => stats.unsafe_file_moves += 1,
                None => {}
            }
            stats.total_issues += report.issues.len();
            stats.total_fixable += report.fixes.len();

            reporter.file( &report );
        }

        reporter.summary( &stats, fix );
        Ok( stats )
    }


    fn process( &self, path: &Path, files: &[PathBuf], fix: bool ) -> Result<FileReport, LibraryError> {
        let metadata = self.tags.read( path )?;
        let siblings = SiblingSet::new( files, path );
        let entry = LibraryEntry { path: path.to_path_buf(), metadata };
        let outcome = self.checker.check( entry, &siblings )?.outcome;

        let relocation = match outcome.canonical_path {
            None => None,
            Some( to ) if fix && outcome.issues.is_empty() => {
                self.relocate( path, &to )?;
                Some( Relocation::Moved( to ) )
            }
            Some( to ) => Some( Relocation::Proposed { safe: outcome.issues.is_empty(), to } ),
        };

        Ok( FileReport {
            path: path.to_path_buf(),
            issues: outcome.issues,
            fixes: outcome.fixes,
            relocation,
            bitrate_kbps: outcome.bitrate_kbps,
        })
    }


    /// Moves a file and removes the directories it leaves empty.
    fn relocate( &self, from: &Path, to: &Path ) -> Result<(), LibraryError> {
        if to.exists() {
            return Err( LibraryError::DestinationExists( to.to_path_buf() ) );
        }
        if let Some( parent ) = to.parent() {
            fs::create_dir_all( parent )?;
        }
        fs::rename( from, to ).map_err( |e| LibraryError::Move { to: to.to_path_buf(), source: e } )?;
        tracing::info!( "Moved {:?} to {:?}", from, to );

        self.prune_empty_parents( from );
        Ok(())
    }


    fn prune_empty_parents( &self, path: &Path ) {
        let root = self.scanner.root();
        for dir in path.ancestors().skip( 1 ) {
            if dir == root || !dir.starts_with( root ) {
                break;
            }
            // Fails on the first non-empty directory
            if fs::remove_dir( dir ).is_err() {
                break;
            }
            tracing::debug!( "Removed empty directory: {:?}", dir );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use crate::artwork::{ ArtworkCodec, ArtworkError, MAX_COVER_BYTES };
    use crate::check::LintOptions;
    use crate::metadata::{ EmbeddedImage, TrackMetadata };
    use crate::probe::BitrateProbe;


    /// Tag store keyed by path. Unknown paths have no tag.
    #[derive( Default )]
    struct MemoryStore {
        tags: RefCell<BTreeMap<PathBuf, TrackMetadata>>,
    }


    impl MemoryStore {
        fn insert( &self, path: &Path, metadata: TrackMetadata ) {
            self.tags.borrow_mut().insert( path.to_path_buf(), metadata );
        }
    }


    impl TagStore for MemoryStore {
        fn read( &self, path: &Path ) -> Result<TrackMetadata, TagError> {
            self.tags
                .borrow()
                .get( path )
                .cloned()
                .ok_or_else( || TagError::NoTag( path.to_path_buf() ) )
        }


        fn write( &self, path: &Path, metadata: &TrackMetadata ) -> Result<(), TagError> {
            self.insert( path, metadata.clone() );
            Ok(())
        }
    }


    struct EchoCodec;


    impl ArtworkCodec for EchoCodec {
        fn reencode( &self, data: &[u8], _mime_type: &str, _shrink: bool ) -> Result<Vec<u8>, ArtworkError> {
            Ok( data.to_vec() )
        }
    }


    /// Store whose writes always fail.
    struct ReadOnlyStore( MemoryStore );


    impl TagStore for ReadOnlyStore {
        fn read( &self, path: &Path ) -> Result<TrackMetadata, TagError> {
            self.0.read( path )
        }


        fn write( &self, path: &Path, _metadata: &TrackMetadata ) -> Result<(), TagError> {
            Err( TagError::Write {
                path: path.to_path_buf(),
                source: id3::Error::new( id3::ErrorKind::InvalidInput, "read-only file" ),
            })
        }
    }


    struct BrokenCodec;


    impl ArtworkCodec for BrokenCodec {
        fn reencode( &self, _data: &[u8], _mime_type: &str, _shrink: bool ) -> Result<Vec<u8>, ArtworkError> {
            Err( ArtworkError::Io( std::io::Error::new( std::io::ErrorKind::InvalidData, "corrupt image" ) ) )
        }
    }


    struct NoProbe;


    impl BitrateProbe for NoProbe {
        fn bitrate_kbps( &self, _path: &Path ) -> Option<u32> {
            None
        }
    }


    #[derive( Default )]
    struct Recorder {
        unreadable: Vec<PathBuf>,
        files: Vec<FileReport>,
        summaries: Vec<( RunStats, bool )>,
    }


    impl Reporter for Recorder {
        fn unreadable( &mut self, path: &Path, _reason: &str ) {
            self.unreadable.push( path.to_path_buf() );
        }


        fn file( &mut self, report: &FileReport ) {
            self.files.push( report.clone() );
        }


        fn summary( &mut self, stats: &RunStats, fix: bool ) {
            self.summaries.push(( *stats, fix ));
        }
    }


    fn touch( path: &Path ) {
        fs::create_dir_all( path.parent().unwrap() ).unwrap();
        fs::write( path, b"" ).unwrap();
    }


    fn solo_track() -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Let's Stay Together".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            year: Some( vec![ "1972".into() ] ),
            images: vec![ EmbeddedImage::front_cover( vec![ 0xff, 0xd8 ], "image/jpeg" ) ],
            ..Default::default()
        }
    }


    fn album_track() -> TrackMetadata {
        TrackMetadata {
            album: Some( vec![ "Gets Next to You".into() ] ),
            title: Some( vec![ "Tired of Being Alone".into() ] ),
            year: Some( vec![ "1971".into() ] ),
            track: Some( vec![ "1/1".into() ] ),
            disc: Some( vec![ "1/1".into() ] ),
            ..solo_track()
        }
    }


    fn lint( root: &Path, store: &MemoryStore, fix: bool ) -> ( RunStats, Recorder ) {
        lint_with( root, store, &EchoCodec, fix )
    }


    fn lint_with( root: &Path, store: &dyn TagStore, codec: &dyn ArtworkCodec, fix: bool ) -> ( RunStats, Recorder ) {
        let options = LintOptions { fix, ..Default::default() };
        let checker = Checker::new( &options, store, codec, &NoProbe );
        let scanner = LibraryScanner::new( root );
        let walker = LibraryWalker::new( &scanner, &checker, store );

        let mut recorder = Recorder::default();
        let stats = walker.run( &mut recorder ).unwrap();
        ( stats, recorder )
    }


    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch( &root.join( "b/02.mp3" ) );
        touch( &root.join( "b/01.mp3" ) );
        touch( &root.join( "a.mp3" ) );
        touch( &root.join( "c/cover.jpg" ) );
        touch( &root.join( "c/upper.MP3" ) );
        touch( &root.join( ".hidden/x.mp3" ) );
        touch( &root.join( "b/.x.mp3" ) );

        let files = LibraryScanner::new( root ).scan().unwrap();
        assert_eq!( files, vec![ root.join( "a.mp3" ), root.join( "b/01.mp3" ), root.join( "b/02.mp3" ) ] );
    }


    #[test]
    fn test_scan_exclusions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch( &root.join( "Abba/x.mp3" ) );
        touch( &root.join( "Abba Gold/y.mp3" ) );
        touch( &root.join( "Bee Gees/z.mp3" ) );

        let mut scanner = LibraryScanner::new( root );
        scanner.exclude( root.join( "Abba" ) );
        assert_eq!( scanner.scan().unwrap(), vec![ root.join( "Bee Gees/z.mp3" ) ] );
    }


    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = LibraryScanner::new( dir.path().join( "nope" ) ).scan();
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_correct_solo_track_is_quiet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join( "Al Green/Al Green - Let's Stay Together.mp3" );
        touch( &path );
        let store = MemoryStore::default();
        store.insert( &path, solo_track() );

        let ( stats, recorder ) = lint( dir.path(), &store, false );
        assert_eq!( stats, RunStats { total_files: 1, ..Default::default() } );
        assert_eq!( stats.grand_total(), 0 );
        assert_eq!( recorder.files.len(), 1 );
        assert!( !recorder.files[ 0 ].is_noteworthy() );
        assert_eq!( recorder.files[ 0 ].bitrate_kbps, 128 );
        assert_eq!( recorder.summaries, vec![ ( stats, false ) ] );
    }


    #[test]
    fn test_album_track_is_moved_into_album_folder() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join( "Al Green/loose/01 - Tired of Being Alone.mp3" );
        let new = dir.path().join( "Al Green/[1971] Gets Next to You/01 - Tired of Being Alone.mp3" );
        touch( &old );
        let store = MemoryStore::default();
        store.insert( &old, album_track() );

        let ( dry, recorder ) = lint( dir.path(), &store, false );
        assert_eq!( dry.safe_file_moves, 1 );
        assert_eq!(
            recorder.files[ 0 ].relocation,
            Some( Relocation::Proposed { to: new.clone(), safe: true } )
        );
        assert!( old.exists() );

        let ( fixed, recorder ) = lint( dir.path(), &store, true );
        assert_eq!( fixed.safe_file_moves, 1 );
        assert_eq!( fixed.unsafe_file_moves, 0 );
        assert_eq!( recorder.files[ 0 ].relocation, Some( Relocation::Moved( new.clone() ) ) );
        assert!( new.exists() );
        assert!( !old.exists() );
        assert!( !dir.path().join( "Al Green/loose" ).exists() );
        assert!( dir.path().join( "Al Green" ).exists() );
    }


    #[test]
    fn test_move_is_withheld_while_issues_remain() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join( "Al Green/loose/01 - Tired of Being Alone.mp3" );
        touch( &old );
        let store = MemoryStore::default();
        let mut meta = album_track();
        meta.images.clear();
        store.insert( &old, meta );

        let ( stats, recorder ) = lint( dir.path(), &store, true );
        assert_eq!( stats.unsafe_file_moves, 1 );
        assert_eq!( stats.safe_file_moves, 0 );
        assert!( stats.total_issues >= 1 );
        assert!( matches!( recorder.files[ 0 ].relocation, Some( Relocation::Proposed { safe: false, .. } ) ) );
        assert!( old.exists() );
    }


    #[test]
    fn test_unreadable_file_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join( "Al Green/broken.mp3" );
        let good = dir.path().join( "Al Green/Al Green - Let's Stay Together.mp3" );
        touch( &broken );
        touch( &good );
        let store = MemoryStore::default();
        store.insert( &good, solo_track() );

        let ( stats, recorder ) = lint( dir.path(), &store, false );
        assert_eq!( stats.total_files, 2 );
        assert_eq!( stats.total_unreadable, 1 );
        assert_eq!( stats.total_issues, 0 );
        assert_eq!( stats.total_fixable, 0 );
        assert_eq!( recorder.unreadable, vec![ broken ] );
        assert_eq!( recorder.files.len(), 1 );
        assert_eq!( recorder.files[ 0 ].path, good );
    }


    /// Two solo tracks in one artist folder: `Let's Stay Together` sorts
    /// before `Tired of Being Alone`.
    fn two_solo_tracks( root: &Path, store: &MemoryStore, first: TrackMetadata ) -> ( PathBuf, PathBuf ) {
        let first_path = root.join( "Al Green/Al Green - Let's Stay Together.mp3" );
        let second_path = root.join( "Al Green/Al Green - Tired of Being Alone.mp3" );
        touch( &first_path );
        touch( &second_path );
        store.insert( &first_path, first );
        store.insert( &second_path, TrackMetadata {
            title: Some( vec![ "Tired of Being Alone".into() ] ),
            ..solo_track()
        });
        ( first_path, second_path )
    }


    #[test]
    fn test_failed_tag_write_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryStore::default();
        let mut needs_fix = solo_track();
        needs_fix.track = Some( vec![ "1/1".into() ] );
        let ( failing, next ) = two_solo_tracks( dir.path(), &memory, needs_fix );
        let store = ReadOnlyStore( memory );

        let ( stats, recorder ) = lint_with( dir.path(), &store, &EchoCodec, true );
        assert_eq!( stats.total_files, 2 );
        assert_eq!( stats.total_unreadable, 1 );
        assert_eq!( stats.total_fixable, 0 );
        assert_eq!( recorder.unreadable, vec![ failing ] );
        assert_eq!( recorder.files.len(), 1 );
        assert_eq!( recorder.files[ 0 ].path, next );
    }


    #[test]
    fn test_failed_cover_reencode_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let mut oversized = solo_track();
        oversized.images = vec![ EmbeddedImage::front_cover( vec![ 0u8; MAX_COVER_BYTES + 1 ], "image/jpeg" ) ];
        let ( failing, next ) = two_solo_tracks( dir.path(), &store, oversized.clone() );

        let ( stats, recorder ) = lint_with( dir.path(), &store, &BrokenCodec, true );
        assert_eq!( stats.total_unreadable, 1 );
        assert_eq!( stats.total_fixable, 0 );
        assert_eq!( recorder.unreadable, vec![ failing.clone() ] );
        assert_eq!( recorder.files.len(), 1 );
        assert_eq!( recorder.files[ 0 ].path, next );
        assert_eq!( store.read( &failing ).unwrap().images, oversized.images );
    }


    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join( "Al Green/loose/01 - Tired of Being Alone.mp3" );
        let new = dir.path().join( "Al Green/[1971] Gets Next to You/01 - Tired of Being Alone.mp3" );
        touch( &old );
        fs::create_dir_all( new.parent().unwrap() ).unwrap();
        fs::write( &new, b"keep me" ).unwrap();
        let store = MemoryStore::default();
        store.insert( &old, album_track() );
        store.insert( &new, album_track() );

        let ( stats, recorder ) = lint( dir.path(), &store, true );
        assert_eq!( stats.total_unreadable, 1 );
        assert_eq!( recorder.unreadable, vec![ old.clone() ] );
        assert!( old.exists() );
        assert_eq!( fs::read( &new ).unwrap(), b"keep me" );
    }
}
