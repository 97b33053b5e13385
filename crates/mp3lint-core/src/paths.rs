//! Canonical path derivation
//!
//! A track's canonical location is derived from its tags and from the
//! directories above it. Regular artist folders use
//! `<artist>/[<year>] <album>/[CD<n>/]<nn> - <title>.mp3` (or
//! `<artist>/<artist> - <title>.mp3` without an album). Directories whose
//! name starts with the collection marker (or matches a reserved
//! compilation name) switch to collection naming, see [`Layout`].
//!
//! Everything works on path components; the existing artist or
//! collection directories are kept, only the levels below them are
//! derived from the tags.

use std::path::{ Component, Path, PathBuf };

use crate::metadata::TrackMetadata;
use crate::normalize::replace_typographic;
use crate::report::Findings;


/// How many directories above a file are inspected for a collection.
pub const MAX_COLLECTION_LEVELS: usize = 7;

/// Prefix marking a directory as a collection.
pub const DEFAULT_COLLECTION_MARKER: &str = "!";

/// Directory names treated as collections regardless of the marker.
pub const DEFAULT_COLLECTION_NAMES: &[&str] = &[ "Various Artists" ];

/// Extension used for canonical file names.
pub const CANONICAL_EXTENSION: &str = "mp3";


/// Settings for path derivation.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct PathRules {
    pub collection_marker: String,
    pub collection_names: Vec<String>,
    /// Suppresses the artist folder heuristic in regular folders.
    pub skip_artist_folder: bool,
}


impl Default for PathRules {
    fn default() -> Self {
        Self {
            collection_marker: DEFAULT_COLLECTION_MARKER.to_string(),
            collection_names: DEFAULT_COLLECTION_NAMES.iter().map( |s| s.to_string() ).collect(),
            skip_artist_folder: false,
        }
    }
}


impl PathRules {
    /// Whether a directory name marks a collection.
    pub fn is_collection_dir( &self, name: &str ) -> bool {
        ( !self.collection_marker.is_empty() && name.starts_with( &self.collection_marker ) )
            || self.collection_names.iter().any( |n| n == name )
    }
}


/// Naming scheme that applies to a file.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Layout {
    /// Regular `<artist>/...` folder.
    Standard,

    /// Inside a collection directory found `level` directories above the
    /// file's parent (0 = the parent itself).
    Collection { level: usize },
}


/// Finds the closest collection directory among the file's ancestors.
pub fn detect_layout( path: &Path, rules: &PathRules ) -> Layout {
    let mut dir = path.parent();
    for level in 0..MAX_COLLECTION_LEVELS {
        let Some( current ) = dir else {
            break;
        };
        let name = current.file_name().and_then( |n| n.to_str() ).unwrap_or( "" );
        if rules.is_collection_dir( name ) {
            return Layout::Collection { level };
        }
        dir = current.parent();
    }
    Layout::Standard
}


/// Makes a tag value safe to use as a single path component.
pub fn sanitize_component( value: &str ) -> String {
    replace_typographic( value ).replace( '/', "|" )
}


/// Removes `count` trailing components from a path.
pub fn strip_segments( path: &Path, count: usize ) -> PathBuf {
    let components: Vec<Component> = path.components().collect();
    let keep = components.len().saturating_sub( count );
    components[ ..keep ].iter().collect()
}


/// Tag values used to build path components.
struct Names {
    artist: String,
    title: String,
    album: String,
    year: String,
    track: u32,
    disc: u32,
    disc_total: u32,
    has_album: bool,
}


impl Names {
    fn from_metadata( meta: &TrackMetadata ) -> Self {
        Self {
            artist: sanitize_component( meta.artist_name() ),
            title: sanitize_component( meta.title_name() ),
            album: sanitize_component( meta.album_name() ),
            year: sanitize_component( meta.year_text() ),
            track: meta.track_number(),
            disc: meta.disc_number(),
            disc_total: meta.disc_total(),
            has_album: meta.has_album(),
        }
    }


    fn solo_file( &self ) -> String {
        format!( "{} - {}.{}", self.artist, self.title, CANONICAL_EXTENSION )
    }


    fn track_file( &self ) -> String {
        format!( "{:02} - {}.{}", self.track, self.title, CANONICAL_EXTENSION )
    }


    fn dated_album( &self ) -> String {
        format!( "[{}] {}", self.year, self.album )
    }


    fn disc_dir( &self ) -> String {
        format!( "CD{}", self.disc )
    }


    fn spans_discs( &self ) -> bool {
        self.disc_total > 1
    }


    /// Directory levels below the artist folder, file name included.
    fn folder_count( &self ) -> usize {
        match ( self.has_album, self.spans_discs() ) {
            ( false, _ ) => 1,
            ( true, false ) => 2,
            ( true, true ) => 3,
        }
    }
}


/// Result of deriving the canonical path of a file.
#[derive( Debug, Clone, Default )]
pub struct PathCheck {
    pub findings: Findings,
    /// `None` when the file already sits at its canonical path.
    pub canonical: Option<PathBuf>,
}


/// Derives the canonical path of `path` from its metadata.
pub fn derive( path: &Path, meta: &TrackMetadata, rules: &PathRules ) -> PathCheck {
    let names = Names::from_metadata( meta );
    let ( expected, findings ) = match detect_layout( path, rules ) {
        Layout::Collection { level } => ( collection_path( path, &names, level ), Findings::new() ),
        Layout::Standard => standard_path( path, &names, rules ),
    };

    let canonical = if expected.as_os_str() == path.as_os_str() {
        None
    } else {
        Some( expected )
    };
    PathCheck { findings, canonical }
}


fn standard_path( path: &Path, names: &Names, rules: &PathRules ) -> ( PathBuf, Findings ) {
    let mut findings = Findings::new();
    let artist_dir = strip_segments( path, names.folder_count() );

    let mut expected = artist_dir.clone();
    if names.has_album {
        expected.push( names.dated_album() );
        if names.spans_discs() {
            expected.push( names.disc_dir() );
        }
        expected.push( names.track_file() );
    } else {
        expected.push( names.solo_file() );
    }

    if !rules.skip_artist_folder {
        // Substring heuristic: short folder names match almost anything
        let folder = artist_dir.file_name().and_then( |n| n.to_str() ).unwrap_or( "" );
        let folder_lower = folder.to_lowercase();
        if !names.artist.to_lowercase().contains( &folder_lower )
            && !names.title.to_lowercase().contains( &folder_lower )
        {
            findings.issue( format!(
                "File might not be stored in the right artist folder:\n    folder:  {}\n    artist:  {}\n    title:   {}",
                folder, names.artist, names.title
            ) );
        }
    }

    ( expected, findings )
}


/// Collection naming.
///
/// - Directly inside the collection (`level == 0`) album tracks are named
///   `<nn> - <title>.mp3` with no album or disc folder.
/// - Up to `depth` levels below, the album folder is the bare album title
///   with a leading "The " removed.
/// - Deeper than that, the `[<year>] <album>` form returns.
///
/// `depth` starts as the regular folder count and is one lower when the
/// collection is the immediate parent. That adjustment also decides how
/// many components are replaced, so both naming and placement rely on it.
fn collection_path( path: &Path, names: &Names, level: usize ) -> PathBuf {
    let mut depth = names.folder_count();
    if level == 0 {
        depth -= 1;
    }

    let mut segments = Vec::new();
    if names.has_album {
        if level > 0 {
            if level > depth {
                segments.push( names.dated_album() );
            } else {
                let album = names.album.strip_prefix( "The " ).unwrap_or( &names.album );
                segments.push( album.to_string() );
            }
            if names.spans_discs() {
                segments.push( names.disc_dir() );
            }
        }
        segments.push( names.track_file() );
    } else {
        segments.push( names.solo_file() );
    }

    let mut expected = strip_segments( path, depth.max( 1 ) );
    expected.extend( segments );
    expected
}


#[cfg( test )]
mod tests {
    use super::*;


    fn album_track( album: &str, track: &str, disc: &str ) -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Tired of Being Alone".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            album: Some( vec![ album.into() ] ),
            year: Some( vec![ "1971".into() ] ),
            track: Some( vec![ track.into() ] ),
            disc: Some( vec![ disc.into() ] ),
            ..Default::default()
        }
    }


    fn solo_track() -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Let's Stay Together".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            year: Some( vec![ "1971".into() ] ),
            ..Default::default()
        }
    }


    fn canonical( path: &str, meta: &TrackMetadata ) -> Option<PathBuf> {
        derive( Path::new( path ), meta, &PathRules::default() ).canonical
    }


    #[test]
    fn test_strip_segments() {
        assert_eq!( strip_segments( Path::new( "/a/b/c.mp3" ), 1 ), PathBuf::from( "/a/b" ) );
        assert_eq!( strip_segments( Path::new( "/a/b/c.mp3" ), 2 ), PathBuf::from( "/a" ) );
        assert_eq!( strip_segments( Path::new( "/a/b/c.mp3" ), 0 ), PathBuf::from( "/a/b/c.mp3" ) );
        assert_eq!( strip_segments( Path::new( "a/b" ), 5 ), PathBuf::new() );
    }


    #[test]
    fn test_sanitize_component() {
        assert_eq!( sanitize_component( "AC/DC" ), "AC|DC" );
        assert_eq!( sanitize_component( "Don\u{2019}t" ), "Don't" );
    }


    #[test]
    fn test_detect_layout() {
        let rules = PathRules::default();
        assert_eq!( detect_layout( Path::new( "/m/Al Green/x.mp3" ), &rules ), Layout::Standard );
        assert_eq!( detect_layout( Path::new( "/m/!Soul/x.mp3" ), &rules ), Layout::Collection { level: 0 } );
        assert_eq!( detect_layout( Path::new( "/m/!Soul/A/x.mp3" ), &rules ), Layout::Collection { level: 1 } );
        assert_eq!(
            detect_layout( Path::new( "/m/Various Artists/A/B/x.mp3" ), &rules ),
            Layout::Collection { level: 2 }
        );
    }


    #[test]
    fn test_detect_layout_stops_after_seven_levels() {
        let rules = PathRules::default();
        let near = "/m/!c/1/2/3/4/5/6/x.mp3";
        let far = "/m/!c/1/2/3/4/5/6/7/x.mp3";
        assert_eq!( detect_layout( Path::new( near ), &rules ), Layout::Collection { level: 6 } );
        assert_eq!( detect_layout( Path::new( far ), &rules ), Layout::Standard );
    }


    #[test]
    fn test_solo_track_in_place() {
        let meta = solo_track();
        let check = derive( Path::new( "/m/Al Green/Al Green - Let's Stay Together.mp3" ), &meta, &PathRules::default() );
        assert!( check.canonical.is_none() );
        assert!( check.findings.is_empty() );
    }


    #[test]
    fn test_solo_track_renamed() {
        let meta = solo_track();
        assert_eq!(
            canonical( "/m/Al Green/track01.mp3", &meta ),
            Some( PathBuf::from( "/m/Al Green/Al Green - Let's Stay Together.mp3" ) )
        );
    }


    #[test]
    fn test_album_track_gets_dated_folder() {
        let meta = album_track( "Gets Next to You", "3/9", "1/1" );
        assert_eq!(
            canonical( "/m/Al Green/Gets Next to You/03 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/Al Green/[1971] Gets Next to You/03 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_year_with_slash_stays_one_folder() {
        let mut meta = album_track( "Gets Next to You", "3/9", "1/1" );
        meta.year = Some( vec![ "1971/1972".into() ] );
        let expected = PathBuf::from( "/m/Al Green/[1971|1972] Gets Next to You/03 - Tired of Being Alone.mp3" );
        assert_eq!(
            canonical( "/m/Al Green/Gets Next to You/03 - Tired of Being Alone.mp3", &meta ),
            Some( expected.clone() )
        );
        assert_eq!( canonical( expected.to_str().unwrap(), &meta ), None );
    }


    #[test]
    fn test_multi_disc_album() {
        let meta = album_track( "Anthology", "12/20", "2/2" );
        assert_eq!(
            canonical( "/m/Al Green/Anthology/Disc 2/track.mp3", &meta ),
            Some( PathBuf::from( "/m/Al Green/[1971] Anthology/CD2/12 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_derive_is_idempotent() {
        let rules = PathRules::default();
        let cases = [
            ( album_track( "Gets Next to You", "3/9", "1/1" ), "/m/Al Green/x/y.mp3" ),
            ( album_track( "Anthology", "12/20", "2/2" ), "/m/Al Green/x/y/z.mp3" ),
            ( solo_track(), "/m/Al Green/whatever.mp3" ),
            ( album_track( "The Belle Album", "1/9", "1/1" ), "/m/!Soul/x/y.mp3" ),
            ( album_track( "The Belle Album", "1/9", "1/1" ), "/m/!Soul/a/b/c/y.mp3" ),
        ];
        for ( meta, start ) in cases {
            let first = derive( Path::new( start ), &meta, &rules ).canonical.unwrap();
            let second = derive( &first, &meta, &rules );
            assert!( second.canonical.is_none(), "{:?} moved again", first );
        }
    }


    #[test]
    fn test_wrong_artist_folder_is_issue() {
        let meta = solo_track();
        let check = derive( Path::new( "/m/Barry White/Al Green - Let's Stay Together.mp3" ), &meta, &PathRules::default() );
        assert_eq!( check.findings.issues.len(), 1 );
        assert!( check.findings.mentions( "right artist folder" ) );
        assert!( check.findings.fixes.is_empty() );
        assert!( check.canonical.is_none() );

        let rules = PathRules { skip_artist_folder: true, ..PathRules::default() };
        let check = derive( Path::new( "/m/Barry White/Al Green - Let's Stay Together.mp3" ), &meta, &rules );
        assert!( check.findings.is_empty() );
    }


    #[test]
    fn test_artist_folder_matching_title_is_accepted() {
        let meta = solo_track();
        let check = derive( Path::new( "/m/Together/Al Green - Let's Stay Together.mp3" ), &meta, &PathRules::default() );
        assert!( check.findings.is_empty() );
    }


    #[test]
    fn test_collection_level_zero_has_no_album_folder() {
        let meta = album_track( "The Belle Album", "4/9", "1/1" );
        assert_eq!(
            canonical( "/m/!Soul/whatever.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_level_one_drops_year_and_article() {
        let meta = album_track( "The Belle Album", "4/9", "1/1" );
        assert_eq!(
            canonical( "/m/!Soul/[1977] The Belle Album/04 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/Belle Album/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_level_two_still_drops_year() {
        let meta = album_track( "Gets Next to You", "4/9", "1/1" );
        assert_eq!(
            canonical( "/m/!Soul/Al Green/x/04 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/Al Green/Gets Next to You/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_level_three_uses_dated_album() {
        let meta = album_track( "The Belle Album", "4/9", "1/1" );
        assert_eq!(
            canonical( "/m/!Soul/a/b/x/04 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/a/b/[1971] The Belle Album/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_depth_counts_disc_folder() {
        // With a disc folder the undated range reaches one level further
        let meta = album_track( "Anthology", "4/20", "2/2" );
        assert_eq!(
            canonical( "/m/!Soul/a/b/c/04 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/a/Anthology/CD2/04 - Tired of Being Alone.mp3" ) )
        );
        assert_eq!(
            canonical( "/m/!Soul/a/b/c/d/04 - Tired of Being Alone.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/a/b/[1971] Anthology/CD2/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_level_zero_multi_disc_climbs_out() {
        // Level 0 lowers depth to 2, so two components are replaced
        let meta = album_track( "Anthology", "4/20", "2/2" );
        assert_eq!(
            canonical( "/m/!Soul/x.mp3", &meta ),
            Some( PathBuf::from( "/m/04 - Tired of Being Alone.mp3" ) )
        );
    }


    #[test]
    fn test_collection_solo_track() {
        let meta = solo_track();
        assert_eq!(
            canonical( "/m/!Soul/x.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/Al Green - Let's Stay Together.mp3" ) )
        );
        assert_eq!(
            canonical( "/m/!Soul/sub/x.mp3", &meta ),
            Some( PathBuf::from( "/m/!Soul/sub/Al Green - Let's Stay Together.mp3" ) )
        );
    }


    #[test]
    fn test_collection_never_checks_artist_folder() {
        let meta = solo_track();
        let check = derive( Path::new( "/m/!Soul/Al Green - Let's Stay Together.mp3" ), &meta, &PathRules::default() );
        assert!( check.findings.is_empty() );
        assert!( check.canonical.is_none() );
    }
}
