//! Settings file management
//!
//! Optional JSON file with library conventions that rarely change between
//! runs. Command-line flags are merged on top.

use std::collections::BTreeSet;
use std::fs;
use std::path::{ Path, PathBuf };

use serde::Deserialize;

use mp3lint_core::paths::{ DEFAULT_COLLECTION_MARKER, DEFAULT_COLLECTION_NAMES };
use mp3lint_core::schema::DEFAULT_ALLOWED_EXTRA;
use mp3lint_core::{ FieldPolicy, LintOptions, PathRules };


/// Linter settings.
#[derive( Debug, Clone, PartialEq, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Folders that are never linted
    pub exclude: Vec<PathBuf>,

    pub skip_artist_folder: bool,

    /// Folder name prefix marking a collection
    pub collection_marker: String,

    /// Folder names that are always collections
    pub collection_names: Vec<String>,

    /// Frames that are never reported as redundant
    pub allowed_extra_fields: Vec<String>,

    /// Redundant frames that may be deleted, `None` for all of them
    pub removable_fields: Option<Vec<String>>,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            skip_artist_folder: false,
            collection_marker: DEFAULT_COLLECTION_MARKER.to_string(),
            collection_names: DEFAULT_COLLECTION_NAMES.iter().map( |n| n.to_string() ).collect(),
            allowed_extra_fields: DEFAULT_ALLOWED_EXTRA.iter().map( |f| f.to_string() ).collect(),
            removable_fields: None,
        }
    }
}


impl Settings {
    /// Returns the path to the default settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "mp3lint" ).join( "settings.json" ) )
    }


    /// Loads settings from the default location, or returns defaults.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from `path`, or returns defaults if it is missing
    /// or invalid.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            tracing::debug!( "No settings file at {:?}", path );
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => match serde_json::from_str( &contents ) {
                Ok( settings ) => {
                    tracing::info!( "Loaded settings from {:?}", path );
                    settings
                }
                Err( e ) => {
                    tracing::warn!( "Invalid settings file {:?}: {}", path, e );
                    Self::default()
                }
            },
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Builds the core options, with flags taking precedence.
    pub fn lint_options( &self, fix: bool, skip_artist_folder: bool ) -> LintOptions {
        LintOptions {
            fix,
            paths: PathRules {
                collection_marker: self.collection_marker.clone(),
                collection_names: self.collection_names.clone(),
                skip_artist_folder: self.skip_artist_folder || skip_artist_folder,
            },
            fields: FieldPolicy {
                allowed_extra: to_field_set( &self.allowed_extra_fields ),
                removable: self.removable_fields.as_deref().map( to_field_set ),
            },
        }
    }
}


fn to_field_set( ids: &[String] ) -> BTreeSet<String> {
    ids.iter().map( |id| id.trim().to_uppercase() ).collect()
}


#[cfg( test )]
mod tests {
    use super::*;
    use tempfile::TempDir;


    #[test]
    fn test_defaults_match_core() {
        let options = Settings::default().lint_options( false, false );
        let core = LintOptions::default();
        assert_eq!( options.paths.collection_marker, core.paths.collection_marker );
        assert_eq!( options.paths.collection_names, core.paths.collection_names );
        assert_eq!( options.fields.allowed_extra, core.fields.allowed_extra );
        assert_eq!( options.fields.removable, None );
        assert!( !options.paths.skip_artist_folder );
    }


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!( Settings::load_from( &dir.path().join( "settings.json" ) ), Settings::default() );
    }


    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }


    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "collection_names": [ "Soundtracks" ], "removable_fields": [ "tcon", "COMM" ] }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert_eq!( settings.collection_names, vec![ "Soundtracks".to_string() ] );
        assert_eq!( settings.collection_marker, "!" );

        let options = settings.lint_options( true, false );
        assert!( options.fix );
        assert_eq!(
            options.fields.removable,
            Some( [ "COMM", "TCON" ].iter().map( |s| s.to_string() ).collect() )
        );
    }


    #[test]
    fn test_flags_are_merged() {
        let settings = Settings { skip_artist_folder: true, ..Default::default() };
        assert!( settings.lint_options( false, false ).paths.skip_artist_folder );
        assert!( Settings::default().lint_options( false, true ).paths.skip_artist_folder );
    }
}
