//! Command-line argument parsing for mp3lint.

use std::path::PathBuf;

use clap::{ ArgAction, Parser };


/// mp3lint - Opinionated and consistent ID3 linter and fixer.
#[derive( Parser, Debug )]
#[command( name = "mp3lint" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Folder to search for mp3 files.
    pub folder: PathBuf,

    /// Folders to ignore when linting/fixing.
    #[arg( long, num_args = 1.. )]
    pub exclude: Vec<PathBuf>,

    /// Automatically fix all the fixable issues and rename the files.
    #[arg( long )]
    pub fix: bool,

    /// Don't check if files are stored in a folder named after the artist.
    #[arg( long )]
    pub skip_artist_folder: bool,

    /// Settings file to use instead of the default location.
    #[arg( long, value_name = "FILE" )]
    pub config: Option<PathBuf>,

    /// Log more details to stderr, repeat for even more.
    #[arg( short, long, action = ArgAction::Count )]
    pub verbose: u8,

    /// Exit with status 1 when issues or unreadable files remain.
    #[arg( long )]
    pub strict: bool,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_minimal_args() {
        let args = Args::try_parse_from([ "mp3lint", "~/Music" ]).unwrap();
        assert_eq!( args.folder, PathBuf::from( "~/Music" ) );
        assert!( args.exclude.is_empty() );
        assert!( !args.fix );
        assert!( !args.skip_artist_folder );
        assert_eq!( args.verbose, 0 );
        assert!( !args.strict );
    }


    #[test]
    fn test_all_args() {
        let args = Args::try_parse_from([
            "mp3lint", "/music", "--fix", "--skip-artist-folder", "-vv", "--strict",
            "--config", "/tmp/lint.json", "--exclude", "/music/Abba", "/music/Queen",
        ])
        .unwrap();
        assert!( args.fix );
        assert!( args.skip_artist_folder );
        assert!( args.strict );
        assert_eq!( args.verbose, 2 );
        assert_eq!( args.config, Some( PathBuf::from( "/tmp/lint.json" ) ) );
        assert_eq!( args.exclude, vec![ PathBuf::from( "/music/Abba" ), PathBuf::from( "/music/Queen" ) ] );
    }


    #[test]
    fn test_folder_is_required() {
        assert!( Args::try_parse_from([ "mp3lint" ]).is_err() );
    }
}
