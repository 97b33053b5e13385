//! mp3lint CLI - Opinionated and consistent ID3 linter and fixer

mod cli;
mod console;
mod settings;

use std::io::{ self, IsTerminal };
use std::path::{ Path, PathBuf };
use std::process::ExitCode;

use anyhow::{ Context, Result };
use clap::Parser;
use tracing::Level;

use cli::Args;
use console::ConsoleReporter;
use settings::Settings;

use mp3lint_core::{ Checker, Id3Store, ImageCodec, LibraryScanner, LibraryWalker, SymphoniaProbe };


/// Maps the number of `-v` flags to a log level.
fn log_level( verbose: u8 ) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}


/// Replaces a leading `~` with the home directory.
fn expand_home( path: &Path ) -> PathBuf {
    match ( path.strip_prefix( "~" ), dirs::home_dir() ) {
        ( Ok( rest ), Some( home ) ) => home.join( rest ),
        _ => path.to_path_buf(),
    }
}


fn absolutize( path: &Path ) -> Result<PathBuf> {
    let expanded = expand_home( path );
    std::path::absolute( &expanded )
        .with_context( || format!( "Invalid path: {}", expanded.display() ) )
}


fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer( io::stderr )
        .with_max_level( log_level( args.verbose ) )
        .init();

    let settings = match &args.config {
        Some( path ) => Settings::load_from( &expand_home( path ) ),
        None => Settings::load(),
    };
    let options = settings.lint_options( args.fix, args.skip_artist_folder );

    let root = absolutize( &args.folder )?;
    let mut scanner = LibraryScanner::new( &root );
    for exclusion in settings.exclude.iter().chain( &args.exclude ) {
        scanner.exclude( absolutize( exclusion )? );
    }

    let tags = Id3Store;
    let codec = ImageCodec;
    let probe = SymphoniaProbe;
    let checker = Checker::new( &options, &tags, &codec, &probe );
    let walker = LibraryWalker::new( &scanner, &checker, &tags );

    let mut reporter = ConsoleReporter::stdout( io::stdout().is_terminal() );
    let stats = walker
        .run( &mut reporter )
        .with_context( || format!( "Failed to lint {}", root.display() ) )?;

    if args.strict && stats.needs_attention() {
        return Ok( ExitCode::FAILURE );
    }
    Ok( ExitCode::SUCCESS )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_log_level() {
        assert_eq!( log_level( 0 ), Level::WARN );
        assert_eq!( log_level( 1 ), Level::INFO );
        assert_eq!( log_level( 2 ), Level::DEBUG );
        assert_eq!( log_level( 9 ), Level::TRACE );
    }


    #[test]
    fn test_expand_home() {
        let Some( home ) = dirs::home_dir() else {
            return;
        };
        assert_eq!( expand_home( Path::new( "~/Music" ) ), home.join( "Music" ) );
        assert_eq!( expand_home( Path::new( "/srv/~music" ) ), PathBuf::from( "/srv/~music" ) );
        assert_eq!( expand_home( Path::new( "~bob/x" ) ), PathBuf::from( "~bob/x" ) );
    }


    #[test]
    fn test_absolutize_relative_path() {
        let path = absolutize( Path::new( "music" ) ).unwrap();
        assert!( path.is_absolute() );
        assert!( path.ends_with( "music" ) );
    }
}
