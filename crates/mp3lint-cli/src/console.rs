//! Colored console report
//!
//! Prints one block per noteworthy file followed by a summary of the run.

use std::io::{ self, Write };
use std::path::Path;

use crossterm::style::{ style, Color, Stylize };

use mp3lint_core::{ FileReport, Relocation, Reporter, RunStats };


const PATH_COLOR: Color = Color::Blue;
const TARGET_COLOR: Color = Color::Magenta;
const ISSUE_COLOR: Color = Color::Yellow;
const FIX_COLOR: Color = Color::Green;
const ERROR_COLOR: Color = Color::Red;
const DETAIL_COLOR: Color = Color::DarkGrey;


/// [`Reporter`] writing colored text to a terminal.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
}


impl ConsoleReporter<io::Stdout> {
    pub fn stdout( color: bool ) -> Self {
        Self::new( io::stdout(), color )
    }
}


impl<W: Write> ConsoleReporter<W> {
    pub fn new( out: W, color: bool ) -> Self {
        Self { out, color }
    }


    pub fn into_inner( self ) -> W {
        self.out
    }


    fn paint( &self, text: &str, color: Color ) -> String {
        if self.color {
            style( text ).with( color ).to_string()
        } else {
            text.to_string()
        }
    }


    fn emit( &mut self, text: &str ) {
        if let Err( e ) = self.out.write_all( text.as_bytes() ) {
            tracing::debug!( "Failed to write report: {}", e );
        }
    }


    fn line( &mut self, text: &str, color: Color ) {
        let painted = self.paint( text, color );
        self.emit( &painted );
        self.emit( "\n" );
    }


    fn path_line( &mut self, lead: Option<( &str, Color )>, path: &Path, color: Color, bitrate: Option<u32> ) {
        let mut text = String::new();
        if let Some(( lead, lead_color )) = lead {
            text.push_str( &self.paint( lead, lead_color ) );
        }
        text.push_str( &self.paint( &path.display().to_string(), color ) );
        if let Some( kbps ) = bitrate {
            text.push_str( &self.paint( &format!( " ({} kbps)", kbps ), DETAIL_COLOR ) );
        }
        self.emit( &text );
        self.emit( "\n" );
    }
}


impl<W: Write> Reporter for ConsoleReporter<W> {
    fn unreadable( &mut self, path: &Path, reason: &str ) {
        self.path_line( None, path, PATH_COLOR, None );
        self.line( &format!( "  - {}", reason ), ERROR_COLOR );
        self.emit( "\n" );
    }


    fn file( &mut self, report: &FileReport ) {
        if !report.is_noteworthy() {
            return;
        }
        let bitrate = Some( report.bitrate_kbps );

        match &report.relocation {
            Some( Relocation::Moved( to ) ) => {
                self.path_line( Some(( "previously ", FIX_COLOR )), &report.path, PATH_COLOR, bitrate );
                self.path_line( Some(( "moved to   ", FIX_COLOR )), to, TARGET_COLOR, None );
            }
            Some( Relocation::Proposed { to, safe } ) => {
                let lead_color = if *safe { FIX_COLOR } else { ISSUE_COLOR };
                self.path_line( Some(( "currently ", lead_color )), &report.path, PATH_COLOR, bitrate );
                self.path_line( Some(( "should be ", lead_color )), to, TARGET_COLOR, None );
            }
            None => self.path_line( None, &report.path, PATH_COLOR, bitrate ),
        }

        for issue in &report.issues {
            self.line( &format!( "  - {}", issue ), ISSUE_COLOR );
        }
        for fix in &report.fixes {
            self.line( &format!( "  - {}", fix ), FIX_COLOR );
        }
        self.emit( "\n\n" );
    }


    fn summary( &mut self, stats: &RunStats, fix: bool ) {
        let grand_total = stats.grand_total();
        if grand_total > 0 {
            self.line(
                &format!( "Processed {} files with {} total issues", stats.total_files, grand_total ),
                PATH_COLOR,
            );
        } else {
            self.line(
                &format!( "Processed {} files that are all named and tagged correctly", stats.total_files ),
                FIX_COLOR,
            );
        }

        if stats.total_unreadable > 0 {
            self.line( &format!( "- There are {} files unreadable", stats.total_unreadable ), ERROR_COLOR );
        }
        if stats.total_issues > 0 {
            self.line( &format!( "- There are {} tag issues with manual work", stats.total_issues ), ISSUE_COLOR );
        }

        if fix {
            if stats.total_fixable > 0 {
                self.line( &format!( "- There were {} tag issues fixed automatically", stats.total_fixable ), FIX_COLOR );
            }
            if stats.unsafe_file_moves > 0 {
                self.line(
                    &format!( "- There were {} files that were not renamed, due to incomplete tags", stats.unsafe_file_moves ),
                    TARGET_COLOR,
                );
            }
            if stats.safe_file_moves > 0 {
                self.line( &format!( "- There were {} files renamed on disk", stats.safe_file_moves ), TARGET_COLOR );
            }
        } else {
            if stats.total_fixable > 0 {
                self.line(
                    &format!( "- There are {} issues fixable with the `--fix` argument", stats.total_fixable ),
                    FIX_COLOR,
                );
            }
            if stats.unsafe_file_moves > 0 {
                self.line(
                    &format!( "- There are {} files that cannot be moved, due to incomplete tags", stats.unsafe_file_moves ),
                    TARGET_COLOR,
                );
            }
            if stats.safe_file_moves > 0 {
                self.line(
                    &format!( "- There are {} files that can be moved with `--fix` automatically", stats.safe_file_moves ),
                    TARGET_COLOR,
                );
            }
        }
        self.emit( "\n" );

        if let Err( e ) = self.out.flush() {
            tracing::debug!( "Failed to flush report: {}", e );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use mp3lint_core::{ FixRecord, Issue };


    fn render( f: impl FnOnce( &mut ConsoleReporter<Vec<u8>> ) ) -> String {
        let mut reporter = ConsoleReporter::new( Vec::new(), false );
        f( &mut reporter );
        String::from_utf8( reporter.into_inner() ).unwrap()
    }


    fn report( relocation: Option<Relocation> ) -> FileReport {
        FileReport {
            path: PathBuf::from( "/m/Al Green/x.mp3" ),
            issues: vec![ Issue::new( "No total track specified" ) ],
            fixes: vec![ FixRecord::new( "Zero padded disc number" ) ],
            relocation,
            bitrate_kbps: 320,
        }
    }


    #[test]
    fn test_quiet_file_prints_nothing() {
        let out = render( |r| r.file( &FileReport {
            path: PathBuf::from( "/m/a.mp3" ),
            issues: Vec::new(),
            fixes: Vec::new(),
            relocation: None,
            bitrate_kbps: 128,
        }) );
        assert!( out.is_empty() );
    }


    #[test]
    fn test_file_block() {
        let out = render( |r| r.file( &report( None ) ) );
        assert_eq!(
            out,
            "/m/Al Green/x.mp3 (320 kbps)\n  - No total track specified\n  - Zero padded disc number\n\n\n"
        );
    }


    #[test]
    fn test_relocations() {
        let proposed = render( |r| r.file( &report( Some( Relocation::Proposed {
            to: PathBuf::from( "/m/Al Green/y.mp3" ),
            safe: false,
        })) ) );
        assert!( proposed.starts_with( "currently /m/Al Green/x.mp3 (320 kbps)\nshould be /m/Al Green/y.mp3\n" ) );

        let moved = render( |r| r.file( &report( Some( Relocation::Moved( PathBuf::from( "/m/y.mp3" ) ) ) ) ) );
        assert!( moved.starts_with( "previously /m/Al Green/x.mp3 (320 kbps)\nmoved to   /m/y.mp3\n" ) );
    }


    #[test]
    fn test_unreadable() {
        let out = render( |r| r.unreadable( Path::new( "/m/bad.mp3" ), "Failed to read ID3 tag" ) );
        assert_eq!( out, "/m/bad.mp3\n  - Failed to read ID3 tag\n\n" );
    }


    #[test]
    fn test_clean_summary() {
        let stats = RunStats { total_files: 12, ..Default::default() };
        let out = render( |r| r.summary( &stats, false ) );
        assert_eq!( out, "Processed 12 files that are all named and tagged correctly\n\n" );
    }


    #[test]
    fn test_summary_wording_depends_on_fix() {
        let stats = RunStats {
            total_files: 10,
            total_unreadable: 1,
            total_issues: 2,
            total_fixable: 3,
            unsafe_file_moves: 1,
            safe_file_moves: 4,
        };

        let dry = render( |r| r.summary( &stats, false ) );
        assert!( dry.starts_with( "Processed 10 files with 11 total issues\n" ) );
        assert!( dry.contains( "- There are 1 files unreadable\n" ) );
        assert!( dry.contains( "- There are 2 tag issues with manual work\n" ) );
        assert!( dry.contains( "- There are 3 issues fixable with the `--fix` argument\n" ) );
        assert!( dry.contains( "- There are 4 files that can be moved with `--fix` automatically\n" ) );

        let fixed = render( |r| r.summary( &stats, true ) );
        assert!( fixed.contains( "- There were 3 tag issues fixed automatically\n" ) );
        assert!( fixed.contains( "- There were 1 files that were not renamed, due to incomplete tags\n" ) );
        assert!( fixed.contains( "- There were 4 files renamed on disk\n" ) );
    }
}
