//! Findings, run statistics and the reporting sink
//!
//! The rule engine never prints. It hands [`FileReport`]s and the final
//! [`RunStats`] to a [`Reporter`], and the binary decides how to show them.

use std::fmt;
use std::path::{ Path, PathBuf };


/// A problem that needs human judgement and is never corrected automatically.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Issue( String );


impl Issue {
    pub fn new( message: impl Into<String> ) -> Self {
        Self( message.into() )
    }


    pub fn as_str( &self ) -> &str {
        &self.0
    }
}


impl fmt::Display for Issue {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.0 )
    }
}


/// A problem with a deterministic, safe correction.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct FixRecord( String );


impl FixRecord {
    pub fn new( message: impl Into<String> ) -> Self {
        Self( message.into() )
    }


    pub fn as_str( &self ) -> &str {
        &self.0
    }
}


impl fmt::Display for FixRecord {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.0 )
    }
}


/// Issues and fix records produced by one or more rules, in order.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct Findings {
    pub issues: Vec<Issue>,
    pub fixes: Vec<FixRecord>,
}


impl Findings {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn issue( &mut self, message: impl Into<String> ) {
        self.issues.push( Issue::new( message ) );
    }


    pub fn fix( &mut self, message: impl Into<String> ) {
        self.fixes.push( FixRecord::new( message ) );
    }


    /// Appends another set of findings, keeping order.
    pub fn extend( &mut self, other: Findings ) {
        self.issues.extend( other.issues );
        self.fixes.extend( other.fixes );
    }


    /// Turns every fix record into an issue.
    pub fn demote_fixes( &mut self ) {
        let fixes = std::mem::take( &mut self.fixes );
        self.issues.extend( fixes.into_iter().map( |f| Issue( f.0 ) ) );
    }


    pub fn is_empty( &self ) -> bool {
        self.issues.is_empty() && self.fixes.is_empty()
    }

}


#[cfg( test )]
impl Findings {
    /// Whether any message contains `needle`.
    pub fn mentions( &self, needle: &str ) -> bool {
        self.issues.iter().any( |i| i.0.contains( needle ) )
            || self.fixes.iter().any( |f| f.0.contains( needle ) )
    }
}


/// What happened to a file whose canonical path differs from its current one.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Relocation {
    /// The file was moved to the canonical path.
    Moved( PathBuf ),

    /// The file should be moved. `safe` is false when the file still has
    /// issues, in which case the move is withheld even in fix mode.
    Proposed { to: PathBuf, safe: bool },
}


/// Outcome of checking a single file, as handed to the reporter.
#[derive( Debug, Clone )]
pub struct FileReport {
    pub path: PathBuf,
    pub issues: Vec<Issue>,
    pub fixes: Vec<FixRecord>,
    pub relocation: Option<Relocation>,
    pub bitrate_kbps: u32,
}


impl FileReport {
    /// Whether there is anything worth showing for this file.
    pub fn is_noteworthy( &self ) -> bool {
        self.relocation.is_some() || !self.issues.is_empty() || !self.fixes.is_empty()
    }
}


/// Aggregate counts for one run.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct RunStats {
    pub total_files: usize,
    pub total_unreadable: usize,
    pub total_issues: usize,
    pub total_fixable: usize,
    pub unsafe_file_moves: usize,
    pub safe_file_moves: usize,
}


impl RunStats {
    /// Every problem found, of any kind.
    pub fn grand_total( &self ) -> usize {
        self.total_issues
            + self.total_fixable
            + self.total_unreadable
            + self.safe_file_moves
            + self.unsafe_file_moves
    }


    /// Whether something still needs manual work after the run.
    pub fn needs_attention( &self ) -> bool {
        self.total_issues > 0 || self.total_unreadable > 0
    }
}


/// Sink for everything a run wants to tell the user.
pub trait Reporter {
    /// A file whose tag could not be read, written or relocated.
    fn unreadable( &mut self, path: &Path, reason: &str );

    /// A file that was checked.
    fn file( &mut self, report: &FileReport );

    /// The totals at the end of a run.
    fn summary( &mut self, stats: &RunStats, fix: bool );
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_demote_fixes_keeps_order() {
        let mut findings = Findings::new();
        findings.issue( "first" );
        findings.fix( "second" );
        findings.fix( "third" );

        findings.demote_fixes();

        assert!( findings.fixes.is_empty() );
        let issues: Vec<&str> = findings.issues.iter().map( Issue::as_str ).collect();
        assert_eq!( issues, vec![ "first", "second", "third" ] );
    }


    #[test]
    fn test_grand_total_excludes_file_count() {
        let stats = RunStats {
            total_files: 100,
            total_unreadable: 1,
            total_issues: 2,
            total_fixable: 3,
            unsafe_file_moves: 4,
            safe_file_moves: 5,
        };
        assert_eq!( stats.grand_total(), 15 );
        assert!( stats.needs_attention() );
        assert!( !RunStats::default().needs_attention() );
    }


    #[test]
    fn test_file_report_noteworthy() {
        let mut report = FileReport {
            path: PathBuf::from( "/music/a.mp3" ),
            issues: Vec::new(),
            fixes: Vec::new(),
            relocation: None,
            bitrate_kbps: 320,
        };
        assert!( !report.is_noteworthy() );

        report.relocation = Some( Relocation::Proposed { to: PathBuf::from( "/music/b.mp3" ), safe: true } );
        assert!( report.is_noteworthy() );
    }
}
