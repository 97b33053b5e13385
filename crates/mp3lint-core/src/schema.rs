//! Field schema
//!
//! Which frames a track must carry, and which ones it should not.

use std::collections::BTreeSet;

use crate::metadata::{ TrackMetadata, ALBUM, ARTIST, DISC, PICTURE, TITLE, TRACK, YEAR };
use crate::report::Findings;


/// Frames required on a standalone track.
pub const REQUIRED_SOLO: &[&str] = &[ TITLE, ARTIST, PICTURE, YEAR ];

/// Frames required on a track that belongs to an album.
pub const REQUIRED_ALBUM: &[&str] = &[ TITLE, ARTIST, PICTURE, YEAR, TRACK, ALBUM, DISC ];

/// Frames that may be present without being required.
pub const DEFAULT_ALLOWED_EXTRA: &[&str] = &[ "TDAT" ];


/// Which unexpected frames are tolerated and which may be deleted.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct FieldPolicy {
    /// Never reported as redundant.
    pub allowed_extra: BTreeSet<String>,

    /// Frames that may be deleted when redundant. `None` means any
    /// redundant frame may be deleted; otherwise unlisted redundant
    /// frames are reported as issues and left alone.
    pub removable: Option<BTreeSet<String>>,
}


impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            allowed_extra: DEFAULT_ALLOWED_EXTRA.iter().map( |s| s.to_string() ).collect(),
            removable: None,
        }
    }
}


impl FieldPolicy {
    fn may_remove( &self, id: &str ) -> bool {
        self.removable.as_ref().map_or( true, |list| list.contains( id ) )
    }
}


/// Result of comparing present frames against the expected set.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct FieldDiff {
    pub missing: BTreeSet<String>,
    pub redundant: BTreeSet<String>,
}


/// Expected frames for a track with or without an album.
pub fn expected_fields( has_album: bool ) -> BTreeSet<String> {
    let required = if has_album { REQUIRED_ALBUM } else { REQUIRED_SOLO };
    required.iter().map( |s| s.to_string() ).collect()
}


/// Compares present frames against the expected ones.
///
/// `missing = expected ∩ (expected ⊕ present)` and
/// `redundant = (expected ⊕ present) − expected − allowed`.
pub fn compare_fields(
    expected: &BTreeSet<String>,
    present: &BTreeSet<String>,
    allowed: &BTreeSet<String>,
) -> FieldDiff {
    let incorrect: BTreeSet<String> = expected.symmetric_difference( present ).cloned().collect();

    FieldDiff {
        missing: expected.intersection( &incorrect ).cloned().collect(),
        redundant: incorrect
            .difference( expected )
            .filter( |id| !allowed.contains( *id ) )
            .cloned()
            .collect(),
    }
}


/// Reports missing and redundant frames, deleting removable redundant
/// frames when `fix` is set.
pub fn check_fields( meta: &mut TrackMetadata, policy: &FieldPolicy, fix: bool ) -> Findings {
    let mut findings = Findings::new();
    let expected = expected_fields( meta.has_album() );
    let diff = compare_fields( &expected, &meta.present_fields(), &policy.allowed_extra );

    for id in &diff.missing {
        findings.issue( format!( "Missing required {} field", id ) );
    }

    for id in &diff.redundant {
        if !policy.may_remove( id ) {
            findings.issue( format!( "Unexpected field {} present", id ) );
            continue;
        }
        findings.fix( format!( "Redundant field {} present", id ) );
        if fix {
            meta.remove_field( id );
        }
    }

    findings
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::metadata::EmbeddedImage;


    fn set( ids: &[&str] ) -> BTreeSet<String> {
        ids.iter().map( |s| s.to_string() ).collect()
    }


    fn solo_track() -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Let's Stay Together".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            year: Some( vec![ "1971".into() ] ),
            images: vec![ EmbeddedImage::front_cover( vec![ 1 ], "image/jpeg" ) ],
            ..Default::default()
        }
    }


    #[test]
    fn test_identical_sets_have_no_diff() {
        let expected = expected_fields( true );
        let diff = compare_fields( &expected, &expected.clone(), &BTreeSet::new() );
        assert!( diff.missing.is_empty() );
        assert!( diff.redundant.is_empty() );
    }


    #[test]
    fn test_missing_and_redundant() {
        let expected = expected_fields( false );
        let present = set( &[ TITLE, ARTIST, "COMM", "TDAT" ] );
        let diff = compare_fields( &expected, &present, &set( &[ "TDAT" ] ) );
        assert_eq!( diff.missing, set( &[ PICTURE, YEAR ] ) );
        assert_eq!( diff.redundant, set( &[ "COMM" ] ) );
    }


    #[test]
    fn test_album_expects_more_fields() {
        assert_eq!( expected_fields( false ).len(), 4 );
        assert_eq!( expected_fields( true ).len(), 7 );
        assert!( expected_fields( false ).is_subset( &expected_fields( true ) ) );
    }


    #[test]
    fn test_redundant_field_removed_in_fix_mode() {
        let mut meta = solo_track();
        meta.extra.insert( "TCON".into(), Vec::new() );

        let dry = check_fields( &mut meta.clone(), &FieldPolicy::default(), false );
        assert_eq!( dry.fixes, vec![ crate::report::FixRecord::new( "Redundant field TCON present" ) ] );

        let fixed = check_fields( &mut meta, &FieldPolicy::default(), true );
        assert_eq!( fixed.fixes.len(), 1 );
        assert!( fixed.issues.is_empty() );
        assert!( !meta.extra.contains_key( "TCON" ) );
    }


    #[test]
    fn test_missing_field_is_issue() {
        let mut meta = solo_track();
        meta.images.clear();

        let findings = check_fields( &mut meta, &FieldPolicy::default(), true );
        assert_eq!( findings.issues.len(), 1 );
        assert!( findings.mentions( "Missing required APIC field" ) );
    }


    #[test]
    fn test_allowed_extra_is_not_redundant() {
        let mut meta = solo_track();
        meta.extra.insert( "TDAT".into(), Vec::new() );

        let findings = check_fields( &mut meta, &FieldPolicy::default(), true );
        assert!( findings.is_empty() );
        assert!( meta.extra.contains_key( "TDAT" ) );
    }


    #[test]
    fn test_deny_list_keeps_unlisted_fields() {
        let mut meta = solo_track();
        meta.extra.insert( "TCON".into(), Vec::new() );
        meta.extra.insert( "PRIV".into(), Vec::new() );

        let policy = FieldPolicy {
            removable: Some( set( &[ "TCON" ] ) ),
            ..FieldPolicy::default()
        };
        let findings = check_fields( &mut meta, &policy, true );

        assert!( findings.mentions( "Redundant field TCON present" ) );
        assert!( findings.mentions( "Unexpected field PRIV present" ) );
        assert!( !meta.extra.contains_key( "TCON" ) );
        assert!( meta.extra.contains_key( "PRIV" ) );
    }
}
