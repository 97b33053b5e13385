//! Tag normalization rules
//!
//! Detects non-canonical disc/track numbers and typographic characters in
//! text frames, and corrects them in place when fixing.

use crate::metadata::{ TrackMetadata, ALBUM, ARTIST, DISC, TITLE, TRACK, YEAR };
use crate::report::Findings;


/// Number frames and the name used for them in messages.
const NUMBER_FIELDS: &[( &str, &str )] = &[ ( DISC, "disc" ), ( TRACK, "track" ) ];

/// Text frames scanned for typographic characters.
const TEXT_FIELDS: &[( &str, &str )] = &[
    ( ALBUM, "album" ),
    ( YEAR, "year" ),
    ( TITLE, "title" ),
    ( ARTIST, "artist" ),
];

/// Disallowed characters and their ASCII replacements.
pub const TYPOGRAPHIC_REPLACEMENTS: &[( char, &str )] = &[
    ( '\u{2018}', "'" ),
    ( '\u{2019}', "'" ),
    ( '\u{201A}', "'" ),
    ( '\u{2032}', "'" ),
    ( '\u{201C}', "\"" ),
    ( '\u{201D}', "\"" ),
    ( '\u{201E}', "\"" ),
    ( '\u{2033}', "\"" ),
    ( '\u{2012}', "-" ),
    ( '\u{2013}', "-" ),
    ( '\u{2014}', "-" ),
    ( '\u{2212}', "-" ),
    ( '\u{2026}', "..." ),
];


/// Returns the ASCII replacement for a disallowed character.
fn replacement_for( c: char ) -> Option<&'static str> {
    TYPOGRAPHIC_REPLACEMENTS
        .iter()
        .find( |( from, _ )| *from == c )
        .map( |( _, to )| *to )
}


/// Replaces every disallowed typographic character.
pub fn replace_typographic( text: &str ) -> String {
    let mut out = String::with_capacity( text.len() );
    for c in text.chars() {
        match replacement_for( c ) {
            Some( to ) => out.push_str( to ),
            None => out.push( c ),
        }
    }
    out
}


/// Removes exactly one leading zero, if there is one.
pub fn strip_leading_zero( value: &str ) -> String {
    value.strip_prefix( '0' ).unwrap_or( value ).to_string()
}


/// Checks the disc and track number frames.
///
/// Multiple values and zero padding are fixable. A number without a
/// `/<total>` part is an issue, since the total cannot be guessed.
pub fn check_numbers( meta: &mut TrackMetadata, fix: bool ) -> Findings {
    let mut findings = Findings::new();

    for &( id, kind ) in NUMBER_FIELDS {
        let Some( values ) = meta.text_slot_mut( id ).and_then( |slot| slot.as_mut() ) else {
            continue;
        };
        let Some( first ) = values.first().cloned() else {
            continue;
        };

        if values.len() != 1 {
            findings.fix( format!( "Multiple {} number values", kind ) );
            if fix {
                values.truncate( 1 );
            }
        }
        if first.starts_with( '0' ) {
            findings.fix( format!( "Zero padded {} number", kind ) );
            if fix {
                values[ 0 ] = strip_leading_zero( &first );
            }
        }
        if !first.contains( '/' ) {
            findings.issue( format!( "No total {} specified", kind ) );
        }
    }

    findings
}


/// Flags albums carrying more than one title.
pub fn check_album_values( meta: &TrackMetadata ) -> Findings {
    let mut findings = Findings::new();
    if meta.album.as_ref().is_some_and( |values| values.len() > 1 ) {
        findings.issue( "Multiple values for album" );
    }
    findings
}


/// Checks text frames for typographic characters, one fix per occurrence.
pub fn check_characters( meta: &mut TrackMetadata, fix: bool ) -> Findings {
    let mut findings = Findings::new();

    for &( id, name ) in TEXT_FIELDS {
        let Some( values ) = meta.text_slot_mut( id ).and_then( |slot| slot.as_mut() ) else {
            continue;
        };
        for value in values.iter_mut() {
            let mut found = false;
            for c in value.chars().filter( |c| replacement_for( *c ).is_some() ) {
                findings.fix( format!( "Disallowed character '{}' in {}", c, name ) );
                found = true;
            }
            if found && fix {
                *value = replace_typographic( value );
            }
        }
    }

    findings
}


#[cfg( test )]
mod tests {
    use super::*;


    fn with_track( values: &[&str] ) -> TrackMetadata {
        TrackMetadata {
            track: Some( values.iter().map( |s| s.to_string() ).collect() ),
            ..Default::default()
        }
    }


    #[test]
    fn test_strip_exactly_one_zero_per_fix() {
        let mut meta = with_track( &[ "0005" ] );

        let findings = check_numbers( &mut meta, true );
        assert!( findings.mentions( "Zero padded track number" ) );
        assert_eq!( meta.first( TRACK ), "005" );

        check_numbers( &mut meta, true );
        assert_eq!( meta.first( TRACK ), "05" );

        check_numbers( &mut meta, true );
        assert_eq!( meta.first( TRACK ), "5" );

        let findings = check_numbers( &mut meta, true );
        assert!( !findings.mentions( "Zero padded" ) );
        assert_eq!( meta.first( TRACK ), "5" );
    }


    #[test]
    fn test_zero_padding_untouched_without_fix() {
        let mut meta = with_track( &[ "03/12" ] );
        let findings = check_numbers( &mut meta, false );
        assert_eq!( findings.fixes.len(), 1 );
        assert_eq!( meta.first( TRACK ), "03/12" );
    }


    #[test]
    fn test_missing_total_is_always_an_issue() {
        for fix in [ false, true ] {
            let mut meta = with_track( &[ "7" ] );
            let findings = check_numbers( &mut meta, fix );
            assert_eq!( findings.issues.len(), 1 );
            assert!( findings.fixes.is_empty() );
            assert!( findings.mentions( "No total track specified" ) );
            assert_eq!( meta.first( TRACK ), "7" );
        }
    }


    #[test]
    fn test_multiple_values_collapse_to_first() {
        let mut meta = TrackMetadata {
            disc: Some( vec![ "1/2".into(), "2/2".into() ] ),
            ..Default::default()
        };
        let findings = check_numbers( &mut meta, true );
        assert!( findings.mentions( "Multiple disc number values" ) );
        assert_eq!( meta.disc, Some( vec![ "1/2".to_string() ] ) );
    }


    #[test]
    fn test_collapse_then_strip() {
        let mut meta = with_track( &[ "04/10", "5/10" ] );
        let findings = check_numbers( &mut meta, true );
        assert_eq!( findings.fixes.len(), 2 );
        assert_eq!( meta.track, Some( vec![ "4/10".to_string() ] ) );
    }


    #[test]
    fn test_absent_number_fields_are_skipped() {
        let mut meta = TrackMetadata::default();
        assert!( check_numbers( &mut meta, true ).is_empty() );
    }


    #[test]
    fn test_replace_typographic() {
        assert_eq!( replace_typographic( "Don\u{2019}t Stop \u{2013} Live\u{2026}" ), "Don't Stop - Live..." );
        assert_eq!( replace_typographic( "\u{201C}Quoted\u{201D}" ), "\"Quoted\"" );
        assert_eq!( replace_typographic( "plain" ), "plain" );
    }


    #[test]
    fn test_one_fix_per_occurrence() {
        let mut meta = TrackMetadata {
            title: Some( vec![ "\u{2018}Til It\u{2019}s Over".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            ..Default::default()
        };

        let findings = check_characters( &mut meta, false );
        assert_eq!( findings.fixes.len(), 2 );
        assert!( findings.issues.is_empty() );
        assert_eq!( meta.title_name(), "\u{2018}Til It\u{2019}s Over" );

        check_characters( &mut meta, true );
        assert_eq!( meta.title_name(), "'Til It's Over" );
        assert!( check_characters( &mut meta, true ).is_empty() );
    }


    #[test]
    fn test_multiple_album_values() {
        let meta = TrackMetadata {
            album: Some( vec![ "One".into(), "Two".into() ] ),
            ..Default::default()
        };
        assert!( check_album_values( &meta ).mentions( "Multiple values for album" ) );
    }
}
