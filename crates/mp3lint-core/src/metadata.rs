//! Track metadata model
//!
//! A typed view over the ID3 frames the linter has rules for. Every other
//! frame is carried verbatim in `extra` so a write-back keeps it intact.

use std::collections::{ BTreeMap, BTreeSet };
use std::path::PathBuf;

use id3::frame::PictureType;
use id3::{ Encoding, Frame };


/// Song title frame.
pub const TITLE: &str = "TIT2";

/// Lead artist frame.
pub const ARTIST: &str = "TPE1";

/// Album title frame.
pub const ALBUM: &str = "TALB";

/// Release year frame (ID3v2.3).
pub const YEAR: &str = "TYER";

/// Track number frame, `<n>` or `<n>/<total>`.
pub const TRACK: &str = "TRCK";

/// Disc number frame, `<n>` or `<n>/<total>`.
pub const DISC: &str = "TPOS";

/// Attached picture frame.
pub const PICTURE: &str = "APIC";


/// A picture embedded in the tag.
#[derive( Debug, Clone, PartialEq )]
pub struct EmbeddedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub picture_type: PictureType,
    pub description: String,
    /// Text encoding of the description; `None` lets the writer choose.
    pub encoding: Option<Encoding>,
}


impl EmbeddedImage {
    /// Creates a front cover with an empty description and Latin-1 encoding.
    pub fn front_cover( data: Vec<u8>, mime_type: impl Into<String> ) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            encoding: Some( Encoding::Latin1 ),
        }
    }


    /// Whether the picture is classified as the front cover.
    pub fn is_front( &self ) -> bool {
        self.picture_type == PictureType::CoverFront
    }


    /// Whether the description uses the default (Latin-1) text encoding.
    pub fn has_default_encoding( &self ) -> bool {
        matches!( self.encoding, None | Some( Encoding::Latin1 ) )
    }
}


/// Metadata of a single track.
///
/// Text fields hold every value of a (possibly multi-valued) frame. A field
/// that is `Some` with an empty list means the frame exists but is empty.
#[derive( Debug, Clone, Default )]
pub struct TrackMetadata {
    /// Major tag version, `3` for ID3v2.3.
    pub version: u8,
    pub title: Option<Vec<String>>,
    pub artist: Option<Vec<String>>,
    pub album: Option<Vec<String>>,
    pub year: Option<Vec<String>>,
    pub track: Option<Vec<String>>,
    pub disc: Option<Vec<String>>,
    pub images: Vec<EmbeddedImage>,
    /// Frames without a typed field, keyed by frame identifier.
    pub extra: BTreeMap<String, Vec<Frame>>,
}


impl TrackMetadata {
    /// Returns the typed text field for a frame identifier.
    pub fn text( &self, id: &str ) -> Option<&Vec<String>> {
        match id {
            TITLE => self.title.as_ref(),
            ARTIST => self.artist.as_ref(),
            ALBUM => self.album.as_ref(),
            YEAR => self.year.as_ref(),
            TRACK => self.track.as_ref(),
            DISC => self.disc.as_ref(),
            _ => None,
        }
    }


    /// Returns the mutable slot of a typed text field.
    pub fn text_slot_mut( &mut self, id: &str ) -> Option<&mut Option<Vec<String>>> {
        match id {
            TITLE => Some( &mut self.title ),
            ARTIST => Some( &mut self.artist ),
            ALBUM => Some( &mut self.album ),
            YEAR => Some( &mut self.year ),
            TRACK => Some( &mut self.track ),
            DISC => Some( &mut self.disc ),
            _ => None,
        }
    }


    /// Sets a typed text field to a single value.
    pub fn set_text( &mut self, id: &str, value: impl Into<String> ) {
        if let Some( slot ) = self.text_slot_mut( id ) {
            *slot = Some( vec![ value.into() ] );
        }
    }


    /// First value of a text field, or an empty string.
    pub fn first( &self, id: &str ) -> &str {
        self.text( id )
            .and_then( |values| values.first() )
            .map( String::as_str )
            .unwrap_or( "" )
    }


    pub fn artist_name( &self ) -> &str {
        self.first( ARTIST )
    }


    pub fn title_name( &self ) -> &str {
        self.first( TITLE )
    }


    pub fn album_name( &self ) -> &str {
        self.first( ALBUM )
    }


    pub fn year_text( &self ) -> &str {
        self.first( YEAR )
    }


    /// Whether the track belongs to an album (non-empty album title).
    pub fn has_album( &self ) -> bool {
        !self.album_name().is_empty()
    }


    pub fn track_number( &self ) -> u32 {
        parse_number_pair( self.first( TRACK ) ).0
    }


    pub fn track_total( &self ) -> u32 {
        parse_number_pair( self.first( TRACK ) ).1
    }


    pub fn disc_number( &self ) -> u32 {
        parse_number_pair( self.first( DISC ) ).0
    }


    pub fn disc_total( &self ) -> u32 {
        parse_number_pair( self.first( DISC ) ).1
    }


    /// Identifiers of every frame present in the tag.
    pub fn present_fields( &self ) -> BTreeSet<String> {
        let mut fields: BTreeSet<String> = [ TITLE, ARTIST, ALBUM, YEAR, TRACK, DISC ]
            .into_iter()
            .filter( |id| self.text( id ).is_some() )
            .map( str::to_string )
            .collect();

        if !self.images.is_empty() {
            fields.insert( PICTURE.to_string() );
        }
        fields.extend( self.extra.keys().cloned() );
        fields
    }


    /// Deletes every frame with the given identifier.
    pub fn remove_field( &mut self, id: &str ) {
        if id == PICTURE {
            self.images.clear();
        } else if let Some( slot ) = self.text_slot_mut( id ) {
            *slot = None;
        } else {
            self.extra.remove( id );
        }
    }
}


/// A discovered file together with its parsed metadata.
#[derive( Debug, Clone )]
pub struct LibraryEntry {
    pub path: PathBuf,
    pub metadata: TrackMetadata,
}


/// Parses `"3"` or `"3/12"` into `(3, 0)` or `(3, 12)`.
///
/// Missing or unparsable parts become `0`.
pub fn parse_number_pair( value: &str ) -> ( u32, u32 ) {
    let mut parts = value.trim().splitn( 2, '/' );
    let number = parts.next().and_then( |p| p.trim().parse().ok() ).unwrap_or( 0 );
    let total = parts.next().and_then( |p| p.trim().parse().ok() ).unwrap_or( 0 );
    ( number, total )
}


#[cfg( test )]
mod tests {
    use super::*;


    fn album_track() -> TrackMetadata {
        TrackMetadata {
            version: 3,
            title: Some( vec![ "Tired of Being Alone".into() ] ),
            artist: Some( vec![ "Al Green".into() ] ),
            album: Some( vec![ "Let's Stay Together".into() ] ),
            year: Some( vec![ "1972".into() ] ),
            track: Some( vec![ "04/09".into() ] ),
            disc: Some( vec![ "1/1".into() ] ),
            ..Default::default()
        }
    }


    #[test]
    fn test_parse_number_pair() {
        assert_eq!( parse_number_pair( "3" ), ( 3, 0 ) );
        assert_eq!( parse_number_pair( "03/12" ), ( 3, 12 ) );
        assert_eq!( parse_number_pair( "" ), ( 0, 0 ) );
        assert_eq!( parse_number_pair( "x/7" ), ( 0, 7 ) );
    }


    #[test]
    fn test_number_accessors() {
        let meta = album_track();
        assert_eq!( meta.track_number(), 4 );
        assert_eq!( meta.track_total(), 9 );
        assert_eq!( meta.disc_number(), 1 );
        assert_eq!( meta.disc_total(), 1 );
    }


    #[test]
    fn test_has_album_needs_a_value() {
        let mut meta = album_track();
        assert!( meta.has_album() );

        meta.album = Some( Vec::new() );
        assert!( !meta.has_album() );

        meta.album = None;
        assert!( !meta.has_album() );
    }


    #[test]
    fn test_present_fields_include_pictures_and_extras() {
        let mut meta = album_track();
        meta.images.push( EmbeddedImage::front_cover( vec![ 1, 2, 3 ], "image/jpeg" ) );
        meta.extra.insert( "COMM".into(), Vec::new() );

        let present = meta.present_fields();
        for id in [ TITLE, ARTIST, ALBUM, YEAR, TRACK, DISC, PICTURE, "COMM" ] {
            assert!( present.contains( id ), "missing {}", id );
        }
        assert_eq!( present.len(), 8 );
    }


    #[test]
    fn test_remove_field() {
        let mut meta = album_track();
        meta.images.push( EmbeddedImage::front_cover( vec![ 1 ], "image/png" ) );
        meta.extra.insert( "TCON".into(), Vec::new() );

        meta.remove_field( DISC );
        meta.remove_field( PICTURE );
        meta.remove_field( "TCON" );

        assert!( meta.disc.is_none() );
        assert!( meta.images.is_empty() );
        assert!( meta.extra.is_empty() );
    }


    #[test]
    fn test_front_cover_defaults() {
        let image = EmbeddedImage::front_cover( vec![ 9 ], "image/jpeg" );
        assert!( image.is_front() );
        assert!( image.has_default_encoding() );
        assert!( image.description.is_empty() );
    }
}
