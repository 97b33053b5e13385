//! ID3 tag reading and writing
//!
//! Converts between `id3::Tag` and [`TrackMetadata`]. Tags are written
//! back in the version they were read with, except ID3v2.2 which can
//! only be written as ID3v2.3.

use std::path::{ Path, PathBuf };

use id3::frame::{ Content, Picture };
use id3::{ Frame, Tag, TagLike, Version };
use thiserror::Error;

use crate::metadata::{ EmbeddedImage, TrackMetadata, ALBUM, ARTIST, DISC, PICTURE, TITLE, TRACK, YEAR };


/// Text frames mapped onto typed fields.
const TYPED_TEXT_FRAMES: &[&str] = &[ TITLE, ARTIST, ALBUM, YEAR, TRACK, DISC ];

/// Separator between values of a multi-valued text frame.
const VALUE_SEPARATOR: char = '\0';


/// Errors that can occur while reading or writing tags.
#[derive( Debug, Error )]
pub enum TagError {
    #[error( "No ID3 tag found: {0}" )]
    NoTag( PathBuf ),

    #[error( "File not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Failed to read tag of {path}: {source}" )]
    Read {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },

    #[error( "Failed to write tag of {path}: {source}" )]
    Write {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },
}


/// Storage of track metadata.
pub trait TagStore {
    /// Reads the metadata of a file.
    fn read( &self, path: &Path ) -> Result<TrackMetadata, TagError>;

    /// Replaces the metadata of a file.
    fn write( &self, path: &Path, metadata: &TrackMetadata ) -> Result<(), TagError>;
}


/// [`TagStore`] backed by the `id3` crate.
#[derive( Debug, Clone, Copy, Default )]
pub struct Id3Store;


impl TagStore for Id3Store {
    fn read( &self, path: &Path ) -> Result<TrackMetadata, TagError> {
        match Tag::read_from_path( path ) {
            Ok( tag ) => Ok( from_tag( &tag ) ),
            Err( e ) if matches!( e.kind, id3::ErrorKind::NoTag ) => {
                Err( TagError::NoTag( path.to_path_buf() ) )
            }
            Err( e ) if matches!( &e.kind, id3::ErrorKind::Io( io ) if io.kind() == std::io::ErrorKind::NotFound ) => {
                Err( TagError::NotFound( path.to_path_buf() ) )
            }
            Err( e ) => Err( TagError::Read { path: path.to_path_buf(), source: e } ),
        }
    }


    fn write( &self, path: &Path, metadata: &TrackMetadata ) -> Result<(), TagError> {
        to_tag( metadata )
            .write_to_path( path, write_version( metadata.version ) )
            .map_err( |e| TagError::Write { path: path.to_path_buf(), source: e } )?;

        tracing::debug!( "Wrote tag: {:?}", path );
        Ok(())
    }
}


fn major_version( version: Version ) -> u8 {
    match version {
        Version::Id3v22 => 2,
        Version::Id3v23 => 3,
        _ => 4,
    }
}


/// Version a tag read as ID3v2.`major` is written back as.
fn write_version( major: u8 ) -> Version {
    match major {
        4 => Version::Id3v24,
        _ => Version::Id3v23,
    }
}


fn split_values( text: &str ) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split( VALUE_SEPARATOR ).map( str::to_string ).collect()
}


/// Builds typed metadata from a parsed tag.
pub fn from_tag( tag: &Tag ) -> TrackMetadata {
    let mut meta = TrackMetadata {
        version: major_version( tag.version() ),
        ..Default::default()
    };

    for frame in tag.frames() {
        match ( frame.id(), frame.content() ) {
            ( id, Content::Text( text ) ) if TYPED_TEXT_FRAMES.contains( &id ) => {
                if let Some( slot ) = meta.text_slot_mut( id ) {
                    slot.get_or_insert_with( Vec::new ).extend( split_values( text ) );
                }
            }
            ( PICTURE, Content::Picture( picture ) ) => {
                meta.images.push( EmbeddedImage {
                    data: picture.data.clone(),
                    mime_type: picture.mime_type.clone(),
                    picture_type: picture.picture_type,
                    description: picture.description.clone(),
                    encoding: frame.encoding(),
                });
            }
            ( id, _ ) => {
                meta.extra.entry( id.to_string() ).or_default().push( frame.clone() );
            }
        }
    }

    meta
}


/// Builds a tag from typed metadata, keeping its major version.
pub fn to_tag( meta: &TrackMetadata ) -> Tag {
    let mut tag = Tag::with_version( write_version( meta.version ) );

    for id in TYPED_TEXT_FRAMES {
        if let Some( values ) = meta.text( id ) {
            tag.add_frame( Frame::text( *id, values.join( &VALUE_SEPARATOR.to_string() ) ) );
        }
    }

    for image in &meta.images {
        let frame = Frame::with_content( PICTURE, Content::Picture( Picture {
            mime_type: image.mime_type.clone(),
            picture_type: image.picture_type,
            description: image.description.clone(),
            data: image.data.clone(),
        }));
        let frame = frame.set_encoding( image.encoding );
        tag.add_frame( frame );
    }

    for frame in meta.extra.values().flatten() {
        tag.add_frame( frame.clone() );
    }

    tag
}


#[cfg( test )]
mod tests {
    use super::*;
    use id3::frame::PictureType;
    use id3::Encoding;


    fn sample_tag() -> Tag {
        let mut tag = Tag::with_version( Version::Id3v23 );
        tag.add_frame( Frame::text( TITLE, "Love and Happiness" ) );
        tag.add_frame( Frame::text( ARTIST, "Al Green" ) );
        tag.add_frame( Frame::text( ALBUM, "I'm Still in Love with You" ) );
        tag.add_frame( Frame::text( YEAR, "1972" ) );
        tag.add_frame( Frame::text( TRACK, "3/9" ) );
        tag.add_frame( Frame::text( DISC, "1/1\u{0}2/2" ) );
        tag.add_frame( Frame::text( "TCON", "Soul" ) );
        tag.add_frame( Frame::with_content( PICTURE, Content::Picture( Picture {
            mime_type: "image/jpeg".into(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: vec![ 0xff, 0xd8, 0xff ],
        })));
        tag
    }


    #[test]
    fn test_from_tag_maps_typed_fields() {
        let meta = from_tag( &sample_tag() );
        assert_eq!( meta.version, 3 );
        assert_eq!( meta.title_name(), "Love and Happiness" );
        assert_eq!( meta.artist_name(), "Al Green" );
        assert_eq!( meta.year_text(), "1972" );
        assert_eq!( meta.track_number(), 3 );
        assert_eq!( meta.track_total(), 9 );
        assert_eq!( meta.disc, Some( vec![ "1/1".to_string(), "2/2".to_string() ] ) );
        assert_eq!( meta.images.len(), 1 );
        assert!( meta.images[ 0 ].is_front() );
        assert!( meta.extra.contains_key( "TCON" ) );
    }


    #[test]
    fn test_to_tag_keeps_extra_frames() {
        let mut meta = from_tag( &sample_tag() );
        meta.set_text( TRACK, "4/9" );
        meta.images[ 0 ].encoding = Some( Encoding::Latin1 );

        let tag = to_tag( &meta );
        assert_eq!( tag.version(), Version::Id3v23 );
        assert_eq!( tag.get( TRACK ).and_then( |f| f.content().text() ), Some( "4/9" ) );
        assert_eq!( tag.get( "TCON" ).and_then( |f| f.content().text() ), Some( "Soul" ) );
        assert_eq!( tag.pictures().count(), 1 );

        let back = from_tag( &tag );
        assert_eq!( back.present_fields(), meta.present_fields() );
        assert_eq!( back.disc, meta.disc );
    }


    #[test]
    fn test_removed_fields_are_not_written() {
        let mut meta = from_tag( &sample_tag() );
        meta.remove_field( "TCON" );
        meta.remove_field( DISC );

        let tag = to_tag( &meta );
        assert!( tag.get( "TCON" ).is_none() );
        assert!( tag.get( DISC ).is_none() );
    }


    #[test]
    fn test_write_keeps_v24() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write( file.path(), vec![ 0u8; 256 ] ).unwrap();

        let mut original = from_tag( &sample_tag() );
        original.version = 4;
        Id3Store.write( file.path(), &original ).unwrap();
        assert_eq!( Tag::read_from_path( file.path() ).unwrap().version(), Version::Id3v24 );

        let mut meta = Id3Store.read( file.path() ).unwrap();
        assert_eq!( meta.version, 4 );
        meta.remove_field( "TCON" );
        Id3Store.write( file.path(), &meta ).unwrap();

        let back = Id3Store.read( file.path() ).unwrap();
        assert_eq!( back.version, 4 );
        assert!( !back.extra.contains_key( "TCON" ) );
    }


    #[test]
    fn test_write_version() {
        assert_eq!( write_version( 2 ), Version::Id3v23 );
        assert_eq!( write_version( 3 ), Version::Id3v23 );
        assert_eq!( write_version( 4 ), Version::Id3v24 );
    }


    #[test]
    fn test_read_missing_file() {
        let result = Id3Store.read( Path::new( "/definitely/not/here.mp3" ) );
        assert!( matches!( result, Err( TagError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_read_untagged_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write( file.path(), vec![ 0u8; 256 ] ).unwrap();

        let result = Id3Store.read( file.path() );
        assert!( matches!( result, Err( TagError::NoTag( _ ) ) ) );
    }


    #[test]
    fn test_write_then_read() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write( file.path(), vec![ 0u8; 256 ] ).unwrap();

        let meta = from_tag( &sample_tag() );
        Id3Store.write( file.path(), &meta ).unwrap();

        let back = Id3Store.read( file.path() ).unwrap();
        assert_eq!( back.version, 3 );
        assert_eq!( back.title_name(), "Love and Happiness" );
        assert_eq!( back.images.len(), 1 );
        assert_eq!( back.images[ 0 ].data, vec![ 0xff, 0xd8, 0xff ] );
    }
}
