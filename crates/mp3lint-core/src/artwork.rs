//! Cover art validation and repair
//!
//! The policy is a single front cover with an empty description, a JPEG or
//! PNG MIME type, the default text encoding and at most [`MAX_COVER_BYTES`]
//! of data. Re-encoding goes through the [`ArtworkCodec`] seam.

use std::io::Write;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use thiserror::Error;

use crate::metadata::{ EmbeddedImage, TrackMetadata };
use crate::report::Findings;


/// Largest accepted cover, in bytes.
pub const MAX_COVER_BYTES: usize = 1_000_000;

/// Edge length oversized covers are resized to.
pub const COVER_EDGE_PX: u32 = 700;

/// Quality used when re-encoding covers.
pub const JPEG_QUALITY: u8 = 95;

/// MIME types accepted without re-encoding.
pub const ALLOWED_MIME_TYPES: &[&str] = &[ "image/jpeg", "image/png" ];


/// Errors that can occur while re-encoding a cover.
#[derive( Debug, Error )]
pub enum ArtworkError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Image error: {0}" )]
    Image( #[from] image::ImageError ),
}


/// Image codec used to bring a cover back within policy.
pub trait ArtworkCodec {
    /// Decodes `data`, resizes it to [`COVER_EDGE_PX`] square when
    /// `shrink` is set, and returns it re-encoded as JPEG.
    fn reencode( &self, data: &[u8], mime_type: &str, shrink: bool ) -> Result<Vec<u8>, ArtworkError>;
}


/// [`ArtworkCodec`] backed by the `image` crate.
#[derive( Debug, Clone, Copy, Default )]
pub struct ImageCodec;


impl ArtworkCodec for ImageCodec {
    fn reencode( &self, data: &[u8], mime_type: &str, shrink: bool ) -> Result<Vec<u8>, ArtworkError> {
        // Decode from a scratch copy of the embedded payload
        let extension = mime_type.rsplit( '/' ).next().filter( |s| !s.is_empty() ).unwrap_or( "img" );
        let mut scratch = tempfile::Builder::new()
            .prefix( "mp3lint_cover" )
            .suffix( &format!( ".{}", extension ) )
            .tempfile()?;
        scratch.write_all( data )?;
        scratch.flush()?;

        let decoded = ImageReader::open( scratch.path() )?
            .with_guessed_format()?
            .decode()?;

        let decoded = if shrink {
            decoded.resize_exact( COVER_EDGE_PX, COVER_EDGE_PX, FilterType::Lanczos3 )
        } else {
            decoded
        };

        // JPEG has no alpha or palette, always hand the encoder plain RGB
        let rgb = decoded.to_rgb8();

        let mut encoded = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality( &mut encoded, JPEG_QUALITY );
            encoder.encode_image( &rgb )?;
        }

        tracing::debug!(
            "Re-encoded cover: {} bytes {} -> {} bytes image/jpeg",
            data.len(),
            mime_type,
            encoded.len()
        );
        Ok( encoded )
    }
}


fn is_allowed_mime( mime_type: &str ) -> bool {
    ALLOWED_MIME_TYPES.contains( &mime_type )
}


/// Checks the embedded images of a track.
///
/// When there is more than one image and none is a front cover, every
/// finding becomes an issue and nothing is fixed: there is no safe way to
/// tell which picture is meant to be the cover.
pub fn check_cover(
    meta: &mut TrackMetadata,
    codec: &dyn ArtworkCodec,
    fix: bool,
) -> Result<Findings, ArtworkError> {
    let mut findings = Findings::new();
    let all = meta.images.len();
    let fronts = meta.images.iter().filter( |img| img.is_front() ).count();

    if all == 0 {
        findings.issue( "No cover art found" );
    }
    if all > 1 {
        if fronts > 1 {
            findings.fix( "Multiple front cover pictures found" );
        } else if fronts == 1 {
            findings.fix( "Single front cover, but also other images present" );
        } else {
            findings.issue( "Multiple embedded images found, none of them front" );
        }
    }

    let relevant = meta.images.iter().filter( |img| fronts == 0 || img.is_front() );
    for img in relevant {
        if img.data.is_empty() {
            findings.issue( "Cover picture data is empty" );
        }
        if img.data.len() > MAX_COVER_BYTES {
            findings.fix( "Cover picture is too large >1MB" );
        }
        if !img.description.is_empty() {
            findings.fix( "Cover picture has a description" );
        }
        if !img.is_front() {
            findings.fix( "Cover picture type is not Front" );
        }
        if !img.has_default_encoding() {
            findings.issue( "Cover picture has an incorrect encoding" );
        }
        if !is_allowed_mime( &img.mime_type ) {
            findings.fix( "Cover picture has an incorrect mime type" );
        }
    }

    if fronts == 0 && all > 1 {
        findings.demote_fixes();
    }

    if fix && !findings.fixes.is_empty() {
        replace_cover( meta, codec )?;
    }

    Ok( findings )
}


/// Replaces all images with a single, compliant front cover.
fn replace_cover( meta: &mut TrackMetadata, codec: &dyn ArtworkCodec ) -> Result<(), ArtworkError> {
    let index = meta.images.iter().position( EmbeddedImage::is_front ).unwrap_or( 0 );
    let Some( source ) = meta.images.get( index ) else {
        return Ok(());
    };

    let oversized = source.data.len() > MAX_COVER_BYTES;
    let cover = if oversized || !is_allowed_mime( &source.mime_type ) {
        let data = codec.reencode( &source.data, &source.mime_type, oversized )?;
        EmbeddedImage::front_cover( data, "image/jpeg" )
    } else {
        EmbeddedImage::front_cover( source.data.clone(), source.mime_type.clone() )
    };

    meta.images = vec![ cover ];
    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;

    use id3::frame::PictureType;
    use id3::Encoding;
    use image::{ DynamicImage, GenericImageView, Rgba, RgbaImage };


    /// Codec that records calls and returns a fixed payload.
    #[derive( Default )]
    struct FakeCodec {
        calls: Cell<usize>,
        shrunk: Cell<bool>,
    }


    impl ArtworkCodec for FakeCodec {
        fn reencode( &self, _data: &[u8], _mime_type: &str, shrink: bool ) -> Result<Vec<u8>, ArtworkError> {
            self.calls.set( self.calls.get() + 1 );
            self.shrunk.set( shrink );
            Ok( vec![ 0xff, 0xd8 ] )
        }
    }


    fn picture( picture_type: PictureType ) -> EmbeddedImage {
        EmbeddedImage {
            data: vec![ 1, 2, 3 ],
            mime_type: "image/jpeg".into(),
            picture_type,
            description: String::new(),
            encoding: Some( Encoding::Latin1 ),
        }
    }


    fn with_images( images: Vec<EmbeddedImage> ) -> TrackMetadata {
        TrackMetadata { images, ..Default::default() }
    }


    #[test]
    fn test_no_images_is_single_issue() {
        let mut meta = with_images( Vec::new() );
        let findings = check_cover( &mut meta, &FakeCodec::default(), true ).unwrap();
        assert_eq!( findings.issues.len(), 1 );
        assert!( findings.mentions( "No cover art found" ) );
        assert!( findings.fixes.is_empty() );
    }


    #[test]
    fn test_compliant_cover_is_clean() {
        let mut meta = with_images( vec![ picture( PictureType::CoverFront ) ] );
        let findings = check_cover( &mut meta, &FakeCodec::default(), true ).unwrap();
        assert!( findings.is_empty() );
    }


    #[test]
    fn test_extra_non_front_image_is_fixable() {
        let codec = FakeCodec::default();
        let mut meta = with_images( vec![ picture( PictureType::Other ), picture( PictureType::CoverFront ) ] );

        let findings = check_cover( &mut meta.clone(), &codec, false ).unwrap();
        assert_eq!( findings.fixes.len(), 1 );
        assert!( findings.issues.is_empty() );
        assert!( findings.mentions( "Single front cover, but also other images present" ) );

        check_cover( &mut meta, &codec, true ).unwrap();
        assert_eq!( meta.images.len(), 1 );
        assert!( meta.images[ 0 ].is_front() );
        assert_eq!( codec.calls.get(), 0 );
    }


    #[test]
    fn test_multiple_front_covers_keep_first() {
        let mut first = picture( PictureType::CoverFront );
        first.data = vec![ 7 ];
        let mut meta = with_images( vec![ picture( PictureType::Other ), first, picture( PictureType::CoverFront ) ] );

        let findings = check_cover( &mut meta, &FakeCodec::default(), true ).unwrap();
        assert!( findings.mentions( "Multiple front cover pictures found" ) );
        assert_eq!( meta.images.len(), 1 );
        assert_eq!( meta.images[ 0 ].data, vec![ 7 ] );
    }


    #[test]
    fn test_no_front_among_many_is_never_fixed() {
        let mut described = picture( PictureType::Other );
        described.description = "back".into();
        let original = vec![ described, picture( PictureType::CoverBack ) ];

        for fix in [ false, true ] {
            let mut meta = with_images( original.clone() );
            let findings = check_cover( &mut meta, &FakeCodec::default(), fix ).unwrap();
            assert!( findings.fixes.is_empty() );
            assert!( findings.mentions( "Multiple embedded images found, none of them front" ) );
            assert!( findings.mentions( "Cover picture type is not Front" ) );
            assert!( findings.mentions( "Cover picture has a description" ) );
            assert_eq!( meta.images, original );
        }
    }


    #[test]
    fn test_single_non_front_image_is_fixed() {
        let mut meta = with_images( vec![ picture( PictureType::Other ) ] );
        let findings = check_cover( &mut meta, &FakeCodec::default(), true ).unwrap();
        assert!( findings.mentions( "Cover picture type is not Front" ) );
        assert!( findings.issues.is_empty() );
        assert!( meta.images[ 0 ].is_front() );
    }


    #[test]
    fn test_oversized_cover_is_shrunk() {
        let codec = FakeCodec::default();
        let mut big = picture( PictureType::CoverFront );
        big.data = vec![ 0; MAX_COVER_BYTES + 1 ];
        let mut meta = with_images( vec![ big ] );

        let findings = check_cover( &mut meta, &codec, true ).unwrap();
        assert!( findings.mentions( "too large" ) );
        assert_eq!( codec.calls.get(), 1 );
        assert!( codec.shrunk.get() );
        assert_eq!( meta.images[ 0 ].mime_type, "image/jpeg" );
        assert_eq!( meta.images[ 0 ].data, vec![ 0xff, 0xd8 ] );
    }


    #[test]
    fn test_wrong_mime_is_reencoded_without_shrinking() {
        let codec = FakeCodec::default();
        let mut gif = picture( PictureType::CoverFront );
        gif.mime_type = "image/gif".into();
        let mut meta = with_images( vec![ gif ] );

        let findings = check_cover( &mut meta, &codec, true ).unwrap();
        assert!( findings.mentions( "incorrect mime type" ) );
        assert_eq!( codec.calls.get(), 1 );
        assert!( !codec.shrunk.get() );
        assert_eq!( meta.images[ 0 ].mime_type, "image/jpeg" );
    }


    #[test]
    fn test_bad_encoding_and_empty_data_are_issues() {
        let mut broken = picture( PictureType::CoverFront );
        broken.data.clear();
        broken.encoding = Some( Encoding::UTF16 );
        let mut meta = with_images( vec![ broken ] );

        let findings = check_cover( &mut meta, &FakeCodec::default(), false ).unwrap();
        assert!( findings.mentions( "Cover picture data is empty" ) );
        assert!( findings.mentions( "Cover picture has an incorrect encoding" ) );
        assert!( findings.fixes.is_empty() );
    }


    #[test]
    fn test_image_codec_shrinks_to_jpeg() {
        let source = RgbaImage::from_pixel( 900, 600, Rgba( [ 10, 200, 30, 128 ] ) );
        let mut png = Cursor::new( Vec::new() );
        DynamicImage::ImageRgba8( source )
            .write_to( &mut png, image::ImageFormat::Png )
            .unwrap();

        let jpeg = ImageCodec.reencode( png.get_ref(), "image/png", true ).unwrap();
        let decoded = image::load_from_memory( &jpeg ).unwrap();
        assert_eq!( decoded.dimensions(), ( COVER_EDGE_PX, COVER_EDGE_PX ) );
        assert_eq!( image::guess_format( &jpeg ).unwrap(), image::ImageFormat::Jpeg );
    }


    #[test]
    fn test_image_codec_rejects_garbage() {
        assert!( ImageCodec.reencode( b"not an image", "image/bmp", false ).is_err() );
    }
}
