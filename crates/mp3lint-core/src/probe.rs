//! Bitrate lookup via Symphonia
//!
//! MP3 streams do not carry a single bitrate, so the average is derived
//! from the file size and the stream duration.

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;


/// Reported when the bitrate cannot be determined.
pub const DEFAULT_BITRATE_KBPS: u32 = 128;


/// Errors that can occur while probing a file.
#[derive( Debug, Error )]
pub enum ProbeError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Unknown stream duration" )]
    UnknownDuration,
}


/// Looks up the bitrate of an audio file.
pub trait BitrateProbe {
    /// Average bitrate in kbps, if it can be determined.
    fn bitrate_kbps( &self, path: &Path ) -> Option<u32>;
}


/// [`BitrateProbe`] backed by Symphonia.
#[derive( Debug, Clone, Copy, Default )]
pub struct SymphoniaProbe;


impl BitrateProbe for SymphoniaProbe {
    fn bitrate_kbps( &self, path: &Path ) -> Option<u32> {
        match average_bitrate( path ) {
            Ok( kbps ) => Some( kbps ),
            Err( e ) => {
                tracing::debug!( "No bitrate for {:?}: {}", path, e );
                None
            }
        }
    }
}


/// Computes the average bitrate of the first audio track in kbps.
pub fn average_bitrate( path: &Path ) -> Result<u32, ProbeError> {
    let file = File::open( path )?;
    let file_len = file.metadata()?.len();
    let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions::default() );

    // Provide hint based on file extension
    let mut hint = Hint::new();
    if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
        hint.with_extension( ext );
    }

    let probed = symphonia::default::get_probe()
        .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
        .map_err( |_| ProbeError::UnsupportedFormat )?;

    let track = probed.format
        .tracks()
        .iter()
        .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
        .ok_or( ProbeError::NoAudioTrack )?;

    let params = &track.codec_params;
    let ( frames, sample_rate ) = match ( params.n_frames, params.sample_rate ) {
        ( Some( frames ), Some( rate ) ) if frames > 0 && rate > 0 => ( frames, rate ),
        _ => return Err( ProbeError::UnknownDuration ),
    };

    let duration_secs = frames as f64 / sample_rate as f64;
    Ok( kbps( file_len, duration_secs ) )
}


fn kbps( bytes: u64, duration_secs: f64 ) -> u32 {
    ( bytes as f64 * 8.0 / duration_secs / 1000.0 ).round() as u32
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_kbps() {
        // 4 minutes at 320 kbps
        assert_eq!( kbps( 9_600_000, 240.0 ), 320 );
        assert_eq!( kbps( 1_920_000, 120.0 ), 128 );
    }


    #[test]
    fn test_missing_file_has_no_bitrate() {
        assert!( matches!(
            average_bitrate( Path::new( "/definitely/not/here.mp3" ) ),
            Err( ProbeError::FileOpen( _ ) )
        ) );
        assert_eq!( SymphoniaProbe.bitrate_kbps( Path::new( "/definitely/not/here.mp3" ) ), None );
    }


    #[test]
    fn test_non_audio_file_is_unsupported() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write( file.path(), b"plain text, not audio" ).unwrap();
        assert!( SymphoniaProbe.bitrate_kbps( file.path() ).is_none() );
    }
}
