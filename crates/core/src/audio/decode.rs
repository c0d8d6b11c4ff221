use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer as PcmScratch,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::{Result, ScrubError};

use super::SampleBuffer;

/// Decodes an in-memory audio file into per-channel planes.
///
/// `extension` is an optional format hint such as `"mp3"`; the container is
/// probed either way.
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleBuffer> {
    if bytes.is_empty() {
        return Err(ScrubError::Decode("payload is empty".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ScrubError::Decode("no audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut planes: Vec<Vec<f32>> = Vec::new();
    let mut scratch: Option<PcmScratch<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped rather than failing the whole file.
            Err(SymphoniaError::DecodeError(err)) => {
                tracing::debug!(%err, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }
        sample_rate.get_or_insert(spec.rate);
        if planes.is_empty() {
            planes = vec![Vec::new(); channels];
        }

        let needed = decoded.capacity() as u64;
        if scratch
            .as_ref()
            .map(|buf| (buf.capacity() as u64) < needed)
            .unwrap_or(true)
        {
            scratch = Some(PcmScratch::new(needed, spec));
        }
        let Some(buf) = scratch.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        for (i, sample) in buf.samples().iter().enumerate() {
            if let Some(plane) = planes.get_mut(i % channels) {
                plane.push(*sample);
            }
        }
    }

    if planes.first().map(Vec::is_empty).unwrap_or(true) {
        return Err(ScrubError::Decode("no audio frames decoded".to_string()));
    }
    let sample_rate =
        sample_rate.ok_or_else(|| ScrubError::Decode("unknown sample rate".to_string()))?;

    SampleBuffer::new(planes, sample_rate)
}

/// Extracts a lower-case file extension from a URL or path, ignoring any
/// query string or fragment.
pub fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
