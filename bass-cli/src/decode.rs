use anyhow::{Context, Result};
use bass_core::SampleBuffer;
use crossbeam_channel::Sender;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A decoded file, downmixed to mono.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut decode_buf = DecodeBuffer::<f32>::new(decoded.frames() as u64, spec);
        decode_buf.copy_interleaved_ref(decoded);

        // Downmix to mono
        let interleaved = decode_buf.samples();
        if channels == 1 {
            samples.extend_from_slice(interleaved);
        } else {
            samples.extend(
                interleaved
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples,
        sample_rate,
    })
}

/// Cuts decoded audio into consecutive windows. A trailing partial window is dropped.
pub fn windows(audio: &AudioData, frame_size: usize) -> impl Iterator<Item = SampleBuffer> + '_ {
    let frame_size = frame_size.max(1);
    audio
        .samples
        .chunks_exact(frame_size)
        .enumerate()
        .filter_map(move |(index, chunk)| {
            let buffer = SampleBuffer::new(chunk.to_vec(), audio.sample_rate).ok()?;
            Some(buffer.with_position((index * frame_size) as u64))
        })
}

/// Plays decoded audio into the analysis loop on its own thread, one window
/// per window-length of wall time unless `realtime` is off.
pub fn spawn_file_source(
    audio: AudioData,
    frame_size: usize,
    sender: Sender<SampleBuffer>,
    realtime: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for buffer in windows(&audio, frame_size) {
            let pause = Duration::from_secs_f64(buffer.duration());
            if sender.send(buffer).is_err() {
                log::debug!("Analysis loop closed, stopping file playback");
                return;
            }
            if realtime {
                thread::sleep(pause);
            }
        }
        log::info!("End of file reached");
    })
}
