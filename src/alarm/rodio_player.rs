#![cfg(feature = "audio-rodio")]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::sound::{PlaybackError, SoundPlayer};

/// Audio channel backed by the default system output device.
pub struct RodioPlayer {
    // Dropping the stream silences every sink; it lives as long as the player.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioPlayer {
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

impl SoundPlayer for RodioPlayer {
    fn is_busy(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => PlaybackError::Missing {
                path: path.to_path_buf(),
            },
            _ => PlaybackError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
        sink.append(decoder);
        self.sink = Some(sink);
        Ok(())
    }
}
