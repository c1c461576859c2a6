//! File sink: raw PCM or WAV.

use crate::sink::Sink;
use crate::SinkError;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// WAV file format constants
// See: http://soundfile.sapp.org/doc/WaveFormat/

/// Byte offset of the file size field in WAV header (RIFF chunk size).
const WAV_FILE_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field in WAV header.
const WAV_DATA_SIZE_OFFSET: u64 = 40;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
const WAV_HEADER_SIZE: usize = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Recordings are always mono.
const WAV_CHANNELS: u16 = 1;

/// Bytes per sample (16-bit = 2 bytes).
const BYTES_PER_SAMPLE: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Raw,
    Wav { sample_rate: u32 },
}

/// A sink that writes recorded samples to a file.
///
/// [`FileSink::raw`] produces headerless signed 16-bit little-endian mono
/// PCM, byte for byte what the microphone delivered. [`FileSink::wav`] writes
/// the same data behind a 44-byte PCM header so ordinary tools can play it.
///
/// The file is created (truncating any existing file) by [`Sink::open`].
///
/// # Example
///
/// ```no_run
/// use tapstory_audio::{AudioEngine, FileSink};
///
/// let engine = AudioEngine::new();
/// engine
///     .start_recording_with(Box::new(FileSink::wav("take.wav", 44_100)), 0)
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct FileSink {
    name: String,
    path: PathBuf,
    layout: Layout,
    writer: Option<BufWriter<File>>,
    samples_written: u64,
    encoded: Vec<u8>,
}

impl FileSink {
    /// Creates a sink that writes headerless 16-bit little-endian PCM.
    pub fn raw(path: impl AsRef<Path>) -> Self {
        Self::with_layout(path.as_ref(), Layout::Raw)
    }

    /// Creates a sink that writes a mono 16-bit WAV file at `sample_rate`.
    pub fn wav(path: impl AsRef<Path>, sample_rate: u32) -> Self {
        Self::with_layout(path.as_ref(), Layout::Wav { sample_rate })
    }

    fn with_layout(path: &Path, layout: Layout) -> Self {
        Self {
            name: format!("file:{}", path.display()),
            path: path.to_path_buf(),
            layout,
            writer: None,
            samples_written: 0,
            encoded: Vec::new(),
        }
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples written since the sink was opened.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Writes a complete WAV header with the given parameters.
    ///
    /// The header includes RIFF, fmt, and data chunk headers (44 bytes total).
    fn write_wav_header(
        writer: &mut BufWriter<File>,
        sample_rate: u32,
        data_size: u32,
    ) -> std::io::Result<()> {
        // RIFF container header
        writer.write_all(b"RIFF")?;
        let file_size = WAV_HEADER_SIZE as u32 - 8 + data_size;
        writer.write_all(&file_size.to_le_bytes())?;
        writer.write_all(b"WAVE")?;

        // fmt subchunk
        writer.write_all(b"fmt ")?;
        writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
        writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
        writer.write_all(&WAV_CHANNELS.to_le_bytes())?;
        writer.write_all(&sample_rate.to_le_bytes())?;

        let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
        let byte_rate = sample_rate * u32::from(WAV_CHANNELS) * u32::from(bytes_per_sample);
        writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = WAV_CHANNELS * bytes_per_sample;
        writer.write_all(&block_align.to_le_bytes())?;
        writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

        // data subchunk header
        writer.write_all(b"data")?;
        writer.write_all(&data_size.to_le_bytes())?;

        Ok(())
    }

    /// Patches the size fields once the final data length is known.
    fn update_wav_header(writer: &mut BufWriter<File>, data_size: u32) -> std::io::Result<()> {
        let file_size = WAV_HEADER_SIZE as u32 - 8 + data_size;
        writer.seek(SeekFrom::Start(WAV_FILE_SIZE_OFFSET))?;
        writer.write_all(&file_size.to_le_bytes())?;

        writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
        writer.write_all(&data_size.to_le_bytes())?;

        writer.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SinkError> {
        let file = File::create(&self.path).map_err(|e| SinkError::file_error(&self.path, e))?;
        let mut writer = BufWriter::new(file);

        if let Layout::Wav { sample_rate } = self.layout {
            // Placeholder sizes, patched in finish()
            Self::write_wav_header(&mut writer, sample_rate, 0)
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }

        tracing::debug!(sink = %self.name, "file sink opened");
        self.writer = Some(writer);
        self.samples_written = 0;
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        if self.writer.is_none() {
            self.open()?;
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::write_failed("file sink is not open"));
        };

        self.encoded.clear();
        self.encoded
            .extend(samples.iter().flat_map(|s| s.to_le_bytes()));
        writer
            .write_all(&self.encoded)
            .map_err(|e| SinkError::file_error(&self.path, e))?;

        self.samples_written += samples.len() as u64;
        tracing::trace!(sink = %self.name, samples = samples.len(), "file sink write");
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        if let Layout::Wav { .. } = self.layout {
            let data_size = u32::try_from(self.samples_written * BYTES_PER_SAMPLE)
                .map_err(|_| SinkError::write_failed("recording exceeds WAV size limit"))?;
            Self::update_wav_header(&mut writer, data_size)
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }

        writer
            .flush()
            .map_err(|e| SinkError::file_error(&self.path, e))?;

        tracing::debug!(
            sink = %self.name,
            samples = self.samples_written,
            "file sink finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_raw_sink_writes_headerless_le_pcm() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.pcm");

        let mut sink = FileSink::raw(&path);
        sink.open().unwrap();
        sink.write(&[0x1234, -2]).unwrap();
        sink.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data, vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn test_open_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.pcm");
        std::fs::write(&path, [0xAA; 64]).unwrap();

        let mut sink = FileSink::raw(&path);
        sink.open().unwrap();
        sink.write(&[1]).unwrap();
        sink.finish().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_open_without_samples_leaves_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pcm");

        let mut sink = FileSink::raw(&path);
        sink.open().unwrap();
        sink.finish().unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_invalid_path_fails_on_open() {
        let mut sink = FileSink::raw("/nonexistent/directory/take.pcm");
        let err = sink.open().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::raw(dir.path().join("take.pcm"));
        sink.open().unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_wav_header_patched_on_finish() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let mut sink = FileSink::wav(&path, 44_100);
        sink.open().unwrap();
        sink.write(&[100, 200]).unwrap();
        sink.write(&[300, 400]).unwrap();
        sink.write(&[500, 600]).unwrap();
        sink.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(&data[12..16], b"fmt ");
        assert_eq!(&data[36..40], b"data");

        // 6 samples * 2 bytes
        assert_eq!(u32_at(&data, 40), 12);
        assert_eq!(u32_at(&data, 4), WAV_HEADER_SIZE as u32 - 8 + 12);
        assert_eq!(data.len(), WAV_HEADER_SIZE + 12);
    }

    #[test]
    fn test_wav_header_describes_mono_16_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let mut sink = FileSink::wav(&path, 48_000);
        sink.open().unwrap();
        sink.write(&[0x1234]).unwrap();
        sink.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(u16::from_le_bytes([data[22], data[23]]), 1);
        assert_eq!(u32_at(&data, 24), 48_000);
        assert_eq!(u32_at(&data, 28), 48_000 * 2);
        assert_eq!(u16::from_le_bytes([data[32], data[33]]), 2);
        assert_eq!(u16::from_le_bytes([data[34], data[35]]), 16);
        assert_eq!(&data[WAV_HEADER_SIZE..], &[0x34, 0x12]);
    }

    #[test]
    fn test_file_sink_name() {
        let sink = FileSink::raw("/path/to/take.pcm");
        assert_eq!(sink.name(), "file:/path/to/take.pcm");
        assert_eq!(sink.path(), Path::new("/path/to/take.pcm"));
    }
}
