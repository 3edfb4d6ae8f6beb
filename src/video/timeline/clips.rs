use std::fs;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tempfile::NamedTempFile;

use super::{AudioClip, ClipSource, Timeline};
use crate::video::error::PipelineError;

/// Clips stored as `audio/<segment-id>.wav`.
pub struct WavClipSource {
    audio_dir: PathBuf,
}

impl WavClipSource {
    pub fn new(audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
        }
    }

    fn path_for(&self, segment_id: &str) -> PathBuf {
        self.audio_dir.join(format!("{segment_id}.wav"))
    }
}

impl ClipSource for WavClipSource {
    fn clip_for(&self, segment_id: &str) -> Result<Option<AudioClip>, PipelineError> {
        let path = self.path_for(segment_id);
        if !path.is_file() {
            return Ok(None);
        }
        let duration_ms = wav_duration_ms(&path)?;
        Ok(Some(AudioClip { path, duration_ms }))
    }
}

/// Duration from the WAV header, rounded to the nearest millisecond.
pub fn wav_duration_ms(path: &Path) -> Result<u64, PipelineError> {
    let reader = WavReader::open(path).map_err(|e| PipelineError::persistence(path, e))?;
    let rate = u64::from(reader.spec().sample_rate);
    if rate == 0 {
        return Err(PipelineError::persistence(path, "WAV header has a zero sample rate"));
    }
    let frames = u64::from(reader.duration());
    Ok((frames * 1000 + rate / 2) / rate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcatSummary {
    pub clips: usize,
    pub frames: u64,
    pub sample_rate: u32,
}

#[derive(Clone, Copy)]
enum SampleKind {
    I16,
    I32,
    F32,
}

impl SampleKind {
    fn of(spec: &WavSpec) -> Self {
        match spec.sample_format {
            SampleFormat::Float => Self::F32,
            SampleFormat::Int if spec.bits_per_sample <= 16 => Self::I16,
            SampleFormat::Int => Self::I32,
        }
    }
}

/// Concatenates the timeline's clips in entry order into one WAV, with
/// `gap_ms` of silence between consecutive clips. All clips must share one
/// format; the output replaces `output` only once fully written.
pub fn concat_timeline(timeline: &Timeline, output: &Path) -> Result<ConcatSummary, PipelineError> {
    let Some(first) = timeline.entries.first() else {
        return Err(PipelineError::persistence(output, "timeline has no clips to concatenate"));
    };
    let spec = open_clip(&first.segment_id, &first.clip)?.spec();
    let kind = SampleKind::of(&spec);

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
    let temp = NamedTempFile::new_in(parent).map_err(|e| PipelineError::persistence(output, e))?;
    let target = temp.reopen().map_err(|e| PipelineError::persistence(output, e))?;
    let mut writer = WavWriter::new(BufWriter::new(target), spec)
        .map_err(|e| PipelineError::persistence(output, e))?;

    // A WAV data chunk is addressed with 32 bits, so a gap beyond that can
    // never be written.
    let gap_samples = u128::from(spec.sample_rate) * u128::from(timeline.gap_ms) / 1000
        * u128::from(spec.channels);
    let gap_fits = gap_samples * u128::from(spec.bits_per_sample.div_ceil(8))
        <= u128::from(u32::MAX);
    for (idx, entry) in timeline.entries.iter().enumerate() {
        let mut reader = open_clip(&entry.segment_id, &entry.clip)?;
        let clip_spec = reader.spec();
        if clip_spec != spec {
            return Err(PipelineError::missing_input(
                &entry.segment_id,
                format!(
                    "clip {} is {} but the first clip is {}; re-export clips with one format",
                    entry.clip.display(),
                    describe(&clip_spec),
                    describe(&spec)
                ),
            ));
        }

        if idx > 0 {
            if !gap_fits {
                return Err(PipelineError::TimelineOverflow {
                    segment_id: entry.segment_id.clone(),
                });
            }
            write_silence(&mut writer, kind, gap_samples as u64)
                .map_err(|e| PipelineError::persistence(output, e))?;
        }
        copy_samples(&mut reader, &mut writer, kind)
            .map_err(|e| PipelineError::persistence(&entry.clip, e))?;
    }

    let frames = u64::from(writer.duration());
    writer
        .finalize()
        .map_err(|e| PipelineError::persistence(output, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::persistence(output, e))?;
    temp.persist(output)
        .map_err(|e| PipelineError::persistence(output, e.error))?;

    Ok(ConcatSummary {
        clips: timeline.entries.len(),
        frames,
        sample_rate: spec.sample_rate,
    })
}

fn open_clip(
    segment_id: &str,
    path: &Path,
) -> Result<WavReader<BufReader<fs::File>>, PipelineError> {
    WavReader::open(path).map_err(|e| {
        PipelineError::missing_input(
            segment_id,
            format!("cannot read clip {}: {e}", path.display()),
        )
    })
}

fn copy_samples<R, W>(
    reader: &mut WavReader<R>,
    writer: &mut WavWriter<W>,
    kind: SampleKind,
) -> hound::Result<()>
where
    R: Read,
    W: Write + Seek,
{
    match kind {
        SampleKind::I16 => {
            for sample in reader.samples::<i16>() {
                writer.write_sample(sample?)?;
            }
        }
        SampleKind::I32 => {
            for sample in reader.samples::<i32>() {
                writer.write_sample(sample?)?;
            }
        }
        SampleKind::F32 => {
            for sample in reader.samples::<f32>() {
                writer.write_sample(sample?)?;
            }
        }
    }
    Ok(())
}

fn write_silence<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    kind: SampleKind,
    samples: u64,
) -> hound::Result<()> {
    for _ in 0..samples {
        match kind {
            SampleKind::I16 => writer.write_sample(0i16)?,
            SampleKind::I32 => writer.write_sample(0i32)?,
            SampleKind::F32 => writer.write_sample(0.0f32)?,
        }
    }
    Ok(())
}

fn describe(spec: &WavSpec) -> String {
    let format = match spec.sample_format {
        SampleFormat::Int => "int",
        SampleFormat::Float => "float",
    };
    format!(
        "{} ch / {} Hz / {}-bit {}",
        spec.channels, spec.sample_rate, spec.bits_per_sample, format
    )
}
