use anyhow::{Context, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Join WAV files back to back into `out`, with `lead_in` seconds of
/// silence before the first and `gap` seconds between neighbours.
/// All inputs must share one format. Returns the written duration.
pub fn concat_wavs(inputs: &[PathBuf], lead_in: f64, gap: f64, out: &Path) -> anyhow::Result<f64> {
    let Some(first) = inputs.first() else {
        bail!("no narration clips to concatenate");
    };
    let spec = WavReader::open(first)
        .with_context(|| format!("reading {}", first.display()))?
        .spec();

    let mut writer = WavWriter::create(out, spec)?;
    let mut frames = 0_u64;
    frames += write_silence(&mut writer, spec, lead_in)?;
    for (i, input) in inputs.iter().enumerate() {
        if i > 0 {
            frames += write_silence(&mut writer, spec, gap)?;
        }
        let mut reader =
            WavReader::open(input).with_context(|| format!("reading {}", input.display()))?;
        if reader.spec() != spec {
            bail!(
                "{} has format {:?}, expected {:?}",
                input.display(),
                reader.spec(),
                spec
            );
        }
        let samples = reader.len() as u64;
        match spec.sample_format {
            SampleFormat::Int => {
                for s in reader.samples::<i32>() {
                    writer.write_sample(s?)?;
                }
            }
            SampleFormat::Float => {
                for s in reader.samples::<f32>() {
                    writer.write_sample(s?)?;
                }
            }
        }
        frames += samples / spec.channels as u64;
    }
    writer.finalize()?;
    Ok(frames as f64 / spec.sample_rate as f64)
}

fn write_silence<W>(writer: &mut WavWriter<W>, spec: WavSpec, seconds: f64) -> anyhow::Result<u64>
where
    W: std::io::Write + std::io::Seek,
{
    if seconds <= 0.0 {
        return Ok(0);
    }
    let frames = (seconds * spec.sample_rate as f64).round() as u64;
    for _ in 0..frames * spec.channels as u64 {
        match spec.sample_format {
            SampleFormat::Int => writer.write_sample(0_i32)?,
            SampleFormat::Float => writer.write_sample(0.0_f32)?,
        }
    }
    Ok(frames)
}

/// Write `seconds` of a quiet tone; used for fixtures and the fake engine.
#[cfg(test)]
pub fn write_test_wav(path: &Path, seconds: f64, sample_rate: u32) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let frames = (seconds * sample_rate as f64).round() as u64;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let v = (t * 440.0 * std::f64::consts::TAU).sin() * 1000.0;
        writer.write_sample(v as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
