//! Speech-to-text via Whisper
//!
//! The model file is resolved through the capability gate and the context is
//! loaded once per process. Per-segment transcription failures are the
//! caller's to contain; this module only reports them.

use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::{debug, info};
use videoseek_common::{ProcessingError, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

static SHARED: OnceCell<SpeechToText> = OnceCell::new();

/// Whisper-backed transcription engine
pub struct SpeechToText {
    context: WhisperContext,
    threads: i32,
    language: Option<String>,
}

impl SpeechToText {
    /// The per-process shared engine, loading the model on first use.
    ///
    /// # Errors
    /// Returns a missing-capability error when the model file is absent and
    /// a transcription error when the model cannot be loaded.
    pub fn shared() -> Result<&'static SpeechToText> {
        SHARED.get_or_try_init(Self::load)
    }

    fn load() -> Result<Self> {
        let model_path = videoseek_capability::whisper_model()?;
        info!("Loading Whisper model from {}", model_path.display());
        let model_path_str = model_path.to_str().ok_or_else(|| {
            ProcessingError::Transcription("model path is not valid UTF-8".to_string())
        })?;
        let context =
            WhisperContext::new_with_params(model_path_str, WhisperContextParameters::default())
                .map_err(|e| {
                    ProcessingError::Transcription(format!("failed to load model: {e}"))
                })?;
        Ok(Self {
            context,
            threads: num_cpus::get() as i32,
            language: std::env::var("WHISPER_LANGUAGE").ok(),
        })
    }

    /// Transcribe a 16 kHz mono WAV file to plain text.
    ///
    /// # Errors
    /// Returns a transcription error when the audio cannot be read or the
    /// model run fails.
    pub fn transcribe_wav(&self, audio_path: &Path) -> Result<String> {
        let samples = read_wav_mono_f32(audio_path)?;
        debug!(
            "Transcribing {} samples ({:.2}s) from {}",
            samples.len(),
            samples.len() as f64 / 16000.0,
            audio_path.display()
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_translate(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        if let Some(language) = &self.language {
            params.set_language(Some(language.as_str()));
        }

        let mut state = self.context.create_state().map_err(|e| {
            ProcessingError::Transcription(format!("failed to create state: {e}"))
        })?;
        state
            .full(params, &samples)
            .map_err(|e| ProcessingError::Transcription(format!("model run failed: {e}")))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(segment.to_string().trim());
            text.push(' ');
        }
        Ok(text.trim().to_string())
    }
}

/// Read WAV samples as f32 in [-1, 1], verifying the 16 kHz mono contract.
fn read_wav_mono_f32(audio_path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(audio_path)
        .map_err(|e| ProcessingError::Transcription(format!("failed to open WAV: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate != 16000 {
        return Err(ProcessingError::Transcription(format!(
            "expected 16kHz audio, got {}Hz",
            spec.sample_rate
        )));
    }
    if spec.channels != 1 {
        return Err(ProcessingError::Transcription(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let num_samples = reader.len() as usize;
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            let mut samples = Vec::with_capacity(num_samples);
            for sample in reader.samples::<i32>() {
                let sample = sample.map_err(|e| {
                    ProcessingError::Transcription(format!("failed to read sample: {e}"))
                })?;
                samples.push(sample as f32 / max_value);
            }
            Ok(samples)
        }
        hound::SampleFormat::Float => {
            let mut samples = Vec::with_capacity(num_samples);
            for sample in reader.samples::<f32>() {
                let sample = sample.map_err(|e| {
                    ProcessingError::Transcription(format!("failed to read sample: {e}"))
                })?;
                samples.push(sample);
            }
            Ok(samples)
        }
    }
}
