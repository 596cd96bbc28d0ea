use crate::error::{PIPER_HINT, StartupError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Text-to-speech backend: writes a WAV for `text` to `out_path`.
pub trait SpeechEngine {
    /// `length_scale` stretches speech; above 1.0 is slower.
    fn synthesize(&self, text: &str, length_scale: f64, out_path: &Path) -> anyhow::Result<()>;
}

pub struct Piper {
    bin: PathBuf,
    model: PathBuf,
}

impl Piper {
    pub fn new(bin: PathBuf, model: PathBuf) -> Self {
        Self { bin, model }
    }

    /// Resolve the piper binary and check the voice model exists.
    pub fn locate(bin: Option<&Path>, model: &Path) -> Result<Self, StartupError> {
        let bin = match bin {
            Some(p) if p.is_file() => p.to_path_buf(),
            Some(p) => {
                return Err(StartupError::MissingTool {
                    tool: "piper",
                    detail: format!("{} does not exist", p.display()),
                    hint: PIPER_HINT,
                });
            }
            None => which::which("piper").map_err(|e| StartupError::MissingTool {
                tool: "piper",
                detail: e.to_string(),
                hint: PIPER_HINT,
            })?,
        };
        if !model.is_file() {
            return Err(StartupError::MissingTool {
                tool: "piper voice model",
                detail: format!("{} does not exist", model.display()),
                hint: "Download an .onnx voice (plus its .onnx.json) from https://huggingface.co/rhasspy/piper-voices and pass --piper-model",
            });
        }
        Ok(Self::new(bin, model.to_path_buf()))
    }
}

impl SpeechEngine for Piper {
    fn synthesize(&self, text: &str, length_scale: f64, out_path: &Path) -> anyhow::Result<()> {
        debug!("Calling piper for {}", out_path.display());
        let mut child = Command::new(&self.bin)
            .arg("--model")
            .arg(&self.model)
            .arg("--length_scale")
            .arg(format!("{length_scale:.3}"))
            .arg("--output_file")
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        {
            let Some(stdin) = child.stdin.as_mut() else {
                anyhow::bail!("piper stdin unavailable");
            };
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Piper TTS failed for {}: {}", out_path.display(), stderr.trim());
            anyhow::bail!("TTS engine failed for chunk, command returned {}", output.status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Piper::locate(Some(&dir.path().join("piper")), &dir.path().join("v.onnx"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not exist"));
        assert!(err.to_string().contains("piper"));
    }

    #[test]
    fn missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("piper");
        std::fs::write(&bin, "").unwrap();
        let err = Piper::locate(Some(&bin), &dir.path().join("v.onnx")).err().unwrap();
        assert!(err.to_string().contains("voice model"));
    }
}
