//! Legacy word-processor conversion through an external executable.
//!
//! The uploaded bytes are written to a scoped temporary file, the converter is run with the
//! file path as its single argument, and its stdout becomes the extracted text. The temporary
//! file is removed on every exit path.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Errors raised while converting a legacy document.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The converter executable could not be started.
    #[error("failed to launch converter '{program}': {source}")]
    Spawn {
        /// Executable that was invoked.
        program: String,
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },
    /// The converter ran but exited unsuccessfully.
    #[error("converter exited with {status}: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Diagnostic text captured from stderr.
        stderr: String,
    },
    /// Staging the temporary input file failed.
    #[error("failed to stage document for conversion: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a document on disk into plain text.
pub trait Converter: Send + Sync {
    /// Convert the file at `path` and return its text.
    fn convert(&self, path: &Path) -> Result<String, ConverterError>;
}

/// Converter backed by an external program such as `antiword`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
}

impl CommandConverter {
    /// Create a converter that runs `program <path>`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Converter for CommandConverter {
    fn convert(&self, path: &Path) -> Result<String, ConverterError> {
        let output = Command::new(&self.program)
            .arg(path)
            .output()
            .map_err(|source| ConverterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ConverterError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Convert legacy document bytes, returning an empty string on any failure.
pub fn extract_legacy(bytes: &[u8], converter: &dyn Converter) -> String {
    match convert_staged(bytes, converter) {
        Ok(text) => text,
        Err(error) => {
            tracing::error!(error = %error, "Error during conversion");
            String::new()
        }
    }
}

fn convert_staged(bytes: &[u8], converter: &dyn Converter) -> Result<String, ConverterError> {
    let mut staged = tempfile::Builder::new()
        .prefix("smartdoc-")
        .suffix(".doc")
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    tracing::debug!(path = %staged.path().display(), bytes = bytes.len(), "Staged legacy document");

    let result = converter.convert(staged.path());

    if let Err(error) = staged.close() {
        tracing::warn!(error = %error, "Failed to remove staged document");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records the staged path and whether the file existed while converting.
    struct RecordingConverter {
        outcome: Result<&'static str, &'static str>,
        seen: Mutex<Option<(PathBuf, bool, Vec<u8>)>>,
    }

    impl RecordingConverter {
        fn new(outcome: Result<&'static str, &'static str>) -> Self {
            Self {
                outcome,
                seen: Mutex::new(None),
            }
        }

        fn seen(&self) -> (PathBuf, bool, Vec<u8>) {
            self.seen
                .lock()
                .unwrap()
                .clone()
                .expect("converter was invoked")
        }
    }

    impl Converter for RecordingConverter {
        fn convert(&self, path: &Path) -> Result<String, ConverterError> {
            let contents = std::fs::read(path).unwrap_or_default();
            *self.seen.lock().unwrap() = Some((path.to_path_buf(), path.exists(), contents));
            match self.outcome {
                Ok(text) => Ok(text.to_string()),
                Err(stderr) => Err(ConverterError::Failed {
                    status: "exit status: 1".into(),
                    stderr: stderr.into(),
                }),
            }
        }
    }

    #[test]
    fn returns_converter_stdout_and_removes_staged_file() {
        let converter = RecordingConverter::new(Ok("Sample text from DOC."));
        let text = extract_legacy(b"fake_doc_content", &converter);
        assert_eq!(text, "Sample text from DOC.");

        let (path, existed, contents) = converter.seen();
        assert!(existed, "document must be staged before conversion");
        assert_eq!(contents, b"fake_doc_content");
        assert!(!path.exists(), "staged file leaked at {}", path.display());
    }

    #[test]
    fn empty_output_yields_empty_text() {
        let converter = RecordingConverter::new(Ok(""));
        assert_eq!(extract_legacy(b"", &converter), "");
        let (path, _, _) = converter.seen();
        assert!(!path.exists());
    }

    #[test]
    fn converter_failure_yields_empty_text_and_removes_staged_file() {
        let converter = RecordingConverter::new(Err("not a word document"));
        assert_eq!(extract_legacy(b"fake_doc_content", &converter), "");
        let (path, existed, _) = converter.seen();
        assert!(existed);
        assert!(!path.exists(), "staged file leaked at {}", path.display());
    }

    #[test]
    fn missing_program_is_absorbed() {
        let converter = CommandConverter::new("smartdoc-converter-that-does-not-exist");
        assert_eq!(extract_legacy(b"fake_doc_content", &converter), "");
    }

    #[cfg(unix)]
    #[test]
    fn command_converter_captures_stdout() {
        let converter = CommandConverter::new("cat");
        assert_eq!(
            extract_legacy(b"plain bytes through cat", &converter),
            "plain bytes through cat"
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_converter_reports_non_zero_exit() {
        let converter = CommandConverter::new("false");
        let staged = tempfile::NamedTempFile::new().unwrap();
        let error = converter.convert(staged.path()).unwrap_err();
        assert!(matches!(error, ConverterError::Failed { .. }));
        assert_eq!(extract_legacy(b"anything", &converter), "");
    }
}
