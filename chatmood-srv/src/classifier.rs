//! External inference command backend
//!
//! Runs the configured command once per message: normalized text goes to
//! stdin, one JSON document comes back on stdout:
//!
//! ```json
//! {"sentiment": {"label": "negative", "score": 0.93},
//!  "toxicity": [{"label": "toxic", "score": 0.41}, {"label": "insult", "score": 0.12}]}
//! ```
//!
//! Calls block until the command exits; the analysis pool runs them on the
//! blocking thread pool.

use std::io::Write;
use std::process::{Command, Stdio};

use chatmood_common::analysis::{Classification, Classifier, ClassifierError};
use tracing::debug;

/// Text used to check the backend at startup
const PROBE_TEXT: &str = "hello";

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    display: String,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let display = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            program,
            args,
            display,
        }
    }

    /// Build from a whitespace-separated command line (no shell quoting)
    pub fn from_command_line(command_line: &str) -> Result<Self, ClassifierError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ClassifierError::Unavailable("empty classifier command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Run one classification to make sure the models answer
    pub fn probe(&self) -> Result<(), ClassifierError> {
        self.classify(PROBE_TEXT).map(|_| ())
    }
}

impl Classifier for CommandClassifier {
    fn name(&self) -> &str {
        &self.display
    }

    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClassifierError::Unavailable(format!("{}: {}", self.display, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                // Reap the child before bailing out
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClassifierError::Backend(format!(
                "exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        debug!(bytes = output.stdout.len(), "Classifier command finished");
        serde_json::from_slice(&output.stdout)
            .map_err(|e| ClassifierError::MalformedOutput(e.to_string()))
    }
}
