use crate::collectors::parse::{parse_output, OutputFormat};
use crate::collectors::{CollectFuture, Collector};
use crate::error::CollectorError;
use crate::state::ValueKind;
use log::{debug, info};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Collector that runs an external scraper and parses its stdout
///
/// The scraper (typically a headless-browser script) is responsible for
/// navigating the source page; this collector only owns the subprocess and
/// the interpretation of its output.
pub struct CommandCollector {
    /// Program to execute
    program: String,
    /// Arguments passed to the program
    args: Vec<String>,
    /// Format the program prints
    format: OutputFormat,
    /// Kind of values the monitored domain produces
    expected: ValueKind,
    /// Upper bound for one scraper run
    timeout: Duration,
}

impl CommandCollector {
    /// Create a new CommandCollector
    ///
    /// # Arguments
    ///
    /// * `command` - Program followed by its arguments
    /// * `format` - Output format of the program
    /// * `expected` - Value kind every collected entry must have
    /// * `timeout` - Maximum runtime before the program is killed
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::SubprocessSpawn` if `command` is empty.
    pub fn new(
        command: &[String],
        format: OutputFormat,
        expected: ValueKind,
        timeout: Duration,
    ) -> Result<Self, CollectorError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| CollectorError::SubprocessSpawn("empty collector command".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            format,
            expected,
            timeout,
        })
    }

    async fn run(&self) -> Result<String, CollectorError> {
        debug!("Spawning collector: {} {:?}", self.program, self.args);

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollectorError::SubprocessSpawn(format!("{}: {}", self.program, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CollectorError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::SubprocessFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Collector for CommandCollector {
    fn collect(&self) -> CollectFuture<'_> {
        Box::pin(async move {
            let stdout = self.run().await?;
            let entries = parse_output(self.format, &stdout, self.expected)?;
            info!("Collected {} entries from {}", entries.len(), self.program);
            Ok(entries)
        })
    }
}
