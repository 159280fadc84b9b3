//! Client tying the command producer and the record scanner together.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::BufReader;

use crate::exec::{CommandRunner, RunError, ShellRunner};
use crate::p4::{scan_depot_files, DepotFile, ScanError};

/// Capacity of the in-memory pipe between the producer and the scanner.
///
/// The pipe is bounded so a fast command cannot buffer its whole output in
/// memory; the producer suspends once the scanner falls this far behind.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Error type for stream depth lookups.
#[derive(thiserror::Error, Debug)]
pub enum DepthError {
    /// The depth was zero or negative.
    #[error("stream depth must be a positive integer")]
    NotPositive,
    /// The lookup itself failed.
    #[error("stream depth lookup failed: {0}")]
    Lookup(String),
}

/// Provides the number of leading path segments that make up the
/// depot-stream root for the current context.
#[async_trait]
pub trait StreamDepthSource: Send + Sync {
    /// Return the stream depth, a positive integer.
    ///
    /// # Errors
    ///
    /// Returns `DepthError` if the depth cannot be determined.
    async fn stream_depth(&self) -> Result<usize, DepthError>;
}

/// A stream depth known up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedDepth(pub usize);

#[async_trait]
impl StreamDepthSource for FixedDepth {
    async fn stream_depth(&self) -> Result<usize, DepthError> {
        if self.0 == 0 {
            return Err(DepthError::NotPositive);
        }
        Ok(self.0)
    }
}

/// Error type for listing depot files.
#[derive(thiserror::Error, Debug)]
pub enum ListError {
    /// The command string does not request tagged output.
    #[error(r#"missing "-z tag" in cmd: {0}"#)]
    MissingTagFlag(String),
    /// The stream depth could not be determined.
    #[error(transparent)]
    Depth(#[from] DepthError),
    /// The output stream was malformed or unreadable.
    #[error("error scanning for files: {0}")]
    Scan(#[from] ScanError),
    /// The command ran but failed.
    #[error("error listing files: {0}")]
    Command(#[from] RunError),
    /// The producer task panicked or was cancelled.
    #[error("command task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Client for commands that emit tagged depot file records.
pub struct DepotClient {
    runner: Arc<dyn CommandRunner>,
    depth: Arc<dyn StreamDepthSource>,
}

impl DepotClient {
    /// Create a client with an explicit runner and depth source.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, depth: Arc<dyn StreamDepthSource>) -> Self {
        Self { runner, depth }
    }

    /// Create a client that runs commands through the system shell.
    #[must_use]
    pub fn with_shell(depth: Arc<dyn StreamDepthSource>) -> Self {
        Self::new(Arc::new(ShellRunner), depth)
    }

    /// Run `cmd` and parse its tagged output into depot file records,
    /// sorted case-insensitively by path.
    ///
    /// `cmd` must request tagged output (contain `-ztag` or `-z tag`); the
    /// command is not started otherwise. The command runs on a separate
    /// task, streaming into a bounded pipe that this task scans. If both
    /// the scanner and the command report errors, the scanner's error wins:
    /// aborting the scan closes the pipe, and the write failure that causes
    /// in the producer is a symptom, not the cause.
    ///
    /// # Errors
    ///
    /// Returns `ListError` if the command string lacks the tagged-output
    /// flag, the depth lookup fails, the output is malformed, or the
    /// command exits with a failure status. No records are returned
    /// alongside an error.
    pub async fn run_and_parse_depot_files(&self, cmd: &str) -> Result<Vec<DepotFile>, ListError> {
        if !cmd.contains("-ztag") && !cmd.contains("-z tag") {
            return Err(ListError::MissingTagFlag(cmd.to_string()));
        }
        let depth = self.depth.stream_depth().await?;
        if depth == 0 {
            return Err(ListError::Depth(DepthError::NotPositive));
        }

        tracing::debug!(cmd = %cmd, depth, "listing depot files");
        let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
        let runner = Arc::clone(&self.runner);
        let cmd_owned = cmd.to_string();
        let producer =
            tokio::spawn(async move { runner.run(&cmd_owned, Box::new(writer)).await });

        // Scanning runs here, on the calling task. On a protocol error the
        // read end is dropped, which unblocks a producer stuck mid-write.
        let scanned = scan_depot_files(BufReader::new(reader), depth).await;

        // Join before inspecting the command error; the value is only
        // guaranteed visible once the task has finished.
        let run_result = producer.await?;

        let mut files = scanned?;
        run_result?;

        files.sort_by_cached_key(|f| f.path.to_lowercase());
        tracing::debug!(count = files.len(), "depot file listing complete");
        Ok(files)
    }

    /// List depot files matching `pattern` (`p4 files`).
    ///
    /// # Errors
    ///
    /// See [`DepotClient::run_and_parse_depot_files`].
    pub async fn files(&self, pattern: &str) -> Result<Vec<DepotFile>, ListError> {
        let pattern = shell_escape::escape(pattern.into());
        self.run_and_parse_depot_files(&format!("p4 -ztag files {pattern}"))
            .await
    }

    /// List files opened for pending changelists (`p4 opened`).
    ///
    /// # Errors
    ///
    /// See [`DepotClient::run_and_parse_depot_files`].
    pub async fn opened(&self) -> Result<Vec<DepotFile>, ListError> {
        self.run_and_parse_depot_files("p4 -ztag opened").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::OutputSink;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::AsyncWriteExt;

    /// Runner that replays canned bytes instead of executing anything.
    struct ScriptedRunner {
        output: Vec<u8>,
        exit_code: Option<i32>,
        invoked: Arc<AtomicBool>,
    }

    impl ScriptedRunner {
        fn new(output: &str) -> Self {
            Self {
                output: output.as_bytes().to_vec(),
                exit_code: None,
                invoked: Arc::new(AtomicBool::new(false)),
            }
        }

        fn failing(output: &str, exit_code: i32) -> Self {
            Self {
                exit_code: Some(exit_code),
                ..Self::new(output)
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _cmd: &str, mut out: OutputSink) -> Result<(), RunError> {
            self.invoked.store(true, Ordering::SeqCst);
            out.write_all(&self.output).await?;
            out.shutdown().await?;
            match self.exit_code {
                None => Ok(()),
                Some(code) => Err(RunError::Failed {
                    status: ExitStatus::from_raw(code << 8),
                }),
            }
        }
    }

    fn client_with(runner: ScriptedRunner, depth: usize) -> DepotClient {
        DepotClient::new(Arc::new(runner), Arc::new(FixedDepth(depth)))
    }

    #[tokio::test]
    async fn parses_and_sorts_records() {
        let runner = ScriptedRunner::new(
            "... depotFile //depot/Engine/a.cpp\n... action edit\n\n\
             ... depotFile //depot/Content/x.uasset\n... action add\n\n",
        );
        let client = client_with(runner, 1);

        let files = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "Content/x.uasset");
        assert_eq!(files[1].path, "Engine/a.cpp");
    }

    #[tokio::test]
    async fn sorting_ignores_case() {
        let runner = ScriptedRunner::new(
            "... depotFile //depot/zebra.txt\n\n\
             ... depotFile //depot/Apple.txt\n\n\
             ... depotFile //depot/mango.txt\n\n",
        );
        let client = client_with(runner, 1);

        let files = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["Apple.txt", "mango.txt", "zebra.txt"]);
        for pair in files.windows(2) {
            assert!(pair[0].path.to_lowercase() <= pair[1].path.to_lowercase());
        }
    }

    #[tokio::test]
    async fn case_only_duplicates_both_survive_the_sort() {
        // The relative order of case-only-differing paths is unspecified;
        // assert only that both are present and the weak ordering holds.
        let runner = ScriptedRunner::new(
            "... depotFile //depot/README\n\n\
             ... depotFile //depot/readme\n\n",
        );
        let client = client_with(runner, 1);

        let files = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.path == "README"));
        assert!(files.iter().any(|f| f.path == "readme"));
        assert!(files[0].path.to_lowercase() <= files[1].path.to_lowercase());
    }

    #[tokio::test]
    async fn missing_tag_flag_never_runs_the_command() {
        let runner = ScriptedRunner::new("");
        let invoked = Arc::clone(&runner.invoked);
        let client = client_with(runner, 1);

        let err = client
            .run_and_parse_depot_files("p4 files //depot/...")
            .await
            .unwrap_err();

        assert!(matches!(err, ListError::MissingTagFlag(_)));
        assert!(err.to_string().contains("p4 files //depot/..."));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spaced_tag_flag_form_is_accepted() {
        let runner = ScriptedRunner::new("... depotFile //depot/a.txt\n\n");
        let client = client_with(runner, 1);

        let files = client
            .run_and_parse_depot_files("p4 -z tag files //depot/...")
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn depth_failure_short_circuits() {
        let runner = ScriptedRunner::new("");
        let invoked = Arc::clone(&runner.invoked);
        let client = client_with(runner, 0);

        let err = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap_err();

        assert!(matches!(err, ListError::Depth(DepthError::NotPositive)));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn command_failure_is_surfaced() {
        let runner = ScriptedRunner::failing("... depotFile //depot/a.txt\n\n", 1);
        let client = client_with(runner, 1);

        let err = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap_err();

        assert!(matches!(err, ListError::Command(RunError::Failed { .. })));
    }

    #[tokio::test]
    async fn scanner_error_beats_command_error() {
        let runner = ScriptedRunner::failing("garbage\n", 1);
        let client = client_with(runner, 1);

        let err = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap_err();

        match err {
            ListError::Scan(ScanError::Malformed(line)) => assert_eq!(line, "garbage"),
            other => panic!("expected Scan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn protocol_error_discards_earlier_records() {
        let runner = ScriptedRunner::new(
            "... depotFile //depot/a.txt\n\n\
             not a tagged line\n",
        );
        let client = client_with(runner, 1);

        let err = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a tagged line"));
    }

    #[tokio::test]
    async fn large_output_flows_through_the_bounded_pipe() {
        // Well past PIPE_CAPACITY, so the producer must suspend and resume.
        let mut output = String::new();
        for i in 0..5000 {
            output.push_str(&format!("... depotFile //depot/dir/file{i:05}.txt\n\n"));
        }
        let runner = ScriptedRunner::new(&output);
        let client = client_with(runner, 1);

        let files = client
            .run_and_parse_depot_files("p4 -ztag files //depot/...")
            .await
            .unwrap();
        assert_eq!(files.len(), 5000);
    }

    #[tokio::test]
    async fn files_builds_a_tagged_command() {
        let runner = ScriptedRunner::new("... depotFile //depot/a.txt\n\n");
        let client = client_with(runner, 1);

        let files = client.files("//depot/...").await.unwrap();
        assert_eq!(files[0].path, "a.txt");
    }

    #[tokio::test]
    async fn opened_parses_records() {
        let runner = ScriptedRunner::new(
            "... depotFile //depot/b.txt\n... action edit\n... change 42\n\n",
        );
        let client = client_with(runner, 1);

        let files = client.opened().await.unwrap();
        assert_eq!(files[0].action, "edit");
        assert_eq!(files[0].cl, "42");
    }
}
