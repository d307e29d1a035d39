use std::io;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;

use super::model::EntitySpan;
use super::GenerationError;

/// Runs an external NER program once per block.
///
/// The block is written to the program's stdin; stdout must be a JSON
/// array of `{"text": ..., "label": ...}` objects in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecognizer {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        CommandRecognizer {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Run the program on one block.
    ///
    /// Stdin is fed while stdout and stderr are drained, so a chatty program
    /// cannot stall on a full pipe. A program still running after `limit` is
    /// killed and reaped before [`GenerationError::TimedOut`] is returned.
    pub async fn recognize(
        &self,
        text: &str,
        limit: Duration,
    ) -> Result<Vec<EntitySpan>, GenerationError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let exchange = async {
            let feed = async move {
                if let Some(mut pipe) = stdin {
                    match pipe.write_all(text.as_bytes()).await {
                        // The program may exit without reading all of its input.
                        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                        _ => {}
                    }
                }
                Ok(())
            };
            let (fed, out, err, status) =
                tokio::join!(feed, read_all(stdout), read_all(stderr), child.wait());
            fed?;
            Ok::<_, io::Error>((status?, out?, err?))
        };

        let (status, stdout, stderr) = match tokio::time::timeout(limit, exchange).await {
            Ok(finished) => finished?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill recognizer `{}`: {}", self.command, e);
                }
                return Err(GenerationError::TimedOut(limit));
            }
        };

        if !status.success() {
            return Err(GenerationError::Exit {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let spans: Vec<EntitySpan> = serde_json::from_slice(&stdout)?;
        Ok(spans)
    }
}

async fn read_all(pipe: Option<impl AsyncRead + Unpin>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    const LIMIT: Duration = Duration::from_secs(10);

    fn shell(script: &str) -> CommandRecognizer {
        CommandRecognizer::new("sh").with_args(vec!["-c".into(), script.into()])
    }

    fn run(
        recognizer: &CommandRecognizer,
        text: &str,
        limit: Duration,
    ) -> Result<Vec<EntitySpan>, GenerationError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(recognizer.recognize(text, limit))
    }

    #[test]
    fn parses_json_spans() {
        let r = shell(
            r#"cat >/dev/null; echo '[{"text":"Ada Lovelace","label":"PERSON"},{"text":"Paris","label":"GPE"}]'"#,
        );
        let spans = run(&r, "Ada Lovelace went to Paris.", LIMIT).unwrap();
        assert_eq!(
            spans,
            vec![
                EntitySpan::new("Ada Lovelace", "PERSON"),
                EntitySpan::new("Paris", "GPE"),
            ]
        );
    }

    #[test]
    fn receives_block_on_stdin() {
        // Echo the block back as a single span.
        let r = shell(r#"printf '[{"text":"%s","label":"PERSON"}]' "$(cat)""#);
        let spans = run(&r, "Grace Hopper", LIMIT).unwrap();
        assert_eq!(spans, vec![EntitySpan::new("Grace Hopper", "PERSON")]);
    }

    #[test]
    fn program_ignoring_stdin_still_succeeds() {
        let r = shell("echo '[]'");
        assert!(run(&r, "Grace Hopper", LIMIT).unwrap().is_empty());
    }

    #[test]
    fn large_block_echoed_to_stderr_does_not_stall() {
        // Far more than a pipe buffer flows out before stdin is exhausted.
        let r = shell("cat >&2; echo '[]'");
        let block = "Ada Lovelace wrote the notes. ".repeat(10_000);
        let t0 = Instant::now();
        assert!(run(&r, &block, LIMIT).unwrap().is_empty());
        assert!(t0.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn timed_out_program_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let r = CommandRecognizer::new("sh").with_args(vec![
            "-c".into(),
            r#"echo $$ > "$0"; exec sleep 30"#.into(),
            pid_file.display().to_string(),
        ]);

        let t0 = Instant::now();
        let result = run(&r, "text", Duration::from_millis(500));
        assert!(matches!(result, Err(GenerationError::TimedOut(_))));
        assert!(t0.elapsed() < Duration::from_secs(5));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "recognizer {} still running", pid.trim());
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let r = shell("cat >/dev/null; echo 'model missing' >&2; exit 3");
        match run(&r, "text", LIMIT) {
            Err(GenerationError::Exit { stderr, .. }) => assert_eq!(stderr, "model missing"),
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_output_is_an_error() {
        let r = shell("cat >/dev/null; echo 'not json'");
        assert!(matches!(run(&r, "text", LIMIT), Err(GenerationError::Output(_))));
    }

    #[test]
    fn missing_program_is_an_error() {
        let r = CommandRecognizer::new("namex-no-such-recognizer");
        assert!(matches!(
            run(&r, "text", LIMIT),
            Err(GenerationError::Spawn { .. })
        ));
    }
}
