//! Incremental parsing of child-process output streams.
//!
//! External tools emit facts we care about (a JSON document, announced file
//! paths, progress timestamps) interleaved with noise, and chunk boundaries
//! fall anywhere. One `OutputParser` is owned by exactly one invocation and
//! dropped with it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::FetchError;

static SUBTITLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[info\] Writing video subtitles to: (.+)$").unwrap());
static MEDIA_DESTINATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\] Destination: (.+)$").unwrap());
static MEDIA_EXISTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\] (.+?) has already been downloaded").unwrap());
static MEDIA_MERGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\[Merger\] Merging formats into "(.+)"$"#).unwrap());
static PROGRESS_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d+)").unwrap());

/// Category of a file path announced on a tool's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A timed-text subtitle file (`.vtt`)
    TimedText,
    /// An already-converted plain-text subtitle file (`.txt`)
    PlainText,
    /// The media file being written or reused
    Media,
}

/// A structured fact extracted from a tool's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// The single JSON document an invocation was expected to emit
    Json(serde_json::Value),
    /// A file path announced by the tool
    File(FileKind, PathBuf),
    /// Elapsed processing time in seconds, taken from a progress line
    Progress(f64),
}

/// Splits a chunked text stream into lines, retaining the unterminated tail.
///
/// Completed lines are returned exactly once, so downstream pattern matching
/// never re-scans text it has already consumed. `\n`, `\r` and `\r\n` all
/// terminate a line; ffmpeg rewrites its progress line with bare `\r`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    tail: String,
    pending_cr: bool,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for c in chunk.chars() {
            match c {
                '\n' => {
                    if self.pending_cr {
                        // second half of \r\n, already flushed
                        self.pending_cr = false;
                    } else {
                        lines.push(std::mem::take(&mut self.tail));
                    }
                }
                '\r' => {
                    lines.push(std::mem::take(&mut self.tail));
                    self.pending_cr = true;
                }
                _ => {
                    self.pending_cr = false;
                    self.tail.push(c);
                }
            }
        }
        lines
    }

    /// Flush the unterminated tail, if any, as a final line
    pub fn flush(&mut self) -> Option<String> {
        if self.tail.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.tail))
        }
    }
}

/// Per-invocation parser state for one child process.
///
/// Standard output and standard error are buffered separately; a tool's
/// structured announcements and its diagnostics never share a channel.
#[derive(Debug)]
pub struct OutputParser {
    expect_json: bool,
    json_emitted: bool,
    stdout_lines: LineBuffer,
    stderr_lines: LineBuffer,
    stdout_text: String,
    stderr_text: String,
}

impl OutputParser {
    pub fn new(expect_json: bool) -> Self {
        Self {
            expect_json,
            json_emitted: false,
            stdout_lines: LineBuffer::default(),
            stderr_lines: LineBuffer::default(),
            stdout_text: String::new(),
            stderr_text: String::new(),
        }
    }

    /// Consume a chunk of standard output, returning any newly completed events
    pub fn feed_stdout(&mut self, chunk: &[u8]) -> Vec<OutputEvent> {
        let text = String::from_utf8_lossy(chunk);
        self.stdout_text.push_str(&text);

        let mut events = Vec::new();
        for line in self.stdout_lines.push(&text) {
            scan_stdout_line(&line, &mut events);
        }
        self.try_json(&mut events);
        events
    }

    /// Consume a chunk of standard error, returning any newly completed events
    pub fn feed_stderr(&mut self, chunk: &[u8]) -> Vec<OutputEvent> {
        let text = String::from_utf8_lossy(chunk);
        self.stderr_text.push_str(&text);

        let mut events = Vec::new();
        for line in self.stderr_lines.push(&text) {
            scan_stderr_line(&line, &mut events);
        }
        events
    }

    /// Flush unterminated tails once both streams have reached end of file
    pub fn finish(&mut self) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        if let Some(line) = self.stdout_lines.flush() {
            scan_stdout_line(&line, &mut events);
        }
        if let Some(line) = self.stderr_lines.flush() {
            scan_stderr_line(&line, &mut events);
        }
        self.try_json(&mut events);
        events
    }

    /// Attempt to parse the accumulated stdout buffer as one JSON document.
    /// Emitted at most once per invocation; until the document is complete the
    /// parse simply fails and we keep buffering.
    fn try_json(&mut self, events: &mut Vec<OutputEvent>) {
        if !self.expect_json || self.json_emitted {
            return;
        }
        if let Ok(value) = serde_json::from_str(self.stdout_text.trim()) {
            self.json_emitted = true;
            events.push(OutputEvent::Json(value));
        }
    }

    fn into_buffers(self) -> (String, String) {
        (self.stdout_text, self.stderr_text)
    }
}

fn scan_stdout_line(line: &str, events: &mut Vec<OutputEvent>) {
    if let Some(caps) = SUBTITLE_LINE.captures(line) {
        let path = PathBuf::from(&caps[1]);
        let kind = if path.extension().and_then(|e| e.to_str()) == Some("txt") {
            FileKind::PlainText
        } else {
            FileKind::TimedText
        };
        events.push(OutputEvent::File(kind, path));
        return;
    }
    for pattern in [&MEDIA_DESTINATION, &MEDIA_MERGED, &MEDIA_EXISTING] {
        if let Some(caps) = pattern.captures(line) {
            events.push(OutputEvent::File(FileKind::Media, PathBuf::from(&caps[1])));
            return;
        }
    }
    scan_progress(line, events);
}

fn scan_stderr_line(line: &str, events: &mut Vec<OutputEvent>) {
    scan_progress(line, events);
}

fn scan_progress(line: &str, events: &mut Vec<OutputEvent>) {
    if let Some(caps) = PROGRESS_TIME.captures(line) {
        let hours: f64 = caps[1].parse().unwrap_or(0.0);
        let minutes: f64 = caps[2].parse().unwrap_or(0.0);
        let seconds: f64 = caps[3].parse().unwrap_or(0.0);
        let frac_digits = &caps[4];
        let frac = frac_digits.parse::<f64>().unwrap_or(0.0)
            / 10f64.powi(frac_digits.len() as i32);
        events.push(OutputEvent::Progress(
            hours * 3600.0 + minutes * 60.0 + seconds + frac,
        ));
    }
}

/// Everything captured from one successful tool invocation
#[derive(Debug)]
pub struct ToolRun {
    pub stdout: String,
    pub stderr: String,
    pub events: Vec<OutputEvent>,
}

impl ToolRun {
    /// The JSON document emitted by the invocation, if one was extracted
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.events.iter().find_map(|ev| match ev {
            OutputEvent::Json(value) => Some(value),
            _ => None,
        })
    }

    /// All announced file paths of the given kind, in announcement order
    pub fn files(&self, kind: FileKind) -> impl Iterator<Item = &Path> {
        self.events.iter().filter_map(move |ev| match ev {
            OutputEvent::File(k, path) if *k == kind => Some(path.as_path()),
            _ => None,
        })
    }
}

/// Run an external tool to completion, feeding its output through `parser`.
///
/// Both pipes are drained concurrently so a chatty tool never blocks on a
/// full pipe. Events are delivered to `on_event` as they complete and are
/// also collected into the returned [`ToolRun`]. A non-zero exit reports the
/// captured standard error as diagnostic text.
pub async fn run_tool<F>(
    tool: &str,
    mut cmd: Command,
    mut parser: OutputParser,
    mut on_event: F,
) -> std::result::Result<ToolRun, FetchError>
where
    F: FnMut(&OutputEvent),
{
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null());

    let mut child = cmd.spawn().map_err(|source| FetchError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    let mut stdout = child.stdout.take().expect("child stdout is piped");
    let mut stderr = child.stderr.take().expect("child stderr is piped");

    let mut events = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut out_done = false;
    let mut err_done = false;

    while !(out_done && err_done) {
        tokio::select! {
            read = stdout.read(&mut out_buf), if !out_done => {
                let n = read?;
                if n == 0 {
                    out_done = true;
                } else {
                    for ev in parser.feed_stdout(&out_buf[..n]) {
                        on_event(&ev);
                        events.push(ev);
                    }
                }
            }
            read = stderr.read(&mut err_buf), if !err_done => {
                let n = read?;
                if n == 0 {
                    err_done = true;
                } else {
                    for ev in parser.feed_stderr(&err_buf[..n]) {
                        on_event(&ev);
                        events.push(ev);
                    }
                }
            }
        }
    }

    for ev in parser.finish() {
        on_event(&ev);
        events.push(ev);
    }

    let status = child.wait().await?;
    let (stdout_text, stderr_text) = parser.into_buffers();

    if !status.success() {
        return Err(FetchError::ToolExit {
            tool: tool.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: stderr_text.trim().to_string(),
        });
    }

    tracing::debug!("{} finished with {} event(s)", tool, events.len());

    Ok(ToolRun {
        stdout: stdout_text,
        stderr: stderr_text,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_keeps_unterminated_tail() {
        let mut buf = LineBuffer::default();
        assert_eq!(buf.push("abc\nde"), vec!["abc".to_string()]);
        assert_eq!(buf.push("f\n"), vec!["def".to_string()]);
        assert_eq!(buf.flush(), None);
    }

    #[test]
    fn line_buffer_emits_lines_once() {
        let mut buf = LineBuffer::default();
        assert_eq!(buf.push("one\ntwo\n"), vec!["one".to_string(), "two".to_string()]);
        assert!(buf.push("").is_empty());
    }

    #[test]
    fn line_buffer_handles_carriage_returns() {
        let mut buf = LineBuffer::default();
        assert_eq!(buf.push("a\r\nb\rc"), vec!["a".to_string(), "b".to_string()]);
        // \r\n split across chunks still counts once
        assert_eq!(buf.push("d\r"), vec!["cd".to_string()]);
        assert!(buf.push("\n").is_empty());
        assert_eq!(buf.flush(), None);
    }

    #[test]
    fn json_split_across_chunks_matches_single_chunk() {
        let doc = r#"{"id":"a","title":"T","duration":10,"uploader":"U","upload_date":"20240101"}"#;

        let mut whole = OutputParser::new(true);
        let whole_events = whole.feed_stdout(doc.as_bytes());

        let mut split = OutputParser::new(true);
        let mut split_events = split.feed_stdout(&doc.as_bytes()[..20]);
        split_events.extend(split.feed_stdout(&doc.as_bytes()[20..]));

        assert_eq!(whole_events, split_events);
        assert!(matches!(split_events.as_slice(), [OutputEvent::Json(_)]));
    }

    #[test]
    fn json_is_emitted_at_most_once() {
        let mut parser = OutputParser::new(true);
        let first = parser.feed_stdout(b"{\"ok\":true}");
        assert_eq!(first.len(), 1);
        assert!(parser.feed_stdout(b"\n").is_empty());
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn subtitle_announcements_are_classified_by_extension() {
        let mut parser = OutputParser::new(false);
        let events = parser.feed_stdout(
            b"[info] Writing video subtitles to: out/Video [id].en.vtt\n\
              [info] Writing video subtitles to: out/Video [id].en.txt\n",
        );
        assert_eq!(
            events,
            vec![
                OutputEvent::File(FileKind::TimedText, PathBuf::from("out/Video [id].en.vtt")),
                OutputEvent::File(FileKind::PlainText, PathBuf::from("out/Video [id].en.txt")),
            ]
        );
    }

    #[test]
    fn media_announcements_are_matched() {
        let mut parser = OutputParser::new(false);
        let events = parser.feed_stdout(
            b"[download] Destination: clip.mp4\n\
              [download] clip.mp4 has already been downloaded\n\
              [Merger] Merging formats into \"clip.mkv\"\n",
        );
        let paths: Vec<_> = events
            .iter()
            .filter_map(|ev| match ev {
                OutputEvent::File(FileKind::Media, p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("clip.mp4"),
                PathBuf::from("clip.mp4"),
                PathBuf::from("clip.mkv"),
            ]
        );
    }

    #[test]
    fn progress_timestamps_become_seconds() {
        let mut parser = OutputParser::new(false);
        let events = parser.feed_stderr(
            b"frame= 1000 fps=25 q=28.0 size=2048kB time=00:01:05.500 bitrate= 256kbits/s\r",
        );
        assert_eq!(events, vec![OutputEvent::Progress(65.5)]);
    }

    #[test]
    fn finish_flushes_the_tail_line() {
        let mut parser = OutputParser::new(false);
        assert!(parser
            .feed_stdout(b"[download] Destination: partial.mp4")
            .is_empty());
        let events = parser.finish();
        assert_eq!(
            events,
            vec![OutputEvent::File(FileKind::Media, PathBuf::from("partial.mp4"))]
        );
    }

    #[tokio::test]
    async fn run_tool_collects_json_from_a_real_process() {
        let mut cmd = Command::new("sh");
        cmd.args([
            "-c",
            r#"printf '{"id":"a","title":"T","duration":10,"uploader":"U","upload_date":"20240101"}'"#,
        ]);
        let run = run_tool("sh", cmd, OutputParser::new(true), |_| {})
            .await
            .unwrap();
        let json = run.json().expect("one JSON document");
        assert_eq!(json["id"], "a");
        assert_eq!(json["duration"], 10);
    }

    #[tokio::test]
    async fn run_tool_reports_exit_code_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'not found' >&2; exit 1"]);
        let err = run_tool("sh", cmd, OutputParser::new(false), |_| {})
            .await
            .unwrap_err();
        match err {
            FetchError::ToolExit { code, stderr, .. } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_tool_reports_missing_binary_as_spawn_error() {
        let cmd = Command::new("definitely-not-an-installed-tool");
        let err = run_tool(
            "definitely-not-an-installed-tool",
            cmd,
            OutputParser::new(false),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Spawn { .. }));
    }
}
