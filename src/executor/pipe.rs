//! Internal utilities for capturing command output.
//!
//! This module handles reading from stdout/stderr pipes while the command
//! runs, copying every line into the caller's output sink.

use std::io::{BufRead, BufReader, Read};

use super::OutputBuffer;

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads a pipe to the end and returns its content.
///
/// - Each line is logged at TRACE level and appended to `sink`, if any
/// - Binary data uses lossy UTF-8 conversion
/// - I/O errors stop reading but don't fail command execution
///   (success is determined by exit status)
pub(super) fn read_pipe<R: Read>(
    pipe: Option<R>,
    stream_type: StreamType,
    sink: Option<OutputBuffer>,
) -> String {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return String::new();
    };

    let mut captured = String::new();
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                tracing::trace!(stream = %stream_type, "{}", line);
                if let Some(sink) = &sink {
                    sink.append_line(line);
                }
                captured.push_str(line);
                captured.push('\n');
            }
            Err(e) => {
                tracing::warn!(stream = %stream_type, "failed to read command output: {}", e);
                break;
            }
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pipe_captures_and_copies_lines() {
        let sink = OutputBuffer::new();
        let input: &[u8] = b"first\r\nsecond\nno newline";
        let captured = read_pipe(Some(input), StreamType::Stdout, Some(sink.clone()));
        assert_eq!(captured, "first\nsecond\nno newline\n");
        assert_eq!(sink.contents(), captured);
    }

    #[test]
    fn test_read_pipe_none() {
        let captured = read_pipe::<&[u8]>(None, StreamType::Stderr, None);
        assert!(captured.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
