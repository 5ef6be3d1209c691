//! Stream list parsing
//!
//! One entry per line:
//!
//! ```text
//! program.mxf=0        # every channel of audio stream 0
//! left.wav=0.0         # channel 0 of stream 0
//! left.wav=0.1         # merged with the line above: channels 0 and 1
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A line without `=`
//! names a file whose first audio stream is used whole.

use crate::error::{AnalyserError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One audio stream of one file, optionally restricted to some channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDesc {
    pub path: PathBuf,
    pub stream_index: usize,
    /// `None` keeps every channel
    pub channels: Option<Vec<usize>>,
}

impl StreamDesc {
    pub fn new(path: impl Into<PathBuf>, stream_index: usize, channels: Option<Vec<usize>>) -> Self {
        Self {
            path: path.into(),
            stream_index,
            channels,
        }
    }

    fn merge_channel(&mut self, channel: Option<usize>) {
        match (&mut self.channels, channel) {
            (Some(channels), Some(channel)) => {
                if !channels.contains(&channel) {
                    channels.push(channel);
                }
            }
            // A whole-stream entry wins over single channels
            _ => self.channels = None,
        }
    }
}

impl fmt::Display for StreamDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.path.display(), self.stream_index)?;
        if let Some(channels) = &self.channels {
            let list: Vec<String> = channels.iter().map(ToString::to_string).collect();
            write!(f, ".{}", list.join(","))?;
        }
        Ok(())
    }
}

fn parse_index(text: &str, what: &str, line: usize) -> Result<usize> {
    text.trim().parse().map_err(|_| AnalyserError::StreamList {
        line,
        message: format!("invalid {} '{}'", what, text.trim()),
    })
}

/// Parse the text of a stream list
///
/// # Errors
/// Returns an error naming the line of the first malformed entry, or
/// [`AnalyserError::NoStreams`] if nothing is listed.
pub fn parse_stream_list(text: &str) -> Result<Vec<StreamDesc>> {
    let mut streams: Vec<StreamDesc> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let entry = raw.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        let (path, stream_index, channel) = match entry.rsplit_once('=') {
            Some((path, selector)) => {
                let (stream, channel) = match selector.split_once('.') {
                    Some((stream, channel)) => (stream, Some(parse_index(channel, "channel index", line)?)),
                    None => (selector, None),
                };
                (path.trim(), parse_index(stream, "stream index", line)?, channel)
            }
            None => (entry, 0, None),
        };
        if path.is_empty() {
            return Err(AnalyserError::StreamList {
                line,
                message: "missing file name".to_string(),
            });
        }

        let path = PathBuf::from(path);
        match streams
            .iter_mut()
            .find(|s| s.path == path && s.stream_index == stream_index)
        {
            Some(existing) => existing.merge_channel(channel),
            None => streams.push(StreamDesc::new(path, stream_index, channel.map(|c| vec![c]))),
        }
    }

    if streams.is_empty() {
        return Err(AnalyserError::NoStreams);
    }
    Ok(streams)
}

/// Read and parse a stream list file
pub fn load_stream_list(path: &Path) -> Result<Vec<StreamDesc>> {
    let text = std::fs::read_to_string(path)?;
    parse_stream_list(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_entries() {
        let streams = parse_stream_list("a.wav=0\nb.wav=1.3\n").unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0], StreamDesc::new("a.wav", 0, None));
        assert_eq!(streams[1], StreamDesc::new("b.wav", 1, Some(vec![3])));
    }

    #[test]
    fn test_same_stream_merges_channels() {
        let streams = parse_stream_list("left.wav=0.0\nleft.wav=0.1\nleft.wav=1.0\n").unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].channels, Some(vec![0, 1]));
        assert_eq!(streams[1].stream_index, 1);
    }

    #[test]
    fn test_whole_stream_wins_on_merge() {
        let streams = parse_stream_list("x.wav=0.2\nx.wav=0\n").unwrap();
        assert_eq!(streams, vec![StreamDesc::new("x.wav", 0, None)]);
    }

    #[test]
    fn test_duplicate_channel_is_kept_once() {
        let streams = parse_stream_list("x.wav=0.1\nx.wav=0.1\n").unwrap();
        assert_eq!(streams[0].channels, Some(vec![1]));
    }

    #[test]
    fn test_comments_blank_lines_and_bare_paths() {
        let text = "# program\n\n  clip.flac  \n";
        let streams = parse_stream_list(text).unwrap();
        assert_eq!(streams, vec![StreamDesc::new("clip.flac", 0, None)]);
    }

    #[test]
    fn test_equals_sign_in_path() {
        let streams = parse_stream_list("take=2.wav=0.1\n").unwrap();
        assert_eq!(streams[0].path, PathBuf::from("take=2.wav"));
        assert_eq!(streams[0].channels, Some(vec![1]));
    }

    #[test]
    fn test_errors_name_the_line() {
        let err = parse_stream_list("a.wav=0\nb.wav=x\n").unwrap_err();
        assert!(matches!(err, AnalyserError::StreamList { line: 2, .. }));

        let err = parse_stream_list("a.wav=0.y\n").unwrap_err();
        assert!(matches!(err, AnalyserError::StreamList { line: 1, .. }));

        let err = parse_stream_list("=0\n").unwrap_err();
        assert!(matches!(err, AnalyserError::StreamList { line: 1, .. }));

        assert!(matches!(parse_stream_list("# nothing\n"), Err(AnalyserError::NoStreams)));
    }

    #[test]
    fn test_display_lists_channels() {
        let desc = StreamDesc::new("a.wav", 1, Some(vec![0, 2]));
        assert_eq!(desc.to_string(), "a.wav=1.0,2");
        assert_eq!(StreamDesc::new("a.wav", 0, None).to_string(), "a.wav=0");
    }
}
