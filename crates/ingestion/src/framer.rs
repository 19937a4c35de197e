//! 行分帧器
//!
//! 把任意切分的字节流重新组装为完整的以 `\n` 结尾的行。

use std::borrow::Cow;

use bytes::{Buf, BytesMut};

/// 分帧结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 一行完整文本 (已去除首尾空白，非空)
    Line(String),
    /// 超长行被丢弃，`bytes` 为丢弃时缓冲的字节数
    Oversize { bytes: usize },
}

/// Newline framer over a growable byte buffer.
///
/// Bytes are appended with [`push`](Self::push); complete lines are taken with
/// [`next_frame`](Self::next_frame). A partial line is kept until its newline
/// arrives, unless it grows beyond `max_line_bytes`, in which case it is thrown
/// away along with everything up to the next newline.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line_bytes: usize,
    discarding: bool,
}

impl LineFramer {
    /// Create a framer
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Append raw bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes of the pending (unterminated) fragment
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the next frame, if a complete one is buffered
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                if self.buf.len() > self.max_line_bytes {
                    let bytes = self.buf.len();
                    self.buf.clear();
                    if !self.discarding {
                        self.discarding = true;
                        return Some(Frame::Oversize { bytes });
                    }
                }
                return None;
            };

            let line = self.buf.split_to(pos);
            self.buf.advance(1);

            if self.discarding {
                // Tail of a line already reported as oversize.
                self.discarding = false;
                continue;
            }

            if line.len() > self.max_line_bytes {
                return Some(Frame::Oversize { bytes: line.len() });
            }

            let text = decode_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            return Some(Frame::Line(text.to_string()));
        }
    }
}

/// UTF-8 decode dropping invalid sequences
fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(bytes) {
        Cow::Owned(s) => Cow::Owned(s.replace(char::REPLACEMENT_CHARACTER, "")),
        borrowed => borrowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer) -> Vec<Frame> {
        std::iter::from_fn(|| framer.next_frame()).collect()
    }

    fn line(s: &str) -> Frame {
        Frame::Line(s.to_string())
    }

    #[test]
    fn test_fragmented_input_reassembled() {
        let mut framer = LineFramer::new(1024);
        framer.push(b"{\"a\":");
        assert_eq!(framer.next_frame(), None);
        framer.push(b"1}\n{\"b\"");
        assert_eq!(drain(&mut framer), vec![line("{\"a\":1}")]);
        framer.push(b":2}\n");
        assert_eq!(drain(&mut framer), vec![line("{\"b\":2}")]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new(1024);
        framer.push(b"one\ntwo\nthree\npart");
        assert_eq!(
            drain(&mut framer),
            vec![line("one"), line("two"), line("three")]
        );
        assert_eq!(framer.pending(), 4);
    }

    #[test]
    fn test_blank_lines_and_whitespace() {
        let mut framer = LineFramer::new(1024);
        framer.push(b"\n   \n\t value \r\n\n");
        assert_eq!(drain(&mut framer), vec![line("value")]);
    }

    #[test]
    fn test_invalid_utf8_dropped() {
        let mut framer = LineFramer::new(1024);
        framer.push(b"ab\xffcd\n");
        assert_eq!(drain(&mut framer), vec![line("abcd")]);
    }

    #[test]
    fn test_oversize_complete_line() {
        let mut framer = LineFramer::new(8);
        framer.push(b"0123456789\nok\n");
        assert_eq!(
            drain(&mut framer),
            vec![Frame::Oversize { bytes: 10 }, line("ok")]
        );
    }

    #[test]
    fn test_oversize_partial_line_discarded_until_newline() {
        let mut framer = LineFramer::new(8);
        framer.push(b"0123456789");
        assert_eq!(drain(&mut framer), vec![Frame::Oversize { bytes: 10 }]);
        assert_eq!(framer.pending(), 0);

        framer.push(b"abcdefghijk");
        assert_eq!(drain(&mut framer), vec![]);

        framer.push(b"tail\nnext\n");
        assert_eq!(drain(&mut framer), vec![line("next")]);
    }
}
