//! Minimal shell-line splitting.
//!
//! Policies only care about command words: the first whitespace-delimited
//! token of each simple command. This module splits a command line into
//! segments at list and pipeline operators (`|`, `||`, `&&`, `;`, newline)
//! while leaving quoted text alone. It is not a shell parser; anything it
//! does not understand stays inside the current segment.

use smallvec::SmallVec;

/// Segments of a command line, most commands have only one or two.
pub type Segments<'a> = SmallVec<[&'a str; 4]>;

/// Split `command` at unquoted `|`, `||`, `&&`, `;` and newlines.
///
/// Returned segments are trimmed; empty ones are dropped.
#[must_use]
pub fn split_segments(command: &str) -> Segments<'_> {
    let bytes = command.as_bytes();
    let len = bytes.len();
    let mut segments = Segments::new();
    let mut start = 0;
    let mut i = 0;
    let mut quote: Option<u8> = None;

    while i < len {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q == b'"' && i + 1 < len {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None => match b {
                b'\\' if i + 1 < len => i += 2,
                b'\'' | b'"' => {
                    quote = Some(b);
                    i += 1;
                }
                b'|' | b';' | b'\n' => {
                    push_segment(&mut segments, &command[start..i]);
                    i += if b == b'|' && bytes.get(i + 1) == Some(&b'|') {
                        2
                    } else {
                        1
                    };
                    start = i;
                }
                b'&' if bytes.get(i + 1) == Some(&b'&') => {
                    push_segment(&mut segments, &command[start..i]);
                    i += 2;
                    start = i;
                }
                _ => i += 1,
            },
        }
    }
    push_segment(&mut segments, &command[start..]);
    segments
}

fn push_segment<'a>(segments: &mut Segments<'a>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed);
    }
}

/// First whitespace-delimited token of a segment.
#[inline]
#[must_use]
pub fn command_word(segment: &str) -> Option<&str> {
    segment.split_whitespace().next()
}

/// Text after the first token, with its original spacing and quoting.
#[must_use]
pub fn rest_after_first_token(segment: &str) -> &str {
    let trimmed = segment.trim_start();
    trimmed
        .find(char::is_whitespace)
        .map_or("", |idx| trimmed[idx..].trim())
}

/// Command words of every segment, in order.
#[must_use]
pub fn command_words(command: &str) -> SmallVec<[&str; 4]> {
    split_segments(command)
        .into_iter()
        .filter_map(command_word)
        .collect()
}
