// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Buffered input for the tokenizer.
//!
//! Callers may feed the document in arbitrary chunks; the buffer keeps
//! the not-yet-consumed tail of every chunk without copying or joining
//! them. Consumption is incremental down to single characters, and
//! unconsumed text can be pushed back on the front, which the
//! character-reference scanner and markup-declaration lookahead need.

use std::collections::VecDeque;

use tendril::StrTendril;

/// One step of consuming input: either a single significant character,
/// or a maximal run containing none of the requested stop characters.
#[derive(PartialEq, Eq, Debug)]
pub enum Scan {
    One(char),
    Span(StrTendril),
}

/// A queue of input chunks with incremental, push-back-able reads.
#[derive(Default)]
pub struct InputBuffer {
    chunks: VecDeque<StrTendril>,
}

impl InputBuffer {
    /// True if no unconsumed input remains.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Queue a chunk of input after everything already buffered.
    pub fn push(&mut self, chunk: StrTendril) {
        if chunk.len32() > 0 {
            self.chunks.push_back(chunk);
        }
    }

    /// Put text back at the front of the buffer, to be consumed next.
    pub fn unread(&mut self, text: StrTendril) {
        if text.len32() > 0 {
            self.chunks.push_front(text);
        }
    }

    /// Look at the next character without consuming it.
    pub fn peek(&self) -> Option<char> {
        // No chunk in the queue is ever empty.
        self.chunks
            .front()
            .and_then(|chunk| chunk.chars().next())
    }

    /// Consume and return the next character.
    pub fn next(&mut self) -> Option<char> {
        let chunk = self.chunks.front_mut()?;
        let c = chunk.pop_front_char().expect("empty chunk in input buffer");
        if chunk.is_empty() {
            self.chunks.pop_front();
        }
        Some(c)
    }

    /// Consume either one character from `stops`, or the longest prefix
    /// of the front chunk containing no stop character.
    ///
    /// Every stop is an ASCII byte, so scanning bytes cannot split a
    /// multi-byte character.
    pub fn scan(&mut self, stops: &[u8]) -> Option<Scan> {
        let chunk = self.chunks.front_mut()?;
        let bytes = chunk.as_bytes();
        let plain = bytes
            .iter()
            .position(|b| stops.contains(b))
            .unwrap_or(bytes.len());

        let result = if plain == 0 {
            Scan::One(chunk.pop_front_char().expect("empty chunk in input buffer"))
        } else {
            let span = chunk.subtendril(0, plain as u32);
            chunk.pop_front(plain as u32);
            Scan::Span(span)
        };
        if chunk.is_empty() {
            self.chunks.pop_front();
        }
        Some(result)
    }

    /// Check whether the buffered input starts with `pat`, without
    /// consuming anything on a mismatch.
    ///
    /// Returns `Some(true)` (and consumes the match), `Some(false)` on
    /// a definite mismatch, or `None` if not enough input is buffered
    /// to decide yet.
    pub fn starts_with(&mut self, pat: &str, ignore_ascii_case: bool) -> Option<bool> {
        {
            let mut ahead = self.chunks.iter().flat_map(|chunk| chunk.chars());
            for expected in pat.chars() {
                let got = ahead.next()?;
                let matched = if ignore_ascii_case {
                    got.eq_ignore_ascii_case(&expected)
                } else {
                    got == expected
                };
                if !matched {
                    return Some(false);
                }
            }
        }

        for _ in 0..pat.chars().count() {
            self.next();
        }
        Some(true)
    }
}

#[cfg(test)]
mod test {
    use tendril::SliceExt;

    use super::{InputBuffer, Scan};

    #[test]
    fn char_at_a_time() {
        let mut input = InputBuffer::default();
        assert_eq!(input.peek(), None);
        assert_eq!(input.next(), None);

        input.push("ab".to_tendril());
        input.push("c".to_tendril());
        assert_eq!(input.peek(), Some('a'));
        assert_eq!(input.next(), Some('a'));
        assert_eq!(input.next(), Some('b'));
        assert_eq!(input.peek(), Some('c'));
        assert_eq!(input.next(), Some('c'));
        assert_eq!(input.next(), None);
        assert!(input.is_empty());
    }

    #[test]
    fn unread_comes_back_first() {
        let mut input = InputBuffer::default();
        input.push("cd".to_tendril());
        input.unread("ab".to_tendril());
        assert_eq!(input.next(), Some('a'));
        assert_eq!(input.next(), Some('b'));
        assert_eq!(input.next(), Some('c'));
        assert_eq!(input.next(), Some('d'));
    }

    #[test]
    fn scan_splits_on_stops() {
        let mut input = InputBuffer::default();
        input.push("abc&def".to_tendril());
        assert_eq!(input.scan(b"&"), Some(Scan::Span("abc".to_tendril())));
        assert_eq!(input.scan(b"&"), Some(Scan::One('&')));
        assert_eq!(input.scan(b"&"), Some(Scan::Span("def".to_tendril())));
        assert_eq!(input.scan(b"&"), None);
    }

    #[test]
    fn scan_is_utf8_safe() {
        let mut input = InputBuffer::default();
        input.push("\u{00e9}\u{2209}<".to_tendril());
        assert_eq!(
            input.scan(b"<"),
            Some(Scan::Span("\u{00e9}\u{2209}".to_tendril()))
        );
        assert_eq!(input.scan(b"<"), Some(Scan::One('<')));
    }

    #[test]
    fn starts_with_needs_enough_input() {
        let mut input = InputBuffer::default();
        input.push("doc".to_tendril());
        assert_eq!(input.starts_with("doctype", true), None);
        input.push("TYPE x".to_tendril());
        assert_eq!(input.starts_with("nope", true), Some(false));
        assert_eq!(input.starts_with("doctype", true), Some(true));
        // The mismatch consumed nothing; the match consumed the word.
        assert_eq!(input.next(), Some(' '));
        assert_eq!(input.next(), Some('x'));
    }
}
