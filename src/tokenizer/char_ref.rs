// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The character-reference scanner: everything after a `&`.
//!
//! This runs as a sub-machine of the tokenizer so it can stall at a
//! chunk boundary mid-reference and resume on the next feed. Named
//! references are matched incrementally against the generated entity
//! map, which contains every proper prefix of every name, so a single
//! lookup per character tells us "complete match", "could still grow",
//! or "dead end". The longest complete match seen is remembered and
//! anything consumed past it is pushed back to the input.

use std::borrow::Cow::{self, Borrowed};
use std::char::from_u32;
use std::mem;

use tendril::StrTendril;

use super::{TokenSink, Tokenizer};
use crate::data::NAMED_ENTITIES;
use crate::input::InputBuffer;

/// The characters a reference resolved to. `len` is 0 when the `&` was
/// not a reference at all (the tokenizer then emits a literal `&`), and
/// 2 for the handful of two-codepoint entities.
pub(super) struct Resolved {
    pub(super) chars: [char; 2],
    pub(super) len: u8,
}

impl Resolved {
    const NONE: Resolved = Resolved {
        chars: ['\0', '\0'],
        len: 0,
    };

    fn one(c: char) -> Resolved {
        Resolved {
            chars: [c, '\0'],
            len: 1,
        }
    }
}

pub(super) enum ScanStatus {
    /// Out of input; try again after the next feed.
    Stall,
    /// Made progress, call `step` again.
    Working,
    /// The reference (or non-reference) is fully decided.
    Done(Resolved),
}

#[derive(Debug)]
enum Phase {
    /// Just after the `&`.
    Start,
    /// Just after `&#`.
    Hash,
    /// Accumulating digits in the given base.
    Digits(u32),
    /// Digits done, deciding about the `;`.
    DigitsEnd,
    /// Accumulating a name.
    Name,
    /// A name that can no longer match; consumed only to decide
    /// whether to report a missing-semicolon error.
    Garbage,
}

pub(super) struct CharRefScanner {
    phase: Phase,
    in_attr: bool,

    /// Everything consumed since the `&`, for pushing back.
    taken: StrTendril,
    /// Longest complete named match: (chars matched, codepoints).
    best: Option<(usize, u32, u32)>,

    value: u32,
    overflowed: bool,
    any_digit: bool,
    hex_marker: Option<char>,
}

impl CharRefScanner {
    pub(super) fn new(in_attr: bool) -> CharRefScanner {
        CharRefScanner {
            phase: Phase::Start,
            in_attr,
            taken: StrTendril::new(),
            best: None,
            value: 0,
            overflowed: false,
            any_digit: false,
            hex_marker: None,
        }
    }

    pub(super) fn step<Sink: TokenSink>(
        &mut self,
        tok: &mut Tokenizer<Sink>,
        input: &mut InputBuffer,
    ) -> ScanStatus {
        match self.phase {
            Phase::Start => match tok.peek_raw(input) {
                None => ScanStatus::Stall,
                Some('a'..='z' | 'A'..='Z' | '0'..='9') => {
                    self.phase = Phase::Name;
                    ScanStatus::Working
                },
                Some('#') => {
                    tok.skip_raw(input);
                    self.phase = Phase::Hash;
                    ScanStatus::Working
                },
                Some(_) => ScanStatus::Done(Resolved::NONE),
            },

            Phase::Hash => match tok.peek_raw(input) {
                None => ScanStatus::Stall,
                Some(c @ ('x' | 'X')) => {
                    tok.skip_raw(input);
                    self.hex_marker = Some(c);
                    self.phase = Phase::Digits(16);
                    ScanStatus::Working
                },
                Some(_) => {
                    self.phase = Phase::Digits(10);
                    ScanStatus::Working
                },
            },

            Phase::Digits(base) => {
                let Some(c) = tok.peek_raw(input) else {
                    return ScanStatus::Stall;
                };
                match c.to_digit(base) {
                    Some(d) => {
                        tok.skip_raw(input);
                        self.value = self.value.wrapping_mul(base);
                        if self.value > char::MAX as u32 {
                            // Definitely invalid, and further digits
                            // could wrap; remember that and keep
                            // consuming them anyway.
                            self.overflowed = true;
                        }
                        self.value = self.value.wrapping_add(d);
                        self.any_digit = true;
                        ScanStatus::Working
                    },
                    None if self.any_digit => {
                        self.phase = Phase::DigitsEnd;
                        ScanStatus::Working
                    },
                    None => self.abandon_number(tok, input),
                }
            },

            Phase::DigitsEnd => match tok.peek_raw(input) {
                None => ScanStatus::Stall,
                Some(';') => {
                    tok.skip_raw(input);
                    ScanStatus::Done(self.number_to_char(tok))
                },
                Some(_) => {
                    tok.parse_error(Borrowed("missing-semicolon-after-character-reference"));
                    ScanStatus::Done(self.number_to_char(tok))
                },
            },

            Phase::Name => {
                let Some(c) = tok.peek_raw(input) else {
                    return ScanStatus::Stall;
                };
                tok.skip_raw(input);
                self.taken.push_char(c);
                match NAMED_ENTITIES.get(&self.taken[..]) {
                    // Either a complete name or the prefix of a longer
                    // one; prefixes map to (0, 0).
                    Some(&(first, second)) => {
                        if first != 0 {
                            self.best = Some((self.taken.len(), first, second));
                        }
                        ScanStatus::Working
                    },
                    None => self.settle_name(tok, input, Some(c)),
                }
            },

            Phase::Garbage => {
                let Some(c) = tok.peek_raw(input) else {
                    return ScanStatus::Stall;
                };
                tok.skip_raw(input);
                self.taken.push_char(c);
                if c.is_ascii_alphanumeric() {
                    return ScanStatus::Working;
                }
                if c == ';' {
                    self.bad_name_error(tok);
                }
                self.give_back_taken(input);
                ScanStatus::Done(Resolved::NONE)
            },
        }
    }

    /// `&#` with no digits at all: nothing was a reference.
    fn abandon_number<Sink: TokenSink>(
        &mut self,
        tok: &mut Tokenizer<Sink>,
        input: &mut InputBuffer,
    ) -> ScanStatus {
        let mut unread = StrTendril::from_char('#');
        if let Some(marker) = self.hex_marker {
            unread.push_char(marker);
        }
        input.unread(unread);
        tok.parse_error(Borrowed("absence-of-digits-in-numeric-character-reference"));
        ScanStatus::Done(Resolved::NONE)
    }

    /// Turn the accumulated number into a character, applying the
    /// replacement rules for out-of-range and C1-control values.
    fn number_to_char<Sink: TokenSink>(&self, tok: &mut Tokenizer<Sink>) -> Resolved {
        let replace = |n: u32| from_u32(n).expect("range was checked");

        let (c, bad) = if self.overflowed || self.value > char::MAX as u32 {
            ('\u{fffd}', true)
        } else {
            match self.value {
                0x00 | 0xD800..=0xDFFF => ('\u{fffd}', true),
                n @ 0x80..=0x9F => match crate::data::C1_REPLACEMENTS[(n - 0x80) as usize] {
                    Some(mapped) => (mapped, true),
                    None => (replace(n), true),
                },
                n @ (0x01..=0x08 | 0x0B | 0x0D..=0x1F | 0x7F | 0xFDD0..=0xFDEF) => {
                    (replace(n), true)
                },
                n if (n & 0xFFFE) == 0xFFFE => (replace(n), true),
                n => (replace(n), false),
            }
        };

        if bad {
            let msg: Cow<'static, str> = if tok.wants_exact_errors() {
                format!("Invalid numeric character reference 0x{:06X}", self.value).into()
            } else {
                Borrowed("Invalid numeric character reference")
            };
            tok.parse_error(msg);
        }
        Resolved::one(c)
    }

    fn bad_name_error<Sink: TokenSink>(&self, tok: &mut Tokenizer<Sink>) {
        let msg: Cow<'static, str> = if tok.wants_exact_errors() {
            format!("Invalid character reference &{}", &*self.taken).into()
        } else {
            Borrowed("unknown-named-character-reference")
        };
        tok.parse_error(msg);
    }

    fn give_back_taken(&mut self, input: &mut InputBuffer) {
        input.unread(mem::take(&mut self.taken));
    }

    /// The name can't grow any further (or input ended): commit to the
    /// longest match, or push everything back.
    ///
    /// `stopper` is the character that ended the name, if any.
    fn settle_name<Sink: TokenSink>(
        &mut self,
        tok: &mut Tokenizer<Sink>,
        input: &mut InputBuffer,
        stopper: Option<char>,
    ) -> ScanStatus {
        let Some((matched_len, first, second)) = self.best else {
            match stopper {
                Some(c) if c.is_ascii_alphanumeric() => {
                    // Keep consuming the bogus name so we know whether
                    // to report the trailing `;`.
                    self.phase = Phase::Garbage;
                    return ScanStatus::Working;
                },
                // `&;` alone is not an error.
                Some(';') if self.taken.len() > 1 => self.bad_name_error(tok),
                _ => {},
            }
            self.give_back_taken(input);
            return ScanStatus::Done(Resolved::NONE);
        };

        let ends_with_semicolon = self.taken.as_bytes()[matched_len - 1] == b';';
        let after_match = self.taken[matched_len..].chars().next();

        // The attribute carve-out: historically, `&lt=` and the like in
        // attribute values are left untouched.
        let not_a_reference_after_all = self.in_attr
            && !ends_with_semicolon
            && match after_match {
                Some('=') => true,
                Some(c) => c.is_ascii_alphanumeric(),
                None => false,
            };

        if not_a_reference_after_all {
            self.give_back_taken(input);
            return ScanStatus::Done(Resolved::NONE);
        }

        if !ends_with_semicolon {
            tok.parse_error(Borrowed("missing-semicolon-after-character-reference"));
        }

        input.unread(StrTendril::from_slice(&self.taken[matched_len..]));
        tok.forget_pending_lf();
        let first = from_u32(first).expect("entity table holds scalar values");
        if second == 0 {
            ScanStatus::Done(Resolved::one(first))
        } else {
            let second = from_u32(second).expect("entity table holds scalar values");
            ScanStatus::Done(Resolved {
                chars: [first, second],
                len: 2,
            })
        }
    }

    /// Input is over; wind the scanner down to a final answer.
    pub(super) fn finish<Sink: TokenSink>(
        &mut self,
        tok: &mut Tokenizer<Sink>,
        input: &mut InputBuffer,
    ) -> Resolved {
        loop {
            let status = match self.phase {
                Phase::Start => ScanStatus::Done(Resolved::NONE),
                Phase::Hash => {
                    input.unread(StrTendril::from_char('#'));
                    tok.parse_error(Borrowed("EOF after '#' in character reference"));
                    ScanStatus::Done(Resolved::NONE)
                },
                Phase::Digits(_) if !self.any_digit => self.abandon_number(tok, input),
                Phase::Digits(_) | Phase::DigitsEnd => {
                    tok.parse_error(Borrowed("EOF in numeric character reference"));
                    ScanStatus::Done(self.number_to_char(tok))
                },
                Phase::Name => self.settle_name(tok, input, None),
                Phase::Garbage => {
                    self.give_back_taken(input);
                    ScanStatus::Done(Resolved::NONE)
                },
            };
            match status {
                ScanStatus::Done(out) => return out,
                ScanStatus::Stall => return Resolved::NONE,
                ScanStatus::Working => continue,
            }
        }
    }
}
