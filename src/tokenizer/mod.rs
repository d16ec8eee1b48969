// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tokenizer.
//!
//! One [`step`](Tokenizer::step) performs one consumption action:
//! either a single (preprocessed) character drives the current state,
//! or — in the text-heavy states — a whole run of insignificant
//! characters is forwarded in one go. The driver loop repeats steps
//! until the input runs dry, so the tokenizer can stop at any chunk
//! boundary and pick up where it left off on the next feed.

pub use self::tokens::{Doctype, SinkResult, Tag, TagKind, Token, TokenSink};
pub use self::tokens::TagKind::{EndTag, StartTag};

use std::borrow::Cow::{self, Borrowed};
use std::collections::BTreeMap;
use std::mem;
use std::time::Instant;

use log::trace;
use tendril::StrTendril;

use self::char_ref::{CharRefScanner, Resolved, ScanStatus};
use self::states::CdataPhase::{self, Bracket};
use self::states::CommentPhase;
use self::states::DoctypePhase;
use self::states::Escape::{Once, Twice};
use self::states::IdKind::{self, Public, System};
use self::states::Quote::{Double, Single, Unquoted};
use self::states::RawKind::{Rawtext, Rcdata, Script, ScriptEscaped};
use self::states::RawPhase::{EndTagName, EndTagSlash, Lt, Text};
use self::states::{Quote, RawKind, RawPhase, State};

use crate::input::{InputBuffer, Scan};
use crate::interface::Attribute;
use crate::util::lower_ascii_letter;
use crate::{LocalName, QualName};

mod char_ref;
pub mod states;
mod tokens;

/// Outcome of one tokenizer step.
enum Step<Handle> {
    /// Did something; keep going.
    Go,
    /// Out of input (or yielded EOF); stop until fed again.
    Stall,
    /// A `</script>` completed; the caller decides what to do.
    Script(Handle),
}

/// Result of a [`Tokenizer::feed`] call: either all input was consumed,
/// or a script element closed and the caller should run it before
/// feeding more.
#[derive(Debug)]
pub enum TokenizerResult<Handle> {
    Done,
    Script(Handle),
}

/// Tokenizer options, with an impl for `Default`.
#[derive(Clone)]
pub struct TokenizerOpts {
    /// Report all parse errors described in the standard, at some
    /// performance penalty?  Default: false
    pub exact_errors: bool,

    /// Discard a `U+FEFF BYTE ORDER MARK` if we see one at the
    /// beginning of the stream?  Default: true
    pub discard_bom: bool,

    /// Keep per-state timing and print it when `end()` is called?
    /// Default: false
    pub profile: bool,

    /// Initial state override, for fragment parsing and the test
    /// runner.
    pub initial_state: Option<State>,

    /// Last start tag seen, for fragment parsing and the test runner;
    /// decides whether an end tag closes a raw-text element.
    pub last_start_tag_name: Option<String>,
}

impl Default for TokenizerOpts {
    fn default() -> TokenizerOpts {
        TokenizerOpts {
            exact_errors: false,
            discard_bom: true,
            profile: false,
            initial_state: None,
            last_start_tag_name: None,
        }
    }
}

/// Scratch space for the tag token under construction.
#[derive(Default)]
struct TagScratch {
    kind: TagKind,
    name: StrTendril,
    self_closing: bool,
    attrs: Vec<Attribute>,
    attr_name: StrTendril,
    attr_value: StrTendril,
}

impl TagScratch {
    fn reset(&mut self, kind: TagKind, first: char) {
        self.kind = kind;
        self.name.clear();
        self.name.push_char(first);
        self.self_closing = false;
        self.attrs.clear();
        self.attr_name.clear();
        self.attr_value.clear();
    }

    fn abandon(&mut self) {
        self.name.clear();
        self.self_closing = false;
        self.attrs.clear();
        self.attr_name.clear();
        self.attr_value.clear();
    }

    /// Move the in-progress attribute into the list. Returns true if it
    /// was a duplicate and had to be dropped instead.
    fn commit_attr(&mut self) -> bool {
        if self.attr_name.is_empty() {
            return false;
        }
        let duplicate = self.attrs.iter().any(|a| *a.name.local == *self.attr_name);
        if duplicate {
            self.attr_name.clear();
            self.attr_value.clear();
        } else {
            let local = LocalName::from(&*self.attr_name);
            self.attr_name.clear();
            self.attrs.push(Attribute {
                // Foreign-content namespace fixups happen in the tree
                // builder.
                name: QualName::new(None, ns!(), local),
                value: mem::take(&mut self.attr_value),
            });
        }
        duplicate
    }
}

/// The HTML tokenizer.
pub struct Tokenizer<Sink> {
    /// Destination for tokens we emit.
    pub sink: Sink,

    opts: TokenizerOpts,

    /// Machine state, as in the standard.
    state: State,

    /// No further input will arrive after the current buffer.
    at_eof: bool,

    /// A single pushed-back (already preprocessed) character; the
    /// standard's "reconsume".
    pending: Option<char>,

    /// A `\r` was just folded to `\n`; swallow an immediately following
    /// `\n`.
    lf_pending: bool,

    /// Still waiting to see (and drop) a leading byte-order mark.
    bom_pending: bool,

    /// 1-based line number of the character last consumed.
    line: u64,

    /// Tag under construction.
    tag: TagScratch,

    /// Comment text under construction.
    comment: StrTendril,

    /// DOCTYPE under construction.
    doctype: Doctype,

    /// The standard's "temporary buffer".
    temp: StrTendril,

    /// Most recent start tag name, for "appropriate end tag" checks.
    last_start_tag: Option<LocalName>,

    /// In-flight character-reference scanner, if a `&` is being
    /// resolved.
    char_ref: Option<CharRefScanner>,

    /// Nanoseconds spent per state, when profiling.
    state_times: BTreeMap<State, u64>,
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    /// Create a new tokenizer which feeds tokens to a particular
    /// `TokenSink`.
    pub fn new(sink: Sink, mut opts: TokenizerOpts) -> Tokenizer<Sink> {
        let last_start_tag = opts
            .last_start_tag_name
            .take()
            .map(|name| LocalName::from(&*name));
        let state = opts.initial_state.unwrap_or(State::Data);
        let bom_pending = opts.discard_bom;
        Tokenizer {
            sink,
            opts,
            state,
            at_eof: false,
            pending: None,
            lf_pending: false,
            bom_pending,
            line: 1,
            tag: TagScratch::default(),
            comment: StrTendril::new(),
            doctype: Doctype::default(),
            temp: StrTendril::new(),
            last_start_tag,
            char_ref: None,
            state_times: BTreeMap::new(),
        }
    }

    /// Feed buffered input into the state machine, consuming as much as
    /// possible.
    pub fn feed(&mut self, input: &mut InputBuffer) -> TokenizerResult<Sink::Handle> {
        if input.is_empty() {
            return TokenizerResult::Done;
        }

        if self.bom_pending {
            self.bom_pending = false;
            if input.peek() == Some('\u{feff}') {
                input.next();
            }
        }

        self.run(input)
    }

    /// Switch to the PLAINTEXT state; used by the tree builder.
    pub fn set_plaintext_state(&mut self) {
        self.state = State::Plaintext;
    }

    fn run(&mut self, input: &mut InputBuffer) -> TokenizerResult<Sink::Handle> {
        loop {
            let step = if self.opts.profile {
                let state = self.state;
                let begun = Instant::now();
                let step = self.step(input);
                *self.state_times.entry(state).or_insert(0) +=
                    begun.elapsed().as_nanos() as u64;
                step
            } else {
                self.step(input)
            };
            match step {
                Step::Go => {},
                Step::Stall => return TokenizerResult::Done,
                Step::Script(handle) => return TokenizerResult::Script(handle),
            }
        }
    }

    //§ preprocessing-the-input-stream
    /// Newline-normalize and count one raw input character.
    fn cook(&mut self, mut c: char, input: &mut InputBuffer) -> Option<char> {
        if self.lf_pending {
            self.lf_pending = false;
            if c == '\n' {
                c = input.next()?;
            }
        }
        if c == '\r' {
            self.lf_pending = true;
            c = '\n';
        }
        if c == '\n' {
            self.line += 1;
        }
        if self.opts.exact_errors && is_forbidden_in_stream(c) {
            self.parse_error(format!("Bad character {c}").into());
        }
        trace!("consumed {c:?}");
        Some(c)
    }

    /// Next preprocessed character, honoring a pushed-back one.
    fn next_char(&mut self, input: &mut InputBuffer) -> Option<char> {
        if let Some(c) = self.pending.take() {
            return Some(c);
        }
        let c = input.next()?;
        self.cook(c, input)
    }

    /// Push a character back; it will be the next one consumed, without
    /// being preprocessed again.
    fn unread(&mut self, c: char) {
        debug_assert!(self.pending.is_none(), "double unread");
        self.pending = Some(c);
    }

    /// Raw peek: no newline normalization, no line counting. Pairs with
    /// [`skip_raw`](Self::skip_raw).
    fn peek_raw(&mut self, input: &InputBuffer) -> Option<char> {
        self.pending.or_else(|| input.peek())
    }

    fn skip_raw(&mut self, input: &mut InputBuffer) {
        if self.pending.take().is_none() {
            input.next();
        }
    }

    /// Consume a significant character or a run free of `stops`. The
    /// stop set always contains `\r`, `\0` and `\n`, so runs need no
    /// preprocessing; the slow path covers everything else.
    fn next_span(&mut self, input: &mut InputBuffer, stops: &[u8]) -> Option<Scan> {
        if self.opts.exact_errors || self.pending.is_some() || self.lf_pending {
            return self.next_char(input).map(Scan::One);
        }
        match input.scan(stops)? {
            Scan::One(c) => self.cook(c, input).map(Scan::One),
            span => Some(span),
        }
    }

    /// Lookahead used by `<!--`, `<!DOCTYPE` and `<![CDATA[` matching.
    /// Consumes only on a full match; at end-of-input a partial match
    /// counts as a mismatch.
    fn lookahead(
        &mut self,
        input: &mut InputBuffer,
        pat: &str,
        ignore_case: bool,
    ) -> Option<bool> {
        debug_assert!(self.pending.is_none());
        // A swallowed `\n` from `\r\n` must not take part in the match.
        if self.lf_pending {
            self.lf_pending = false;
            if input.peek() == Some('\n') {
                input.next();
            }
        }
        match input.starts_with(pat, ignore_case) {
            None if self.at_eof => Some(false),
            answer => answer,
        }
    }

    // Emission helpers.

    fn emit(&mut self, token: Token) {
        let redirect = self.sink.process_token(token, self.line);
        debug_assert!(
            matches!(redirect, SinkResult::Continue),
            "only tags may redirect the tokenizer"
        );
    }

    pub(self) fn parse_error(&mut self, msg: Cow<'static, str>) {
        self.sink.parse_error(msg, self.line);
    }

    pub(self) fn wants_exact_errors(&self) -> bool {
        self.opts.exact_errors
    }

    pub(self) fn forget_pending_lf(&mut self) {
        self.lf_pending = false;
    }

    fn bad_char(&mut self) {
        let msg: Cow<'static, str> = if self.opts.exact_errors {
            format!("Bad character in state {:?}", self.state).into()
        } else {
            Borrowed("Bad character")
        };
        self.parse_error(msg);
    }

    fn bad_eof(&mut self) {
        let msg: Cow<'static, str> = if self.opts.exact_errors {
            format!("EOF in state {:?}", self.state).into()
        } else {
            Borrowed("Unexpected EOF")
        };
        self.parse_error(msg);
    }

    fn null_error(&mut self) {
        self.parse_error(Borrowed("unexpected-null-character"));
    }

    fn emit_char(&mut self, c: char) {
        if c == '\0' {
            self.emit(Token::Null);
        } else {
            self.emit(Token::Chars(StrTendril::from_char(c)));
        }
    }

    // The span must not contain '\0'.
    fn emit_span(&mut self, text: StrTendril) {
        self.emit(Token::Chars(text));
    }

    fn flush_temp(&mut self) {
        let buffered = mem::take(&mut self.temp);
        if !buffered.is_empty() {
            self.emit_span(buffered);
        }
    }

    fn emit_comment(&mut self) {
        let text = mem::take(&mut self.comment);
        self.emit(Token::Comment(text));
    }

    fn emit_doctype(&mut self) {
        let doctype = mem::take(&mut self.doctype);
        self.emit(Token::Doctype(doctype));
    }

    fn begin_attr(&mut self, first: char) {
        if self.tag.commit_attr() {
            self.parse_error(Borrowed("duplicate-attribute"));
        }
        self.tag.attr_name.push_char(first);
    }

    fn doctype_id(&mut self, kind: IdKind) -> &mut Option<StrTendril> {
        match kind {
            Public => &mut self.doctype.public_id,
            System => &mut self.doctype.system_id,
        }
    }

    fn reset_doctype_id(&mut self, kind: IdKind) {
        self.doctype_id(kind)
            .get_or_insert_with(StrTendril::new)
            .clear();
    }

    fn push_doctype_id(&mut self, kind: IdKind, c: char) {
        self.doctype_id(kind)
            .get_or_insert_with(StrTendril::new)
            .push_char(c);
    }

    fn push_doctype_name(&mut self, c: char) {
        self.doctype
            .name
            .get_or_insert_with(StrTendril::new)
            .push_char(c);
    }

    /// Does the scratch end tag match the last start tag?
    fn raw_end_tag_matches(&self) -> bool {
        self.tag.kind == EndTag
            && match &self.last_start_tag {
                Some(last) => *self.tag.name == **last,
                None => false,
            }
    }

    /// Finish the scratch tag, hand it to the sink, and let the sink
    /// pick the next state if it wants to.
    fn finish_tag(&mut self, fallback: State) -> Step<Sink::Handle> {
        self.state = fallback;
        if self.tag.commit_attr() {
            self.parse_error(Borrowed("duplicate-attribute"));
        }

        let name = LocalName::from(&*self.tag.name);
        self.tag.name.clear();
        match self.tag.kind {
            StartTag => self.last_start_tag = Some(name.clone()),
            EndTag => {
                if !self.tag.attrs.is_empty() {
                    self.parse_error(Borrowed("end-tag-with-attributes"));
                }
                if self.tag.self_closing {
                    self.parse_error(Borrowed("end-tag-with-trailing-solidus"));
                }
            },
        }
        let token = Token::Tag(Tag {
            kind: self.tag.kind,
            name,
            self_closing: mem::take(&mut self.tag.self_closing),
            attrs: mem::take(&mut self.tag.attrs),
        });

        match self.sink.process_token(token, self.line) {
            SinkResult::Continue => Step::Go,
            SinkResult::Plaintext => {
                self.state = State::Plaintext;
                Step::Go
            },
            SinkResult::RawText(kind) => {
                self.state = State::raw(kind);
                Step::Go
            },
            SinkResult::Script(handle) => {
                self.state = State::Data;
                Step::Script(handle)
            },
        }
    }

    fn begin_char_ref(&mut self, in_attr: bool) {
        debug_assert!(self.char_ref.is_none());
        self.char_ref = Some(CharRefScanner::new(in_attr));
    }

    /// Route a resolved character reference to wherever the `&`
    /// appeared.
    fn deliver_char_ref(&mut self, out: Resolved) {
        if out.len == 0 {
            self.deliver_ref_char('&');
        } else {
            for &c in &out.chars[..out.len as usize] {
                self.deliver_ref_char(c);
            }
        }
    }

    fn deliver_ref_char(&mut self, c: char) {
        match self.state {
            State::Data | State::Raw(Rcdata, Text) => self.emit_char(c),
            State::AttrValue(_) => self.tag.attr_value.push_char(c),
            state => panic!("character reference resolved in state {state:?}"),
        }
    }

    /// One action of the machine.
    fn step(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        if let Some(scanner) = self.char_ref.take() {
            return self.step_char_ref(scanner, input);
        }

        match self.state {
            State::Data => self.data_state(input),
            State::Plaintext => self.plaintext_state(input),
            State::Raw(kind, Text) => self.raw_text_state(kind, input),
            State::Raw(kind, phase) => self.raw_closer_states(kind, phase, input),
            State::ScriptEscapeStart
            | State::ScriptEscapeStartDash
            | State::ScriptEscapedDash(_)
            | State::ScriptEscapedDashDash(_)
            | State::ScriptDoubleEscapeStart
            | State::ScriptDoubleEscapeEnd => self.script_escape_states(input),
            State::TagOpen
            | State::EndTagOpen
            | State::TagName
            | State::SelfClosing => self.tag_states(input),
            State::BeforeAttrName
            | State::AttrName
            | State::AfterAttrName
            | State::AfterQuotedAttrValue => self.attr_name_states(input),
            State::BeforeAttrValue => self.before_attr_value_state(input),
            State::AttrValue(quote) => self.attr_value_state(quote, input),
            State::MarkupDecl => self.markup_decl_state(input),
            State::Comment(phase) => self.comment_states(phase, input),
            State::BogusComment => self.bogus_comment_state(input),
            State::Doctype(phase) => self.doctype_states(phase, input),
            State::BogusDoctype => self.bogus_doctype_state(input),
            State::Cdata(phase) => self.cdata_states(phase, input),
        }
    }

    fn step_char_ref(
        &mut self,
        mut scanner: CharRefScanner,
        input: &mut InputBuffer,
    ) -> Step<Sink::Handle> {
        match scanner.step(self, input) {
            ScanStatus::Done(out) => {
                self.deliver_char_ref(out);
                Step::Go
            },
            ScanStatus::Working => {
                self.char_ref = Some(scanner);
                Step::Go
            },
            ScanStatus::Stall => {
                self.char_ref = Some(scanner);
                Step::Stall
            },
        }
    }

    //§ data-state
    fn data_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(scan) = self.next_span(input, b"\r\0&<\n") else {
            return Step::Stall;
        };
        match scan {
            Scan::One('\0') => {
                self.null_error();
                self.emit_char('\0');
            },
            Scan::One('&') => self.begin_char_ref(false),
            Scan::One('<') => self.state = State::TagOpen,
            Scan::One(c) => self.emit_char(c),
            Scan::Span(text) => self.emit_span(text),
        }
        Step::Go
    }

    //§ plaintext-state
    fn plaintext_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(scan) = self.next_span(input, b"\r\0\n") else {
            return Step::Stall;
        };
        match scan {
            Scan::One('\0') => {
                self.null_error();
                self.emit_char('\u{fffd}');
            },
            Scan::One(c) => self.emit_char(c),
            Scan::Span(text) => self.emit_span(text),
        }
        Step::Go
    }

    //§ rcdata-state rawtext-state script-data-state script-data-escaped-state script-data-double-escaped-state
    fn raw_text_state(&mut self, kind: RawKind, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let stops: &[u8] = match kind {
            Rcdata => b"\r\0&<\n",
            Rawtext | Script => b"\r\0<\n",
            ScriptEscaped(_) => b"\r\0-<\n",
        };
        let Some(scan) = self.next_span(input, stops) else {
            return Step::Stall;
        };
        match scan {
            Scan::One('\0') => {
                self.null_error();
                self.emit_char('\u{fffd}');
            },
            Scan::One('&') if kind == Rcdata => self.begin_char_ref(false),
            Scan::One('-') if matches!(kind, ScriptEscaped(_)) => {
                let ScriptEscaped(esc) = kind else {
                    unreachable!();
                };
                self.emit_char('-');
                self.state = State::ScriptEscapedDash(esc);
            },
            Scan::One('<') => {
                if kind == ScriptEscaped(Twice) {
                    self.emit_char('<');
                }
                self.state = State::Raw(kind, Lt);
            },
            Scan::One(c) => self.emit_char(c),
            Scan::Span(text) => self.emit_span(text),
        }
        Step::Go
    }

    //§ rcdata-less-than-sign-state rawtext-less-than-sign-state script-data-less-than-sign-state script-data-escaped-less-than-sign-state script-data-double-escaped-less-than-sign-state rcdata-end-tag-open-state rawtext-end-tag-open-state script-data-end-tag-open-state script-data-escaped-end-tag-open-state rcdata-end-tag-name-state rawtext-end-tag-name-state script-data-end-tag-name-state script-data-escaped-end-tag-name-state
    fn raw_closer_states(
        &mut self,
        kind: RawKind,
        phase: RawPhase,
        input: &mut InputBuffer,
    ) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match phase {
            Text => unreachable!("handled by raw_text_state"),

            Lt if kind == ScriptEscaped(Twice) => {
                if c == '/' {
                    self.temp.clear();
                    self.emit_char('/');
                    self.state = State::ScriptDoubleEscapeEnd;
                } else {
                    self.unread(c);
                    self.state = State::raw(kind);
                }
            },

            Lt if kind == ScriptEscaped(Once) => match lower_ascii_letter(c) {
                _ if c == '/' => {
                    self.temp.clear();
                    self.state = State::Raw(kind, EndTagSlash);
                },
                Some(lower) => {
                    self.temp.clear();
                    self.temp.push_char(lower);
                    self.emit_char('<');
                    self.emit_char(c);
                    self.state = State::ScriptDoubleEscapeStart;
                },
                None => {
                    self.emit_char('<');
                    self.unread(c);
                    self.state = State::raw(kind);
                },
            },

            Lt => match c {
                '/' => {
                    self.temp.clear();
                    self.state = State::Raw(kind, EndTagSlash);
                },
                '!' if kind == Script => {
                    self.emit_char('<');
                    self.emit_char('!');
                    self.state = State::ScriptEscapeStart;
                },
                _ => {
                    self.emit_char('<');
                    self.unread(c);
                    self.state = State::raw(kind);
                },
            },

            EndTagSlash => match lower_ascii_letter(c) {
                Some(lower) => {
                    self.tag.reset(EndTag, lower);
                    self.temp.push_char(c);
                    self.state = State::Raw(kind, EndTagName);
                },
                None => {
                    self.emit_char('<');
                    self.emit_char('/');
                    self.unread(c);
                    self.state = State::raw(kind);
                },
            },

            EndTagName => {
                if self.raw_end_tag_matches() {
                    match c {
                        '\t' | '\n' | '\x0C' | ' ' => {
                            self.temp.clear();
                            self.state = State::BeforeAttrName;
                            return Step::Go;
                        },
                        '/' => {
                            self.temp.clear();
                            self.state = State::SelfClosing;
                            return Step::Go;
                        },
                        '>' => {
                            self.temp.clear();
                            return self.finish_tag(State::Data);
                        },
                        _ => {},
                    }
                }
                match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.tag.name.push_char(lower);
                        self.temp.push_char(c);
                    },
                    None => {
                        self.tag.abandon();
                        self.emit_char('<');
                        self.emit_char('/');
                        self.flush_temp();
                        self.unread(c);
                        self.state = State::raw(kind);
                    },
                }
            },
        }
        Step::Go
    }

    //§ script-data-escape-start-state script-data-escape-start-dash-state script-data-escaped-dash-state script-data-double-escaped-dash-state script-data-escaped-dash-dash-state script-data-double-escaped-dash-dash-state script-data-double-escape-start-state script-data-double-escape-end-state
    fn script_escape_states(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match self.state {
            State::ScriptEscapeStart => match c {
                '-' => {
                    self.emit_char('-');
                    self.state = State::ScriptEscapeStartDash;
                },
                _ => {
                    self.unread(c);
                    self.state = State::raw(Script);
                },
            },

            State::ScriptEscapeStartDash => match c {
                '-' => {
                    self.emit_char('-');
                    self.state = State::ScriptEscapedDashDash(Once);
                },
                _ => {
                    self.unread(c);
                    self.state = State::raw(Script);
                },
            },

            State::ScriptEscapedDash(esc) => match c {
                '-' => {
                    self.emit_char('-');
                    self.state = State::ScriptEscapedDashDash(esc);
                },
                '<' => {
                    if esc == Twice {
                        self.emit_char('<');
                    }
                    self.state = State::Raw(ScriptEscaped(esc), Lt);
                },
                '\0' => {
                    self.null_error();
                    self.emit_char('\u{fffd}');
                    self.state = State::raw(ScriptEscaped(esc));
                },
                _ => {
                    self.emit_char(c);
                    self.state = State::raw(ScriptEscaped(esc));
                },
            },

            State::ScriptEscapedDashDash(esc) => match c {
                '-' => self.emit_char('-'),
                '<' => {
                    if esc == Twice {
                        self.emit_char('<');
                    }
                    self.state = State::Raw(ScriptEscaped(esc), Lt);
                },
                '>' => {
                    self.emit_char('>');
                    self.state = State::raw(Script);
                },
                '\0' => {
                    self.null_error();
                    self.emit_char('\u{fffd}');
                    self.state = State::raw(ScriptEscaped(esc));
                },
                _ => {
                    self.emit_char(c);
                    self.state = State::raw(ScriptEscaped(esc));
                },
            },

            State::ScriptDoubleEscapeStart => match c {
                '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                    let escape = if &*self.temp == "script" { Twice } else { Once };
                    self.emit_char(c);
                    self.state = State::raw(ScriptEscaped(escape));
                },
                _ => match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.temp.push_char(lower);
                        self.emit_char(c);
                    },
                    None => {
                        self.unread(c);
                        self.state = State::raw(ScriptEscaped(Once));
                    },
                },
            },

            State::ScriptDoubleEscapeEnd => match c {
                '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                    let escape = if &*self.temp == "script" { Once } else { Twice };
                    self.emit_char(c);
                    self.state = State::raw(ScriptEscaped(escape));
                },
                _ => match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.temp.push_char(lower);
                        self.emit_char(c);
                    },
                    None => {
                        self.unread(c);
                        self.state = State::raw(ScriptEscaped(Twice));
                    },
                },
            },

            state => unreachable!("not a script escape state: {state:?}"),
        }
        Step::Go
    }

    //§ tag-open-state end-tag-open-state tag-name-state self-closing-start-tag-state
    fn tag_states(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match self.state {
            State::TagOpen => match c {
                '!' => self.state = State::MarkupDecl,
                '/' => self.state = State::EndTagOpen,
                '?' => {
                    self.bad_char();
                    self.comment.clear();
                    self.unread(c);
                    self.state = State::BogusComment;
                },
                _ => match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.tag.reset(StartTag, lower);
                        self.state = State::TagName;
                    },
                    None => {
                        self.bad_char();
                        self.emit_char('<');
                        self.unread(c);
                        self.state = State::Data;
                    },
                },
            },

            State::EndTagOpen => match c {
                '>' => {
                    self.bad_char();
                    self.state = State::Data;
                },
                _ => match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.tag.reset(EndTag, lower);
                        self.state = State::TagName;
                    },
                    None => {
                        self.bad_char();
                        self.comment.clear();
                        self.unread(c);
                        self.state = State::BogusComment;
                    },
                },
            },

            State::TagName => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::BeforeAttrName,
                '/' => self.state = State::SelfClosing,
                '>' => return self.finish_tag(State::Data),
                '\0' => {
                    self.null_error();
                    self.tag.name.push_char('\u{fffd}');
                },
                _ => self.tag.name.push_char(c.to_ascii_lowercase()),
            },

            State::SelfClosing => match c {
                '>' => {
                    self.tag.self_closing = true;
                    return self.finish_tag(State::Data);
                },
                _ => {
                    self.bad_char();
                    self.unread(c);
                    self.state = State::BeforeAttrName;
                },
            },

            state => unreachable!("not a tag state: {state:?}"),
        }
        Step::Go
    }

    //§ before-attribute-name-state attribute-name-state after-attribute-name-state after-attribute-value-(quoted)-state
    fn attr_name_states(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match self.state {
            State::BeforeAttrName | State::AfterAttrName => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '/' => self.state = State::SelfClosing,
                '=' if self.state == State::AfterAttrName => {
                    self.state = State::BeforeAttrValue;
                },
                '>' => return self.finish_tag(State::Data),
                '\0' => {
                    self.null_error();
                    self.begin_attr('\u{fffd}');
                    self.state = State::AttrName;
                },
                _ => {
                    match c {
                        '"' | '\'' | '<' => self.bad_char(),
                        '=' => self.bad_char(), // only reachable from BeforeAttrName
                        _ => {},
                    }
                    self.begin_attr(lower_ascii_letter(c).unwrap_or(c));
                    self.state = State::AttrName;
                },
            },

            State::AttrName => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::AfterAttrName,
                '/' => self.state = State::SelfClosing,
                '=' => self.state = State::BeforeAttrValue,
                '>' => return self.finish_tag(State::Data),
                '\0' => {
                    self.null_error();
                    self.tag.attr_name.push_char('\u{fffd}');
                },
                _ => {
                    if matches!(c, '"' | '\'' | '<') {
                        self.bad_char();
                    }
                    self.tag
                        .attr_name
                        .push_char(lower_ascii_letter(c).unwrap_or(c));
                },
            },

            State::AfterQuotedAttrValue => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::BeforeAttrName,
                '/' => self.state = State::SelfClosing,
                '>' => return self.finish_tag(State::Data),
                _ => {
                    self.bad_char();
                    self.unread(c);
                    self.state = State::BeforeAttrName;
                },
            },

            state => unreachable!("not an attribute state: {state:?}"),
        }
        Step::Go
    }

    //§ before-attribute-value-state
    // Peek rather than consume, so the first value character can ride
    // the zero-copy span path.
    fn before_attr_value_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.peek_raw(input) else {
            return Step::Stall;
        };
        match c {
            '\t' | '\n' | '\r' | '\x0C' | ' ' => self.skip_raw(input),
            '"' => {
                self.skip_raw(input);
                self.state = State::AttrValue(Double);
            },
            '\'' => {
                self.skip_raw(input);
                self.state = State::AttrValue(Single);
            },
            '>' => {
                self.skip_raw(input);
                self.bad_char();
                return self.finish_tag(State::Data);
            },
            _ => self.state = State::AttrValue(Unquoted),
        }
        Step::Go
    }

    //§ attribute-value-(double-quoted)-state attribute-value-(single-quoted)-state attribute-value-(unquoted)-state
    fn attr_value_state(&mut self, quote: Quote, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let stops: &[u8] = match quote {
            Double => b"\r\"&\0\n",
            Single => b"\r'&\0\n",
            Unquoted => b"\r\t\n\x0C &>\0",
        };
        let Some(scan) = self.next_span(input, stops) else {
            return Step::Stall;
        };
        match scan {
            Scan::One('"') if quote == Double => self.state = State::AfterQuotedAttrValue,
            Scan::One('\'') if quote == Single => self.state = State::AfterQuotedAttrValue,
            Scan::One('\t' | '\n' | '\x0C' | ' ') if quote == Unquoted => {
                self.state = State::BeforeAttrName;
            },
            Scan::One('>') if quote == Unquoted => return self.finish_tag(State::Data),
            Scan::One('&') => self.begin_char_ref(true),
            Scan::One('\0') => {
                self.null_error();
                self.tag.attr_value.push_char('\u{fffd}');
            },
            Scan::One(c) => {
                if quote == Unquoted && matches!(c, '"' | '\'' | '<' | '=' | '`') {
                    self.bad_char();
                }
                self.tag.attr_value.push_char(c);
            },
            Scan::Span(text) => self.tag.attr_value.push_tendril(&text),
        }
        Step::Go
    }

    //§ markup-declaration-open-state
    fn markup_decl_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(comment_open) = self.lookahead(input, "--", false) else {
            return Step::Stall;
        };
        if comment_open {
            self.comment.clear();
            self.state = State::Comment(CommentPhase::Start);
            return Step::Go;
        }
        let Some(doctype_open) = self.lookahead(input, "doctype", true) else {
            return Step::Stall;
        };
        if doctype_open {
            self.state = State::Doctype(DoctypePhase::Start);
            return Step::Go;
        }
        if self
            .sink
            .adjusted_current_node_present_but_not_in_html_namespace()
        {
            let Some(cdata_open) = self.lookahead(input, "[CDATA[", false) else {
                return Step::Stall;
            };
            if cdata_open {
                self.temp.clear();
                self.state = State::Cdata(CdataPhase::Body);
                return Step::Go;
            }
        }
        self.parse_error(Borrowed("incorrectly-opened-comment"));
        self.comment.clear();
        self.state = State::BogusComment;
        Step::Go
    }

    //§ comment-start-state comment-start-dash-state comment-state comment-less-than-sign-state comment-less-than-sign-bang-state comment-less-than-sign-bang-dash-state comment-less-than-sign-bang-dash-dash-state comment-end-dash-state comment-end-state comment-end-bang-state
    fn comment_states(&mut self, phase: CommentPhase, input: &mut InputBuffer) -> Step<Sink::Handle> {
        use self::states::CommentPhase::*;

        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match phase {
            Start => match c {
                '-' => self.state = State::Comment(StartDash),
                '\0' => {
                    self.null_error();
                    self.comment.push_char('\u{fffd}');
                    self.state = State::Comment(Body);
                },
                '>' => {
                    self.parse_error(Borrowed("abrupt-closing-of-empty-comment"));
                    self.emit_comment();
                    self.state = State::Data;
                },
                _ => {
                    self.comment.push_char(c);
                    self.state = State::Comment(Body);
                },
            },

            StartDash => match c {
                '-' => self.state = State::Comment(End),
                '\0' => {
                    self.null_error();
                    self.comment.push_slice("-\u{fffd}");
                    self.state = State::Comment(Body);
                },
                '>' => {
                    self.parse_error(Borrowed("abrupt-closing-of-empty-comment"));
                    self.emit_comment();
                    self.state = State::Data;
                },
                _ => {
                    self.comment.push_char('-');
                    self.comment.push_char(c);
                    self.state = State::Comment(Body);
                },
            },

            Body => match c {
                '<' => {
                    self.comment.push_char(c);
                    self.state = State::Comment(Lt);
                },
                '-' => self.state = State::Comment(EndDash),
                '\0' => {
                    self.null_error();
                    self.comment.push_char('\u{fffd}');
                },
                _ => self.comment.push_char(c),
            },

            Lt => match c {
                '!' => {
                    self.comment.push_char(c);
                    self.state = State::Comment(LtBang);
                },
                '<' => self.comment.push_char(c),
                _ => {
                    self.unread(c);
                    self.state = State::Comment(Body);
                },
            },

            LtBang => match c {
                '-' => self.state = State::Comment(LtBangDash),
                _ => {
                    self.unread(c);
                    self.state = State::Comment(Body);
                },
            },

            LtBangDash => match c {
                '-' => self.state = State::Comment(LtBangDashDash),
                _ => {
                    self.unread(c);
                    self.state = State::Comment(EndDash);
                },
            },

            LtBangDashDash => {
                if c != '>' {
                    self.parse_error(Borrowed("nested-comment"));
                }
                self.unread(c);
                self.state = State::Comment(End);
            },

            EndDash => match c {
                '-' => self.state = State::Comment(End),
                '\0' => {
                    self.null_error();
                    self.comment.push_slice("-\u{fffd}");
                    self.state = State::Comment(Body);
                },
                _ => {
                    self.comment.push_char('-');
                    self.comment.push_char(c);
                    self.state = State::Comment(Body);
                },
            },

            End => match c {
                '>' => {
                    self.emit_comment();
                    self.state = State::Data;
                },
                '!' => self.state = State::Comment(EndBang),
                '-' => self.comment.push_char('-'),
                _ => {
                    self.comment.push_slice("--");
                    self.unread(c);
                    self.state = State::Comment(Body);
                },
            },

            EndBang => match c {
                '-' => {
                    self.comment.push_slice("--!");
                    self.state = State::Comment(EndDash);
                },
                '>' => {
                    self.parse_error(Borrowed("incorrectly-closed-comment"));
                    self.emit_comment();
                    self.state = State::Data;
                },
                '\0' => {
                    self.null_error();
                    self.comment.push_slice("--!\u{fffd}");
                    self.state = State::Comment(Body);
                },
                _ => {
                    self.comment.push_slice("--!");
                    self.comment.push_char(c);
                    self.state = State::Comment(Body);
                },
            },
        }
        Step::Go
    }

    //§ bogus-comment-state
    fn bogus_comment_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match c {
            '>' => {
                self.emit_comment();
                self.state = State::Data;
            },
            '\0' => {
                self.null_error();
                self.comment.push_char('\u{fffd}');
            },
            _ => self.comment.push_char(c),
        }
        Step::Go
    }

    //§ doctype-state before-doctype-name-state doctype-name-state after-doctype-name-state after-doctype-public-keyword-state after-doctype-system-keyword-state before-doctype-public-identifier-state before-doctype-system-identifier-state doctype-public-identifier-(double-quoted)-state doctype-public-identifier-(single-quoted)-state doctype-system-identifier-(double-quoted)-state doctype-system-identifier-(single-quoted)-state after-doctype-public-identifier-state after-doctype-system-identifier-state between-doctype-public-and-system-identifiers-state
    fn doctype_states(&mut self, phase: DoctypePhase, input: &mut InputBuffer) -> Step<Sink::Handle> {
        use self::states::DoctypePhase::*;

        // AfterName starts with keyword lookahead, before any
        // character is consumed.
        if phase == AfterName {
            let Some(is_public) = self.lookahead(input, "public", true) else {
                return Step::Stall;
            };
            if is_public {
                self.state = State::Doctype(AfterKeyword(Public));
                return Step::Go;
            }
            let Some(is_system) = self.lookahead(input, "system", true) else {
                return Step::Stall;
            };
            if is_system {
                self.state = State::Doctype(AfterKeyword(System));
                return Step::Go;
            }
        }

        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match phase {
            Start => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::Doctype(BeforeName),
                '>' => {
                    self.unread(c);
                    self.state = State::Doctype(BeforeName);
                },
                _ => {
                    self.bad_char();
                    self.unread(c);
                    self.state = State::Doctype(BeforeName);
                },
            },

            BeforeName => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '\0' => {
                    self.null_error();
                    self.doctype = Doctype::default();
                    self.push_doctype_name('\u{fffd}');
                    self.state = State::Doctype(Name);
                },
                '>' => {
                    self.parse_error(Borrowed("missing-doctype-name"));
                    self.doctype = Doctype::default();
                    self.doctype.force_quirks = true;
                    self.emit_doctype();
                    self.state = State::Data;
                },
                _ => {
                    self.doctype = Doctype::default();
                    self.push_doctype_name(c.to_ascii_lowercase());
                    self.state = State::Doctype(Name);
                },
            },

            Name => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::Doctype(AfterName),
                '>' => {
                    self.emit_doctype();
                    self.state = State::Data;
                },
                '\0' => {
                    self.null_error();
                    self.push_doctype_name('\u{fffd}');
                },
                _ => self.push_doctype_name(c.to_ascii_lowercase()),
            },

            AfterName => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '>' => {
                    self.emit_doctype();
                    self.state = State::Data;
                },
                _ => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },

            AfterKeyword(kind) => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::Doctype(BeforeId(kind)),
                '"' => {
                    self.bad_char();
                    self.reset_doctype_id(kind);
                    self.state = State::Doctype(IdDouble(kind));
                },
                '\'' => {
                    self.bad_char();
                    self.reset_doctype_id(kind);
                    self.state = State::Doctype(IdSingle(kind));
                },
                '>' => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.emit_doctype();
                    self.state = State::Data;
                },
                _ => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },

            BeforeId(kind) => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '"' => {
                    self.reset_doctype_id(kind);
                    self.state = State::Doctype(IdDouble(kind));
                },
                '\'' => {
                    self.reset_doctype_id(kind);
                    self.state = State::Doctype(IdSingle(kind));
                },
                '>' => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.emit_doctype();
                    self.state = State::Data;
                },
                _ => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },

            IdDouble(kind) | IdSingle(kind) => {
                let closer = if phase == IdDouble(kind) { '"' } else { '\'' };
                match c {
                    _ if c == closer => self.state = State::Doctype(AfterId(kind)),
                    '\0' => {
                        self.null_error();
                        self.push_doctype_id(kind, '\u{fffd}');
                    },
                    '>' => {
                        self.bad_char();
                        self.doctype.force_quirks = true;
                        self.emit_doctype();
                        self.state = State::Data;
                    },
                    _ => self.push_doctype_id(kind, c),
                }
            },

            AfterId(Public) => match c {
                '\t' | '\n' | '\x0C' | ' ' => self.state = State::Doctype(Between),
                '>' => {
                    self.emit_doctype();
                    self.state = State::Data;
                },
                '"' => {
                    self.bad_char();
                    self.reset_doctype_id(System);
                    self.state = State::Doctype(IdDouble(System));
                },
                '\'' => {
                    self.bad_char();
                    self.reset_doctype_id(System);
                    self.state = State::Doctype(IdSingle(System));
                },
                _ => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },

            AfterId(System) => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '>' => {
                    self.emit_doctype();
                    self.state = State::Data;
                },
                _ => {
                    self.bad_char();
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },

            Between => match c {
                '\t' | '\n' | '\x0C' | ' ' => {},
                '>' => {
                    self.emit_doctype();
                    self.state = State::Data;
                },
                '"' => {
                    self.reset_doctype_id(System);
                    self.state = State::Doctype(IdDouble(System));
                },
                '\'' => {
                    self.reset_doctype_id(System);
                    self.state = State::Doctype(IdSingle(System));
                },
                _ => {
                    self.bad_char();
                    self.doctype.force_quirks = true;
                    self.unread(c);
                    self.state = State::BogusDoctype;
                },
            },
        }
        Step::Go
    }

    //§ bogus-doctype-state
    fn bogus_doctype_state(&mut self, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match c {
            '>' => {
                self.emit_doctype();
                self.state = State::Data;
            },
            '\0' => self.null_error(),
            _ => {},
        }
        Step::Go
    }

    //§ cdata-section-state cdata-section-bracket-state cdata-section-end-state
    fn cdata_states(&mut self, phase: CdataPhase, input: &mut InputBuffer) -> Step<Sink::Handle> {
        let Some(c) = self.next_char(input) else {
            return Step::Stall;
        };
        match phase {
            CdataPhase::Body => match c {
                ']' => self.state = State::Cdata(Bracket),
                '\0' => {
                    self.flush_temp();
                    self.emit_char('\0');
                },
                _ => self.temp.push_char(c),
            },
            CdataPhase::Bracket => match c {
                ']' => self.state = State::Cdata(CdataPhase::End),
                _ => {
                    self.temp.push_char(']');
                    self.unread(c);
                    self.state = State::Cdata(CdataPhase::Body);
                },
            },
            CdataPhase::End => match c {
                ']' => self.temp.push_char(']'),
                '>' => {
                    self.flush_temp();
                    self.state = State::Data;
                },
                _ => {
                    self.temp.push_slice("]]");
                    self.unread(c);
                    self.state = State::Cdata(CdataPhase::Body);
                },
            },
        }
        Step::Go
    }

    /// Signal the end of input. Drains everything still buffered, runs
    /// the per-state EOF rules, and emits the final [`Token::Eof`].
    pub fn end(&mut self) {
        // Wind down an in-flight character reference first; it may push
        // text back that still has to be tokenized.
        let mut leftovers = InputBuffer::default();
        if let Some(mut scanner) = self.char_ref.take() {
            let out = scanner.finish(self, &mut leftovers);
            self.deliver_char_ref(out);
        }

        self.at_eof = true;
        match self.run(&mut leftovers) {
            TokenizerResult::Done => {},
            TokenizerResult::Script(_) => unreachable!("no scripts at EOF"),
        }
        debug_assert!(leftovers.is_empty());

        while let Step::Go = self.eof_step() {}

        self.sink.end();
        if self.opts.profile {
            self.report_profile();
        }
    }

    /// Apply the current state's end-of-file rule. `Stall` means the
    /// final EOF token has been emitted.
    fn eof_step(&mut self) -> Step<Sink::Handle> {
        match self.state {
            State::Data
            | State::Plaintext
            | State::Raw(Rcdata | Rawtext | Script, Text) => {
                self.emit(Token::Eof);
                return Step::Stall;
            },

            State::TagName
            | State::Raw(ScriptEscaped(_), Text)
            | State::ScriptEscapedDash(_)
            | State::ScriptEscapedDashDash(_)
            | State::BeforeAttrName
            | State::AttrName
            | State::AfterAttrName
            | State::AttrValue(_)
            | State::AfterQuotedAttrValue
            | State::SelfClosing => {
                self.bad_eof();
                self.state = State::Data;
            },

            State::BeforeAttrValue => self.state = State::AttrValue(Unquoted),

            State::TagOpen => {
                self.bad_eof();
                self.emit_char('<');
                self.state = State::Data;
            },

            State::EndTagOpen => {
                self.bad_eof();
                self.emit_char('<');
                self.emit_char('/');
                self.state = State::Data;
            },

            State::Raw(kind @ ScriptEscaped(Twice), Lt) => self.state = State::raw(kind),

            State::Raw(kind, Lt) => {
                self.emit_char('<');
                self.state = State::raw(kind);
            },

            State::Raw(kind, EndTagSlash) => {
                self.emit_char('<');
                self.emit_char('/');
                self.state = State::raw(kind);
            },

            State::Raw(kind, EndTagName) => {
                self.emit_char('<');
                self.emit_char('/');
                self.flush_temp();
                self.state = State::raw(kind);
            },

            State::ScriptEscapeStart => self.state = State::raw(ScriptEscaped(Once)),
            State::ScriptEscapeStartDash => self.state = State::raw(Script),
            State::ScriptDoubleEscapeStart | State::ScriptDoubleEscapeEnd => {
                self.state = State::raw(ScriptEscaped(Twice));
            },

            State::Comment(
                CommentPhase::Start
                | CommentPhase::StartDash
                | CommentPhase::Body
                | CommentPhase::EndDash
                | CommentPhase::End
                | CommentPhase::EndBang,
            ) => {
                self.bad_eof();
                self.emit_comment();
                self.state = State::Data;
            },

            State::Comment(CommentPhase::Lt | CommentPhase::LtBang) => {
                self.state = State::Comment(CommentPhase::Body);
            },
            State::Comment(CommentPhase::LtBangDash) => {
                self.state = State::Comment(CommentPhase::EndDash);
            },
            State::Comment(CommentPhase::LtBangDashDash) => {
                self.state = State::Comment(CommentPhase::End);
            },

            State::Doctype(DoctypePhase::Start | DoctypePhase::BeforeName) => {
                self.bad_eof();
                self.doctype = Doctype::default();
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.state = State::Data;
            },

            State::Doctype(_) => {
                self.bad_eof();
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.state = State::Data;
            },

            State::BogusDoctype => {
                self.emit_doctype();
                self.state = State::Data;
            },

            State::BogusComment => {
                self.emit_comment();
                self.state = State::Data;
            },

            State::MarkupDecl => {
                self.parse_error(Borrowed("incorrectly-opened-comment"));
                self.state = State::BogusComment;
            },

            State::Cdata(CdataPhase::Body) => {
                self.flush_temp();
                self.bad_eof();
                self.state = State::Data;
            },
            State::Cdata(CdataPhase::Bracket) => {
                self.temp.push_char(']');
                self.state = State::Cdata(CdataPhase::Body);
            },
            State::Cdata(CdataPhase::End) => {
                self.temp.push_slice("]]");
                self.state = State::Cdata(CdataPhase::Body);
            },
        }
        Step::Go
    }

    fn report_profile(&self) {
        let mut by_time: Vec<(State, u64)> =
            self.state_times.iter().map(|(s, t)| (*s, *t)).collect();
        by_time.sort_by_key(|&(_, t)| std::cmp::Reverse(t));
        let total: u64 = by_time.iter().map(|&(_, t)| t).sum();

        println!("\nTokenizer profile, in nanoseconds");
        println!("{total:12}  total");
        for (state, t) in by_time {
            let pct = 100.0 * (t as f64) / (total as f64);
            println!("{t:12}  {pct:4.1}%  {state:?}");
        }
    }
}

/// Characters the input-stream preprocessor flags under exact errors:
/// controls (other than whitespace) and noncharacters.
fn is_forbidden_in_stream(c: char) -> bool {
    match c as u32 {
        0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF => true,
        n => (n & 0xFFFE) == 0xFFFE,
    }
}

#[cfg(test)]
mod test {
    use tendril::StrTendril;

    use super::{SinkResult, Token, TokenSink, Tokenizer, TokenizerOpts};
    use crate::input::InputBuffer;

    // Records the line number each non-character token arrived on.
    #[derive(Default)]
    struct LineLog {
        tags: Vec<(StrTendril, u64)>,
    }

    impl TokenSink for LineLog {
        type Handle = ();

        fn process_token(&mut self, token: Token, line: u64) -> SinkResult<()> {
            if let Token::Tag(tag) = token {
                self.tags.push((StrTendril::from_slice(&tag.name), line));
            }
            SinkResult::Continue
        }
    }

    fn lines_of(chunks: &[&str]) -> Vec<(StrTendril, u64)> {
        let mut tok = Tokenizer::new(LineLog::default(), TokenizerOpts::default());
        let mut input = InputBuffer::default();
        for chunk in chunks {
            input.push(StrTendril::from_slice(chunk));
            let _ = tok.feed(&mut input);
        }
        tok.end();
        tok.sink.tags
    }

    #[test]
    fn counts_lines() {
        let got = lines_of(&["<a>\n", "<b>\n", "</b>\n", "</a>\n"]);
        let names: Vec<(&str, u64)> = got.iter().map(|(n, l)| (&**n, *l)).collect();
        assert_eq!(names, vec![("a", 1), ("b", 2), ("b", 3), ("a", 4)]);
    }

    #[test]
    fn counts_crlf_as_one_line() {
        let got = lines_of(&["<a>\r\n", "<b>\r\n", "</b>\r\n", "</a>\r\n"]);
        let names: Vec<(&str, u64)> = got.iter().map(|(n, l)| (&**n, *l)).collect();
        assert_eq!(names, vec![("a", 1), ("b", 2), ("b", 3), ("a", 4)]);
    }
}
