// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The tokens the tokenizer hands to its sink, and the sink trait.

use std::borrow::Cow;

use tendril::StrTendril;

use crate::interface::Attribute;
use crate::tokenizer::states::RawKind;
use crate::LocalName;

/// Is this a start or an end tag?
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Default)]
pub enum TagKind {
    #[default]
    StartTag,
    EndTag,
}

/// A complete tag token.
///
/// Names are ASCII-lowercased; attributes keep source order and carry
/// the empty namespace (the tree builder adjusts foreign ones later).
/// Duplicate attributes were already dropped, first occurrence wins.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Tag {
    pub kind: TagKind,
    pub name: LocalName,
    pub self_closing: bool,
    pub attrs: Vec<Attribute>,
}

/// A `<!DOCTYPE ...>` token.
///
/// An absent identifier is distinct from an empty one; the quirks-mode
/// decision depends on the difference.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Doctype {
    pub name: Option<StrTendril>,
    pub public_id: Option<StrTendril>,
    pub system_id: Option<StrTendril>,
    pub force_quirks: bool,
}

/// One unit of tokenizer output.
///
/// `Null` is kept separate from `Chars` because several tree-builder
/// modes treat U+0000 specially; `Chars` never contains it.
#[derive(PartialEq, Eq, Debug)]
pub enum Token {
    Doctype(Doctype),
    Tag(Tag),
    Comment(StrTendril),
    Chars(StrTendril),
    Null,
    Eof,
}

/// What the sink wants the tokenizer to do after a token, beyond
/// carrying on. Tags can switch the tokenizer into one of the raw
/// modes, and a closed `</script>` suspends tokenization so the caller
/// can run the script.
#[derive(Debug, PartialEq)]
#[must_use]
pub enum SinkResult<Handle> {
    Continue,
    Plaintext,
    RawText(RawKind),
    Script(Handle),
}

/// A consumer of tokens; the tree builder is one, tests are another.
pub trait TokenSink {
    type Handle;

    /// Take one token. The return value may redirect the tokenizer.
    fn process_token(&mut self, token: Token, line: u64) -> SinkResult<Self::Handle>;

    /// Record a parse error. Parsing always continues.
    fn parse_error(&mut self, msg: Cow<'static, str>, line: u64) {
        let _ = (msg, line);
    }

    /// The input ended; no more tokens will arrive after the final
    /// [`Token::Eof`].
    fn end(&mut self) {}

    /// Whether the adjusted current node is a foreign element, which is
    /// the condition for honoring `<![CDATA[`.
    ///
    /// <https://html.spec.whatwg.org/multipage/#markup-declaration-open-state>
    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        false
    }
}
