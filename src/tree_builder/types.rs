// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal types of the tree builder.

use tendril::StrTendril;

use crate::tokenizer::states::RawKind;
use crate::tokenizer::Tag;

/// The 23 insertion modes of §13.2.6.
///
/// <https://html.spec.whatwg.org/multipage/#the-insertion-mode>
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    InHeadNoscript,
    AfterHead,
    InBody,
    Text,
    InTable,
    InTableText,
    InCaption,
    InColumnGroup,
    InTableBody,
    InRow,
    InCell,
    InSelect,
    InSelectInTable,
    InTemplate,
    AfterBody,
    InFrameset,
    AfterFrameset,
    AfterAfterBody,
    AfterAfterFrameset,
}

/// The tree builder's view of a token.
///
/// Character data arrives pre-segmented: every `Chars` is either
/// entirely ASCII whitespace or contains none at all, so mode handlers
/// can classify a run by looking at it once. DOCTYPEs and parse errors
/// never reach the mode handlers.
#[derive(PartialEq, Eq, Clone, Debug)]
pub(crate) enum Token {
    Tag(Tag),
    Comment(StrTendril),
    Chars(StrTendril),
    Null,
    Eof,
}

/// What a mode handler decided about the token it was given.
pub(crate) enum Flow<Handle> {
    /// Token fully handled.
    Done,
    /// Token fully handled, and its self-closing flag (if any) was
    /// legitimate.
    SelfClosingOk,
    /// Hand the same token to another mode.
    Redo(InsertionMode, Token),
    /// Suspend: a `</script>` completed.
    Script(Handle),
    /// Put the tokenizer into PLAINTEXT.
    Plaintext,
    /// Put the tokenizer into a raw-text mode.
    RawText(RawKind),
}

/// An entry on the list of active formatting elements.
pub(crate) enum FmtEntry<Handle> {
    /// Scope marker pushed by `<table>`, `<td>`, `<caption>`,
    /// `<template>`, and friends.
    Marker,
    /// A live formatting element and the tag that created it (kept for
    /// re-creation during reconstruction and adoption).
    Entry { element: Handle, tag: Tag },
}

/// Where the next node goes, per "appropriate place for inserting a
/// node".
pub(crate) enum InsertPos<Handle> {
    /// Plain append.
    AppendTo(Handle),
    /// Foster parenting: before `table` if it has a parent, otherwise
    /// at the end of `fallback`.
    Fostered { table: Handle, fallback: Handle },
}
