// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! High-level entry points: wire a tokenizer to a tree builder and
//! accept input through `tendril::TendrilSink`.

use std::borrow::Cow;

use tendril::stream::{TendrilSink, Utf8LossyDecoder};
use tendril::StrTendril;

use crate::input::InputBuffer;
use crate::interface::create_element;
use crate::tokenizer::{Tokenizer, TokenizerOpts, TokenizerResult};
use crate::tree_builder::{TreeBuilder, TreeBuilderOpts, TreeSink};
use crate::{Attribute, QualName};

/// All-encompassing options struct for the parser.
#[derive(Clone, Default)]
pub struct ParseOpts {
    /// Tokenizer options.
    pub tokenizer: TokenizerOpts,

    /// Tree builder options.
    pub tree_builder: TreeBuilderOpts,
}

/// Parse an HTML document.
///
/// The returned [`Parser`] implements `tendril::TendrilSink`, so input
/// can arrive in chunks or all at once via `one`. For byte input, see
/// [`Parser::from_utf8`].
pub fn parse_document<Sink>(sink: Sink, opts: ParseOpts) -> Parser<Sink>
where
    Sink: TreeSink,
{
    let builder = TreeBuilder::new(sink, opts.tree_builder);
    Parser {
        tokenizer: Tokenizer::new(builder, opts.tokenizer),
        input: InputBuffer::default(),
    }
}

/// Parse an HTML fragment in the context of an element with the given
/// name and attributes.
pub fn parse_fragment<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_name: QualName,
    context_attrs: Vec<Attribute>,
) -> Parser<Sink>
where
    Sink: TreeSink,
{
    let context = create_element(&sink, context_name, context_attrs);
    parse_fragment_for_element(sink, opts, context, None)
}

/// Like [`parse_fragment`], for an already-created context element and
/// (optionally) a form owner.
pub fn parse_fragment_for_element<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_element: Sink::Handle,
    form_element: Option<Sink::Handle>,
) -> Parser<Sink>
where
    Sink: TreeSink,
{
    let scripting = opts.tree_builder.scripting_enabled;
    let builder =
        TreeBuilder::new_for_fragment(sink, context_element, form_element, opts.tree_builder);
    let tokenizer_opts = TokenizerOpts {
        initial_state: Some(builder.tokenizer_state_for_context_elem(scripting)),
        ..opts.tokenizer
    };
    Parser {
        tokenizer: Tokenizer::new(builder, tokenizer_opts),
        input: InputBuffer::default(),
    }
}

/// An HTML parser ready to receive input through `TendrilSink`.
pub struct Parser<Sink>
where
    Sink: TreeSink,
{
    pub tokenizer: Tokenizer<TreeBuilder<Sink::Handle, Sink>>,
    pub input: InputBuffer,
}

impl<Sink: TreeSink> Parser<Sink> {
    /// Push buffered input through the tokenizer. Scripts cannot run
    /// here, so `</script>` suspensions are simply resumed.
    fn pump(&mut self) {
        while let TokenizerResult::Script(_) = self.tokenizer.feed(&mut self.input) {}
    }
}

impl<Sink: TreeSink> TendrilSink<tendril::fmt::UTF8> for Parser<Sink> {
    type Output = Sink::Output;

    fn process(&mut self, chunk: StrTendril) {
        self.input.push(chunk);
        self.pump();
    }

    fn error(&mut self, desc: Cow<'static, str>) {
        // Decoding errors land in the same log as parse errors.
        self.tokenizer.sink.sink.parse_error(desc);
    }

    fn finish(mut self) -> Self::Output {
        self.pump();
        debug_assert!(self.input.is_empty());
        self.tokenizer.end();
        self.tokenizer.sink.sink.finish()
    }
}

impl<Sink: TreeSink> Parser<Sink> {
    /// Wrap this parser so it accepts UTF-8 bytes; decoding is lossy,
    /// like `String::from_utf8_lossy`.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_utf8(self) -> Utf8LossyDecoder<Self> {
        Utf8LossyDecoder::new(self)
    }
}
