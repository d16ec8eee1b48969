// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tree builder: consumes tokens, produces DOM operations.
//!
//! Parser state lives in plain vectors here; the DOM itself is behind
//! the [`TreeSink`] trait. Mode-by-mode token handling is in `rules`;
//! this module owns the state and the algorithms the modes share
//! (insertion location, scope queries, formatting reconstruction, the
//! adoption agency, foreign-content fixups).

pub use crate::interface::{create_element, ElementFlags, TreeSink};
pub use crate::interface::{Attribute, NodeOrText, QuirksMode};
pub use crate::interface::{LimitedQuirks, NoQuirks, Quirks};

use std::borrow::Cow::{self, Borrowed};
use std::fmt::Debug;
use std::mem;

use log::debug;
use tendril::StrTendril;

use self::data::*;
use self::types::*;

use crate::tokenizer::states::{RawKind, State};
use crate::tokenizer::{self, Doctype, SinkResult, Tag, TagKind, TokenSink};
use crate::{ExpandedName, LocalName, Namespace, QualName};

mod data;
mod rules;
mod types;

/// Tree builder options, with an impl for `Default`.
#[derive(Copy, Clone)]
pub struct TreeBuilderOpts {
    /// Report all parse errors described in the standard, at some
    /// performance penalty? Default: false
    pub exact_errors: bool,

    /// Is scripting enabled? Affects `<noscript>`: on, its contents
    /// are one raw text node; off, a normal subtree. Default: true
    pub scripting_enabled: bool,

    /// Is this document the `srcdoc` of an `<iframe>`? Affects the
    /// quirks-mode decision. Default: false
    pub iframe_srcdoc: bool,

    /// Leave the DOCTYPE (if any) out of the tree? Default: false
    pub drop_doctype: bool,

    /// Quirks mode to start in. Default: NoQuirks
    pub quirks_mode: QuirksMode,
}

impl Default for TreeBuilderOpts {
    fn default() -> TreeBuilderOpts {
        TreeBuilderOpts {
            exact_errors: false,
            scripting_enabled: true,
            iframe_srcdoc: false,
            drop_doctype: false,
            quirks_mode: NoQuirks,
        }
    }
}

/// The HTML tree builder.
pub struct TreeBuilder<Handle, Sink> {
    /// Consumer of tree operations.
    pub sink: Sink,

    opts: TreeBuilderOpts,

    /// The sink's Document node.
    doc: Handle,

    /// Insertion mode.
    mode: InsertionMode,

    /// Mode to return to after Text or InTableText.
    saved_mode: Option<InsertionMode>,

    /// Stack of template insertion modes.
    template_modes: Vec<InsertionMode>,

    /// The stack of open elements, deepest last.
    open: Vec<Handle>,

    /// The list of active formatting elements.
    fmt: Vec<FmtEntry<Handle>>,

    /// Character runs buffered while in InTableText.
    table_text: Vec<StrTendril>,

    //§ the-element-pointers
    head: Option<Handle>,
    form: Option<Handle>,
    //§ END

    quirks: QuirksMode,

    /// The frameset-ok flag.
    frameset_ok: bool,

    /// Swallow the newline right after `<pre>`/`<textarea>`.
    skip_newline: bool,

    /// Foster parenting is in force.
    fostering: bool,

    /// Context element, when fragment parsing.
    context: Option<Handle>,

    /// Line the tokenizer last reported.
    line: u64,
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    /// Create a tree builder for a full document parse. The builder is
    /// the tokenizer's sink.
    pub fn new(sink: Sink, opts: TreeBuilderOpts) -> TreeBuilder<Handle, Sink> {
        let doc = sink.get_document();
        TreeBuilder {
            sink,
            opts,
            doc,
            mode: InsertionMode::Initial,
            saved_mode: None,
            template_modes: vec![],
            open: vec![],
            fmt: vec![],
            table_text: vec![],
            head: None,
            form: None,
            quirks: opts.quirks_mode,
            frameset_ok: true,
            skip_newline: false,
            fostering: false,
            context: None,
            line: 1,
        }
    }

    /// Create a tree builder for a fragment parse within
    /// `context_elem`.
    ///
    /// <https://html.spec.whatwg.org/multipage/#parsing-html-fragments>
    pub fn new_for_fragment(
        sink: Sink,
        context_elem: Handle,
        form_elem: Option<Handle>,
        opts: TreeBuilderOpts,
    ) -> TreeBuilder<Handle, Sink> {
        let doc = sink.get_document();
        let context_is_template = sink.elem_name(&context_elem).is_html("template");

        let mut tb = TreeBuilder {
            sink,
            opts,
            doc,
            mode: InsertionMode::Initial,
            saved_mode: None,
            template_modes: if context_is_template {
                vec![InsertionMode::InTemplate]
            } else {
                vec![]
            },
            open: vec![],
            fmt: vec![],
            table_text: vec![],
            head: None,
            form: form_elem,
            quirks: opts.quirks_mode,
            frameset_ok: true,
            skip_newline: false,
            fostering: false,
            context: Some(context_elem),
            line: 1,
        };

        // A synthetic <html> root is the entire initial stack, and the
        // insertion mode comes from the context element.
        tb.create_html_root(vec![]);
        tb.mode = tb.reset_mode();
        tb
    }

    /// The tokenizer state a fragment parse starts in, decided by the
    /// context element.
    ///
    /// <https://html.spec.whatwg.org/multipage/#concept-frag-parse-context>
    pub fn tokenizer_state_for_context_elem(&self, scripting: bool) -> State {
        use crate::tokenizer::states::RawKind::*;

        let context = self.context.as_ref().expect("no context element");
        let name = self.sink.elem_name(context);
        if *name.ns != ns!(html) {
            return State::Data;
        }
        match &**name.local {
            "title" | "textarea" => State::raw(Rcdata),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => State::raw(Rawtext),
            "script" => State::raw(Script),
            "noscript" if scripting => State::raw(Rawtext),
            "plaintext" => State::Plaintext,
            _ => State::Data,
        }
    }

    /// Are we parsing a fragment?
    pub fn is_fragment(&self) -> bool {
        self.context.is_some()
    }

    // ------------------------------------------------------------------
    // Driving tokens through the mode handlers.

    /// Split a character run into homogeneous whitespace / text pieces
    /// and feed each through the modes. Mode handlers rely on every
    /// `Chars` being all-blank or blank-free.
    fn process_chars(&mut self, mut text: StrTendril) -> SinkResult<Handle> {
        while let Some((run, _)) = text.pop_front_char_run(|c| c.is_ascii_whitespace()) {
            match self.drive(Token::Chars(run)) {
                SinkResult::Continue => {},
                other => {
                    debug_assert!(text.is_empty(), "tokenizer redirected mid-run");
                    return other;
                },
            }
        }
        SinkResult::Continue
    }

    /// Deliver one token, re-dispatching for as long as handlers ask.
    fn drive(&mut self, mut token: Token) -> SinkResult<Handle> {
        loop {
            debug!("{:?} in {:?}", token, self.mode);
            let unacked_self_closing = matches!(
                &token,
                Token::Tag(tag) if tag.self_closing && tag.kind == TagKind::StartTag
            );
            let flow = if self.in_foreign(&token) {
                self.foreign_rules(token)
            } else {
                self.rules(self.mode, token)
            };
            match flow {
                Flow::Done => {
                    if unacked_self_closing {
                        self.sink.parse_error(Borrowed(
                            "non-void-html-element-start-tag-with-trailing-solidus",
                        ));
                    }
                    return SinkResult::Continue;
                },
                Flow::SelfClosingOk => return SinkResult::Continue,
                Flow::Redo(mode, redo) => {
                    self.mode = mode;
                    token = redo;
                },
                Flow::Script(handle) => return SinkResult::Script(handle),
                Flow::Plaintext => return SinkResult::Plaintext,
                Flow::RawText(kind) => return SinkResult::RawText(kind),
            }
        }
    }

    fn handle_doctype(&mut self, doctype: Doctype) {
        if self.mode != InsertionMode::Initial {
            self.sink.parse_error(if self.opts.exact_errors {
                format!("DOCTYPE in insertion mode {:?}", self.mode).into()
            } else {
                Borrowed("DOCTYPE in body")
            });
            return;
        }

        let (error, quirks) = doctype_error_and_quirks(&doctype, self.opts.iframe_srcdoc);
        if error {
            self.sink.parse_error(if self.opts.exact_errors {
                format!("Bad DOCTYPE: {doctype:?}").into()
            } else {
                Borrowed("Bad DOCTYPE")
            });
        }
        if !self.opts.drop_doctype {
            self.sink.append_doctype_to_document(
                doctype.name.unwrap_or_default(),
                doctype.public_id.unwrap_or_default(),
                doctype.system_id.unwrap_or_default(),
            );
        }
        self.set_quirks(quirks);
        self.mode = InsertionMode::BeforeHtml;
    }

    // ------------------------------------------------------------------
    // Stack and name queries.

    fn current(&self) -> &Handle {
        self.open.last().expect("stack of open elements is empty")
    }

    /// The adjusted current node: the context element when only the
    /// fragment root is open.
    fn adjusted_current(&self) -> &Handle {
        match &self.context {
            Some(context) if self.open.len() == 1 => context,
            _ => self.current(),
        }
    }

    fn elem_is(&self, elem: &Handle, local: &str) -> bool {
        self.sink.elem_name(elem).is_html(local)
    }

    fn elem_in(&self, elem: &Handle, set: fn(ExpandedName) -> bool) -> bool {
        set(self.sink.elem_name(elem))
    }

    fn current_is(&self, local: &str) -> bool {
        self.elem_is(self.current(), local)
    }

    fn current_in(&self, set: fn(ExpandedName) -> bool) -> bool {
        self.elem_in(self.current(), set)
    }

    /// Is some HTML element named `local` anywhere on the stack?
    fn stack_has(&self, local: &str) -> bool {
        self.open.iter().any(|elem| self.elem_is(elem, local))
    }

    /// Walk down the stack looking for an element satisfying `pred`,
    /// stopping (with `false`) at any scope terminator.
    fn in_scope_where<P>(&self, scope: fn(ExpandedName) -> bool, pred: P) -> bool
    where
        P: Fn(&Handle) -> bool,
    {
        for elem in self.open.iter().rev() {
            if pred(elem) {
                return true;
            }
            if scope(self.sink.elem_name(elem)) {
                return false;
            }
        }
        // The root <html> terminates every scope.
        false
    }

    /// "Has an element in scope", for an HTML element named `local`.
    fn has_in_scope(&self, scope: fn(ExpandedName) -> bool, local: &str) -> bool {
        self.in_scope_where(scope, |elem| self.elem_is(elem, local))
    }

    fn push_open(&mut self, elem: &Handle) {
        self.open.push(elem.clone());
    }

    fn pop_open(&mut self) -> Handle {
        let elem = self.open.pop().expect("stack of open elements is empty");
        self.sink.pop(&elem);
        elem
    }

    /// Remove a specific element from wherever it sits on the stack.
    fn remove_open(&mut self, elem: &Handle) {
        if let Some(at) = self.open.iter().rposition(|e| self.sink.same_node(e, elem)) {
            self.open.remove(at);
            self.sink.pop(elem);
        }
    }

    /// Pop until the current node is in `set`.
    fn pop_above(&mut self, set: fn(ExpandedName) -> bool) {
        while !self.current_in(set) {
            self.open.pop();
        }
    }

    /// Pop elements until an HTML element named `local` has been
    /// popped; returns how many were popped in total.
    fn pop_through(&mut self, local: &str) -> usize {
        let mut count = 0;
        while let Some(elem) = self.open.pop() {
            count += 1;
            if self.elem_is(&elem, local) {
                break;
            }
        }
        count
    }

    /// Pop through `local`, reporting an error if anything else had to
    /// be popped on the way.
    fn close_named(&mut self, local: &str) {
        if self.pop_through(local) != 1 {
            self.sink.parse_error(if self.opts.exact_errors {
                format!("Unexpected open element while closing {local}").into()
            } else {
                Borrowed("Unexpected open element")
            });
        }
    }

    /// <https://html.spec.whatwg.org/#generate-implied-end-tags>
    fn generate_implied_ends(&mut self, set: fn(ExpandedName) -> bool) {
        loop {
            let done = match self.open.last() {
                None => true,
                Some(elem) => !set(self.sink.elem_name(elem)),
            };
            if done {
                return;
            }
            self.pop_open();
        }
    }

    fn generate_implied_ends_except(&mut self, keep: &str) {
        loop {
            let done = match self.open.last() {
                None => true,
                Some(elem) => {
                    let name = self.sink.elem_name(elem);
                    name.is_html(keep) || !implied_end(name)
                },
            };
            if done {
                return;
            }
            self.pop_open();
        }
    }

    fn close_p(&mut self) {
        self.generate_implied_ends_except("p");
        self.close_named("p");
    }

    fn close_p_in_button_scope(&mut self) {
        if self.has_in_scope(button_scope, "p") {
            self.close_p();
        }
    }

    /// Close the cell the parser is in.
    fn close_the_cell(&mut self) {
        self.generate_implied_ends(implied_end);
        let mut popped = 0;
        while let Some(elem) = self.open.pop() {
            popped += 1;
            self.sink.pop(&elem);
            if self.elem_in(&elem, td_th) {
                break;
            }
        }
        if popped != 1 {
            self.sink
                .parse_error(Borrowed("expected to close <td> or <th> with cell"));
        }
        self.clear_fmt_to_marker();
    }

    // ------------------------------------------------------------------
    // Inserting nodes.

    /// "Appropriate place for inserting a node".
    ///
    /// <https://html.spec.whatwg.org/multipage/#appropriate-place-for-inserting-a-node>
    fn insertion_target(&self, override_target: Option<Handle>) -> InsertPos<Handle> {
        fn foster_risk(name: ExpandedName) -> bool {
            in_html_set(name, &["table", "tbody", "tfoot", "thead", "tr"])
        }

        let target = override_target.unwrap_or_else(|| self.current().clone());
        if !(self.fostering && self.elem_in(&target, foster_risk)) {
            if self.elem_is(&target, "template") {
                return InsertPos::AppendTo(self.sink.template_contents(&target));
            }
            return InsertPos::AppendTo(target);
        }

        // Foster parenting: divert around the innermost table, unless a
        // template is nearer the top of the stack.
        for at in (0..self.open.len()).rev() {
            let elem = &self.open[at];
            if self.elem_is(elem, "template") {
                return InsertPos::AppendTo(self.sink.template_contents(elem));
            }
            if self.elem_is(elem, "table") {
                return InsertPos::Fostered {
                    table: elem.clone(),
                    // The root <html> is always below the table.
                    fallback: self.open[at - 1].clone(),
                };
            }
        }
        InsertPos::AppendTo(self.open[0].clone())
    }

    fn place(&self, pos: InsertPos<Handle>, child: NodeOrText<Handle>) {
        match pos {
            InsertPos::AppendTo(parent) => self.sink.append(&parent, child),
            InsertPos::Fostered { table, fallback } => {
                self.sink.foster_append(&table, &fallback, child)
            },
        }
    }

    fn insert_here(&mut self, child: NodeOrText<Handle>) {
        let pos = self.insertion_target(None);
        self.place(pos, child);
    }

    fn add_text(&mut self, text: StrTendril) -> Flow<Handle> {
        self.insert_here(NodeOrText::Text(text));
        Flow::Done
    }

    fn add_comment(&mut self, text: StrTendril) -> Flow<Handle> {
        let comment = self.sink.create_comment(text);
        self.insert_here(NodeOrText::Node(comment));
        Flow::Done
    }

    fn add_comment_to_doc(&mut self, text: StrTendril) -> Flow<Handle> {
        let comment = self.sink.create_comment(text);
        self.sink.append(&self.doc, NodeOrText::Node(comment));
        Flow::Done
    }

    fn add_comment_to_root(&mut self, text: StrTendril) -> Flow<Handle> {
        let comment = self.sink.create_comment(text);
        self.sink.append(&self.open[0], NodeOrText::Node(comment));
        Flow::Done
    }

    //§ creating-and-inserting-nodes
    fn create_html_root(&mut self, attrs: Vec<Attribute>) {
        let root = create_element(
            &self.sink,
            QualName::new(None, ns!(html), LocalName::from("html")),
            attrs,
        );
        self.push_open(&root);
        self.sink.append(&self.doc, NodeOrText::Node(root));
    }

    /// <https://html.spec.whatwg.org/multipage/#create-an-element-for-the-token>
    fn insert_element(
        &mut self,
        push: bool,
        ns: Namespace,
        name: LocalName,
        attrs: Vec<Attribute>,
    ) -> Handle {
        fn form_associatable(name: ExpandedName) -> bool {
            in_html_set(
                name,
                &["button", "fieldset", "input", "object", "output", "select", "textarea", "img"],
            )
        }
        fn listed(name: ExpandedName) -> bool {
            form_associatable(name) && &**name.local != "img"
        }

        let qname = QualName::new(None, ns, name);
        let elem = create_element(&self.sink, qname.clone(), attrs.clone());
        let pos = self.insertion_target(None);

        // Form owner association (step 12 of "create an element for the
        // token").
        if form_associatable(qname.expanded())
            && self.form.is_some()
            && !self.stack_has("template")
            && !(listed(qname.expanded())
                && attrs
                    .iter()
                    .any(|a| a.name.ns == ns!() && &*a.name.local == "form"))
        {
            let (near, fallback) = match &pos {
                InsertPos::AppendTo(parent) => (parent.clone(), None),
                InsertPos::Fostered { table, fallback } => (table.clone(), Some(fallback.clone())),
            };
            let form = self.form.clone().expect("form pointer");
            self.sink
                .associate_with_form(&elem, &form, (&near, fallback.as_ref()));
        }

        self.place(pos, NodeOrText::Node(elem.clone()));
        if push {
            self.push_open(&elem);
        }
        elem
    }

    /// Insert an HTML element for a tag and leave it open.
    fn open_elem(&mut self, tag: Tag) -> Handle {
        self.insert_element(true, ns!(html), tag.name, tag.attrs)
    }

    /// Insert an HTML element for a tag and immediately close it.
    fn void_elem(&mut self, tag: Tag) -> Handle {
        self.insert_element(false, ns!(html), tag.name, tag.attrs)
    }

    /// Insert an attribute-less HTML element the standard conjures up.
    fn open_phantom(&mut self, local: &str) -> Handle {
        self.insert_element(true, ns!(html), LocalName::from(local), vec![])
    }

    // ------------------------------------------------------------------
    // Raw-text elements.

    /// Switch to the Text mode (and the tokenizer to `kind`) for the
    /// contents of the element just opened.
    fn text_mode(&mut self, kind: RawKind) -> Flow<Handle> {
        self.saved_mode = Some(self.mode);
        self.mode = InsertionMode::Text;
        Flow::RawText(kind)
    }

    /// The generic raw-text element parsing algorithm.
    fn raw_text_elem(&mut self, tag: Tag, kind: RawKind) -> Flow<Handle> {
        self.open_elem(tag);
        self.text_mode(kind)
    }

    // ------------------------------------------------------------------
    // Active formatting elements.

    fn push_fmt_marker(&mut self) {
        self.fmt.push(FmtEntry::Marker);
    }

    fn clear_fmt_to_marker(&mut self) {
        while let Some(entry) = self.fmt.pop() {
            if matches!(entry, FmtEntry::Marker) {
                break;
            }
        }
    }

    /// Index of `elem` in the formatting list, if present.
    fn fmt_position(&self, elem: &Handle) -> Option<usize> {
        self.fmt.iter().position(|entry| match entry {
            FmtEntry::Marker => false,
            FmtEntry::Entry { element, .. } => self.sink.same_node(element, elem),
        })
    }

    /// Latest non-marker entry named `subject`, scanning back to the
    /// nearest marker.
    fn latest_fmt_entry(&self, subject: &str) -> Option<(usize, Handle, Tag)> {
        for (at, entry) in self.fmt.iter().enumerate().rev() {
            match entry {
                FmtEntry::Marker => return None,
                FmtEntry::Entry { element, tag } if &*tag.name == subject => {
                    return Some((at, element.clone(), tag.clone()));
                },
                FmtEntry::Entry { .. } => {},
            }
        }
        None
    }

    /// A marker, or an element still on the stack, needs no rebuild.
    fn fmt_entry_is_live(&self, entry: &FmtEntry<Handle>) -> bool {
        match entry {
            FmtEntry::Marker => true,
            FmtEntry::Entry { element, .. } => self
                .open
                .iter()
                .rev()
                .any(|open| self.sink.same_node(open, element)),
        }
    }

    /// Open a formatting element, applying the Noah's Ark clause (at
    /// most three identical entries since the last marker).
    fn open_formatting_elem(&mut self, tag: Tag) {
        let mut earliest_twin = None;
        let mut twins = 0;
        for (at, entry) in self.fmt.iter().enumerate().rev() {
            match entry {
                FmtEntry::Marker => break,
                FmtEntry::Entry { tag: seen, .. } => {
                    if same_formatting(seen, &tag) {
                        earliest_twin = Some(at);
                        twins += 1;
                    }
                },
            }
        }
        if twins >= 3 {
            self.fmt.remove(earliest_twin.expect("counted a twin"));
        }

        let element = self.insert_element(true, ns!(html), tag.name.clone(), tag.attrs.clone());
        self.fmt.push(FmtEntry::Entry { element, tag });
    }

    /// <https://html.spec.whatwg.org/#reconstruct-the-active-formatting-elements>
    fn reconstruct_formatting(&mut self) {
        // Nothing to do if the list is empty or ends in a marker or an
        // open element.
        match self.fmt.last() {
            None => return,
            Some(last) if self.fmt_entry_is_live(last) => return,
            Some(_) => {},
        }

        // Rewind to the earliest entry of the dead tail.
        let mut at = self.fmt.len() - 1;
        while at > 0 {
            if self.fmt_entry_is_live(&self.fmt[at - 1]) {
                break;
            }
            at -= 1;
        }

        // Re-open each dead entry in order, replacing it in the list.
        loop {
            let tag = match &self.fmt[at] {
                FmtEntry::Entry { tag, .. } => tag.clone(),
                FmtEntry::Marker => unreachable!("marker inside the dead tail"),
            };
            let element = self.insert_element(true, ns!(html), tag.name.clone(), tag.attrs.clone());
            self.fmt[at] = FmtEntry::Entry { element, tag };
            at += 1;
            if at == self.fmt.len() {
                break;
            }
        }
    }

    /// <https://html.spec.whatwg.org/multipage/#adoption-agency-algorithm>
    fn run_adoption_agency(&mut self, subject: &str) {
        // Shortcut: the current node is it, and isn't in the list.
        if self.current_is(subject) && self.fmt_position(self.current()).is_none() {
            self.pop_open();
            return;
        }

        for _ in 0..8 {
            let Some((fmt_at, fmt_elem, fmt_tag)) = self.latest_fmt_entry(subject) else {
                // No formatting entry: ordinary end-tag handling.
                return self.any_other_end_tag(Tag {
                    kind: TagKind::EndTag,
                    name: LocalName::from(subject),
                    self_closing: false,
                    attrs: vec![],
                });
            };

            let Some(fmt_stack_at) = self
                .open
                .iter()
                .rposition(|open| self.sink.same_node(open, &fmt_elem))
            else {
                self.sink
                    .parse_error(Borrowed("Formatting element not open"));
                self.fmt.remove(fmt_at);
                return;
            };

            if !self.in_scope_where(default_scope, |e| self.sink.same_node(e, &fmt_elem)) {
                self.sink
                    .parse_error(Borrowed("Formatting element not in scope"));
                return;
            }
            if !self.sink.same_node(self.current(), &fmt_elem) {
                self.sink
                    .parse_error(Borrowed("Formatting element not current node"));
            }

            // The furthest block: the first special element deeper than
            // the formatting element.
            let furthest = self.open[fmt_stack_at..]
                .iter()
                .position(|e| self.elem_in(e, special))
                .map(|off| fmt_stack_at + off);
            let Some(block_at) = furthest else {
                // None: pop through the formatting element, drop its
                // entry, done.
                self.open.truncate(fmt_stack_at);
                self.fmt.remove(fmt_at);
                return;
            };
            let block = self.open[block_at].clone();

            let common_ancestor = self.open[fmt_stack_at - 1].clone();

            // None: replace the formatting entry in place.
            // Some(node): insert the new entry after node's entry.
            let mut bookmark: Option<Handle> = None;

            // Walk upward from the furthest block, cloning formatting
            // elements and re-hanging the subtree.
            let mut last_node = block.clone();
            let mut node_at = block_at;
            let mut inner = 0;
            loop {
                inner += 1;
                node_at -= 1;
                let node = self.open[node_at].clone();
                if self.sink.same_node(&node, &fmt_elem) {
                    break;
                }

                if inner > 3 {
                    if let Some(p) = self.fmt_position(&node) {
                        self.fmt.remove(p);
                    }
                    self.open.remove(node_at);
                    continue;
                }
                let Some(node_fmt_at) = self.fmt_position(&node) else {
                    self.open.remove(node_at);
                    continue;
                };

                let node_tag = match &self.fmt[node_fmt_at] {
                    FmtEntry::Entry { tag, .. } => tag.clone(),
                    FmtEntry::Marker => unreachable!("marker between formatting entries"),
                };
                let replacement = create_element(
                    &self.sink,
                    QualName::new(None, ns!(html), node_tag.name.clone()),
                    node_tag.attrs.clone(),
                );
                self.open[node_at] = replacement.clone();
                self.fmt[node_fmt_at] = FmtEntry::Entry {
                    element: replacement.clone(),
                    tag: node_tag,
                };

                if self.sink.same_node(&last_node, &block) {
                    bookmark = Some(replacement.clone());
                }

                self.sink.detach(&last_node);
                self.sink.append(&replacement, NodeOrText::Node(last_node));
                last_node = replacement;
            }

            self.sink.detach(&last_node);
            let pos = self.insertion_target(Some(common_ancestor));
            self.place(pos, NodeOrText::Node(last_node));

            let clone = create_element(
                &self.sink,
                QualName::new(None, ns!(html), fmt_tag.name.clone()),
                fmt_tag.attrs.clone(),
            );
            self.sink.move_children(&block, &clone);
            self.sink.append(&block, NodeOrText::Node(clone.clone()));

            match bookmark {
                None => {
                    let at = self
                        .fmt_position(&fmt_elem)
                        .expect("formatting entry vanished");
                    self.fmt[at] = FmtEntry::Entry {
                        element: clone.clone(),
                        tag: fmt_tag,
                    };
                },
                Some(after) => {
                    let at = self.fmt_position(&after).expect("bookmark entry vanished") + 1;
                    self.fmt.insert(
                        at,
                        FmtEntry::Entry {
                            element: clone.clone(),
                            tag: fmt_tag,
                        },
                    );
                    let stale = self
                        .fmt_position(&fmt_elem)
                        .expect("formatting entry vanished");
                    self.fmt.remove(stale);
                },
            }

            self.remove_open(&fmt_elem);
            let block_now = self
                .open
                .iter()
                .position(|e| self.sink.same_node(e, &block))
                .expect("furthest block left the stack");
            self.open.insert(block_now + 1, clone);
        }
    }

    // ------------------------------------------------------------------
    // Assorted helpers for the mode handlers.

    /// Report and swallow a token that has no effect here.
    fn drop_token<T: Debug>(&self, what: &T) -> Flow<Handle> {
        self.sink.parse_error(if self.opts.exact_errors {
            format!("Unexpected token {:?} in {:?}", what, self.mode).into()
        } else {
            Borrowed("Unexpected token")
        });
        Flow::Done
    }

    fn set_quirks(&mut self, quirks: QuirksMode) {
        self.quirks = quirks;
        self.sink.set_quirks_mode(quirks);
    }

    /// The `<body>` element, if it is where it should be.
    fn body_handle(&self) -> Option<Handle> {
        let second = self.open.get(1)?;
        self.elem_is(second, "body").then(|| second.clone())
    }

    /// Errors for elements still open when the body ends.
    fn check_body_end(&self) {
        fn closeable(name: ExpandedName) -> bool {
            in_html_set(
                name,
                &[
                    "dd", "dt", "li", "optgroup", "option", "p", "rp", "rt", "tbody", "td",
                    "tfoot", "th", "thead", "tr", "body", "html",
                ],
            )
        }

        for elem in &self.open {
            if !self.elem_in(elem, closeable) {
                self.sink.parse_error(if self.opts.exact_errors {
                    format!(
                        "Unexpected open tag {:?} at end of body",
                        self.sink.elem_name(elem)
                    )
                    .into()
                } else {
                    Borrowed("Unexpected open tag at end of body")
                });
                // One error is enough.
                return;
            }
        }
    }

    /// <https://html.spec.whatwg.org/multipage/#reset-the-insertion-mode-appropriately>
    fn reset_mode(&self) -> InsertionMode {
        use self::types::InsertionMode::*;

        for (at, open) in self.open.iter().enumerate().rev() {
            let last = at == 0;
            let node = match (&self.context, last) {
                (Some(context), true) => context,
                _ => open,
            };
            let name = self.sink.elem_name(node);
            // Foreign elements never choose a mode; an SVG <td> must
            // not put the parser into cell mode.
            if *name.ns != ns!(html) {
                continue;
            }
            match &**name.local {
                "select" => {
                    for above in self.open[..at].iter().rev() {
                        if self.elem_is(above, "template") {
                            return InSelect;
                        }
                        if self.elem_is(above, "table") {
                            return InSelectInTable;
                        }
                    }
                    return InSelect;
                },
                "td" | "th" if !last => return InCell,
                "tr" => return InRow,
                "tbody" | "thead" | "tfoot" => return InTableBody,
                "caption" => return InCaption,
                "colgroup" => return InColumnGroup,
                "table" => return InTable,
                "template" => {
                    return *self
                        .template_modes
                        .last()
                        .expect("open template without a template mode");
                },
                "head" if !last => return InHead,
                "body" => return InBody,
                "frameset" => return InFrameset,
                "html" => {
                    return if self.head.is_none() { BeforeHead } else { AfterHead };
                },
                _ => {},
            }
        }
        InBody
    }

    /// Characters arrived in InTable: buffer them (switching to
    /// InTableText) or foster-parent them immediately.
    fn begin_table_text(&mut self, token: Token) -> Flow<Handle> {
        fn table_painful(name: ExpandedName) -> bool {
            in_html_set(name, &["table", "tbody", "tfoot", "thead", "tr"])
        }
        if self.current_in(table_painful) {
            debug_assert!(self.table_text.is_empty());
            self.saved_mode = Some(self.mode);
            Flow::Redo(InsertionMode::InTableText, token)
        } else {
            self.drop_token(&token);
            self.with_fostering(token)
        }
    }

    /// Handle one token with foster parenting switched on.
    fn with_fostering(&mut self, token: Token) -> Flow<Handle> {
        self.fostering = true;
        let flow = self.rules(InsertionMode::InBody, token);
        self.fostering = false;
        flow
    }

    /// Does `tag` carry `type=hidden`?
    fn hidden_input(&self, tag: &Tag) -> bool {
        attr_value(tag, "type").is_some_and(|v| v.eq_ignore_ascii_case("hidden"))
    }

    // ------------------------------------------------------------------
    // Foreign content.

    /// Should this token go through the foreign-content rules?
    ///
    /// <https://html.spec.whatwg.org/multipage/#tree-construction-dispatcher>
    fn in_foreign(&self, token: &Token) -> bool {
        if matches!(token, Token::Eof) || self.open.is_empty() {
            return false;
        }

        let adjusted = self.adjusted_current();
        let name = self.sink.elem_name(adjusted);
        if *name.ns == ns!(html) {
            return false;
        }

        if mathml_text_integration_point(name) {
            match token {
                Token::Chars(_) | Token::Null => return false,
                Token::Tag(tag)
                    if tag.kind == TagKind::StartTag
                        && !matches!(&*tag.name, "mglyph" | "malignmark") =>
                {
                    return false;
                },
                _ => {},
            }
        }

        if svg_html_integration_point(name) {
            match token {
                Token::Chars(_) | Token::Null => return false,
                Token::Tag(tag) if tag.kind == TagKind::StartTag => return false,
                _ => {},
            }
        }

        if *name.ns == ns!(mathml) && &**name.local == "annotation-xml" {
            match token {
                Token::Tag(tag) if tag.kind == TagKind::StartTag && &*tag.name == "svg" => {
                    return false;
                },
                Token::Chars(_) | Token::Null => {
                    return !self
                        .sink
                        .is_mathml_annotation_xml_integration_point(adjusted);
                },
                Token::Tag(tag) if tag.kind == TagKind::StartTag => {
                    return !self
                        .sink
                        .is_mathml_annotation_xml_integration_point(adjusted);
                },
                _ => {},
            }
        }

        true
    }

    /// `<svg>` / `<math>` start tag seen in HTML content.
    fn enter_foreign(&mut self, mut tag: Tag, ns: Namespace) -> Flow<Handle> {
        if ns == ns!(mathml) {
            self.fix_mathml_attrs(&mut tag);
        } else if ns == ns!(svg) {
            self.fix_svg_attrs(&mut tag);
        }
        self.fix_foreign_attrs(&mut tag);

        let self_closing = tag.self_closing;
        self.insert_element(!self_closing, ns, tag.name, tag.attrs);
        if self_closing {
            Flow::SelfClosingOk
        } else {
            Flow::Done
        }
    }

    /// A start tag inside foreign content that stays foreign.
    fn foreign_start(&mut self, mut tag: Tag) -> Flow<Handle> {
        let ns = self.sink.elem_name(self.adjusted_current()).ns.clone();
        if ns == ns!(mathml) {
            self.fix_mathml_attrs(&mut tag);
        } else if ns == ns!(svg) {
            if let Some(canonical) = adjusted_svg_tag_name(&tag.name) {
                tag.name = LocalName::from(canonical);
            }
            self.fix_svg_attrs(&mut tag);
        }
        self.fix_foreign_attrs(&mut tag);

        let self_closing = tag.self_closing;
        self.insert_element(!self_closing, ns, tag.name, tag.attrs);
        if self_closing {
            Flow::SelfClosingOk
        } else {
            Flow::Done
        }
    }

    /// A breakout tag: close the foreign elements, then give the token
    /// to the HTML rules.
    fn foreign_breakout(&mut self, tag: Tag) -> Flow<Handle> {
        self.drop_token(&tag);
        loop {
            let done = {
                let name = self.sink.elem_name(self.current());
                *name.ns == ns!(html)
                    || mathml_text_integration_point(name)
                    || svg_html_integration_point(name)
            };
            if done {
                break;
            }
            self.pop_open();
        }
        self.rules(self.mode, Token::Tag(tag))
    }

    fn fix_mathml_attrs(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            if let Some(canonical) = adjusted_mathml_attr_name(&attr.name.local) {
                attr.name = QualName::new(None, ns!(), LocalName::from(canonical));
            }
        }
    }

    fn fix_svg_attrs(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            if let Some(canonical) = adjusted_svg_attr_name(&attr.name.local) {
                attr.name = QualName::new(None, ns!(), LocalName::from(canonical));
            }
        }
    }

    fn fix_foreign_attrs(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            if let Some(qualified) = adjusted_foreign_attr(&attr.name.local) {
                attr.name = qualified;
            }
        }
    }
}

impl<Handle, Sink> TokenSink for TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    type Handle = Handle;

    fn process_token(&mut self, token: tokenizer::Token, line: u64) -> SinkResult<Handle> {
        if line != self.line {
            self.sink.set_current_line(line);
            self.line = line;
        }
        let skip_newline = mem::replace(&mut self.skip_newline, false);

        let token = match token {
            tokenizer::Token::Doctype(doctype) => {
                self.handle_doctype(doctype);
                return SinkResult::Continue;
            },
            tokenizer::Token::Chars(mut text) => {
                if skip_newline && text.starts_with("\n") {
                    text.pop_front(1);
                }
                if text.is_empty() {
                    return SinkResult::Continue;
                }
                return self.process_chars(text);
            },
            tokenizer::Token::Tag(tag) => Token::Tag(tag),
            tokenizer::Token::Comment(text) => Token::Comment(text),
            tokenizer::Token::Null => Token::Null,
            tokenizer::Token::Eof => Token::Eof,
        };
        self.drive(token)
    }

    fn parse_error(&mut self, msg: Cow<'static, str>, line: u64) {
        if line != self.line {
            self.sink.set_current_line(line);
            self.line = line;
        }
        self.sink.parse_error(msg);
    }

    fn end(&mut self) {
        for elem in mem::take(&mut self.open).into_iter().rev() {
            self.sink.pop(&elem);
        }
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        !self.open.is_empty() && *self.sink.elem_name(self.adjusted_current()).ns != ns!(html)
    }
}

/// The value of an unnamespaced attribute, if present.
fn attr_value<'a>(tag: &'a Tag, local: &str) -> Option<&'a StrTendril> {
    tag.attrs
        .iter()
        .find(|attr| attr.name.ns == ns!() && &*attr.name.local == local)
        .map(|attr| &attr.value)
}

/// Are two tags the same name with the same attribute sets? (Order and
/// the self-closing flag are immaterial.) This is the Noah's Ark
/// comparison.
fn same_formatting(a: &Tag, b: &Tag) -> bool {
    if a.name != b.name || a.attrs.len() != b.attrs.len() {
        return false;
    }
    let mut a_attrs = a.attrs.clone();
    let mut b_attrs = b.attrs.clone();
    a_attrs.sort();
    b_attrs.sort();
    a_attrs == b_attrs
}
