// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Names, attributes, and the tree-construction interface.
//!
//! The parser never builds a DOM of its own; it drives any type that
//! implements [`TreeSink`]. The crate ships one such type,
//! [`RcDom`](crate::rcdom::RcDom).

use std::borrow::Cow;
use std::fmt;

use tendril::StrTendril;

use crate::{LocalName, Namespace, Prefix};

pub use self::QuirksMode::{LimitedQuirks, NoQuirks, Quirks};

/// A namespace-qualified name, fully interned.
///
/// `prefix` is whatever prefix appeared in the source (`xlink` in
/// `xlink:href`); `ns` is the resolved namespace url; `local` is the
/// name within that namespace. The tokenizer produces names with no
/// prefix and the empty namespace, and the tree builder fills both in
/// for foreign elements and `xlink:*`/`xml:*`/`xmlns` attributes.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct QualName {
    pub prefix: Option<Prefix>,
    pub ns: Namespace,
    pub local: LocalName,
}

impl QualName {
    #[inline]
    pub fn new(prefix: Option<Prefix>, ns: Namespace, local: LocalName) -> QualName {
        QualName { prefix, ns, local }
    }

    /// The (namespace, local) pair, which is what name comparisons care
    /// about.
    #[inline]
    pub fn expanded(&self) -> ExpandedName {
        ExpandedName {
            ns: &self.ns,
            local: &self.local,
        }
    }
}

/// A borrowed (namespace, local name) pair.
///
/// <https://www.w3.org/TR/REC-xml-names/#dt-expname>
#[derive(Copy, Clone, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub ns: &'a Namespace,
    pub local: &'a LocalName,
}

impl<'a> ExpandedName<'a> {
    /// Is this `local` in the HTML namespace?
    pub fn is_html(&self, local: &str) -> bool {
        *self.ns == ns!(html) && &**self.local == local
    }
}

impl<'a, 'b> PartialEq<ExpandedName<'a>> for ExpandedName<'b> {
    fn eq(&self, other: &ExpandedName<'a>) -> bool {
        self.ns == other.ns && self.local == other.local
    }
}

impl<'a> fmt::Debug for ExpandedName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}} {}", self.ns, self.local)
        }
    }
}

/// One attribute of a tag.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    pub name: QualName,
    pub value: StrTendril,
}

/// A document's compatibility mode, decided from its DOCTYPE.
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum QuirksMode {
    Quirks,
    LimitedQuirks,
    NoQuirks,
}

/// A new child: either an existing node, or text that the sink may
/// merge into a neighboring text node.
pub enum NodeOrText<Handle> {
    Node(Handle),
    Text(StrTendril),
}

/// Facts about an element that the sink needs at creation time.
#[derive(Default)]
#[non_exhaustive]
pub struct ElementFlags {
    /// The element is an HTML `<template>`; the sink must create its
    /// contents fragment, reachable via
    /// [`TreeSink::template_contents`].
    ///
    /// <https://html.spec.whatwg.org/multipage/#template-contents>
    pub template: bool,

    /// The element is a MathML `<annotation-xml>` whose `encoding`
    /// makes it an HTML integration point.
    ///
    /// <https://html.spec.whatwg.org/multipage/#html-integration-point>
    pub mathml_annotation_xml_integration_point: bool,
}

/// Compute the [`ElementFlags`] for a name/attribute combination and
/// ask the sink to create the element.
pub fn create_element<Sink>(sink: &Sink, name: QualName, attrs: Vec<Attribute>) -> Sink::Handle
where
    Sink: TreeSink,
{
    let mut flags = ElementFlags::default();
    if name.ns == ns!(html) && &*name.local == "template" {
        flags.template = true;
    } else if name.ns == ns!(mathml) && &*name.local == "annotation-xml" {
        flags.mathml_annotation_xml_integration_point = attrs.iter().any(|attr| {
            attr.name.ns == ns!()
                && &*attr.name.local == "encoding"
                && (attr.value.eq_ignore_ascii_case("text/html")
                    || attr.value.eq_ignore_ascii_case("application/xhtml+xml"))
        });
    }
    sink.create_element(name, attrs, flags)
}

/// The DOM operations tree construction needs.
///
/// Handles are cheap clones referring to the same node; the sink owns
/// the actual nodes. All methods take `&self` because handles may be
/// shared — a sink will typically use interior mutability.
pub trait TreeSink {
    /// A reference to a DOM node.
    type Handle: Clone;

    /// What `finish` returns; for a concrete DOM, usually the DOM
    /// itself.
    type Output;

    /// Consume the sink when parsing is done.
    fn finish(self) -> Self::Output;

    /// Record a parse error.
    fn parse_error(&self, msg: Cow<'static, str>);

    /// The `Document` node.
    fn get_document(&self) -> Self::Handle;

    /// The name of an element. Must not be called for other node kinds.
    fn elem_name<'a>(&self, target: &'a Self::Handle) -> ExpandedName<'a>;

    /// Make a new element. When `flags.template` is set, a contents
    /// fragment must be created alongside it.
    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle;

    /// Make a new comment node.
    fn create_comment(&self, text: StrTendril) -> Self::Handle;

    /// Add a child at the end of a parent's children. Text must merge
    /// with an existing final text child rather than sit next to it.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>);

    /// The foster-parenting insertion: before `table` if it has a
    /// parent, else at the end of `fallback_parent`. Text merges with
    /// an adjacent text sibling either way.
    fn foster_append(
        &self,
        table: &Self::Handle,
        fallback_parent: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    );

    /// Add the DOCTYPE node to the document.
    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    );

    /// The contents fragment of a `<template>` element.
    fn template_contents(&self, target: &Self::Handle) -> Self::Handle;

    /// Do two handles refer to the same node?
    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool;

    /// Record the document's quirks mode.
    fn set_quirks_mode(&self, mode: QuirksMode);

    /// Add attributes an element doesn't already have (by name).
    fn merge_attrs(&self, target: &Self::Handle, attrs: Vec<Attribute>);

    /// Remove a node from its parent, if it has one.
    fn detach(&self, target: &Self::Handle);

    /// Move all children of `node` to the end of `new_parent`.
    fn move_children(&self, node: &Self::Handle, new_parent: &Self::Handle);

    /// Flag a `<script>` that must not run when re-encountered.
    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    /// An element left the stack of open elements.
    fn pop(&self, _node: &Self::Handle) {}

    /// Tie a form-associatable element to its form owner.
    fn associate_with_form(
        &self,
        _target: &Self::Handle,
        _form: &Self::Handle,
        _nodes: (&Self::Handle, Option<&Self::Handle>),
    ) {
    }

    /// Is this `annotation-xml` an HTML integration point? (Depends on
    /// an attribute only the sink still knows.)
    fn is_mathml_annotation_xml_integration_point(&self, _handle: &Self::Handle) -> bool {
        false
    }

    /// The tokenizer's line number changed.
    fn set_current_line(&self, _line: u64) {}
}
