// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A reference-counted DOM: the crate's built-in [`TreeSink`].
//!
//! Nodes are `Rc`-shared with weak parent links, which is plenty for a
//! static parse result (don't build a browser on it). Parse errors are
//! collected here too, tagged with the line they occurred on, and
//! [`RcDom::strict`] turns a non-empty error log into a `Result::Err`
//! for callers who want malformed input to be a failure.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::mem;
use std::rc::{Rc, Weak};

use tendril::StrTendril;

use crate::interface::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use crate::serialize::{Serialize, Serializer, TraversalScope};
use crate::{Attribute, ExpandedName, QualName};

/// What a [`Node`] is.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The document root.
    Document,

    /// `<!DOCTYPE ...>`.
    Doctype {
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    },

    /// A text node. Mutable because the parser concatenates adjacent
    /// character runs into one node.
    Text { contents: RefCell<StrTendril> },

    /// `<!-- ... -->`.
    Comment { contents: StrTendril },

    /// An element.
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,

        /// For an HTML `<template>`, the separate fragment its children
        /// live in.
        ///
        /// <https://html.spec.whatwg.org/multipage/#template-contents>
        template_contents: RefCell<Option<Handle>>,

        /// Whether this `<annotation-xml>` is an HTML integration
        /// point.
        mathml_annotation_xml_integration_point: bool,
    },
}

/// A DOM node: its payload plus tree links.
pub struct Node {
    /// The node's parent, if attached. Weak, since parents own their
    /// children.
    pub parent: Cell<Option<Weak<Node>>>,
    /// Children, in document order.
    pub children: RefCell<Vec<Handle>>,
    /// What the node is.
    pub data: NodeData,
}

/// A shared reference to a node.
pub type Handle = Rc<Node>;

/// A node's index among its parent's children.
fn index_in_parent(node: &Handle) -> Option<(Handle, usize)> {
    let parent = node.parent_node()?;
    let at = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))
        .expect("not among parent's children");
    Some((parent, at))
}

/// Unlink a node from its parent, if any.
fn detach(node: &Handle) {
    if let Some((parent, at)) = index_in_parent(node) {
        parent.children.borrow_mut().remove(at);
        node.parent.set(None);
    }
}

/// Hang a parentless node at the end of a parent's children.
fn adopt(parent: &Handle, child: Handle) {
    let old_parent = child.parent.replace(Some(Rc::downgrade(parent)));
    debug_assert!(old_parent.is_none(), "adopting an attached node");
    parent.children.borrow_mut().push(child);
}

impl Node {
    /// A fresh, detached node.
    pub fn new(data: NodeData) -> Handle {
        Rc::new(Node {
            parent: Cell::new(None),
            children: RefCell::new(vec![]),
            data,
        })
    }

    /// The parent, upgraded.
    fn parent_node(&self) -> Option<Handle> {
        let weak = self.parent.take()?;
        let strong = weak.upgrade().expect("parent was dropped");
        self.parent.set(Some(weak));
        Some(strong)
    }

    /// If this is a text node, tack `text` onto it.
    fn absorb_text(&self, text: &str) -> bool {
        match &self.data {
            NodeData::Text { contents } => {
                contents.borrow_mut().push_slice(text);
                true
            },
            _ => false,
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Unlink children iteratively; recursive drops overflow the
        // stack on pathologically deep documents.
        let mut queue = mem::take(&mut *self.children.borrow_mut());
        while let Some(node) = queue.pop() {
            queue.append(&mut node.children.borrow_mut());
            if let NodeData::Element { template_contents, .. } = &node.data {
                if let Some(contents) = template_contents.borrow_mut().take() {
                    queue.push(contents);
                }
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("data", &self.data)
            .field("children", &self.children)
            .finish()
    }
}

/// One recorded parse error.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: u64,
    /// Stable description of what was wrong.
    pub message: Cow<'static, str>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The failure [`RcDom::strict`] returns. The DOM was still built; this
/// only reports that the input wasn't clean.
#[derive(Debug)]
pub struct ParseErrors {
    pub errors: Vec<ParseError>,
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let first = self.errors.first().expect("empty ParseErrors");
        write!(f, "{first}")?;
        match self.errors.len() {
            1 => Ok(()),
            more => write!(f, " (and {} more parse errors)", more - 1),
        }
    }
}

impl std::error::Error for ParseErrors {}

/// The parse result: document, error log, quirks mode.
#[derive(Debug)]
pub struct RcDom {
    /// The `Document` node.
    pub document: Handle,
    /// Parse errors, in the order they were raised.
    pub errors: RefCell<Vec<ParseError>>,
    /// The document's quirks mode.
    pub quirks_mode: Cell<QuirksMode>,

    line: Cell<u64>,
}

impl Default for RcDom {
    fn default() -> RcDom {
        RcDom {
            document: Node::new(NodeData::Document),
            errors: RefCell::new(vec![]),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
            line: Cell::new(1),
        }
    }
}

impl RcDom {
    /// Fail if any parse errors were recorded. The DOM is complete
    /// either way; strictness is only about surfacing the log.
    pub fn strict(self) -> Result<RcDom, ParseErrors> {
        if self.errors.borrow().is_empty() {
            Ok(self)
        } else {
            Err(ParseErrors {
                errors: self.errors.take(),
            })
        }
    }
}

impl TreeSink for RcDom {
    type Handle = Handle;
    type Output = RcDom;

    fn finish(self) -> RcDom {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.errors.borrow_mut().push(ParseError {
            line: self.line.get(),
            message: msg,
        });
    }

    fn set_current_line(&self, line: u64) {
        self.line.set(line);
    }

    fn get_document(&self) -> Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&self, target: &'a Handle) -> ExpandedName<'a> {
        match &target.data {
            NodeData::Element { name, .. } => name.expanded(),
            _ => panic!("not an element"),
        }
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> Handle {
        let template_contents = flags.template.then(|| Node::new(NodeData::Document));
        Node::new(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents: RefCell::new(template_contents),
            mathml_annotation_xml_integration_point: flags
                .mathml_annotation_xml_integration_point,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Handle {
        Node::new(NodeData::Comment { contents: text })
    }

    fn append(&self, parent: &Handle, child: NodeOrText<Handle>) {
        match child {
            NodeOrText::Text(text) => {
                // Merge with a trailing text node rather than make a
                // sibling.
                if let Some(last) = parent.children.borrow().last() {
                    if last.absorb_text(&text) {
                        return;
                    }
                }
                adopt(parent, Node::new(NodeData::Text {
                    contents: RefCell::new(text),
                }));
            },
            NodeOrText::Node(node) => adopt(parent, node),
        }
    }

    fn foster_append(&self, table: &Handle, fallback_parent: &Handle, child: NodeOrText<Handle>) {
        if table.parent_node().is_none() {
            return self.append(fallback_parent, child);
        }

        // Insert immediately before the table, merging text into the
        // preceding sibling.
        let (parent, at) = index_in_parent(table).expect("parent checked above");

        let node = match child {
            NodeOrText::Text(text) => {
                // Merge into the preceding text node if there is one.
                if at > 0 && parent.children.borrow()[at - 1].absorb_text(&text) {
                    return;
                }
                Node::new(NodeData::Text {
                    contents: RefCell::new(text),
                })
            },
            NodeOrText::Node(node) => {
                detach(&node);
                node
            },
        };

        node.parent.set(Some(Rc::downgrade(&parent)));
        parent.children.borrow_mut().insert(at, node);
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        adopt(
            &self.document,
            Node::new(NodeData::Doctype {
                name,
                public_id,
                system_id,
            }),
        );
    }

    fn template_contents(&self, target: &Handle) -> Handle {
        match &target.data {
            NodeData::Element { template_contents, .. } => template_contents
                .borrow()
                .clone()
                .expect("not a template element"),
            _ => panic!("not a template element"),
        }
    }

    fn same_node(&self, a: &Handle, b: &Handle) -> bool {
        Rc::ptr_eq(a, b)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn merge_attrs(&self, target: &Handle, attrs: Vec<Attribute>) {
        let NodeData::Element { attrs: existing, .. } = &target.data else {
            panic!("not an element");
        };
        let mut existing = existing.borrow_mut();
        let present: HashSet<QualName> = existing.iter().map(|a| a.name.clone()).collect();
        existing.extend(attrs.into_iter().filter(|a| !present.contains(&a.name)));
    }

    fn detach(&self, target: &Handle) {
        detach(target);
    }

    fn move_children(&self, node: &Handle, new_parent: &Handle) {
        let mut moved = node.children.borrow_mut();
        for child in moved.iter() {
            child.parent.set(Some(Rc::downgrade(new_parent)));
        }
        new_parent.children.borrow_mut().append(&mut moved);
    }

    fn is_mathml_annotation_xml_integration_point(&self, target: &Handle) -> bool {
        match &target.data {
            NodeData::Element {
                mathml_annotation_xml_integration_point,
                ..
            } => *mathml_annotation_xml_integration_point,
            _ => panic!("not an element"),
        }
    }
}

/// Newtype making a [`Handle`] serializable.
pub struct SerializableHandle(Handle);

impl From<Handle> for SerializableHandle {
    fn from(handle: Handle) -> SerializableHandle {
        SerializableHandle(handle)
    }
}

fn serialize_node<S: Serializer>(node: &Handle, ser: &mut S) -> io::Result<()> {
    match &node.data {
        NodeData::Document => panic!("the Document node itself is not serializable"),

        NodeData::Doctype { name, .. } => ser.write_doctype(name),

        NodeData::Text { contents } => ser.write_text(&contents.borrow()),

        NodeData::Comment { contents } => ser.write_comment(contents),

        NodeData::Element { name, attrs, .. } => {
            {
                let attrs = attrs.borrow();
                ser.start_elem(
                    name.clone(),
                    attrs.iter().map(|a| (&a.name, &a.value[..])),
                )?;
            }
            serialize_children(node, ser)?;
            ser.end_elem(name.clone())
        },
    }
}

fn serialize_children<S: Serializer>(node: &Handle, ser: &mut S) -> io::Result<()> {
    for child in node.children.borrow().iter() {
        serialize_node(child, ser)?;
    }
    Ok(())
}

impl Serialize for SerializableHandle {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match traversal_scope {
            TraversalScope::IncludeNode => serialize_node(&self.0, serializer),
            TraversalScope::ChildrenOnly(_) => serialize_children(&self.0, serializer),
        }
    }
}
