// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTML serialization, mostly so the parser's output can be
//! round-tripped. Follows the WHATWG "serializing HTML fragments"
//! algorithm.

use std::io::{self, Write};

use crate::{LocalName, QualName};

/// Elements with no closing tag and no children.
static VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img",
    "input", "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
static RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Serialize the node itself, or only its children?
#[derive(Clone, PartialEq)]
pub enum TraversalScope {
    IncludeNode,
    /// The name, if known, of the node whose children are serialized;
    /// lets a serializer skip the children of void elements.
    ChildrenOnly(Option<QualName>),
}

/// Things that can feed themselves to a [`Serializer`].
pub trait Serialize {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer;
}

/// A qualified attribute name with its value.
pub type AttrRef<'a> = (&'a QualName, &'a str);

/// The events a tree produces while serializing itself.
pub trait Serializer {
    fn start_elem<'a, AttrIter>(&mut self, name: QualName, attrs: AttrIter) -> io::Result<()>
    where
        AttrIter: Iterator<Item = AttrRef<'a>>;

    fn end_elem(&mut self, name: QualName) -> io::Result<()>;

    fn write_text(&mut self, text: &str) -> io::Result<()>;

    fn write_comment(&mut self, text: &str) -> io::Result<()>;

    fn write_doctype(&mut self, name: &str) -> io::Result<()>;
}

/// Serializer options, with an impl for `Default`.
#[derive(Clone)]
pub struct SerializeOpts {
    /// Is scripting enabled? Decides whether `<noscript>` contents are
    /// escaped. Default: true
    pub scripting_enabled: bool,

    /// Serialize the root node itself or only its children?
    /// Default: children only
    pub traversal_scope: TraversalScope,
}

impl Default for SerializeOpts {
    fn default() -> SerializeOpts {
        SerializeOpts {
            scripting_enabled: true,
            traversal_scope: TraversalScope::ChildrenOnly(None),
        }
    }
}

/// Serialize `node` as HTML text.
pub fn serialize<Wr, T>(writer: Wr, node: &T, opts: SerializeOpts) -> io::Result<()>
where
    Wr: Write,
    T: Serialize,
{
    let mut html = HtmlSerializer::new(writer, opts.clone());
    node.serialize(&mut html, opts.traversal_scope)
}

/// Per-open-element facts the serializer tracks.
struct OpenInfo {
    /// Local name, for HTML elements only.
    html_name: Option<LocalName>,
    /// Inside a void element: nothing gets written.
    suppressed: bool,
}

/// A [`Serializer`] producing standard HTML text.
pub struct HtmlSerializer<Wr: Write> {
    pub writer: Wr,
    opts: SerializeOpts,
    stack: Vec<OpenInfo>,
}

/// Escape `text` into `out`, with the attribute-value rules if
/// `in_attr`.
fn escape_into(out: &mut String, text: &str, in_attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00a0}' => out.push_str("&nbsp;"),
            '"' if in_attr => out.push_str("&quot;"),
            '<' if !in_attr => out.push_str("&lt;"),
            '>' if !in_attr => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

impl<Wr: Write> HtmlSerializer<Wr> {
    pub fn new(writer: Wr, opts: SerializeOpts) -> HtmlSerializer<Wr> {
        let html_name = match &opts.traversal_scope {
            TraversalScope::ChildrenOnly(Some(name)) if name.ns == ns!(html) => {
                Some(name.local.clone())
            },
            _ => None,
        };
        HtmlSerializer {
            writer,
            opts,
            stack: vec![OpenInfo {
                html_name,
                suppressed: false,
            }],
        }
    }

    fn head(&self) -> &OpenInfo {
        self.stack.last().expect("serializer stack underflow")
    }
}

impl<Wr: Write> Serializer for HtmlSerializer<Wr> {
    fn start_elem<'a, AttrIter>(&mut self, name: QualName, attrs: AttrIter) -> io::Result<()>
    where
        AttrIter: Iterator<Item = AttrRef<'a>>,
    {
        if self.head().suppressed {
            self.stack.push(OpenInfo {
                html_name: None,
                suppressed: true,
            });
            return Ok(());
        }

        let mut out = String::new();
        out.push('<');
        out.push_str(&name.local);
        for (attr_name, value) in attrs {
            out.push(' ');
            match &*attr_name.ns {
                "" => {},
                "http://www.w3.org/XML/1998/namespace" => out.push_str("xml:"),
                "http://www.w3.org/1999/xlink" => out.push_str("xlink:"),
                "http://www.w3.org/2000/xmlns/" => {
                    if &*attr_name.local != "xmlns" {
                        out.push_str("xmlns:");
                    }
                },
                other => {
                    log::warn!("attribute in unexpected namespace {other:?}");
                },
            }
            out.push_str(&attr_name.local);
            out.push_str("=\"");
            escape_into(&mut out, value, true);
            out.push('"');
        }
        out.push('>');
        self.writer.write_all(out.as_bytes())?;

        let html = name.ns == ns!(html);
        self.stack.push(OpenInfo {
            html_name: html.then(|| name.local.clone()),
            suppressed: html && VOID_ELEMENTS.contains(&&*name.local),
        });
        Ok(())
    }

    fn end_elem(&mut self, name: QualName) -> io::Result<()> {
        let info = self.stack.pop().expect("serializer stack underflow");
        if info.suppressed {
            return Ok(());
        }
        self.writer.write_all(b"</")?;
        self.writer.write_all(name.local.as_bytes())?;
        self.writer.write_all(b">")
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let raw = match self.head().html_name.as_deref() {
            Some(name) if RAW_TEXT_ELEMENTS.contains(&name) => true,
            Some("noscript") => self.opts.scripting_enabled,
            _ => false,
        };
        if raw {
            self.writer.write_all(text.as_bytes())
        } else {
            let mut out = String::new();
            escape_into(&mut out, text, false);
            self.writer.write_all(out.as_bytes())
        }
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(b"<!--")?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"-->")
    }

    fn write_doctype(&mut self, name: &str) -> io::Result<()> {
        self.writer.write_all(b"<!DOCTYPE ")?;
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(b">")
    }
}
