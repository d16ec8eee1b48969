// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tree-construction tests, compared in the html5lib tree-dump format.

use std::iter;

use weft::rcdom::{Handle, NodeData, RcDom};
use weft::tendril::{StrTendril, TendrilSink};
use weft::tree_builder::QuirksMode;
use weft::{parse_document, parse_fragment, LocalName, Namespace, ParseOpts, QualName};

fn dump(buf: &mut String, indent: usize, handle: Handle) {
    buf.push('|');
    buf.extend(iter::repeat(" ").take(indent));

    let node = handle;
    match node.data {
        NodeData::Document => panic!("should not reach Document"),

        NodeData::Doctype {
            ref name,
            ref public_id,
            ref system_id,
        } => {
            buf.push_str("<!DOCTYPE ");
            buf.push_str(name);
            if !public_id.is_empty() || !system_id.is_empty() {
                buf.push_str(&format!(" \"{}\" \"{}\"", public_id, system_id));
            }
            buf.push_str(">\n");
        },

        NodeData::Text { ref contents } => {
            buf.push('"');
            buf.push_str(&contents.borrow());
            buf.push_str("\"\n");
        },

        NodeData::Comment { ref contents } => {
            buf.push_str("<!-- ");
            buf.push_str(contents);
            buf.push_str(" -->\n");
        },

        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            buf.push('<');
            match &*name.ns {
                "http://www.w3.org/2000/svg" => buf.push_str("svg "),
                "http://www.w3.org/1998/Math/MathML" => buf.push_str("math "),
                _ => (),
            }
            buf.push_str(&name.local);
            buf.push_str(">\n");

            let mut attrs = attrs.borrow().clone();
            attrs.sort_by(|x, y| x.name.local.cmp(&y.name.local));
            // FIXME: sort by UTF-16 code unit

            for attr in attrs.into_iter() {
                buf.push('|');
                buf.extend(iter::repeat(" ").take(indent + 2));
                match &*attr.name.ns {
                    "http://www.w3.org/1999/xlink" => buf.push_str("xlink "),
                    "http://www.w3.org/XML/1998/namespace" => buf.push_str("xml "),
                    "http://www.w3.org/2000/xmlns/" => buf.push_str("xmlns "),
                    _ => (),
                }
                buf.push_str(&format!("{}=\"{}\"\n", attr.name.local, attr.value));
            }
        },
    }

    for child in node.children.borrow().iter() {
        dump(buf, indent + 2, child.clone());
    }

    if let NodeData::Element {
        ref template_contents,
        ..
    } = node.data
    {
        if let Some(ref content) = &*template_contents.borrow() {
            buf.push('|');
            buf.extend(iter::repeat(" ").take(indent + 2));
            buf.push_str("content\n");
            for child in content.children.borrow().iter() {
                dump(buf, indent + 4, child.clone());
            }
        }
    }
}

fn parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(StrTendril::from_slice(input))
}

fn parse_and_dump(input: &str) -> String {
    let dom = parse(input);
    let mut result = String::new();
    for child in dom.document.children.borrow().iter() {
        dump(&mut result, 1, child.clone());
    }
    let len = result.len();
    result.truncate(len.saturating_sub(1)); // drop the trailing newline
    result
}

fn html_context(local: &str) -> QualName {
    QualName::new(
        None,
        Namespace::from("http://www.w3.org/1999/xhtml"),
        LocalName::from(local),
    )
}

fn parse_fragment_and_dump(input: &str, context: QualName) -> String {
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, vec![])
        .one(StrTendril::from_slice(input));
    // Fragment case: serialize children of the synthetic html element
    // rather than children of the document.
    let doc = &dom.document;
    let root = &doc.children.borrow()[0];
    let mut result = String::new();
    for child in root.children.borrow().iter() {
        dump(&mut result, 1, child.clone());
    }
    let len = result.len();
    result.truncate(len.saturating_sub(1));
    result
}

macro_rules! assert_dump {
    ($input:expr, $expected:expr) => {{
        let got = parse_and_dump($input);
        assert_eq!(
            got, $expected,
            "\ninput: {}\ngot:\n{}\nexpected:\n{}\n",
            $input, got, $expected
        );
    }};
}

#[test]
fn text_and_comment_in_body() {
    assert_dump!(
        "FOO<!-- BAR -->BAZ",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     \"FOO\"\n\
         |     <!--  BAR  -->\n\
         |     \"BAZ\""
    );
}

#[test]
fn adoption_agency_rewrites_misnested_a() {
    assert_dump!(
        "<a><p></a></p>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <a>\n\
         |     <p>\n\
         |       <a>"
    );
}

#[test]
fn formatting_reconstructed_after_closed_p() {
    assert_dump!(
        "<p><b>1</p>2",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <p>\n\
         |       <b>\n\
         |         \"1\"\n\
         |     <b>\n\
         |       \"2\""
    );
}

#[test]
fn svg_attribute_case_adjusted() {
    assert_dump!(
        "<svg viewbox=\"0 0 1 1\"></svg>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <svg svg>\n\
         |       viewBox=\"0 0 1 1\""
    );
}

#[test]
fn foreign_object_is_an_html_island() {
    assert_dump!(
        "<svg><foreignObject><p>Hi</p></foreignObject></svg>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <svg svg>\n\
         |       <svg foreignObject>\n\
         |         <p>\n\
         |           \"Hi\""
    );
}

#[test]
fn classic_misnesting() {
    assert_dump!(
        "<a>1<b>2</a>3</b>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <a>\n\
         |       \"1\"\n\
         |       <b>\n\
         |         \"2\"\n\
         |     <b>\n\
         |       \"3\""
    );
}

#[test]
fn adoption_agency_with_furthest_block() {
    assert_dump!(
        "<b><p>Bold</b> Not bold</p>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <b>\n\
         |     <p>\n\
         |       <b>\n\
         |         \"Bold\"\n\
         |       \" Not bold\""
    );
}

#[test]
fn doctype_is_dumped() {
    assert_dump!(
        "<!DOCTYPE html><p>x",
        "| <!DOCTYPE html>\n\
         | <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <p>\n\
         |       \"x\""
    );
}

#[test]
fn head_contents() {
    assert_dump!(
        "<!DOCTYPE html><title>T</title><meta charset=\"x\"><body>y",
        "| <!DOCTYPE html>\n\
         | <html>\n\
         |   <head>\n\
         |     <title>\n\
         |       \"T\"\n\
         |     <meta>\n\
         |       charset=\"x\"\n\
         |   <body>\n\
         |     \"y\""
    );
}

#[test]
fn implied_table_structure() {
    assert_dump!(
        "<table><td>cell</table>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <table>\n\
         |       <tbody>\n\
         |         <tr>\n\
         |           <td>\n\
         |             \"cell\""
    );
}

#[test]
fn table_text_is_foster_parented() {
    assert_dump!(
        "<div><table>foo</table></div>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <div>\n\
         |       \"foo\"\n\
         |       <table>"
    );
}

#[test]
fn whitespace_stays_in_table() {
    assert_dump!(
        "<table> </table>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <table>\n\
         |       \" \""
    );
}

#[test]
fn template_contents_are_separate() {
    assert_dump!(
        "<template>x</template>",
        "| <html>\n\
         |   <head>\n\
         |     <template>\n\
         |       content\n\
         |         \"x\"\n\
         |   <body>"
    );
}

#[test]
fn template_in_table_captures_cells() {
    assert_dump!(
        "<table><template><td>cell</td></template></table>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <table>\n\
         |       <template>\n\
         |         content\n\
         |           <td>\n\
         |             \"cell\""
    );
}

#[test]
fn foreign_breakout_pops_to_html() {
    assert_dump!(
        "<svg><g><p>x",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <svg svg>\n\
         |       <svg g>\n\
         |     <p>\n\
         |       \"x\""
    );
}

#[test]
fn math_text_integration_point() {
    assert_dump!(
        "<math><mi>x</mi></math>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <math math>\n\
         |       <math mi>\n\
         |         \"x\""
    );
}

#[test]
fn xlink_attribute_namespace_adjusted() {
    assert_dump!(
        "<svg><a xlink:href=\"#\"></a></svg>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <svg svg>\n\
         |       <svg a>\n\
         |         xlink href=\"#\""
    );
}

#[test]
fn select_keeps_only_option_content() {
    assert_dump!(
        "<select><option>a<option>b</select>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <select>\n\
         |       <option>\n\
         |         \"a\"\n\
         |       <option>\n\
         |         \"b\""
    );
}

#[test]
fn frameset_replaces_body_when_ok() {
    assert_dump!(
        "<frameset><frame></frameset>",
        "| <html>\n\
         |   <head>\n\
         |   <frameset>\n\
         |     <frame>"
    );
}

#[test]
fn plaintext_swallows_rest() {
    assert_dump!(
        "<plaintext></plaintext>x",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <plaintext>\n\
         |       \"</plaintext>x\""
    );
}

#[test]
fn rcdata_title_keeps_markup_as_text() {
    assert_dump!(
        "<title><p>not markup</title>",
        "| <html>\n\
         |   <head>\n\
         |     <title>\n\
         |       \"<p>not markup\"\n\
         |   <body>"
    );
}

#[test]
fn cdata_in_svg_is_text() {
    assert_dump!(
        "<svg><![CDATA[<b>raw</b>]]></svg>",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <svg svg>\n\
         |       \"<b>raw</b>\""
    );
}

#[test]
fn cdata_outside_foreign_is_bogus_comment() {
    assert_dump!(
        "<![CDATA[x]]>",
        "| <!-- [CDATA[x]] -->\n\
         | <html>\n\
         |   <head>\n\
         |   <body>"
    );
}

#[test]
fn character_references_resolved() {
    assert_dump!(
        "<p>a&amp;b&notin;c",
        "| <html>\n\
         |   <head>\n\
         |   <body>\n\
         |     <p>\n\
         |       \"a&b\u{2209}c\""
    );
}

// Quirks mode selection

fn quirks_of(input: &str) -> QuirksMode {
    parse(input).quirks_mode.get()
}

#[test]
fn quirks_mode_selection() {
    assert_eq!(quirks_of("<!DOCTYPE html><p>"), QuirksMode::NoQuirks);
    assert_eq!(quirks_of("<p>no doctype"), QuirksMode::Quirks);
    assert_eq!(quirks_of("<!DOCTYPE foo><p>"), QuirksMode::Quirks);
    assert_eq!(
        quirks_of("<!DOCTYPE html PUBLIC \"-//IETF//DTD HTML 2.0//EN\">"),
        QuirksMode::Quirks
    );
    assert_eq!(
        quirks_of(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" \
             \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">"
        ),
        QuirksMode::LimitedQuirks
    );
    assert_eq!(
        quirks_of("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\">"),
        QuirksMode::Quirks
    );
    assert_eq!(
        quirks_of(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\" \
             \"http://www.w3.org/TR/html4/loose.dtd\">"
        ),
        QuirksMode::LimitedQuirks
    );
}

#[test]
fn iframe_srcdoc_ignores_missing_doctype() {
    let mut opts = ParseOpts::default();
    opts.tree_builder.iframe_srcdoc = true;
    let dom = parse_document(RcDom::default(), opts).one(StrTendril::from_slice("<p>x"));
    assert_eq!(dom.quirks_mode.get(), QuirksMode::NoQuirks);
}

// Fragment parsing

#[test]
fn fragment_td_context() {
    assert_eq!(
        parse_fragment_and_dump("<td>cell</td>", html_context("tr")),
        "| <td>\n\
         |   \"cell\""
    );
}

#[test]
fn fragment_body_context() {
    assert_eq!(
        parse_fragment_and_dump("<p>one<p>two", html_context("body")),
        "| <p>\n\
         |   \"one\"\n\
         | <p>\n\
         |   \"two\""
    );
}

#[test]
fn fragment_title_context_is_rcdata() {
    assert_eq!(
        parse_fragment_and_dump("<p>text</p>", html_context("title")),
        "| \"<p>text</p>\""
    );
}

// Strict mode

#[test]
fn strict_mode_surfaces_errors() {
    let good = parse("<!DOCTYPE html><html><head></head><body></body></html>");
    assert!(good.strict().is_ok());

    let bad = parse("<!DOCTYPE html><b foo=1 foo=2>");
    let errors = bad.strict().expect_err("duplicate attribute must error");
    assert!(!errors.errors.is_empty());
}

// Universal invariants

fn walk_invariants(node: &Handle) {
    let children = node.children.borrow();
    let mut prev_was_text = false;
    for child in children.iter() {
        // Parent consistency.
        let parent = child
            .parent
            .take()
            .expect("child has no parent")
            .upgrade()
            .expect("dangling parent");
        assert!(
            std::rc::Rc::ptr_eq(&parent, node),
            "child's parent pointer does not match container"
        );
        child.parent.set(Some(std::rc::Rc::downgrade(&parent)));

        // No adjacent text nodes.
        let is_text = matches!(child.data, NodeData::Text { .. });
        assert!(
            !(is_text && prev_was_text),
            "two adjacent text nodes under one parent"
        );
        prev_was_text = is_text;

        walk_invariants(child);
    }
    drop(children);

    if let NodeData::Element {
        ref name,
        ref template_contents,
        ..
    } = node.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            // Template containment: children live in the contents
            // fragment, never under the template element itself.
            assert!(
                node.children.borrow().is_empty(),
                "template element has direct children"
            );
            assert_eq!(&*name.local, "template");
            walk_invariants(contents);
        }
    }
}

#[test]
fn invariants_on_assorted_inputs() {
    let inputs = [
        "",
        "plain text",
        "<p>a<p>b<p>c",
        "<b><i>x</b>y</i>",
        "<table>junk<td>more</table>trailing",
        "<template><template>n</template></template>",
        "<svg><foreignObject><table><td>f</table></foreignObject></svg>",
        "<!doctype html><frameset></frameset>after",
        "<select><table><td>x",
        "a\0b",
        "<p y=\"\0\">&#0;",
        "<<<>>>",
        "</</</a",
        "<a href='x' href='y'>dup</a>",
        "&not;&notin;&noti;&nosuch;&#x110000;",
        "<math><annotation-xml encoding=\"text/html\"><p>x</p></annotation-xml></math>",
        "<!-- unterminated",
        "<button><button>nested",
        "<li><li><li>",
        "<table><colgroup><col><tr><td>z",
    ];
    for input in inputs {
        let dom = parse(input);
        walk_invariants(&dom.document);
    }
}

#[test]
fn repeat_parses_are_identical() {
    let input = "<!DOCTYPE html><b><table><td>x</table><p>y";
    let first = parse_and_dump(input);
    for _ in 0..3 {
        assert_eq!(parse_and_dump(input), first);
    }
}
