// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Serializer round-trip tests.

use weft::rcdom::{RcDom, SerializableHandle};
use weft::serialize::{serialize, SerializeOpts};
use weft::tendril::{StrTendril, TendrilSink};
use weft::{parse_document, ParseOpts};

fn parse_and_serialize(input: &str) -> String {
    let dom =
        parse_document(RcDom::default(), ParseOpts::default()).one(StrTendril::from_slice(input));
    let mut bytes = vec![];
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut bytes, &document, SerializeOpts::default()).unwrap();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn simple_document() {
    assert_eq!(
        parse_and_serialize("<!DOCTYPE html><p>one</p>"),
        "<!DOCTYPE html><html><head></head><body><p>one</p></body></html>"
    );
}

#[test]
fn void_elements_have_no_end_tag() {
    assert_eq!(
        parse_and_serialize("<p>a<br>b<hr>"),
        "<html><head></head><body><p>a<br>b</p><hr></body></html>"
    );
}

#[test]
fn text_is_escaped() {
    assert_eq!(
        parse_and_serialize("<p>&amp;&lt;tag&gt;</p>"),
        "<html><head></head><body><p>&amp;&lt;tag&gt;</p></body></html>"
    );
}

#[test]
fn attributes_are_escaped() {
    assert_eq!(
        parse_and_serialize("<p title='a\"b&amp;c'>x</p>"),
        "<html><head></head><body><p title=\"a&quot;b&amp;c\">x</p></body></html>"
    );
}

#[test]
fn raw_text_elements_not_escaped() {
    assert_eq!(
        parse_and_serialize("<style>a < b</style>"),
        "<html><head><style>a < b</style></head><body></body></html>"
    );
}

#[test]
fn comments_round_trip() {
    assert_eq!(
        parse_and_serialize("<!--note-->"),
        "<!--note--><html><head></head><body></body></html>"
    );
}

#[test]
fn foreign_attributes_keep_prefixes() {
    assert_eq!(
        parse_and_serialize("<svg><a xlink:href=\"#\"></a></svg>"),
        "<html><head></head><body><svg><a xlink:href=\"#\"></a></svg></body></html>"
    );
}

/// Parsing serialized output again must give an identical serialization.
#[test]
fn reparse_is_a_fixed_point() {
    let inputs = [
        "<!DOCTYPE html><p class=a>text<br>more",
        "<table><td>x</table>tail",
        "<b><p>Bold</b> Not bold</p>",
        "<svg viewbox=\"0 0 1 1\"><foreignObject><p>Hi</p></foreignObject></svg>",
        "<ul><li>one<li>two</ul>",
        "<textarea>&amp; raw</textarea>",
    ];
    for input in inputs {
        let once = parse_and_serialize(input);
        let twice = parse_and_serialize(&once);
        assert_eq!(once, twice, "not a fixed point for {input:?}");
    }
}
