// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Token-stream tests driving the tokenizer directly.

use std::borrow::Cow;

use weft::input::InputBuffer;
use weft::tendril::{SliceExt, StrTendril};
use weft::tokenizer::states::{RawKind, State};
use weft::tokenizer::{
    Doctype, SinkResult, Tag, TagKind, Token, TokenSink, Tokenizer, TokenizerOpts,
};
use weft::{Attribute, LocalName, Namespace, QualName};

/// Records every token, gluing adjacent character output together the
/// way the expectations are written.
#[derive(Default)]
struct Recorder {
    tokens: Vec<Token>,
    text_run: StrTendril,
    errors: Vec<String>,
    eof_count: usize,
}

impl Recorder {
    fn take_text(&mut self) {
        if !self.text_run.is_empty() {
            let run = std::mem::take(&mut self.text_run);
            self.tokens.push(Token::Chars(run));
        }
    }

    fn into_output(mut self) -> (Vec<Token>, Vec<String>) {
        self.take_text();
        (self.tokens, self.errors)
    }
}

impl TokenSink for Recorder {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line: u64) -> SinkResult<()> {
        match token {
            Token::Chars(text) => self.text_run.push_slice(&text),
            Token::Null => self.text_run.push_char('\0'),
            Token::Eof => self.eof_count += 1,
            token => {
                self.take_text();
                self.tokens.push(token);
            },
        }
        SinkResult::Continue
    }

    fn parse_error(&mut self, msg: Cow<'static, str>, _line: u64) {
        self.errors.push(msg.into_owned());
    }
}

fn tokenize_chunks(chunks: &[&str], opts: TokenizerOpts) -> (Vec<Token>, Vec<String>) {
    let mut tok = Tokenizer::new(Recorder::default(), opts);
    let mut input = InputBuffer::default();
    for chunk in chunks {
        input.push(chunk.to_tendril());
        let _ = tok.feed(&mut input);
    }
    tok.end();
    assert_eq!(tok.sink.eof_count, 1, "EOF must be emitted exactly once");
    tok.sink.into_output()
}

fn tokenize(input: &str) -> (Vec<Token>, Vec<String>) {
    tokenize_chunks(&[input], TokenizerOpts::default())
}

fn start_tag(name: &str, attrs: Vec<(&str, &str)>, self_closing: bool) -> Token {
    Token::Tag(Tag {
        kind: TagKind::StartTag,
        name: LocalName::from(name),
        self_closing,
        attrs: attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
                value: value.to_tendril(),
            })
            .collect(),
    })
}

fn end_tag(name: &str) -> Token {
    Token::Tag(Tag {
        kind: TagKind::EndTag,
        name: LocalName::from(name),
        self_closing: false,
        attrs: vec![],
    })
}

fn chars(s: &str) -> Token {
    Token::Chars(s.to_tendril())
}

#[test]
fn plain_tags_and_text() {
    let (tokens, errors) = tokenize("<div>hi</div>");
    assert_eq!(
        tokens,
        vec![start_tag("div", vec![], false), chars("hi"), end_tag("div")]
    );
    assert!(errors.is_empty());
}

#[test]
fn tag_names_are_lowercased() {
    let (tokens, _) = tokenize("<DIV CLASS=a>");
    assert_eq!(tokens, vec![start_tag("div", vec![("class", "a")], false)]);
}

#[test]
fn attribute_styles() {
    let (tokens, errors) = tokenize("<a one=1 two='2' three=\"3\" four>");
    assert_eq!(
        tokens,
        vec![start_tag(
            "a",
            vec![("one", "1"), ("two", "2"), ("three", "3"), ("four", "")],
            false
        )]
    );
    assert!(errors.is_empty());
}

#[test]
fn duplicate_attribute_dropped_first_wins() {
    let (tokens, errors) = tokenize("<a x=1 x=2>");
    assert_eq!(tokens, vec![start_tag("a", vec![("x", "1")], false)]);
    assert_eq!(errors, vec!["duplicate-attribute"]);
}

#[test]
fn self_closing_flag() {
    let (tokens, _) = tokenize("<br/>");
    assert_eq!(tokens, vec![start_tag("br", vec![], true)]);
}

#[test]
fn end_tag_with_attributes_is_an_error() {
    let (tokens, errors) = tokenize("</div class=x>");
    match &tokens[..] {
        [Token::Tag(tag)] => {
            assert_eq!(tag.kind, TagKind::EndTag);
            assert_eq!(&*tag.name, "div");
        },
        other => panic!("unexpected tokens {other:?}"),
    }
    assert!(errors.iter().any(|e| e == "end-tag-with-attributes"));
}

#[test]
fn comments() {
    let (tokens, errors) = tokenize("<!-- hello -->");
    assert_eq!(tokens, vec![Token::Comment(" hello ".to_tendril())]);
    assert!(errors.is_empty());

    let (tokens, errors) = tokenize("<!-->");
    assert_eq!(tokens, vec![Token::Comment("".to_tendril())]);
    assert_eq!(errors, vec!["abrupt-closing-of-empty-comment"]);
}

#[test]
fn bogus_comment_from_question_mark() {
    let (tokens, errors) = tokenize("<?php ?>");
    assert_eq!(tokens, vec![Token::Comment("?php ?".to_tendril())]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn doctype_with_ids() {
    let (tokens, _) = tokenize(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">",
    );
    assert_eq!(
        tokens,
        vec![Token::Doctype(Doctype {
            name: Some("html".to_tendril()),
            public_id: Some("-//W3C//DTD HTML 4.01//EN".to_tendril()),
            system_id: Some("http://www.w3.org/TR/html4/strict.dtd".to_tendril()),
            force_quirks: false,
        })]
    );
}

#[test]
fn doctype_missing_name_forces_quirks() {
    let (tokens, errors) = tokenize("<!DOCTYPE>");
    assert_eq!(
        tokens,
        vec![Token::Doctype(Doctype {
            name: None,
            public_id: None,
            system_id: None,
            force_quirks: true,
        })]
    );
    assert!(!errors.is_empty());
}

#[test]
fn named_character_references() {
    let (tokens, errors) = tokenize("&amp;&lt;&gt;");
    assert_eq!(tokens, vec![chars("&<>")]);
    assert!(errors.is_empty());
}

#[test]
fn legacy_reference_without_semicolon() {
    let (tokens, errors) = tokenize("&amp x");
    assert_eq!(tokens, vec![chars("& x")]);
    assert_eq!(errors, vec!["missing-semicolon-after-character-reference"]);
}

#[test]
fn longest_match_with_fallback() {
    // &noti is a prefix of &notin; but only &not matched; the rest is
    // pushed back as text.
    let (tokens, errors) = tokenize("&noti;");
    assert_eq!(tokens, vec![chars("\u{ac}i;")]);
    assert_eq!(errors, vec!["missing-semicolon-after-character-reference"]);

    let (tokens, _) = tokenize("&notin;");
    assert_eq!(tokens, vec![chars("\u{2209}")]);
}

#[test]
fn unknown_reference_left_alone() {
    let (tokens, _) = tokenize("&nosuchthing x");
    assert_eq!(tokens, vec![chars("&nosuchthing x")]);
}

#[test]
fn attribute_legacy_carve_out() {
    // In an attribute value, a no-semicolon match followed by '=' or an
    // alphanumeric is not a character reference at all.
    let (tokens, errors) = tokenize("<a href=\"?x&not=1\">");
    assert_eq!(
        tokens,
        vec![start_tag("a", vec![("href", "?x&not=1")], false)]
    );
    assert!(errors.is_empty());

    // With a semicolon it always resolves.
    let (tokens, _) = tokenize("<a href=\"?x&not;=1\">");
    assert_eq!(
        tokens,
        vec![start_tag("a", vec![("href", "?x\u{ac}=1")], false)]
    );
}

#[test]
fn numeric_references() {
    let (tokens, errors) = tokenize("&#65;&#x42;&#X43;");
    assert_eq!(tokens, vec![chars("ABC")]);
    assert!(errors.is_empty());
}

#[test]
fn numeric_reference_c1_remapped() {
    let (tokens, errors) = tokenize("&#x80;");
    assert_eq!(tokens, vec![chars("\u{20ac}")]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn numeric_reference_out_of_range() {
    let (tokens, errors) = tokenize("&#x110000;&#0;");
    assert_eq!(tokens, vec![chars("\u{fffd}\u{fffd}")]);
    assert_eq!(errors.len(), 2);
}

#[test]
fn null_in_data_state_is_passed_through() {
    let (tokens, errors) = tokenize("a\0b");
    assert_eq!(tokens, vec![chars("a\0b")]);
    assert_eq!(errors, vec!["unexpected-null-character"]);
}

#[test]
fn rawtext_end_tag_must_match_last_start_tag() {
    let opts = TokenizerOpts {
        initial_state: Some(State::raw(RawKind::Rawtext)),
        last_start_tag_name: Some("style".to_string()),
        ..TokenizerOpts::default()
    };
    let (tokens, _) = tokenize_chunks(&["a</div>b</style>"], opts);
    assert_eq!(tokens, vec![chars("a</div>b"), end_tag("style")]);
}

#[test]
fn script_data_escapes() {
    let opts = TokenizerOpts {
        initial_state: Some(State::raw(RawKind::Script)),
        last_start_tag_name: Some("script".to_string()),
        ..TokenizerOpts::default()
    };
    let (tokens, _) = tokenize_chunks(&["<!--<script>x</script>--></script>"], opts);
    assert_eq!(
        tokens,
        vec![chars("<!--<script>x</script>-->"), end_tag("script")]
    );
}

#[test]
fn input_split_across_chunks() {
    let text = "<di v-a ttr='x y'>t ext</div>";
    for split in 1..text.len() {
        if !text.is_char_boundary(split) {
            continue;
        }
        let (a, b) = text.split_at(split);
        let (tokens, _) = tokenize_chunks(&[a, b], TokenizerOpts::default());
        assert_eq!(
            tokens,
            vec![
                start_tag("di", vec![("v-a", ""), ("ttr", "x y")], false),
                chars("t ext"),
                end_tag("div"),
            ],
            "split at {split}"
        );
    }
}

#[test]
fn markup_declaration_lookahead_across_chunks() {
    let (tokens, _) = tokenize_chunks(&["<!", "DOC", "TYPE html>"], TokenizerOpts::default());
    assert_eq!(
        tokens,
        vec![Token::Doctype(Doctype {
            name: Some("html".to_tendril()),
            public_id: None,
            system_id: None,
            force_quirks: false,
        })]
    );
}

#[test]
fn eof_in_tag_recovers() {
    let (tokens, errors) = tokenize("x<div");
    assert_eq!(tokens, vec![chars("x")]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn eof_in_comment_emits_comment() {
    let (tokens, errors) = tokenize("<!--abc");
    assert_eq!(tokens, vec![Token::Comment("abc".to_tendril())]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn lone_ampersand_is_text() {
    let (tokens, errors) = tokenize("a & b &; c");
    assert_eq!(tokens, vec![chars("a & b &; c")]);
    assert!(errors.is_empty());
}

#[test]
fn cr_and_crlf_normalize_to_lf() {
    let (tokens, _) = tokenize("a\r\nb\rc");
    assert_eq!(tokens, vec![chars("a\nb\nc")]);
}

#[test]
fn bom_is_discarded() {
    let (tokens, _) = tokenize("\u{feff}x");
    assert_eq!(tokens, vec![chars("x")]);

    let opts = TokenizerOpts {
        discard_bom: false,
        ..TokenizerOpts::default()
    };
    let (tokens, _) = tokenize_chunks(&["\u{feff}x"], opts);
    assert_eq!(tokens, vec![chars("\u{feff}x")]);
}

#[test]
fn unfinished_markup_at_eof() {
    let (tokens, errors) = tokenize("z<");
    assert_eq!(tokens, vec![chars("z<")]);
    assert_eq!(errors.len(), 1);

    let (tokens, errors) = tokenize("z</");
    assert_eq!(tokens, vec![chars("z</")]);
    assert_eq!(errors.len(), 1);
}
