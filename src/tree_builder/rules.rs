// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! One handler per insertion mode, plus the foreign-content rules.
//!
//! Handlers get pre-classified tokens: every `Chars` run is either all
//! whitespace or has none, so `is_blank` answers the standard's
//! "character token that is one of ..." distinctions in one test.

use std::borrow::Cow::Borrowed;
use std::mem;

use crate::interface::NodeOrText;
use crate::tokenizer::states::RawKind::{Rawtext, Rcdata, Script};
use crate::tokenizer::Tag;
use crate::tokenizer::TagKind::{EndTag, StartTag};
use crate::tree_builder::data::*;
use crate::tree_builder::types::*;
use crate::tree_builder::{create_element, TreeBuilder, TreeSink};
use crate::util::is_blank;
use crate::{LocalName, QualName};

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    /// Dispatch a token to the handler for `mode`.
    pub(super) fn rules(&mut self, mode: InsertionMode, token: Token) -> Flow<Handle> {
        use self::InsertionMode::*;
        match mode {
            Initial => self.mode_initial(token),
            BeforeHtml => self.mode_before_html(token),
            BeforeHead => self.mode_before_head(token),
            InHead => self.mode_in_head(token),
            InHeadNoscript => self.mode_in_head_noscript(token),
            AfterHead => self.mode_after_head(token),
            InBody => self.mode_in_body(token),
            Text => self.mode_text(token),
            InTable => self.mode_in_table(token),
            InTableText => self.mode_in_table_text(token),
            InCaption => self.mode_in_caption(token),
            InColumnGroup => self.mode_in_column_group(token),
            InTableBody => self.mode_in_table_body(token),
            InRow => self.mode_in_row(token),
            InCell => self.mode_in_cell(token),
            InSelect => self.mode_in_select(token),
            InSelectInTable => self.mode_in_select_in_table(token),
            InTemplate => self.mode_in_template(token),
            AfterBody => self.mode_after_body(token),
            InFrameset => self.mode_in_frameset(token),
            AfterFrameset => self.mode_after_frameset(token),
            AfterAfterBody => self.mode_after_after_body(token),
            AfterAfterFrameset => self.mode_after_after_frameset(token),
        }
    }

    //§ the-initial-insertion-mode
    fn mode_initial(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => Flow::Done,
            Token::Comment(text) => self.add_comment_to_doc(text),
            token => {
                if !self.opts.iframe_srcdoc {
                    self.drop_token(&token);
                    self.set_quirks(crate::interface::Quirks);
                }
                Flow::Redo(InsertionMode::BeforeHtml, token)
            },
        }
    }

    //§ the-before-html-insertion-mode
    fn mode_before_html(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => Flow::Done,
            Token::Comment(text) => self.add_comment_to_doc(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => {
                        self.create_html_root(tag.attrs);
                        self.mode = InsertionMode::BeforeHead;
                        Flow::Done
                    },
                    (EndTag, "head" | "body" | "html" | "br") | (StartTag, _) => {
                        self.create_html_root(vec![]);
                        Flow::Redo(InsertionMode::BeforeHead, Token::Tag(tag))
                    },
                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => {
                self.create_html_root(vec![]);
                Flow::Redo(InsertionMode::BeforeHead, token)
            },
        }
    }

    //§ the-before-head-insertion-mode
    fn mode_before_head(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => Flow::Done,
            Token::Comment(text) => self.add_comment(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),
                    (StartTag, "head") => {
                        self.head = Some(self.open_elem(tag));
                        self.mode = InsertionMode::InHead;
                        Flow::Done
                    },
                    (EndTag, "head" | "body" | "html" | "br") | (StartTag, _) => {
                        self.head = Some(self.open_phantom("head"));
                        Flow::Redo(InsertionMode::InHead, Token::Tag(tag))
                    },
                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => {
                self.head = Some(self.open_phantom("head"));
                Flow::Redo(InsertionMode::InHead, token)
            },
        }
    }

    //§ parsing-main-inhead
    fn mode_in_head(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (StartTag, "base" | "basefont" | "bgsound" | "link" | "meta") => {
                        self.void_elem(tag);
                        Flow::SelfClosingOk
                    },

                    (StartTag, "title") => self.raw_text_elem(tag, Rcdata),

                    (StartTag, "noscript") if !self.opts.scripting_enabled => {
                        self.open_elem(tag);
                        self.mode = InsertionMode::InHeadNoscript;
                        Flow::Done
                    },
                    (StartTag, "noframes" | "style" | "noscript") => {
                        self.raw_text_elem(tag, Rawtext)
                    },

                    (StartTag, "script") => {
                        // Not insert-element-for: fragment parsing marks
                        // the script before it hits the tree.
                        let elem = create_element(
                            &self.sink,
                            QualName::new(None, ns!(html), LocalName::from("script")),
                            tag.attrs,
                        );
                        if self.is_fragment() {
                            self.sink.mark_script_already_started(&elem);
                        }
                        self.insert_here(NodeOrText::Node(elem.clone()));
                        self.push_open(&elem);
                        self.text_mode(Script)
                    },

                    (EndTag, "head") => {
                        self.pop_open();
                        self.mode = InsertionMode::AfterHead;
                        Flow::Done
                    },

                    (StartTag, "template") => {
                        self.push_fmt_marker();
                        self.frameset_ok = false;
                        self.mode = InsertionMode::InTemplate;
                        self.template_modes.push(InsertionMode::InTemplate);
                        self.open_elem(tag);
                        Flow::Done
                    },

                    (EndTag, "template") => {
                        if !self.stack_has("template") {
                            self.drop_token(&tag);
                        } else {
                            self.generate_implied_ends(implied_end_thorough);
                            self.close_named("template");
                            self.clear_fmt_to_marker();
                            self.template_modes.pop();
                            self.mode = self.reset_mode();
                        }
                        Flow::Done
                    },

                    (StartTag, "head") => self.drop_token(&tag),

                    (EndTag, "body" | "html" | "br") | (StartTag, _) => {
                        self.pop_open();
                        Flow::Redo(InsertionMode::AfterHead, Token::Tag(tag))
                    },
                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => {
                self.pop_open();
                Flow::Redo(InsertionMode::AfterHead, token)
            },
        }
    }

    //§ parsing-main-inheadnoscript
    fn mode_in_head_noscript(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => {
                self.rules(InsertionMode::InHead, Token::Chars(text))
            },
            Token::Comment(text) => self.rules(InsertionMode::InHead, Token::Comment(text)),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (EndTag, "noscript") => {
                        self.pop_open();
                        self.mode = InsertionMode::InHead;
                        Flow::Done
                    },

                    (StartTag, "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style") => {
                        self.rules(InsertionMode::InHead, Token::Tag(tag))
                    },

                    (StartTag, "head" | "noscript") => self.drop_token(&tag),

                    (EndTag, "br") | (StartTag, _) => {
                        self.drop_token(&tag);
                        self.pop_open();
                        Flow::Redo(InsertionMode::InHead, Token::Tag(tag))
                    },
                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => {
                self.drop_token(&token);
                self.pop_open();
                Flow::Redo(InsertionMode::InHead, token)
            },
        }
    }

    //§ the-after-head-insertion-mode
    fn mode_after_head(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (StartTag, "body") => {
                        self.open_elem(tag);
                        self.frameset_ok = false;
                        self.mode = InsertionMode::InBody;
                        Flow::Done
                    },

                    (StartTag, "frameset") => {
                        self.open_elem(tag);
                        self.mode = InsertionMode::InFrameset;
                        Flow::Done
                    },

                    (
                        StartTag,
                        "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title",
                    ) => {
                        self.drop_token(&tag);
                        let head = self.head.clone().expect("head parsed already");
                        self.push_open(&head);
                        let flow = self.rules(InsertionMode::InHead, Token::Tag(tag));
                        self.remove_open(&head);
                        flow
                    },

                    (EndTag, "template") => self.rules(InsertionMode::InHead, Token::Tag(tag)),

                    (StartTag, "head") => self.drop_token(&tag),

                    (EndTag, "body" | "html" | "br") | (StartTag, _) => {
                        self.open_phantom("body");
                        Flow::Redo(InsertionMode::InBody, Token::Tag(tag))
                    },
                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => {
                self.open_phantom("body");
                Flow::Redo(InsertionMode::InBody, token)
            },
        }
    }

    //§ parsing-main-inbody
    fn mode_in_body(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Null => self.drop_token(&token),

            Token::Chars(text) => {
                self.reconstruct_formatting();
                if !is_blank(&text) {
                    self.frameset_ok = false;
                }
                self.add_text(text)
            },

            Token::Comment(text) => self.add_comment(text),

            Token::Eof => {
                if !self.template_modes.is_empty() {
                    self.mode_in_template(Token::Eof)
                } else {
                    self.check_body_end();
                    Flow::Done
                }
            },

            Token::Tag(tag) => self.tag_in_body(tag),
        }
    }

    fn tag_in_body(&mut self, tag: Tag) -> Flow<Handle> {
        let name = tag.name.clone();
        match (tag.kind, &*name) {
            (StartTag, "html") => {
                self.drop_token(&tag);
                if !self.stack_has("template") {
                    let root = self.open[0].clone();
                    self.sink.merge_attrs(&root, tag.attrs);
                }
                Flow::Done
            },

            (
                StartTag,
                "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                | "style" | "template" | "title",
            )
            | (EndTag, "template") => self.rules(InsertionMode::InHead, Token::Tag(tag)),

            (StartTag, "body") => {
                self.drop_token(&tag);
                if let Some(body) = self.body_handle() {
                    if self.open.len() != 1 && !self.stack_has("template") {
                        self.frameset_ok = false;
                        self.sink.merge_attrs(&body, tag.attrs);
                    }
                }
                Flow::Done
            },

            (StartTag, "frameset") => {
                self.drop_token(&tag);
                if !self.frameset_ok {
                    return Flow::Done;
                }
                let Some(body) = self.body_handle() else {
                    return Flow::Done;
                };
                self.sink.detach(&body);
                self.open.truncate(1);
                self.open_elem(tag);
                self.mode = InsertionMode::InFrameset;
                Flow::Done
            },

            (EndTag, "body") => {
                if self.has_in_scope(default_scope, "body") {
                    self.check_body_end();
                    self.mode = InsertionMode::AfterBody;
                } else {
                    self.sink
                        .parse_error(Borrowed("</body> with no <body> in scope"));
                }
                Flow::Done
            },

            (EndTag, "html") => {
                if self.has_in_scope(default_scope, "body") {
                    self.check_body_end();
                    Flow::Redo(InsertionMode::AfterBody, Token::Tag(tag))
                } else {
                    self.sink
                        .parse_error(Borrowed("</html> with no <body> in scope"));
                    Flow::Done
                }
            },

            (
                StartTag,
                "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dialog"
                | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer"
                | "header" | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "search"
                | "section" | "summary" | "ul",
            ) => {
                self.close_p_in_button_scope();
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                self.close_p_in_button_scope();
                if self.current_in(heading) {
                    self.sink.parse_error(Borrowed("nested heading tags"));
                    self.pop_open();
                }
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "pre" | "listing") => {
                self.close_p_in_button_scope();
                self.open_elem(tag);
                self.skip_newline = true;
                self.frameset_ok = false;
                Flow::Done
            },

            (StartTag, "form") => {
                if self.form.is_some() && !self.stack_has("template") {
                    self.sink.parse_error(Borrowed("nested forms"));
                } else {
                    self.close_p_in_button_scope();
                    let elem = self.open_elem(tag);
                    if !self.stack_has("template") {
                        self.form = Some(elem);
                    }
                }
                Flow::Done
            },

            (StartTag, "li" | "dd" | "dt") => {
                self.frameset_ok = false;

                // Close an open li (for li) or dd/dt (for dd/dt), but
                // stop the search at other special elements.
                let closes: &[&str] = if &*name == "li" {
                    &["li"]
                } else {
                    &["dd", "dt"]
                };
                let mut to_close = None;
                for open in self.open.iter().rev() {
                    let open_name = self.sink.elem_name(open);
                    if in_html_set(open_name, closes) {
                        to_close = Some(open_name.local.clone());
                        break;
                    }
                    if special(open_name) && !in_html_set(open_name, &["address", "div", "p"]) {
                        break;
                    }
                }
                if let Some(local) = to_close {
                    self.generate_implied_ends_except(&local);
                    self.close_named(&local);
                }

                self.close_p_in_button_scope();
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "plaintext") => {
                self.close_p_in_button_scope();
                self.open_elem(tag);
                Flow::Plaintext
            },

            (StartTag, "button") => {
                if self.has_in_scope(default_scope, "button") {
                    self.sink.parse_error(Borrowed("nested buttons"));
                    self.generate_implied_ends(implied_end);
                    self.pop_through("button");
                }
                self.reconstruct_formatting();
                self.open_elem(tag);
                self.frameset_ok = false;
                Flow::Done
            },

            (
                EndTag,
                "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
                | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure"
                | "footer" | "header" | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol"
                | "pre" | "search" | "section" | "summary" | "ul",
            ) => {
                if !self.has_in_scope(default_scope, &name) {
                    self.drop_token(&tag);
                } else {
                    self.generate_implied_ends(implied_end);
                    self.close_named(&name);
                }
                Flow::Done
            },

            (EndTag, "form") => {
                if !self.stack_has("template") {
                    let Some(form) = self.form.take() else {
                        self.sink
                            .parse_error(Borrowed("Null form element pointer on </form>"));
                        return Flow::Done;
                    };
                    if !self.in_scope_where(default_scope, |e| self.sink.same_node(e, &form)) {
                        self.sink
                            .parse_error(Borrowed("Form element not in scope on </form>"));
                        return Flow::Done;
                    }
                    self.generate_implied_ends(implied_end);
                    let still_current = self.sink.same_node(self.current(), &form);
                    self.remove_open(&form);
                    if !still_current {
                        self.sink.parse_error(Borrowed("Bad open element on </form>"));
                    }
                } else {
                    if !self.has_in_scope(default_scope, "form") {
                        self.sink
                            .parse_error(Borrowed("Form element not in scope on </form>"));
                        return Flow::Done;
                    }
                    self.generate_implied_ends(implied_end);
                    if !self.current_is("form") {
                        self.sink.parse_error(Borrowed("Bad open element on </form>"));
                    }
                    self.pop_through("form");
                }
                Flow::Done
            },

            (EndTag, "p") => {
                if !self.has_in_scope(button_scope, "p") {
                    self.sink.parse_error(Borrowed("No <p> tag to close"));
                    self.open_phantom("p");
                }
                self.close_p();
                Flow::Done
            },

            (EndTag, "li" | "dd" | "dt") => {
                let scope = if &*name == "li" { list_item_scope } else { default_scope };
                if self.has_in_scope(scope, &name) {
                    self.generate_implied_ends_except(&name);
                    self.close_named(&name);
                } else {
                    self.sink.parse_error(Borrowed("No matching tag to close"));
                }
                Flow::Done
            },

            (EndTag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                if self.in_scope_where(default_scope, |e| self.elem_in(e, heading)) {
                    self.generate_implied_ends(implied_end);
                    if !self.current_is(&name) {
                        self.sink.parse_error(Borrowed("Closing wrong heading tag"));
                    }
                    while let Some(elem) = self.open.pop() {
                        if self.elem_in(&elem, heading) {
                            break;
                        }
                    }
                } else {
                    self.sink.parse_error(Borrowed("No heading tag to close"));
                }
                Flow::Done
            },

            (StartTag, "a") => {
                self.drop_stray_a(&tag);
                self.reconstruct_formatting();
                self.open_formatting_elem(tag);
                Flow::Done
            },

            (
                StartTag,
                "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike" | "strong"
                | "tt" | "u",
            ) => {
                self.reconstruct_formatting();
                self.open_formatting_elem(tag);
                Flow::Done
            },

            (StartTag, "nobr") => {
                self.reconstruct_formatting();
                if self.has_in_scope(default_scope, "nobr") {
                    self.sink.parse_error(Borrowed("Nested <nobr>"));
                    self.run_adoption_agency("nobr");
                    self.reconstruct_formatting();
                }
                self.open_formatting_elem(tag);
                Flow::Done
            },

            (
                EndTag,
                "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
                | "strike" | "strong" | "tt" | "u",
            ) => {
                self.run_adoption_agency(&name);
                Flow::Done
            },

            (StartTag, "applet" | "marquee" | "object") => {
                self.reconstruct_formatting();
                self.open_elem(tag);
                self.push_fmt_marker();
                self.frameset_ok = false;
                Flow::Done
            },

            (EndTag, "applet" | "marquee" | "object") => {
                if !self.has_in_scope(default_scope, &name) {
                    self.drop_token(&tag);
                } else {
                    self.generate_implied_ends(implied_end);
                    self.close_named(&name);
                    self.clear_fmt_to_marker();
                }
                Flow::Done
            },

            (StartTag, "table") => {
                if self.quirks != crate::interface::Quirks {
                    self.close_p_in_button_scope();
                }
                self.open_elem(tag);
                self.frameset_ok = false;
                self.mode = InsertionMode::InTable;
                Flow::Done
            },

            (EndTag, "br") => {
                // Treated as a start tag with the attributes thrown
                // away.
                self.drop_token(&tag);
                self.tag_in_body(Tag {
                    kind: StartTag,
                    attrs: vec![],
                    ..tag
                })
            },

            (StartTag, "area" | "br" | "embed" | "img" | "keygen" | "wbr" | "input") => {
                let keep_frameset_ok = &*name == "input" && self.hidden_input(&tag);
                self.reconstruct_formatting();
                self.void_elem(tag);
                if !keep_frameset_ok {
                    self.frameset_ok = false;
                }
                Flow::SelfClosingOk
            },

            (StartTag, "param" | "source" | "track") => {
                self.void_elem(tag);
                Flow::SelfClosingOk
            },

            (StartTag, "hr") => {
                self.close_p_in_button_scope();
                self.void_elem(tag);
                self.frameset_ok = false;
                Flow::SelfClosingOk
            },

            (StartTag, "image") => {
                // "Don't ask." -- the standard
                self.drop_token(&tag);
                self.tag_in_body(Tag {
                    name: LocalName::from("img"),
                    ..tag
                })
            },

            (StartTag, "textarea") => {
                self.skip_newline = true;
                self.frameset_ok = false;
                self.raw_text_elem(tag, Rcdata)
            },

            (StartTag, "xmp") => {
                self.close_p_in_button_scope();
                self.reconstruct_formatting();
                self.frameset_ok = false;
                self.raw_text_elem(tag, Rawtext)
            },

            (StartTag, "iframe") => {
                self.frameset_ok = false;
                self.raw_text_elem(tag, Rawtext)
            },

            (StartTag, "noembed") => self.raw_text_elem(tag, Rawtext),

            (StartTag, "noscript") if self.opts.scripting_enabled => {
                self.raw_text_elem(tag, Rawtext)
            },

            (StartTag, "select") => {
                self.reconstruct_formatting();
                self.open_elem(tag);
                self.frameset_ok = false;
                // We may be here via "as in the rules for InBody" from
                // one of the table modes.
                self.mode = match self.mode {
                    InsertionMode::InTable
                    | InsertionMode::InCaption
                    | InsertionMode::InTableBody
                    | InsertionMode::InRow
                    | InsertionMode::InCell => InsertionMode::InSelectInTable,
                    _ => InsertionMode::InSelect,
                };
                Flow::Done
            },

            (StartTag, "optgroup" | "option") => {
                if self.current_is("option") {
                    self.pop_open();
                }
                self.reconstruct_formatting();
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "rb" | "rtc") => {
                if self.has_in_scope(default_scope, "ruby") {
                    self.generate_implied_ends(implied_end);
                }
                if !self.current_is("ruby") {
                    self.drop_token(&tag);
                }
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "rp" | "rt") => {
                if self.has_in_scope(default_scope, "ruby") {
                    self.generate_implied_ends_except("rtc");
                }
                if !self.current_is("rtc") && !self.current_is("ruby") {
                    self.drop_token(&tag);
                }
                self.open_elem(tag);
                Flow::Done
            },

            (StartTag, "math") => self.enter_foreign(tag, ns!(mathml)),
            (StartTag, "svg") => self.enter_foreign(tag, ns!(svg)),

            (
                StartTag,
                "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot"
                | "th" | "thead" | "tr",
            ) => self.drop_token(&tag),

            (StartTag, _) => {
                self.reconstruct_formatting();
                self.open_elem(tag);
                Flow::Done
            },

            (EndTag, _) => {
                self.any_other_end_tag(tag);
                Flow::Done
            },
        }
    }

    /// "Any other end tag" of InBody: close if an open HTML element
    /// matches, erroring past mis-nesting; ignore if a special element
    /// intervenes.
    pub(super) fn any_other_end_tag(&mut self, tag: Tag) {
        let mut found = None;
        for at in (0..self.open.len()).rev() {
            if self.elem_is(&self.open[at], &tag.name) {
                found = Some(at);
                break;
            }
            if self.elem_in(&self.open[at], special) {
                self.sink
                    .parse_error(Borrowed("Found special tag while closing generic tag"));
                return;
            }
        }
        // The root <html> is special, so the loop always ends one way
        // or the other.
        let Some(at) = found else {
            self.drop_token(&tag);
            return;
        };

        self.generate_implied_ends_except(&tag.name);
        if at != self.open.len() - 1 {
            self.drop_token(&tag);
        }
        self.open.truncate(at);
    }

    /// An `<a>` start tag while an `<a>` is still in the formatting
    /// list: adopt it out and scrub the leftovers.
    fn drop_stray_a(&mut self, tag: &Tag) {
        let Some(prior) = self.latest_fmt_entry("a").map(|(_, elem, _)| elem) else {
            return;
        };
        self.drop_token(tag);
        self.run_adoption_agency("a");
        if let Some(at) = self.fmt_position(&prior) {
            self.fmt.remove(at);
        }
        self.remove_open(&prior);
    }

    //§ parsing-main-incdata
    fn mode_text(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) => self.add_text(text),

            Token::Eof => {
                self.drop_token(&token);
                if self.current_is("script") {
                    self.sink.mark_script_already_started(self.current());
                }
                self.pop_open();
                Flow::Redo(self.saved_mode.take().expect("saved mode"), token)
            },

            Token::Tag(tag) => {
                debug_assert!(tag.kind == EndTag, "start tags cannot reach Text mode");
                let elem = self.pop_open();
                self.mode = self.saved_mode.take().expect("saved mode");
                if &*tag.name == "script" {
                    return Flow::Script(elem);
                }
                Flow::Done
            },

            token => panic!("{token:?} in Text mode"),
        }
    }

    //§ parsing-main-intable
    fn mode_in_table(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Null | Token::Chars(_) => self.begin_table_text(token),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => self.rules(InsertionMode::InBody, token),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "caption") => {
                        self.pop_above(table_scope);
                        self.push_fmt_marker();
                        self.open_elem(tag);
                        self.mode = InsertionMode::InCaption;
                        Flow::Done
                    },

                    (StartTag, "colgroup") => {
                        self.pop_above(table_scope);
                        self.open_elem(tag);
                        self.mode = InsertionMode::InColumnGroup;
                        Flow::Done
                    },

                    (StartTag, "col") => {
                        self.pop_above(table_scope);
                        self.open_phantom("colgroup");
                        Flow::Redo(InsertionMode::InColumnGroup, Token::Tag(tag))
                    },

                    (StartTag, "tbody" | "tfoot" | "thead") => {
                        self.pop_above(table_scope);
                        self.open_elem(tag);
                        self.mode = InsertionMode::InTableBody;
                        Flow::Done
                    },

                    (StartTag, "td" | "th" | "tr") => {
                        self.pop_above(table_scope);
                        self.open_phantom("tbody");
                        Flow::Redo(InsertionMode::InTableBody, Token::Tag(tag))
                    },

                    (StartTag, "table") => {
                        self.drop_token(&tag);
                        if self.has_in_scope(table_scope, "table") {
                            self.pop_through("table");
                            Flow::Redo(self.reset_mode(), Token::Tag(tag))
                        } else {
                            Flow::Done
                        }
                    },

                    (EndTag, "table") => {
                        if self.has_in_scope(table_scope, "table") {
                            self.pop_through("table");
                            self.mode = self.reset_mode();
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (
                        EndTag,
                        "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td"
                        | "tfoot" | "th" | "thead" | "tr",
                    ) => self.drop_token(&tag),

                    (StartTag, "style" | "script" | "template") | (EndTag, "template") => {
                        self.rules(InsertionMode::InHead, Token::Tag(tag))
                    },

                    (StartTag, "input") => {
                        self.drop_token(&tag);
                        if self.hidden_input(&tag) {
                            self.void_elem(tag);
                            Flow::SelfClosingOk
                        } else {
                            self.with_fostering(Token::Tag(tag))
                        }
                    },

                    (StartTag, "form") => {
                        self.drop_token(&tag);
                        if !self.stack_has("template") && self.form.is_none() {
                            self.form = Some(self.void_elem(tag));
                        }
                        Flow::Done
                    },

                    _ => {
                        self.drop_token(&tag);
                        self.with_fostering(Token::Tag(tag))
                    },
                }
            },
        }
    }

    //§ parsing-main-intabletext
    fn mode_in_table_text(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Null => self.drop_token(&token),

            Token::Chars(text) => {
                self.table_text.push(text);
                Flow::Done
            },

            token => {
                let buffered = mem::take(&mut self.table_text);
                if buffered.iter().any(|run| !is_blank(run)) {
                    // Stray text in a table: it all gets foster-parented
                    // in front of the table.
                    self.sink.parse_error(Borrowed("Non-space table text"));
                    for run in buffered {
                        match self.with_fostering(Token::Chars(run)) {
                            Flow::Done => {},
                            _ => panic!("character insertion cannot redirect"),
                        }
                    }
                } else {
                    for run in buffered {
                        self.add_text(run);
                    }
                }
                Flow::Redo(self.saved_mode.take().expect("saved mode"), token)
            },
        }
    }

    //§ parsing-main-incaption
    fn mode_in_caption(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr",
                    )
                    | (EndTag, "table" | "caption") => {
                        if !self.has_in_scope(table_scope, "caption") {
                            return self.drop_token(&tag);
                        }
                        self.generate_implied_ends(implied_end);
                        self.close_named("caption");
                        self.clear_fmt_to_marker();
                        if tag.kind == EndTag && &*name == "caption" {
                            self.mode = InsertionMode::InTable;
                            Flow::Done
                        } else {
                            Flow::Redo(InsertionMode::InTable, Token::Tag(tag))
                        }
                    },

                    (
                        EndTag,
                        "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr",
                    ) => self.drop_token(&tag),

                    _ => self.rules(InsertionMode::InBody, Token::Tag(tag)),
                }
            },

            token => self.rules(InsertionMode::InBody, token),
        }
    }

    //§ parsing-main-incolgroup
    fn mode_in_column_group(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => self.rules(InsertionMode::InBody, token),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (StartTag, "col") => {
                        self.void_elem(tag);
                        Flow::SelfClosingOk
                    },

                    (EndTag, "colgroup") => {
                        if self.current_is("colgroup") {
                            self.pop_open();
                            self.mode = InsertionMode::InTable;
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (EndTag, "col") => self.drop_token(&tag),

                    (StartTag, "template") | (EndTag, "template") => {
                        self.rules(InsertionMode::InHead, Token::Tag(tag))
                    },

                    _ => {
                        if self.current_is("colgroup") {
                            self.pop_open();
                            Flow::Redo(InsertionMode::InTable, Token::Tag(tag))
                        } else {
                            self.drop_token(&tag)
                        }
                    },
                }
            },

            token => {
                if self.current_is("colgroup") {
                    self.pop_open();
                    Flow::Redo(InsertionMode::InTable, token)
                } else {
                    self.drop_token(&token)
                }
            },
        }
    }

    //§ parsing-main-intbody
    fn mode_in_table_body(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "tr") => {
                        self.pop_above(table_body_context);
                        self.open_elem(tag);
                        self.mode = InsertionMode::InRow;
                        Flow::Done
                    },

                    (StartTag, "th" | "td") => {
                        self.drop_token(&tag);
                        self.pop_above(table_body_context);
                        self.open_phantom("tr");
                        Flow::Redo(InsertionMode::InRow, Token::Tag(tag))
                    },

                    (EndTag, "tbody" | "tfoot" | "thead") => {
                        if self.has_in_scope(table_scope, &name) {
                            self.pop_above(table_body_context);
                            self.pop_open();
                            self.mode = InsertionMode::InTable;
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (StartTag, "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead")
                    | (EndTag, "table") => {
                        let any_section = self.in_scope_where(table_scope, |e| {
                            self.elem_in(e, |n| in_html_set(n, &["table", "tbody", "tfoot"]))
                        });
                        if any_section {
                            self.pop_above(table_body_context);
                            self.pop_open();
                            Flow::Redo(InsertionMode::InTable, Token::Tag(tag))
                        } else {
                            self.drop_token(&tag)
                        }
                    },

                    (
                        EndTag,
                        "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr",
                    ) => self.drop_token(&tag),

                    _ => self.rules(InsertionMode::InTable, Token::Tag(tag)),
                }
            },

            token => self.rules(InsertionMode::InTable, token),
        }
    }

    //§ parsing-main-intr
    fn mode_in_row(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "th" | "td") => {
                        self.pop_above(table_row_context);
                        self.open_elem(tag);
                        self.mode = InsertionMode::InCell;
                        self.push_fmt_marker();
                        Flow::Done
                    },

                    (EndTag, "tr") => {
                        if self.has_in_scope(table_scope, "tr") {
                            self.pop_above(table_row_context);
                            let row = self.pop_open();
                            debug_assert!(self.elem_is(&row, "tr"));
                            self.mode = InsertionMode::InTableBody;
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (
                        StartTag,
                        "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr",
                    )
                    | (EndTag, "table") => {
                        if self.has_in_scope(table_scope, "tr") {
                            self.pop_above(table_row_context);
                            let row = self.pop_open();
                            debug_assert!(self.elem_is(&row, "tr"));
                            Flow::Redo(InsertionMode::InTableBody, Token::Tag(tag))
                        } else {
                            self.drop_token(&tag)
                        }
                    },

                    (EndTag, "tbody" | "tfoot" | "thead") => {
                        if !self.has_in_scope(table_scope, &name) {
                            self.drop_token(&tag)
                        } else if self.has_in_scope(table_scope, "tr") {
                            self.pop_above(table_row_context);
                            let row = self.pop_open();
                            debug_assert!(self.elem_is(&row, "tr"));
                            Flow::Redo(InsertionMode::InTableBody, Token::Tag(tag))
                        } else {
                            Flow::Done
                        }
                    },

                    (EndTag, "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th") => {
                        self.drop_token(&tag)
                    },

                    _ => self.rules(InsertionMode::InTable, Token::Tag(tag)),
                }
            },

            token => self.rules(InsertionMode::InTable, token),
        }
    }

    //§ parsing-main-intd
    fn mode_in_cell(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (EndTag, "td" | "th") => {
                        if self.has_in_scope(table_scope, &name) {
                            self.generate_implied_ends(implied_end);
                            self.close_named(&name);
                            self.clear_fmt_to_marker();
                            self.mode = InsertionMode::InRow;
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (
                        StartTag,
                        "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr",
                    ) => {
                        if self.in_scope_where(table_scope, |e| self.elem_in(e, td_th)) {
                            self.close_the_cell();
                            Flow::Redo(InsertionMode::InRow, Token::Tag(tag))
                        } else {
                            self.drop_token(&tag)
                        }
                    },

                    (EndTag, "body" | "caption" | "col" | "colgroup" | "html") => {
                        self.drop_token(&tag)
                    },

                    (EndTag, "table" | "tbody" | "tfoot" | "thead" | "tr") => {
                        if self.has_in_scope(table_scope, &name) {
                            self.close_the_cell();
                            Flow::Redo(InsertionMode::InRow, Token::Tag(tag))
                        } else {
                            self.drop_token(&tag)
                        }
                    },

                    _ => self.rules(InsertionMode::InBody, Token::Tag(tag)),
                }
            },

            token => self.rules(InsertionMode::InBody, token),
        }
    }

    //§ parsing-main-inselect
    fn mode_in_select(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Null => self.drop_token(&token),
            Token::Chars(text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => self.rules(InsertionMode::InBody, token),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (StartTag, "option") => {
                        if self.current_is("option") {
                            self.pop_open();
                        }
                        self.open_elem(tag);
                        Flow::Done
                    },

                    (StartTag, "optgroup") => {
                        if self.current_is("option") {
                            self.pop_open();
                        }
                        if self.current_is("optgroup") {
                            self.pop_open();
                        }
                        self.open_elem(tag);
                        Flow::Done
                    },

                    (StartTag, "hr") => {
                        if self.current_is("option") {
                            self.pop_open();
                        }
                        if self.current_is("optgroup") {
                            self.pop_open();
                        }
                        self.open_elem(tag);
                        self.pop_open();
                        Flow::SelfClosingOk
                    },

                    (EndTag, "optgroup") => {
                        if self.open.len() >= 2
                            && self.current_is("option")
                            && self.elem_is(&self.open[self.open.len() - 2], "optgroup")
                        {
                            self.pop_open();
                        }
                        if self.current_is("optgroup") {
                            self.pop_open();
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (EndTag, "option") => {
                        if self.current_is("option") {
                            self.pop_open();
                        } else {
                            self.drop_token(&tag);
                        }
                        Flow::Done
                    },

                    (StartTag, "select") | (EndTag, "select") => {
                        let in_scope = self.has_in_scope(select_scope, "select");
                        if !in_scope || tag.kind == StartTag {
                            self.drop_token(&tag);
                        }
                        if in_scope {
                            self.pop_through("select");
                            self.mode = self.reset_mode();
                        }
                        Flow::Done
                    },

                    (StartTag, "input" | "keygen" | "textarea") => {
                        self.drop_token(&tag);
                        if self.has_in_scope(select_scope, "select") {
                            self.pop_through("select");
                            Flow::Redo(self.reset_mode(), Token::Tag(tag))
                        } else {
                            Flow::Done
                        }
                    },

                    (StartTag, "script" | "template") | (EndTag, "template") => {
                        self.rules(InsertionMode::InHead, Token::Tag(tag))
                    },

                    _ => self.drop_token(&tag),
                }
            },
        }
    }

    //§ parsing-main-inselectintable
    fn mode_in_select_in_table(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                    ) => {
                        self.drop_token(&tag);
                        self.pop_through("select");
                        Flow::Redo(self.reset_mode(), Token::Tag(tag))
                    },

                    (
                        EndTag,
                        "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                    ) => {
                        self.drop_token(&tag);
                        if self.has_in_scope(table_scope, &name) {
                            self.pop_through("select");
                            Flow::Redo(self.reset_mode(), Token::Tag(tag))
                        } else {
                            Flow::Done
                        }
                    },

                    _ => self.mode_in_select(Token::Tag(tag)),
                }
            },

            token => self.mode_in_select(token),
        }
    }

    //§ parsing-main-intemplate
    fn mode_in_template(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(_) | Token::Comment(_) => self.rules(InsertionMode::InBody, token),

            Token::Eof => {
                if !self.stack_has("template") {
                    return Flow::Done;
                }
                self.drop_token(&Token::Eof);
                self.pop_through("template");
                self.clear_fmt_to_marker();
                self.template_modes.pop();
                self.mode = self.reset_mode();
                Flow::Redo(self.reset_mode(), token)
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title",
                    )
                    | (EndTag, "template") => self.rules(InsertionMode::InHead, Token::Tag(tag)),

                    (StartTag, "caption" | "colgroup" | "tbody" | "tfoot" | "thead") => {
                        self.retarget_template(InsertionMode::InTable, tag)
                    },
                    (StartTag, "col") => {
                        self.retarget_template(InsertionMode::InColumnGroup, tag)
                    },
                    (StartTag, "tr") => self.retarget_template(InsertionMode::InTableBody, tag),
                    (StartTag, "td" | "th") => self.retarget_template(InsertionMode::InRow, tag),
                    (StartTag, _) => self.retarget_template(InsertionMode::InBody, tag),

                    (EndTag, _) => self.drop_token(&tag),
                }
            },

            token => self.drop_token(&token),
        }
    }

    /// Replace the current template insertion mode and reprocess there.
    fn retarget_template(&mut self, mode: InsertionMode, tag: Tag) -> Flow<Handle> {
        self.template_modes.pop();
        self.template_modes.push(mode);
        Flow::Redo(mode, Token::Tag(tag))
    }

    //§ parsing-main-afterbody
    fn mode_after_body(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => {
                self.rules(InsertionMode::InBody, Token::Chars(text))
            },
            Token::Comment(text) => self.add_comment_to_root(text),
            Token::Eof => Flow::Done,

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (EndTag, "html") => {
                        if self.is_fragment() {
                            self.drop_token(&tag);
                        } else {
                            self.mode = InsertionMode::AfterAfterBody;
                        }
                        Flow::Done
                    },

                    _ => {
                        self.drop_token(&tag);
                        Flow::Redo(InsertionMode::InBody, Token::Tag(tag))
                    },
                }
            },

            token => {
                self.drop_token(&token);
                Flow::Redo(InsertionMode::InBody, token)
            },
        }
    }

    //§ parsing-main-inframeset
    fn mode_in_frameset(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),

            eof @ Token::Eof => {
                if self.open.len() != 1 {
                    self.drop_token(&eof);
                }
                Flow::Done
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (StartTag, "frameset") => {
                        self.open_elem(tag);
                        Flow::Done
                    },

                    (EndTag, "frameset") => {
                        if self.open.len() == 1 {
                            self.drop_token(&tag);
                        } else {
                            self.pop_open();
                            if !self.is_fragment() && !self.current_is("frameset") {
                                self.mode = InsertionMode::AfterFrameset;
                            }
                        }
                        Flow::Done
                    },

                    (StartTag, "frame") => {
                        self.void_elem(tag);
                        Flow::SelfClosingOk
                    },

                    (StartTag, "noframes") => self.rules(InsertionMode::InHead, Token::Tag(tag)),

                    _ => self.drop_token(&tag),
                }
            },

            token => self.drop_token(&token),
        }
    }

    //§ parsing-main-afterframeset
    fn mode_after_frameset(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => self.add_text(text),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => Flow::Done,

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),

                    (EndTag, "html") => {
                        self.mode = InsertionMode::AfterAfterFrameset;
                        Flow::Done
                    },

                    (StartTag, "noframes") => self.rules(InsertionMode::InHead, Token::Tag(tag)),

                    _ => self.drop_token(&tag),
                }
            },

            token => self.drop_token(&token),
        }
    }

    //§ the-after-after-body-insertion-mode
    fn mode_after_after_body(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => {
                self.rules(InsertionMode::InBody, Token::Chars(text))
            },
            Token::Comment(text) => self.add_comment_to_doc(text),
            Token::Eof => Flow::Done,

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),
                    _ => {
                        self.drop_token(&tag);
                        Flow::Redo(InsertionMode::InBody, Token::Tag(tag))
                    },
                }
            },

            token => {
                self.drop_token(&token);
                Flow::Redo(InsertionMode::InBody, token)
            },
        }
    }

    //§ the-after-after-frameset-insertion-mode
    fn mode_after_after_frameset(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Chars(text) if is_blank(&text) => {
                self.rules(InsertionMode::InBody, Token::Chars(text))
            },
            Token::Comment(text) => self.add_comment_to_doc(text),
            Token::Eof => Flow::Done,

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.rules(InsertionMode::InBody, Token::Tag(tag)),
                    (StartTag, "noframes") => self.rules(InsertionMode::InHead, Token::Tag(tag)),
                    _ => self.drop_token(&tag),
                }
            },

            token => self.drop_token(&token),
        }
    }
    //§ END

    //§ parsing-main-inforeign
    pub(super) fn foreign_rules(&mut self, token: Token) -> Flow<Handle> {
        match token {
            Token::Null => {
                self.drop_token(&token);
                self.add_text("\u{fffd}".into())
            },

            Token::Chars(text) => {
                if !is_blank(&text) {
                    self.frameset_ok = false;
                }
                self.add_text(text)
            },

            Token::Comment(text) => self.add_comment(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, local) if FOREIGN_BREAKOUT.contains(&local) => {
                        self.foreign_breakout(tag)
                    },
                    (EndTag, "br" | "p") => self.foreign_breakout(tag),

                    (StartTag, "font") => {
                        let styled = tag.attrs.iter().any(|attr| {
                            attr.name.ns == ns!()
                                && matches!(&*attr.name.local, "color" | "face" | "size")
                        });
                        if styled {
                            self.foreign_breakout(tag)
                        } else {
                            self.foreign_start(tag)
                        }
                    },

                    (StartTag, _) => self.foreign_start(tag),

                    (EndTag, _) => {
                        // Walk the stack for a case-insensitive name
                        // match, but fall back to the HTML rules at the
                        // first HTML element that isn't the first node
                        // examined.
                        let mut at = self.open.len() - 1;
                        let mut first = true;
                        loop {
                            if at == 0 {
                                return Flow::Done;
                            }
                            let (is_html, name_matches) = {
                                let open_name = self.sink.elem_name(&self.open[at]);
                                (
                                    *open_name.ns == ns!(html),
                                    open_name.local.eq_ignore_ascii_case(&tag.name),
                                )
                            };
                            if !first && is_html {
                                return self.rules(self.mode, Token::Tag(tag));
                            }
                            if name_matches {
                                self.open.truncate(at);
                                return Flow::Done;
                            }
                            if first {
                                self.drop_token(&tag);
                                first = false;
                            }
                            at -= 1;
                        }
                    },
                }
            },

            Token::Eof => unreachable!("EOF is never foreign"),
        }
    }
    //§ END
}
