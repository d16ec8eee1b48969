// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A browser-grade WHATWG HTML5 parser.
//!
//! The two central pieces are the [tokenizer](tokenizer) and the
//! [tree builder](tree_builder), which together turn a (possibly
//! malformed) character stream into a DOM plus a list of parse errors,
//! the same way a conforming browser would. The DOM representation is
//! pluggable through the [`TreeSink`](interface::TreeSink) trait; a
//! reference-counted implementation ships in [`rcdom`].
//!
//! Most users want [`parse_document`] or [`parse_fragment`]:
//!
//! ```ignore
//! use weft::tendril::TendrilSink;
//! use weft::rcdom::RcDom;
//!
//! let dom = weft::parse_document(RcDom::default(), Default::default())
//!     .one("<title>hi</title><p>hello");
//! ```

include!(concat!(env!("OUT_DIR"), "/generated.rs"));

pub mod data;
pub mod driver;
pub mod input;
pub mod interface;
pub mod rcdom;
pub mod serialize;
pub mod tokenizer;
pub mod tree_builder;
pub(crate) mod util;

pub use crate::driver::{parse_document, parse_fragment, parse_fragment_for_element};
pub use crate::driver::{ParseOpts, Parser};
pub use crate::input::InputBuffer;
pub use crate::interface::{Attribute, ExpandedName, QualName};

/// Re-export the tendril crate so downstream code can name its types.
pub use tendril;
