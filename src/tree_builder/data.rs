// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fixed tables the tree builder consults: element classes, scope
//! terminators, foreign-content name adjustments, and the DOCTYPE
//! quirks lists. All values are the standard's, verbatim.

use tendril::StrTendril;

use crate::tokenizer::Doctype;
use crate::util::{ascii_eq_ignore_case, ascii_starts_with_ignore_case};
use crate::{ExpandedName, LocalName, Prefix, QualName};
use crate::interface::{LimitedQuirks, NoQuirks, Quirks, QuirksMode};

/// Is `name` an HTML element with a local name in `set`?
pub(crate) fn in_html_set(name: ExpandedName, set: &[&str]) -> bool {
    *name.ns == ns!(html) && set.contains(&&**name.local)
}

//§ the-stack-of-open-elements

/// The always-terminators of the default scope, HTML part.
static DEFAULT_SCOPE: &[&str] = &[
    "applet", "caption", "html", "table", "td", "th", "marquee", "object", "template",
];

static LIST_SCOPE_EXTRAS: &[&str] = &["ol", "ul"];

static TABLE_SCOPE: &[&str] = &["html", "table", "template"];

/// <https://html.spec.whatwg.org/multipage/#has-an-element-in-scope>
pub(crate) fn default_scope(name: ExpandedName) -> bool {
    in_html_set(name, DEFAULT_SCOPE)
        || mathml_text_integration_point(name)
        || svg_html_integration_point(name)
}

/// <https://html.spec.whatwg.org/multipage/#has-an-element-in-list-item-scope>
pub(crate) fn list_item_scope(name: ExpandedName) -> bool {
    default_scope(name) || in_html_set(name, LIST_SCOPE_EXTRAS)
}

/// <https://html.spec.whatwg.org/multipage/#has-an-element-in-button-scope>
pub(crate) fn button_scope(name: ExpandedName) -> bool {
    default_scope(name) || in_html_set(name, &["button"])
}

/// <https://html.spec.whatwg.org/multipage/#has-an-element-in-table-scope>
pub(crate) fn table_scope(name: ExpandedName) -> bool {
    in_html_set(name, TABLE_SCOPE)
}

/// The select scope is inverted: everything terminates it except
/// `optgroup` and `option`.
pub(crate) fn select_scope(name: ExpandedName) -> bool {
    !in_html_set(name, &["optgroup", "option"])
}

/// Elements cleared off the stack before table-section tags.
pub(crate) fn table_body_context(name: ExpandedName) -> bool {
    in_html_set(name, &["tbody", "tfoot", "thead", "template", "html"])
}

/// Elements cleared off the stack before row tags.
pub(crate) fn table_row_context(name: ExpandedName) -> bool {
    in_html_set(name, &["tr", "template", "html"])
}

pub(crate) fn td_th(name: ExpandedName) -> bool {
    in_html_set(name, &["td", "th"])
}

/// <https://html.spec.whatwg.org/multipage/#generate-implied-end-tags>
static IMPLIED_END: &[&str] = &[
    "dd", "dt", "li", "option", "optgroup", "p", "rb", "rp", "rt", "rtc",
];

pub(crate) fn implied_end(name: ExpandedName) -> bool {
    in_html_set(name, IMPLIED_END)
}

/// The "thoroughly" variant used when a template closes.
pub(crate) fn implied_end_thorough(name: ExpandedName) -> bool {
    implied_end(name)
        || in_html_set(
            name,
            &["caption", "colgroup", "tbody", "td", "tfoot", "th", "thead", "tr"],
        )
}

pub(crate) fn heading(name: ExpandedName) -> bool {
    in_html_set(name, &["h1", "h2", "h3", "h4", "h5", "h6"])
}

/// <https://html.spec.whatwg.org/multipage/#special>
static SPECIAL_HTML: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "basefont", "bgsound",
    "blockquote", "body", "br", "button", "caption", "center", "col", "colgroup", "dd",
    "details", "dir", "div", "dl", "dt", "embed", "fieldset", "figcaption", "figure",
    "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hgroup", "hr", "html", "iframe", "img", "input", "keygen", "li", "link",
    "listing", "main", "marquee", "menu", "meta", "nav", "noembed", "noframes", "noscript",
    "object", "ol", "p", "param", "plaintext", "pre", "script", "search", "section",
    "select", "source", "style", "summary", "table", "tbody", "td", "template", "textarea",
    "tfoot", "th", "thead", "title", "tr", "track", "ul", "wbr", "xmp",
];

pub(crate) fn special(name: ExpandedName) -> bool {
    in_html_set(name, SPECIAL_HTML)
        || (*name.ns == ns!(mathml)
            && matches!(
                &**name.local,
                "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
            ))
        || svg_html_integration_point(name)
}

/// <https://html.spec.whatwg.org/multipage/#mathml-text-integration-point>
pub(crate) fn mathml_text_integration_point(name: ExpandedName) -> bool {
    *name.ns == ns!(mathml) && matches!(&**name.local, "mi" | "mo" | "mn" | "ms" | "mtext")
}

/// The SVG half of <https://html.spec.whatwg.org/multipage/#html-integration-point>;
/// the `annotation-xml` half depends on attributes and lives with the
/// sink.
pub(crate) fn svg_html_integration_point(name: ExpandedName) -> bool {
    *name.ns == ns!(svg) && matches!(&**name.local, "foreignObject" | "desc" | "title")
}

/// Start tags that break out of foreign content (`<font>` only when it
/// has a color/face/size attribute, which the caller checks).
pub(crate) static FOREIGN_BREAKOUT: &[&str] = &[
    "b", "big", "blockquote", "body", "br", "center", "code", "dd", "div", "dl", "dt",
    "em", "embed", "h1", "h2", "h3", "h4", "h5", "h6", "head", "hr", "i", "img", "li",
    "listing", "menu", "meta", "nobr", "ol", "p", "pre", "ruby", "s", "small", "span",
    "strong", "strike", "sub", "sup", "table", "tt", "u", "ul", "var",
];

//§ creating-and-inserting-nodes

/// SVG tag names whose canonical form is mixed-case. Keys are the
/// lowercased form the tokenizer produces.
static SVG_TAG_CASE: &[(&str, &str)] = &[
    ("altglyph", "altGlyph"),
    ("altglyphdef", "altGlyphDef"),
    ("altglyphitem", "altGlyphItem"),
    ("animatecolor", "animateColor"),
    ("animatemotion", "animateMotion"),
    ("animatetransform", "animateTransform"),
    ("clippath", "clipPath"),
    ("feblend", "feBlend"),
    ("fecolormatrix", "feColorMatrix"),
    ("fecomponenttransfer", "feComponentTransfer"),
    ("fecomposite", "feComposite"),
    ("feconvolvematrix", "feConvolveMatrix"),
    ("fediffuselighting", "feDiffuseLighting"),
    ("fedisplacementmap", "feDisplacementMap"),
    ("fedistantlight", "feDistantLight"),
    ("fedropshadow", "feDropShadow"),
    ("feflood", "feFlood"),
    ("fefunca", "feFuncA"),
    ("fefuncb", "feFuncB"),
    ("fefuncg", "feFuncG"),
    ("fefuncr", "feFuncR"),
    ("fegaussianblur", "feGaussianBlur"),
    ("feimage", "feImage"),
    ("femerge", "feMerge"),
    ("femergenode", "feMergeNode"),
    ("femorphology", "feMorphology"),
    ("feoffset", "feOffset"),
    ("fepointlight", "fePointLight"),
    ("fespecularlighting", "feSpecularLighting"),
    ("fespotlight", "feSpotLight"),
    ("fetile", "feTile"),
    ("feturbulence", "feTurbulence"),
    ("foreignobject", "foreignObject"),
    ("glyphref", "glyphRef"),
    ("lineargradient", "linearGradient"),
    ("radialgradient", "radialGradient"),
    ("textpath", "textPath"),
];

/// SVG attribute names whose canonical form is mixed-case.
static SVG_ATTR_CASE: &[(&str, &str)] = &[
    ("attributename", "attributeName"),
    ("attributetype", "attributeType"),
    ("basefrequency", "baseFrequency"),
    ("baseprofile", "baseProfile"),
    ("calcmode", "calcMode"),
    ("clippathunits", "clipPathUnits"),
    ("diffuseconstant", "diffuseConstant"),
    ("edgemode", "edgeMode"),
    ("filterunits", "filterUnits"),
    ("glyphref", "glyphRef"),
    ("gradienttransform", "gradientTransform"),
    ("gradientunits", "gradientUnits"),
    ("kernelmatrix", "kernelMatrix"),
    ("kernelunitlength", "kernelUnitLength"),
    ("keypoints", "keyPoints"),
    ("keysplines", "keySplines"),
    ("keytimes", "keyTimes"),
    ("lengthadjust", "lengthAdjust"),
    ("limitingconeangle", "limitingConeAngle"),
    ("markerheight", "markerHeight"),
    ("markerunits", "markerUnits"),
    ("markerwidth", "markerWidth"),
    ("maskcontentunits", "maskContentUnits"),
    ("maskunits", "maskUnits"),
    ("numoctaves", "numOctaves"),
    ("pathlength", "pathLength"),
    ("patterncontentunits", "patternContentUnits"),
    ("patterntransform", "patternTransform"),
    ("patternunits", "patternUnits"),
    ("pointsatx", "pointsAtX"),
    ("pointsaty", "pointsAtY"),
    ("pointsatz", "pointsAtZ"),
    ("preservealpha", "preserveAlpha"),
    ("preserveaspectratio", "preserveAspectRatio"),
    ("primitiveunits", "primitiveUnits"),
    ("refx", "refX"),
    ("refy", "refY"),
    ("repeatcount", "repeatCount"),
    ("repeatdur", "repeatDur"),
    ("requiredextensions", "requiredExtensions"),
    ("requiredfeatures", "requiredFeatures"),
    ("specularconstant", "specularConstant"),
    ("specularexponent", "specularExponent"),
    ("spreadmethod", "spreadMethod"),
    ("startoffset", "startOffset"),
    ("stddeviation", "stdDeviation"),
    ("stitchtiles", "stitchTiles"),
    ("surfacescale", "surfaceScale"),
    ("systemlanguage", "systemLanguage"),
    ("tablevalues", "tableValues"),
    ("targetx", "targetX"),
    ("targety", "targetY"),
    ("textlength", "textLength"),
    ("viewbox", "viewBox"),
    ("viewtarget", "viewTarget"),
    ("xchannelselector", "xChannelSelector"),
    ("ychannelselector", "yChannelSelector"),
    ("zoomandpan", "zoomAndPan"),
];

fn table_get(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|&&(from, _)| from == key)
        .map(|&(_, to)| to)
}

/// Canonical mixed-case form of an SVG tag name, if it has one.
pub(crate) fn adjusted_svg_tag_name(lower: &str) -> Option<&'static str> {
    table_get(SVG_TAG_CASE, lower)
}

/// Canonical mixed-case form of an SVG attribute name, if it has one.
pub(crate) fn adjusted_svg_attr_name(lower: &str) -> Option<&'static str> {
    table_get(SVG_ATTR_CASE, lower)
}

/// The single MathML attribute adjustment.
pub(crate) fn adjusted_mathml_attr_name(lower: &str) -> Option<&'static str> {
    match lower {
        "definitionurl" => Some("definitionURL"),
        _ => None,
    }
}

/// The xlink/xml/xmlns attributes that get a real namespace on foreign
/// elements.
///
/// <https://html.spec.whatwg.org/multipage/#adjust-foreign-attributes>
pub(crate) fn adjusted_foreign_attr(name: &str) -> Option<QualName> {
    let (prefix, ns, local) = match name {
        "xlink:actuate" => ("xlink", ns!(xlink), "actuate"),
        "xlink:arcrole" => ("xlink", ns!(xlink), "arcrole"),
        "xlink:href" => ("xlink", ns!(xlink), "href"),
        "xlink:role" => ("xlink", ns!(xlink), "role"),
        "xlink:show" => ("xlink", ns!(xlink), "show"),
        "xlink:title" => ("xlink", ns!(xlink), "title"),
        "xlink:type" => ("xlink", ns!(xlink), "type"),
        "xml:lang" => ("xml", ns!(xml), "lang"),
        "xml:space" => ("xml", ns!(xml), "space"),
        "xmlns" => ("", ns!(xmlns), "xmlns"),
        "xmlns:xlink" => ("xmlns", ns!(xmlns), "xlink"),
        _ => return None,
    };
    Some(QualName::new(
        Some(Prefix::from(prefix)),
        ns,
        LocalName::from(local),
    ))
}

//§ the-initial-insertion-mode

// All lowercase, for ASCII-case-insensitive matching.
static QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3c//dtd html 3.0 mathml 1.0//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

static QUIRKY_PUBLIC_EXACT: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3c/dtd html 4.0 transitional/en",
    "html",
];

static QUIRKY_SYSTEM_EXACT: &[&str] =
    &["http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd"];

static LIMITED_QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3c//dtd xhtml 1.0 frameset//",
    "-//w3c//dtd xhtml 1.0 transitional//",
];

static HTML4_PUBLIC_PREFIXES: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

fn any_exact(set: &[&str], id: &str) -> bool {
    set.iter().any(|&entry| ascii_eq_ignore_case(entry, id))
}

fn any_prefix(set: &[&str], id: &str) -> bool {
    set.iter()
        .any(|&entry| ascii_starts_with_ignore_case(id, entry))
}

fn id_is(id: &Option<StrTendril>, expected: &str) -> bool {
    match id {
        Some(id) => &**id == expected,
        None => expected.is_empty(),
    }
}

/// Is this one of the handful of DOCTYPEs the standard does not flag as
/// an error?
fn acceptable_doctype(doctype: &Doctype) -> bool {
    if !id_is(&doctype.name, "html") {
        return false;
    }
    let system = &doctype.system_id;
    match &doctype.public_id {
        None => system.is_none() || id_is(system, "about:legacy-compat"),
        Some(public) => match &**public {
            "-//W3C//DTD HTML 4.0//EN" => {
                system.is_none() || id_is(system, "http://www.w3.org/TR/REC-html40/strict.dtd")
            },
            "-//W3C//DTD HTML 4.01//EN" => {
                system.is_none() || id_is(system, "http://www.w3.org/TR/html4/strict.dtd")
            },
            "-//W3C//DTD XHTML 1.0 Strict//EN" => {
                id_is(system, "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd")
            },
            "-//W3C//DTD XHTML 1.1//EN" => {
                id_is(system, "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd")
            },
            _ => false,
        },
    }
}

/// Whether this DOCTYPE is a parse error, and which quirks mode it
/// selects.
///
/// <https://html.spec.whatwg.org/multipage/#the-initial-insertion-mode>
pub(crate) fn doctype_error_and_quirks(
    doctype: &Doctype,
    iframe_srcdoc: bool,
) -> (bool, QuirksMode) {
    let error = !acceptable_doctype(doctype);

    let public = doctype.public_id.as_deref();
    let system = doctype.system_id.as_deref();

    let quirks = if doctype.force_quirks || !id_is(&doctype.name, "html") {
        Quirks
    } else if iframe_srcdoc {
        NoQuirks
    } else if public.is_some_and(|p| any_exact(QUIRKY_PUBLIC_EXACT, p))
        || system.is_some_and(|s| any_exact(QUIRKY_SYSTEM_EXACT, s))
        || public.is_some_and(|p| any_prefix(QUIRKY_PUBLIC_PREFIXES, p))
    {
        Quirks
    } else if public.is_some_and(|p| any_prefix(LIMITED_QUIRKY_PUBLIC_PREFIXES, p)) {
        LimitedQuirks
    } else if public.is_some_and(|p| any_prefix(HTML4_PUBLIC_PREFIXES, p)) {
        if system.is_some() {
            LimitedQuirks
        } else {
            Quirks
        }
    } else {
        NoQuirks
    };

    (error, quirks)
}

#[cfg(test)]
mod test {
    use tendril::StrTendril;

    use super::doctype_error_and_quirks;
    use crate::interface::{LimitedQuirks, NoQuirks, Quirks};
    use crate::tokenizer::Doctype;

    fn doctype(name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Doctype {
        Doctype {
            name: Some(StrTendril::from_slice(name)),
            public_id: public_id.map(StrTendril::from_slice),
            system_id: system_id.map(StrTendril::from_slice),
            force_quirks: false,
        }
    }

    #[test]
    fn modern_doctype_is_no_quirks() {
        let (err, quirks) = doctype_error_and_quirks(&doctype("html", None, None), false);
        assert!(!err);
        assert_eq!(quirks, NoQuirks);
    }

    #[test]
    fn force_quirks_wins() {
        let mut dt = doctype("html", None, None);
        dt.force_quirks = true;
        assert_eq!(doctype_error_and_quirks(&dt, false).1, Quirks);
    }

    #[test]
    fn non_html_name_is_quirky() {
        assert_eq!(
            doctype_error_and_quirks(&doctype("foo", None, None), false).1,
            Quirks
        );
    }

    #[test]
    fn srcdoc_overrides_quirky_name() {
        assert_eq!(
            doctype_error_and_quirks(&doctype("foo", None, None), true).1,
            NoQuirks
        );
    }

    #[test]
    fn quirky_public_prefix_matches_case_insensitively() {
        let dt = doctype("html", Some("-//IETF//DTD HTML 2.0//EN"), None);
        assert_eq!(doctype_error_and_quirks(&dt, false).1, Quirks);
    }

    #[test]
    fn html4_transitional_depends_on_system_id() {
        let public = Some("-//W3C//DTD HTML 4.01 Transitional//EN");
        let bare = doctype("html", public, None);
        let with = doctype("html", public, Some("http://www.w3.org/TR/html4/loose.dtd"));
        assert_eq!(doctype_error_and_quirks(&bare, false).1, Quirks);
        assert_eq!(doctype_error_and_quirks(&with, false).1, LimitedQuirks);
    }

    #[test]
    fn xhtml_transitional_is_limited_quirks() {
        let dt = doctype(
            "html",
            Some("-//W3C//DTD XHTML 1.0 Transitional//EN"),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd"),
        );
        assert_eq!(doctype_error_and_quirks(&dt, false).1, LimitedQuirks);
    }
}
