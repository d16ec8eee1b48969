// Copyright 2025 The weft Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Build-time code generation: the interned name tables and the named
//! character reference map.

use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;

static NAMESPACES: &[(&str, &str)] = &[
    ("", ""),
    ("*", "*"),
    ("html", "http://www.w3.org/1999/xhtml"),
    ("xml", "http://www.w3.org/XML/1998/namespace"),
    ("xmlns", "http://www.w3.org/2000/xmlns/"),
    ("xlink", "http://www.w3.org/1999/xlink"),
    ("svg", "http://www.w3.org/2000/svg"),
    ("mathml", "http://www.w3.org/1998/Math/MathML"),
];

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = env::var("OUT_DIR").unwrap();

    println!("cargo:rerun-if-changed=local_names.txt");
    println!("cargo:rerun-if-changed=data/entities.json");

    named_entities_to_phf(
        &Path::new(&manifest_dir).join("data").join("entities.json"),
        &Path::new(&out_dir).join("named_entities.rs"),
    );

    let generated = Path::new(&out_dir).join("generated.rs");
    let mut generated = BufWriter::new(File::create(generated).unwrap());

    // String cache for local (tag and attribute) names.
    let local_names = Path::new(&manifest_dir).join("local_names.txt");
    let mut local_names_atom = string_cache_codegen::AtomType::new("LocalName", "local_name!");
    for line in BufReader::new(File::open(local_names).unwrap()).lines() {
        let local_name = line.unwrap();
        local_names_atom.atom(&local_name);
        local_names_atom.atom(&local_name.to_ascii_lowercase());
    }
    local_names_atom
        .with_macro_doc("Takes a local name as a string and returns its key in the string cache.")
        .write_to(&mut generated)
        .unwrap();

    // String cache for namespace prefixes.
    string_cache_codegen::AtomType::new("Prefix", "namespace_prefix!")
        .with_macro_doc("Takes a namespace prefix string and returns its key in a string cache.")
        .atoms(NAMESPACES.iter().map(|&(prefix, _url)| prefix))
        .write_to(&mut generated)
        .unwrap();

    // String cache for namespace urls.
    string_cache_codegen::AtomType::new("Namespace", "namespace_url!")
        .with_macro_doc("Takes a namespace url string and returns its key in a string cache.")
        .atoms(NAMESPACES.iter().map(|&(_prefix, url)| url))
        .write_to(&mut generated)
        .unwrap();

    writeln!(
        generated,
        "/// Maps the input of `namespace_prefix!` to the output of `namespace_url!`."
    )
    .unwrap();
    writeln!(generated, "#[macro_export] macro_rules! ns {{").unwrap();
    for &(prefix, url) in NAMESPACES {
        writeln!(
            generated,
            "({}) => {{ namespace_url!({:?}) }};",
            prefix, url
        )
        .unwrap();
    }
    writeln!(generated, "}}").unwrap();
}

fn named_entities_to_phf(from: &Path, to: &Path) {
    // A struct matching the entries in entities.json.
    #[derive(Deserialize, Debug)]
    struct EntityDef {
        codepoints: Vec<u32>,
    }

    let json: HashMap<String, EntityDef> =
        serde_json::from_reader(File::open(from).unwrap()).unwrap();
    let mut entities: HashMap<&str, (u32, u32)> = json
        .iter()
        .map(|(name, def)| {
            assert!(name.starts_with('&'));
            assert!(!def.codepoints.is_empty() && def.codepoints.len() <= 2);
            (
                &name[1..],
                (def.codepoints[0], *def.codepoints.get(1).unwrap_or(&0)),
            )
        })
        .collect();

    // Add every missing prefix of those keys, mapping to NULL characters.
    // The tokenizer relies on this to do incremental longest-match.
    for key in entities.keys().cloned().collect::<Vec<_>>() {
        for n in 1..key.len() {
            entities.entry(&key[..n]).or_insert((0, 0));
        }
    }
    entities.insert("", (0, 0));

    let mut phf_map = phf_codegen::Map::new();
    for (key, value) in entities {
        phf_map.entry(key, &format!("{:?}", value));
    }

    let mut file = BufWriter::new(File::create(to).unwrap());
    writeln!(
        file,
        "/// A map of entity names to their codepoints. The second codepoint is\n\
         /// 0 for entities that expand to a single codepoint. Keys have their\n\
         /// leading '&' removed; keys that are proper prefixes of a longer\n\
         /// entity map to (0, 0)."
    )
    .unwrap();
    writeln!(
        file,
        "pub static NAMED_ENTITIES: phf::Map<&'static str, (u32, u32)> = {};",
        phf_map.build()
    )
    .unwrap();
}
