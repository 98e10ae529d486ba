//! Helpers shared by the unit tests of this crate.

use stackpatch_core::{Document, Format};
use stackpatch_parser::{Loader, LoaderConfig, Writer, WriterConfig};

pub(crate) fn load_yaml(source: &str) -> Document {
    load(source, Format::Yaml)
}

pub(crate) fn load_json(source: &str) -> Document {
    load(source, Format::Json)
}

fn load(source: &str, format: Format) -> Document {
    match Loader::new(LoaderConfig::default()).load(source, format) {
        Ok(doc) => doc,
        Err(err) => panic!("Expected loading to succeed, but got error: {err}"),
    }
}

pub(crate) fn write_yaml(doc: &Document) -> String {
    Writer::new(WriterConfig::default())
        .write(doc)
        .expect("writing does not fail")
}

/// Shorthand for a resource property lookup.
pub(crate) fn resource_str<'a>(doc: &'a Document, path: &[&str]) -> Option<&'a str> {
    doc.resources()
        .and_then(|resources| {
            let (name, rest) = path.split_first()?;
            resources.get(name)?.get_path(rest)
        })
        .and_then(|node| node.as_scalar())
        .map(|scalar| scalar.value())
}
