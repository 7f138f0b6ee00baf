// ==============================================================================
// svg.rs — SVG DOCUMENT -> PATH DATA
// ------------------------------------------------------------------------------
// Every <path> element in the document contributes its "d" attribute, in
// document order. Group transforms and styling are ignored: level art is
// drawn in document coordinates.
// ==============================================================================

use log::debug;

use super::path::{parse_path_data, Subpath};
use crate::error::{Error, Result};

pub fn path_elements(text: &str, source_name: &str) -> Result<Vec<Subpath>> {
    let doc = roxmltree::Document::parse(text).map_err(|e| {
        let pos = e.pos();
        Error::parse(source_name, None, format!("line {} column {}: {}", pos.row, pos.col, e))
    })?;

    let mut subpaths = Vec::new();
    let mut elements = 0usize;
    for node in doc.descendants().filter(|n| n.is_element() && n.tag_name().name() == "path") {
        let Some(d) = node.attribute("d") else {
            continue;
        };
        elements += 1;
        subpaths.extend(parse_path_data(d, source_name)?);
    }

    if elements == 0 {
        return Err(Error::config("geometry", format!("{source_name} contains no <path> elements")));
    }
    debug!("🗺️ {source_name}: {elements} path element(s), {} subpath(s)", subpaths.len());
    Ok(subpaths)
}
