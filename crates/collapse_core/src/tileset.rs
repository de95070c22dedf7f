//! Tileset XML loader.
//!
//! ```xml
//! <tileset>
//!     <tiles>
//!         <tile name="Grass" weight="2.0"/>
//!         <tile name="Road"/>
//!     </tiles>
//!     <neighbors>
//!         <neighbor left="Grass" right="Road"/>
//!         <neighbor top="Grass" bottom="Road"/>
//!     </neighbors>
//! </tileset>
//! ```
//!
//! `left`/`right` allows the right tile directly right of the left tile.
//! `top`/`bottom` allows the bottom tile directly below the top tile.
//! Every neighbor entry is also allowed in reverse.

use crate::ruleset::{Direction, Ruleset, RulesetBuilder, RulesetError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// File not found or cannot be read
    FileNotFound(String),
    /// XML parsing error
    XmlError(String),
    MissingAttribute {
        element: String,
        attribute: String,
    },
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        reason: String,
    },
    /// Neighbor entry without a left/right or top/bottom pair
    IncompleteNeighbor,
    UnknownTile(String),
    DuplicateTile(String),
    NoTiles,
    Ruleset(RulesetError),
}

impl From<RulesetError> for LoadError {
    fn from(e: RulesetError) -> Self {
        LoadError::Ruleset(e)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FileNotFound(path) => write!(f, "file not found: {}", path),
            LoadError::XmlError(msg) => write!(f, "XML error: {}", msg),
            LoadError::MissingAttribute { element, attribute } => {
                write!(f, "missing attribute '{}' in <{}>", attribute, element)
            }
            LoadError::InvalidAttribute {
                element,
                attribute,
                value,
                reason,
            } => write!(
                f,
                "invalid value '{}' for attribute '{}' in <{}>: {}",
                value, attribute, element, reason
            ),
            LoadError::IncompleteNeighbor => {
                write!(f, "<neighbor> needs left/right or top/bottom")
            }
            LoadError::UnknownTile(name) => write!(f, "unknown tile: {}", name),
            LoadError::DuplicateTile(name) => write!(f, "duplicate tile: {}", name),
            LoadError::NoTiles => write!(f, "tileset has no tiles"),
            LoadError::Ruleset(e) => write!(f, "rule error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq)]
struct Neighbor {
    first: String,
    dir: Direction,
    second: String,
}

/// Load a tileset XML file.
pub fn load_tileset(path: &Path) -> Result<Ruleset, LoadError> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| LoadError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    parse_tileset(&xml)
}

/// Parse tileset XML into a `Ruleset`.
pub fn parse_tileset(xml: &str) -> Result<Ruleset, LoadError> {
    let (tiles, neighbors) = parse_tileset_xml(xml)?;
    if tiles.is_empty() {
        return Err(LoadError::NoTiles);
    }

    let mut builder = RulesetBuilder::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (name, weight) in tiles {
        if index.contains_key(&name) {
            return Err(LoadError::DuplicateTile(name));
        }
        let i = builder.add_tile(name.clone(), weight);
        index.insert(name, i);
    }

    for neighbor in &neighbors {
        let lookup = |attr: &str| {
            let name = get_tile_name(attr);
            index
                .get(name)
                .copied()
                .ok_or_else(|| LoadError::UnknownTile(name.to_string()))
        };
        let a = lookup(&neighbor.first)?;
        let b = lookup(&neighbor.second)?;
        builder.allow(a, neighbor.dir, b);
    }

    Ok(builder.build()?)
}

fn parse_tileset_xml(xml: &str) -> Result<(Vec<(String, f64)>, Vec<Neighbor>), LoadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tiles = Vec::new();
    let mut neighbors = Vec::new();
    let mut in_tiles = false;
    let mut in_neighbors = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name_bytes = e.name();
                let name = std::str::from_utf8(name_bytes.as_ref()).unwrap_or("");
                match name {
                    "tiles" => in_tiles = true,
                    "neighbors" => in_neighbors = true,
                    "tile" if in_tiles => tiles.push(parse_tile_element(e)?),
                    "neighbor" if in_neighbors => neighbors.push(parse_neighbor_element(e)?),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name_bytes = e.name();
                let name = std::str::from_utf8(name_bytes.as_ref()).unwrap_or("");
                match name {
                    "tiles" => in_tiles = false,
                    "neighbors" => in_neighbors = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LoadError::XmlError(e.to_string())),
            _ => {}
        }
    }

    Ok((tiles, neighbors))
}

fn attributes(e: &BytesStart, element: &str) -> Result<HashMap<String, String>, LoadError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| LoadError::XmlError(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| LoadError::XmlError(err.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| LoadError::InvalidAttribute {
                element: element.to_string(),
                attribute: key.clone(),
                value: String::from_utf8_lossy(&attr.value).into_owned(),
                reason: err.to_string(),
            })?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_tile_element(e: &BytesStart) -> Result<(String, f64), LoadError> {
    let attrs = attributes(e, "tile")?;

    let name = attrs
        .get("name")
        .cloned()
        .ok_or_else(|| LoadError::MissingAttribute {
            element: "tile".to_string(),
            attribute: "name".to_string(),
        })?;
    // Neighbor references drop everything up to the last space.
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(LoadError::InvalidAttribute {
            element: "tile".to_string(),
            attribute: "name".to_string(),
            value: name,
            reason: "tile names must be non-empty and contain no whitespace".to_string(),
        });
    }

    let weight = match attrs.get("weight") {
        None => 1.0,
        Some(value) => value.parse().map_err(|_| LoadError::InvalidAttribute {
            element: "tile".to_string(),
            attribute: "weight".to_string(),
            value: value.clone(),
            reason: "expected a number".to_string(),
        })?,
    };

    Ok((name, weight))
}

fn parse_neighbor_element(e: &BytesStart) -> Result<Neighbor, LoadError> {
    let attrs = attributes(e, "neighbor")?;

    let pair = |a: &str, b: &str| match (attrs.get(a), attrs.get(b)) {
        (Some(x), Some(y)) => Some((x.clone(), y.clone())),
        _ => None,
    };

    if let Some((left, right)) = pair("left", "right") {
        Ok(Neighbor {
            first: left,
            dir: Direction::Right,
            second: right,
        })
    } else if let Some((top, bottom)) = pair("top", "bottom") {
        Ok(Neighbor {
            first: top,
            dir: Direction::Down,
            second: bottom,
        })
    } else {
        Err(LoadError::IncompleteNeighbor)
    }
}

/// Strip a rotation prefix like "z " or "zz " from a tile reference.
fn get_tile_name(attr: &str) -> &str {
    match attr.rfind(' ') {
        Some(pos) => &attr[pos + 1..],
        None => attr,
    }
}
