//! Source adapters: one normalization adapter per geodata provider shape,
//! all exposed through the `RawLotSource` / `BusinessSource` traits.

pub mod osm;

pub use osm::{OsmBusinessSource, OsmLotSource};
