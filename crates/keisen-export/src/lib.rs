//! keisen-export: serialize conversion results into SVG documents.
//!
//! The emitter is a pure function from a
//! [`Conversion`](keisen_pipeline::Conversion) to a `String`;
//! [`convert_to_svg`] composes it with the pipeline for callers that
//! want the full invocation contract (document plus structured data)
//! in one call.

mod svg;

pub use svg::{DocumentMetadata, SvgConversion, convert_to_svg, to_svg};
