//! Opens the compressed catalog, streams it through decompression, markup
//! parsing and record building, then finalizes and persists the result.
//!
//! A run is all-or-nothing: any failure before the final rename leaves the
//! destination exactly as it was.

use crate::builder::{CatalogBuilder, RecordMap};
use crate::config::{CatalogOptions, OrphanPolicy};
use crate::decompress::ChunkedDecoder;
use crate::error::{CatalogError, Result};
use crate::finalize::finalize;
use crate::models::Record;
use crate::parser::MarkupEventParser;
use crate::stats::ParseStats;
use crate::store;
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Result of one parse pass, before finalization.
pub struct ParsedCatalog {
    pub records: RecordMap,
    pub stats: ParseStats,
}

/// Result of [`CatalogPipeline::run`].
#[derive(Debug, Clone)]
pub struct CatalogRun {
    pub records: Vec<Record>,
    pub stats: ParseStats,
    /// True when a fresh persisted catalog was reused instead of parsing
    pub reused: bool,
}

pub struct CatalogPipeline {
    options: CatalogOptions,
}

impl CatalogPipeline {
    pub fn new(options: CatalogOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// Streams the source into a keyed record collection.
    pub fn parse(&self) -> Result<ParsedCatalog> {
        let path = &self.options.source;
        let file = File::open(path).map_err(|e| CatalogError::source_unavailable(path, e))?;

        info!("Parsing catalog from: {}", path.display());
        let progress = if self.options.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };

        parse_reader(
            file,
            self.options.chunk_size,
            self.options.orphan_policy,
            progress,
        )
        .map_err(|e| attach_source_path(e, path))
    }

    /// Parses, finalizes and persists, reusing a fresh persisted catalog
    /// when `reuse` is set.
    pub fn run(&self) -> Result<CatalogRun> {
        let source = &self.options.source;
        let destination = &self.options.destination;

        if self.options.reuse {
            if let Some(records) = store::try_load_catalog(destination, source)? {
                return Ok(CatalogRun {
                    stats: ParseStats {
                        records_retained: records.len() as u64,
                        ..ParseStats::default()
                    },
                    records,
                    reused: true,
                });
            }
        }

        let start = Instant::now();
        let ParsedCatalog { records, mut stats } = self.parse()?;

        let finalized = finalize(records);
        stats.records_dropped = finalized.dropped as u64;
        stats.records_retained = finalized.records.len() as u64;

        store::save_catalog(&finalized.records, source, destination)?;

        stats.log_summary();
        info!(
            duration_secs = start.elapsed().as_secs_f64(),
            records = finalized.records.len(),
            "Catalog update complete"
        );

        Ok(CatalogRun {
            records: finalized.records,
            stats,
            reused: false,
        })
    }
}

/// Parses a compressed catalog from any byte source.
pub fn parse_reader<R: Read>(
    source: R,
    chunk_size: usize,
    policy: OrphanPolicy,
    progress: ProgressBar,
) -> Result<ParsedCatalog> {
    let decoder = ChunkedDecoder::new(source, chunk_size);
    let mut parser = MarkupEventParser::new(BufReader::new(decoder));
    let mut builder = CatalogBuilder::new(policy).with_progress(progress);

    parser.parse(&mut builder)?;

    let elements = parser.elements();
    let decoder = parser.get_ref().get_ref();
    let (bytes_read, bytes_decompressed) = (decoder.bytes_read(), decoder.bytes_decompressed());

    let (records, mut stats) = builder.into_parts();
    stats.elements = elements;
    stats.bytes_read = bytes_read;
    stats.bytes_decompressed = bytes_decompressed;

    info!(
        records = records.len(),
        elements,
        bytes_read,
        "Catalog parsed"
    );
    Ok(ParsedCatalog { records, stats })
}

/// Read failures surface from the parser without a path.
fn attach_source_path(err: CatalogError, path: &Path) -> CatalogError {
    match err {
        CatalogError::SourceUnavailable { source, .. } => {
            CatalogError::source_unavailable(path, source)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    fn compress(xml: &str) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    const ONE_BOOK: &str = r##"<rdf:RDF>
        <pgterms:etext rdf:ID="etext1"><dc:title>T</dc:title></pgterms:etext>
        <pgterms:file rdf:about="http://www.gutenberg.org/dirs/1/1.zip">
            <dc:format>text/plain</dc:format>
            <dc:format>application/zip</dc:format>
            <dcterms:isFormatOf rdf:resource="#etext1"/>
        </pgterms:file>
    </rdf:RDF>"##;

    #[test]
    fn parse_reader_collects_stats() {
        let compressed = compress(ONE_BOOK);
        let parsed = parse_reader(
            compressed.as_slice(),
            64,
            OrphanPolicy::Skip,
            ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.records_committed, 1);
        assert_eq!(parsed.stats.variants_applied, 1);
        assert_eq!(parsed.stats.bytes_read, compressed.len() as u64);
        assert_eq!(parsed.stats.bytes_decompressed, ONE_BOOK.len() as u64);
        assert!(parsed.stats.elements >= 6);
    }

    #[test]
    fn corrupt_archive_is_reported_as_decompress_error() {
        let err = parse_reader(
            &b"BZh9 this is not really bzip2"[..],
            2048,
            OrphanPolicy::Skip,
            ProgressBar::hidden(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CatalogError::Decompress { .. }));
    }

    #[test]
    fn missing_source_is_unavailable() {
        let pipeline = CatalogPipeline::new(CatalogOptions::new(
            "/nonexistent/catalog.rdf.bz2",
            "/nonexistent/catalog.bin",
        ));
        let err = pipeline.parse().err().unwrap();
        match err {
            CatalogError::SourceUnavailable { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/catalog.rdf.bz2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn attach_source_path_only_touches_read_errors() {
        let err = attach_source_path(CatalogError::malformed("x"), Path::new("/a"));
        assert!(matches!(err, CatalogError::MalformedMarkup { .. }));

        let err = attach_source_path(
            CatalogError::source_unavailable("", std::io::Error::other("boom")),
            Path::new("/a"),
        );
        match err {
            CatalogError::SourceUnavailable { path, .. } => assert_eq!(path, Path::new("/a")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
