//! Event consumer that turns catalog markup into keyed [`Record`]s.
//!
//! A record is opened by `pgterms:etext`, its fields are filled as the typed
//! leaf elements close, and it is committed on `pgterms:etext` end. File
//! descriptors (`pgterms:file`) run as a separate sub-machine and, when they
//! describe a zipped plain-text download, offer that file to the already
//! committed record they point at.

use crate::config::{
    OrphanPolicy, BOOK_ID_PREFIX_LEN, FILE_URL_PREFIX_LEN, FORMAT_OF_PREFIX_LEN, PROGRESS_INTERVAL,
};
use crate::error::{CatalogError, Result};
use crate::models::Record;
use crate::parser::{Attributes, MarkupHandler};
use crate::stats::ParseStats;
use indexmap::IndexMap;
use indicatif::ProgressBar;
use rustc_hash::FxBuildHasher;
use tracing::{debug, warn};

const RECORD: &str = "pgterms:etext";
const FILE: &str = "pgterms:file";
const TITLE: &str = "dc:title";
const CREATOR: &str = "dc:creator";
const LANGUAGE: &str = "dc:language";
const SUBJECT: &str = "dc:subject";
const SUBJECT_HEADING: &str = "dcterms:LCSH";
const CLASSIFICATION: &str = "dcterms:LCC";
const FORMAT: &str = "dc:format";
const MODIFIED: &str = "dcterms:modified";
const FORMAT_OF: &str = "dcterms:isFormatOf";

const RECORD_ID_ATTR: &str = "rdf:ID";
const FILE_ABOUT_ATTR: &str = "rdf:about";
const RESOURCE_ATTR: &str = "rdf:resource";

/// Committed records keyed by book id, in first-commit order.
pub type RecordMap = IndexMap<String, Record, FxBuildHasher>;

#[derive(Debug)]
struct FileDescriptor {
    filename: String,
    book_id: Option<String>,
    is_text: bool,
    is_zip: bool,
    modified: Option<String>,
}

impl FileDescriptor {
    fn new(filename: String) -> Self {
        Self {
            filename,
            book_id: None,
            is_text: false,
            is_zip: false,
            modified: None,
        }
    }
}

pub struct CatalogBuilder {
    records: RecordMap,
    policy: OrphanPolicy,
    record: Option<Record>,
    file: Option<FileDescriptor>,
    capturing: bool,
    text: String,
    stats: ParseStats,
    progress: ProgressBar,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new(OrphanPolicy::default())
    }
}

impl CatalogBuilder {
    pub fn new(policy: OrphanPolicy) -> Self {
        Self {
            records: RecordMap::default(),
            policy,
            record: None,
            file: None,
            capturing: false,
            text: String::new(),
            stats: ParseStats::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn records(&self) -> &RecordMap {
        &self.records
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn into_parts(self) -> (RecordMap, ParseStats) {
        self.progress.finish_and_clear();
        (self.records, self.stats)
    }

    fn begin_capture(&mut self) {
        self.capturing = true;
        self.text.clear();
    }

    /// Cleaned text of the field that just closed.
    fn take_field(&mut self) -> String {
        let value = clean_text(&self.text);
        self.text.clear();
        self.capturing = false;
        value
    }

    /// Working record, unless a file descriptor owns the current fields.
    fn record_fields(&mut self) -> Option<&mut Record> {
        if self.file.is_some() {
            return None;
        }
        self.record.as_mut()
    }

    fn open_record(&mut self, attrs: &Attributes) -> Result<()> {
        let id = required_attr(attrs, RECORD, RECORD_ID_ATTR)?;
        self.record = Some(Record::new(strip_prefix_chars(id, BOOK_ID_PREFIX_LEN)));
        self.capturing = false;
        self.text.clear();
        Ok(())
    }

    fn commit_record(&mut self) {
        if let Some(record) = self.record.take() {
            let book_id = record.book_id.clone();
            if self.records.insert(book_id.clone(), record).is_some() {
                debug!(book_id = %book_id, "Record re-entered, replacing earlier entry");
                self.stats.records_replaced += 1;
            }
            self.stats.records_committed += 1;
            if self.stats.records_committed % PROGRESS_INTERVAL == 0 {
                self.progress.tick();
            }
        }
        self.capturing = false;
        self.text.clear();
    }

    fn open_file(&mut self, attrs: &Attributes) -> Result<()> {
        let about = required_attr(attrs, FILE, FILE_ABOUT_ATTR)?;
        self.file = Some(FileDescriptor::new(strip_prefix_chars(
            about,
            FILE_URL_PREFIX_LEN,
        )));
        Ok(())
    }

    fn close_file(&mut self) -> Result<()> {
        self.capturing = false;
        self.text.clear();

        let Some(file) = self.file.take() else {
            return Ok(());
        };
        self.stats.file_descriptors += 1;

        if !(file.is_text && file.is_zip) {
            return Ok(());
        }

        let book_id = file
            .book_id
            .or_else(|| self.record.as_ref().map(|r| r.book_id.clone()))
            .unwrap_or_default();

        match self.records.get_mut(&book_id) {
            Some(record) => {
                if record.offer_variant(file.filename, file.modified) {
                    debug!(
                        book_id = %book_id,
                        filename = ?record.filename,
                        "Selected file variant"
                    );
                    self.stats.variants_applied += 1;
                }
                Ok(())
            }
            None => match self.policy {
                OrphanPolicy::Fail => Err(CatalogError::OrphanFileDescriptor {
                    book_id,
                    filename: file.filename,
                }),
                OrphanPolicy::Skip => {
                    warn!(
                        book_id = %book_id,
                        filename = %file.filename,
                        "Skipping file descriptor with no committed record"
                    );
                    self.stats.orphans_skipped += 1;
                    Ok(())
                }
            },
        }
    }

    /// `dcterms:isFormatOf` points the current context at another book id.
    /// Inside a record this moves the in-progress record to the new key and
    /// drops any entry already committed under the old one.
    fn redirect(&mut self, attrs: &Attributes) -> Result<()> {
        let resource = required_attr(attrs, FORMAT_OF, RESOURCE_ATTR)?;
        let target = strip_prefix_chars(resource, FORMAT_OF_PREFIX_LEN);

        if let Some(file) = self.file.as_mut() {
            file.book_id = Some(target);
        } else if let Some(record) = self.record.as_mut() {
            if record.book_id != target {
                let old = std::mem::replace(&mut record.book_id, target);
                if self.records.shift_remove(&old).is_some() {
                    debug!(from = %old, to = %record.book_id, "Removed stale record after redirect");
                }
                self.stats.records_redirected += 1;
            }
        } else {
            debug!(target = %target, "Ignoring isFormatOf outside a record or file");
        }
        Ok(())
    }
}

impl MarkupHandler for CatalogBuilder {
    fn start_element(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
        match name {
            RECORD => self.open_record(attrs)?,
            FILE => self.open_file(attrs)?,
            TITLE | CREATOR | LANGUAGE | SUBJECT | FORMAT | MODIFIED => self.begin_capture(),
            FORMAT_OF => self.redirect(attrs)?,
            _ => {}
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        match name {
            RECORD => self.commit_record(),
            FILE => self.close_file()?,
            TITLE => {
                let value = self.take_field();
                if let Some(record) = self.record_fields() {
                    record.title = value;
                }
            }
            CREATOR => {
                let value = self.take_field();
                if let Some(record) = self.record_fields() {
                    record.author = value;
                }
            }
            LANGUAGE => {
                let value = self.take_field();
                if let Some(record) = self.record_fields() {
                    record.language = value;
                }
            }
            SUBJECT_HEADING => {
                // Several headings can share one dc:subject; keep capturing
                let value = clean_text(&self.text);
                self.text.clear();
                if let Some(record) = self.record_fields() {
                    record.subjects.push(value);
                }
            }
            CLASSIFICATION => {
                let value = self.take_field();
                if let Some(record) = self.record_fields() {
                    record.loc_classification = value;
                }
            }
            SUBJECT => {
                self.capturing = false;
                self.text.clear();
            }
            MODIFIED => {
                let value = self.take_field();
                if let Some(file) = self.file.as_mut() {
                    file.modified = Some(value);
                }
            }
            FORMAT => {
                let value = self.take_field();
                if let Some(file) = self.file.as_mut() {
                    if value.starts_with("text/plain") {
                        file.is_text = true;
                    } else if value == "application/zip" {
                        file.is_zip = true;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if self.capturing {
            self.text.push_str(text);
        }
        Ok(())
    }
}

fn required_attr<'a>(attrs: &'a Attributes, element: &str, attr: &str) -> Result<&'a str> {
    attrs
        .get(attr)
        .ok_or_else(|| CatalogError::malformed(format!("<{}> is missing {}", element, attr)))
}

/// Collapses whitespace runs to single spaces and trims both ends.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Drops the first `n` characters; shorter values become empty.
pub fn strip_prefix_chars(value: &str, n: usize) -> String {
    value
        .char_indices()
        .nth(n)
        .map(|(i, _)| value[i..].to_string())
        .unwrap_or_default()
}
