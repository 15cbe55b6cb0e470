use serde::{Deserialize, Serialize};

/// One book's bibliographic facts plus its selected download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub language: String,
    /// Subject headings in document order, duplicates kept
    pub subjects: Vec<String>,
    pub loc_classification: String,
    pub filename: Option<String>,
    pub modified_date: Option<String>,
}

impl Record {
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            title: "Unknown".to_string(),
            author: "Unknown".to_string(),
            language: String::new(),
            subjects: Vec::new(),
            loc_classification: String::new(),
            filename: None,
            modified_date: None,
        }
    }

    /// Lower-cased author followed by lower-cased title, no separator.
    pub fn sort_key(&self) -> String {
        let mut key = String::with_capacity(self.author.len() + self.title.len());
        key.push_str(&self.author.to_lowercase());
        key.push_str(&self.title.to_lowercase());
        key
    }

    /// Offers a download variant. The first one is always taken; later ones
    /// only replace it with a strictly newer `modified_date`.
    pub fn offer_variant(&mut self, filename: String, modified_date: Option<String>) -> bool {
        if self.filename.is_some() && modified_date <= self.modified_date {
            return false;
        }
        self.filename = Some(filename);
        self.modified_date = modified_date;
        true
    }

    /// Archive path for this book: each id digit but the last is a directory.
    /// `4443` becomes `4/4/4/4443/`.
    pub fn remote_path(&self) -> String {
        let mut path = String::with_capacity(self.book_id.len() * 3 + 1);
        let mut chars = self.book_id.chars();
        chars.next_back();
        for c in chars {
            path.push(c);
            path.push('/');
        }
        path.push_str(&self.book_id);
        path.push('/');
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let r = Record::new("1234");
        assert_eq!(r.title, "Unknown");
        assert_eq!(r.author, "Unknown");
        assert!(r.language.is_empty());
        assert!(r.subjects.is_empty());
        assert!(r.filename.is_none());
        assert!(r.modified_date.is_none());
    }

    #[test]
    fn sort_key_is_case_insensitive_concat() {
        let mut r = Record::new("1");
        r.author = "Poe, Edgar Allan".into();
        r.title = "The Raven".into();
        assert_eq!(r.sort_key(), "poe, edgar allanthe raven");
    }

    #[test]
    fn first_variant_always_taken() {
        let mut r = Record::new("1");
        assert!(r.offer_variant("a.zip".into(), None));
        assert_eq!(r.filename.as_deref(), Some("a.zip"));
    }

    #[test]
    fn newer_variant_replaces() {
        let mut r = Record::new("1");
        r.offer_variant("old.zip".into(), Some("2019-01-01".into()));
        assert!(r.offer_variant("new.zip".into(), Some("2020-01-01".into())));
        assert_eq!(r.filename.as_deref(), Some("new.zip"));
        assert_eq!(r.modified_date.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn equal_date_keeps_first() {
        let mut r = Record::new("1");
        r.offer_variant("first.zip".into(), Some("2020-01-01".into()));
        assert!(!r.offer_variant("second.zip".into(), Some("2020-01-01".into())));
        assert_eq!(r.filename.as_deref(), Some("first.zip"));
    }

    #[test]
    fn older_variant_ignored() {
        let mut r = Record::new("1");
        r.offer_variant("new.zip".into(), Some("2020-01-01".into()));
        assert!(!r.offer_variant("old.zip".into(), Some("2019-12-31".into())));
        assert_eq!(r.filename.as_deref(), Some("new.zip"));
    }

    #[test]
    fn dated_variant_beats_undated() {
        let mut r = Record::new("1");
        r.offer_variant("undated.zip".into(), None);
        assert!(r.offer_variant("dated.zip".into(), Some("2001-01-01".into())));
        assert_eq!(r.filename.as_deref(), Some("dated.zip"));
    }

    #[test]
    fn remote_path_splits_digits() {
        assert_eq!(Record::new("4443").remote_path(), "4/4/4/4443/");
        assert_eq!(Record::new("7").remote_path(), "7/");
    }
}
