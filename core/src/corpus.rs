//! Parser for SGML-style collection files (`<DOC>` ... `</DOC>` blocks).

use crate::error::{BenchError, Result};
use crate::model::{Document, DocumentIdIndex};
use crate::tagstream::TagScanner;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DOC_OPEN: &str = "<DOC>";
const DOC_CLOSE: &str = "</DOC>";
const TEXT_OPEN: &str = "<TEXT>";
const TEXT_CLOSE: &str = "</TEXT>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderField {
    DocNo,
    Profile,
    Date,
    Headline,
    Pub,
    Page,
}

const HEADER_TAGS: [(HeaderField, &str, &str); 6] = [
    (HeaderField::DocNo, "<DOCNO>", "</DOCNO>"),
    (HeaderField::Profile, "<PROFILE>", "</PROFILE>"),
    (HeaderField::Date, "<DATE>", "</DATE>"),
    (HeaderField::Headline, "<HEADLINE>", "</HEADLINE>"),
    (HeaderField::Pub, "<PUB>", "</PUB>"),
    (HeaderField::Page, "<PAGE>", "</PAGE>"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
    OutsideDoc,
    InDocHeader,
    InTextRegion,
}

/// Documents of one corpus directory plus the set of their identifiers.
#[derive(Debug, Clone, Default)]
pub struct ParsedCorpus {
    pub documents: Vec<Document>,
    pub doc_ids: DocumentIdIndex,
}

/// Per-file state machine. Header fields that span lines keep a pending
/// scanner; everything inside `<TEXT>` is body text except `</TEXT>`.
struct DocumentStream {
    state: DocState,
    current: Option<Document>,
    pending: Option<(HeaderField, TagScanner<'static>)>,
    text_lines: Vec<String>,
    out: Vec<Document>,
}

impl DocumentStream {
    fn new() -> Self {
        Self { state: DocState::OutsideDoc, current: None, pending: None, text_lines: Vec::new(), out: Vec::new() }
    }

    fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        match self.state {
            DocState::OutsideDoc => {
                if line.contains(DOC_OPEN) {
                    self.open_document();
                }
            }
            DocState::InDocHeader => self.feed_header(line),
            DocState::InTextRegion => {
                if let Some(end) = line.find(TEXT_CLOSE) {
                    self.push_text(&line[..end]);
                    self.flush_text();
                    self.state = DocState::InDocHeader;
                } else if line.contains(DOC_CLOSE) {
                    tracing::warn!("unterminated <TEXT> region closed by </DOC>");
                    self.finish_document();
                } else {
                    self.push_text(line);
                }
            }
        }
    }

    fn feed_header(&mut self, line: &str) {
        if line.contains(DOC_CLOSE) {
            self.finish_document();
            return;
        }
        if let Some((field, mut scanner)) = self.pending.take() {
            match scanner.feed(line) {
                Some(content) => self.assign(field, content),
                None => self.pending = Some((field, scanner)),
            }
            return;
        }
        if line.contains(DOC_OPEN) {
            tracing::warn!("<DOC> opened before previous document was closed");
            self.finish_document();
            self.open_document();
            return;
        }
        if let Some(start) = line.find(TEXT_OPEN) {
            let rest = &line[start + TEXT_OPEN.len()..];
            match rest.find(TEXT_CLOSE) {
                Some(end) => {
                    self.push_text(&rest[..end]);
                    self.flush_text();
                }
                None => {
                    self.push_text(rest);
                    self.state = DocState::InTextRegion;
                }
            }
            return;
        }
        for (field, start_tag, end_tag) in HEADER_TAGS {
            if line.contains(start_tag) {
                let mut scanner = TagScanner::new(start_tag, end_tag);
                match scanner.feed(line) {
                    Some(content) => self.assign(field, content),
                    None => self.pending = Some((field, scanner)),
                }
                return;
            }
        }
    }

    fn open_document(&mut self) {
        self.current = Some(Document::default());
        self.pending = None;
        self.text_lines.clear();
        self.state = DocState::InDocHeader;
    }

    fn assign(&mut self, field: HeaderField, content: String) {
        let Some(doc) = self.current.as_mut() else { return };
        let value = if content.is_empty() { None } else { Some(content) };
        match field {
            HeaderField::DocNo => doc.doc_no = value.unwrap_or_default(),
            HeaderField::Profile => doc.profile = value,
            HeaderField::Date => doc.date = value,
            HeaderField::Headline => doc.headline = value,
            HeaderField::Pub => doc.publication = value,
            HeaderField::Page => doc.page = value,
        }
    }

    fn push_text(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            self.text_lines.push(fragment.to_string());
        }
    }

    fn flush_text(&mut self) {
        if self.text_lines.is_empty() {
            return;
        }
        let joined = self.text_lines.join(" ");
        self.text_lines.clear();
        if let Some(doc) = self.current.as_mut() {
            doc.text = Some(match doc.text.take() {
                Some(prev) => format!("{prev} {joined}"),
                None => joined,
            });
        }
    }

    fn finish_document(&mut self) {
        if let Some((field, scanner)) = self.pending.take() {
            let content = scanner.finish();
            self.assign(field, content);
        }
        self.flush_text();
        if let Some(doc) = self.current.take() {
            if doc.doc_no.is_empty() {
                tracing::warn!("document without <DOCNO> dropped");
            } else {
                self.out.push(doc);
            }
        }
        self.state = DocState::OutsideDoc;
    }

    fn finish(mut self) -> Vec<Document> {
        if self.current.is_some() {
            tracing::warn!("input ended inside an open <DOC>");
            self.finish_document();
        }
        self.out
    }
}

/// Parse every `<DOC>` block in `text`, in order of appearance.
pub fn parse_documents_str(text: &str) -> Vec<Document> {
    let mut stream = DocumentStream::new();
    for line in text.lines() {
        stream.feed(line);
    }
    stream.finish()
}

/// Parse a single collection file. Non-UTF-8 bytes are replaced rather than
/// rejected; the collections are effectively ASCII.
pub fn parse_corpus_file(path: &Path) -> Result<Vec<Document>> {
    let bytes = fs::read(path).map_err(|e| BenchError::io(path, e))?;
    Ok(parse_documents_str(&String::from_utf8_lossy(&bytes)))
}

/// Regular files directly inside `dir`, sorted by file name.
fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(BenchError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "corpus directory not found"),
        ));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(e) => tracing::debug!(path = %e.path().display(), "skipping non-file entry"),
            Err(err) => tracing::warn!(%err, "unreadable corpus entry skipped"),
        }
    }
    Ok(files)
}

/// Parse every file of a corpus directory.
///
/// Files are scanned in parallel and merged in file-name order, so the
/// output is identical across runs on an unchanged directory. The first
/// occurrence of a `doc_no` wins; later duplicates are dropped.
pub fn parse_documents(dir: impl AsRef<Path>) -> Result<ParsedCorpus> {
    let dir = dir.as_ref();
    let files = corpus_files(dir)?;

    let per_file: Vec<(PathBuf, Vec<Document>)> = files
        .into_par_iter()
        .filter_map(|path| match parse_corpus_file(&path) {
            Ok(docs) => Some((path, docs)),
            Err(err) => {
                tracing::warn!(%err, "collection file skipped");
                None
            }
        })
        .collect();

    let mut corpus = ParsedCorpus::default();
    let mut duplicates = 0usize;
    for (path, docs) in per_file {
        tracing::debug!(path = %path.display(), docs = docs.len(), "parsed collection file");
        for doc in docs {
            if corpus.doc_ids.insert(&doc.doc_no) {
                corpus.documents.push(doc);
            } else {
                duplicates += 1;
                tracing::warn!(doc_no = %doc.doc_no, path = %path.display(), "duplicate DOCNO dropped");
            }
        }
    }
    tracing::info!(dir = %dir.display(), documents = corpus.documents.len(), duplicates, "corpus parsed");
    Ok(corpus)
}
