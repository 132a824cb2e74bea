use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type DocNo = String;
pub type QueryNo = String;

/// One `<DOC>` region of a collection file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub doc_no: DocNo,
    pub profile: Option<String>,
    pub date: Option<String>,
    pub headline: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "pub")]
    pub publication: Option<String>,
    pub page: Option<String>,
}

impl Document {
    /// Headline and body joined the way the passage exports expect.
    pub fn passage(&self) -> String {
        let mut out = String::new();
        if let Some(h) = self.headline.as_deref() {
            out.push_str(h);
            out.push(' ');
        }
        if let Some(t) = self.text.as_deref() {
            out.push_str(t);
        }
        out.trim().to_string()
    }
}

/// A benchmark topic plus the relevance evidence attached to it downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query_no: QueryNo,
    pub query_text: String,
    pub relevant_docs: Vec<DocNo>,
    pub non_relevant_docs: Option<Vec<DocNo>>,
}

impl Query {
    pub fn new(query_no: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self { query_no: query_no.into(), query_text: query_text.into(), ..Self::default() }
    }

    pub fn add_relevant_doc(&mut self, doc_no: impl Into<String>) {
        self.relevant_docs.push(doc_no.into());
    }

    pub fn num_relevant(&self) -> usize { self.relevant_docs.len() }
}

/// Membership oracle over every `doc_no` seen during one corpus parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIdIndex {
    ids: HashSet<DocNo>,
}

impl DocumentIdIndex {
    pub fn new() -> Self { Self::default() }

    /// Returns false when the id was already present.
    pub(crate) fn insert(&mut self, doc_no: &str) -> bool {
        self.ids.insert(doc_no.to_string())
    }

    pub fn contains(&self, doc_no: &str) -> bool { self.ids.contains(doc_no) }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Ids in lexicographic order, for listings and deterministic sampling.
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for DocumentIdIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { ids: iter.into_iter().map(Into::into).collect() }
    }
}

/// A single qrels line: `query_no iteration doc_no relevance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceJudgment {
    pub query_no: QueryNo,
    pub iteration: String,
    pub doc_no: DocNo,
    pub relevance: String,
}

impl RelevanceJudgment {
    /// Splits on whitespace; anything other than exactly four fields is rejected.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let query_no = fields.next()?;
        let iteration = fields.next()?;
        let doc_no = fields.next()?;
        let relevance = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            query_no: query_no.to_string(),
            iteration: iteration.to_string(),
            doc_no: doc_no.to_string(),
            relevance: relevance.to_string(),
        })
    }

    pub fn is_relevant(&self) -> bool { self.relevance == "1" }

    pub fn is_judged_non_relevant(&self) -> bool { self.relevance == "0" }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<Query>,
    pub test: Vec<Query>,
}

/// Top-k hits for one query, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub query_no: QueryNo,
    pub hits: Vec<(DocNo, f32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgment_requires_four_fields() {
        assert!(RelevanceJudgment::parse("301 0 FT911-1 1").is_some());
        assert!(RelevanceJudgment::parse("301 0 FT911-1").is_none());
        assert!(RelevanceJudgment::parse("301 0 FT911-1 1 extra").is_none());
        assert!(RelevanceJudgment::parse("").is_none());
    }

    #[test]
    fn passage_joins_headline_and_text() {
        let doc = Document {
            doc_no: "FT911-1".into(),
            headline: Some("Markets".into()),
            text: Some("Shares rose.".into()),
            ..Document::default()
        };
        assert_eq!(doc.passage(), "Markets Shares rose.");
        assert_eq!(Document::default().passage(), "");
    }
}
