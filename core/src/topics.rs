//! Parser for TREC topic files (`<top>` blocks with `<num>` and `<title>`).

use crate::model::Query;
use crate::tagstream::extract_tag_content;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const TOP_OPEN: &str = "<top>";
const TOP_CLOSE: &str = "</top>";
const NUM_OPEN: &str = "<num>";
const NUM_CLOSE: &str = "</num>";
const TITLE_OPEN: &str = "<title>";
const TITLE_CLOSE: &str = "</title>";
const NUMBER_PREFIX: &str = "Number: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicState {
    OutsideTopic,
    InTopic,
}

struct TopicStream {
    state: TopicState,
    current: Option<Query>,
    // `<title>` left empty on its own line; the next plain line carries the title.
    title_on_next_line: bool,
    out: Vec<Query>,
}

impl TopicStream {
    fn new() -> Self {
        Self { state: TopicState::OutsideTopic, current: None, title_on_next_line: false, out: Vec::new() }
    }

    fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        match self.state {
            TopicState::OutsideTopic => {
                if line.contains(TOP_OPEN) {
                    self.current = Some(Query::default());
                    self.title_on_next_line = false;
                    self.state = TopicState::InTopic;
                }
            }
            TopicState::InTopic => {
                if line.contains(TOP_CLOSE) {
                    self.finish_topic();
                    return;
                }
                let Some(query) = self.current.as_mut() else { return };
                if line.contains(NUM_OPEN) {
                    let num = extract_tag_content([line], NUM_OPEN, NUM_CLOSE);
                    let num = num.trim();
                    query.query_no = num.strip_prefix(NUMBER_PREFIX).unwrap_or(num).trim().to_string();
                } else if line.contains(TITLE_OPEN) {
                    query.query_text = extract_tag_content([line], TITLE_OPEN, TITLE_CLOSE).trim().to_string();
                    self.title_on_next_line = query.query_text.is_empty();
                } else if self.title_on_next_line && !line.is_empty() && !line.starts_with('<') {
                    query.query_text = line.to_string();
                    self.title_on_next_line = false;
                } else if line.starts_with('<') {
                    self.title_on_next_line = false;
                }
            }
        }
    }

    fn finish_topic(&mut self) {
        if let Some(query) = self.current.take() {
            if query.query_no.is_empty() {
                tracing::warn!(title = %query.query_text, "topic without <num> dropped");
            } else {
                self.out.push(query);
            }
        }
        self.state = TopicState::OutsideTopic;
    }

    fn finish(self) -> Vec<Query> {
        if self.state == TopicState::InTopic {
            tracing::warn!("input ended inside an open <top>; topic discarded");
        }
        self.out
    }
}

/// Parse all topics in `text`, in order of appearance.
pub fn parse_topics_str(text: &str) -> Vec<Query> {
    let mut stream = TopicStream::new();
    for line in text.lines() {
        stream.feed(line);
    }
    stream.finish()
}

/// Parse topic files in the given order and concatenate their queries.
///
/// Paths that are missing or not regular files are skipped with a warning.
/// A `query_no` seen in an earlier file shadows later repeats.
pub fn parse_queries<P: AsRef<Path> + Sync>(paths: &[P]) -> Vec<Query> {
    let per_file: Vec<Vec<Query>> = paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            if !path.is_file() {
                tracing::warn!(path = %path.display(), "topic file not found, skipping");
                return Vec::new();
            }
            match fs::read(path) {
                Ok(bytes) => parse_topics_str(&String::from_utf8_lossy(&bytes)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "topic file unreadable, skipping");
                    Vec::new()
                }
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    for query in per_file.into_iter().flatten() {
        if seen.insert(query.query_no.clone()) {
            queries.push(query);
        } else {
            tracing::warn!(query_no = %query.query_no, "duplicate topic number dropped");
        }
    }
    tracing::info!(files = paths.len(), queries = queries.len(), "topics parsed");
    queries
}
