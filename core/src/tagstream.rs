//! Line-oriented extraction of `<TAG>content</TAG>` regions.
//!
//! A region may open and close on the same line or span several lines. The
//! scan is a single forward pass with one recording flag: nothing is ever
//! re-read and no line beyond the current one is inspected.

/// Incremental extractor for one start/end tag pair.
///
/// Feed lines in order; the scanner yields the joined content once the end
/// tag is seen. Each fed line is trimmed and empty fragments are dropped, so
/// the result is always single-space separated.
#[derive(Debug, Clone)]
pub struct TagScanner<'t> {
    start_tag: &'t str,
    end_tag: &'t str,
    recording: bool,
    parts: Vec<String>,
}

impl<'t> TagScanner<'t> {
    pub fn new(start_tag: &'t str, end_tag: &'t str) -> Self {
        Self { start_tag, end_tag, recording: false, parts: Vec::new() }
    }

    pub fn is_recording(&self) -> bool { self.recording }

    /// Consume one line. Returns the completed content when the region closes.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if self.recording {
            if let Some(end) = line.find(self.end_tag) {
                self.push(&line[..end]);
                self.recording = false;
                return Some(self.take());
            }
            self.push(line);
            return None;
        }

        let start = line.find(self.start_tag)?;
        let after = start + self.start_tag.len();
        match line[after..].find(self.end_tag) {
            Some(rel_end) => Some(line[after..after + rel_end].trim().to_string()),
            None => {
                self.recording = true;
                self.push(&line[after..]);
                None
            }
        }
    }

    /// Content gathered so far, for regions the input never closes.
    pub fn finish(mut self) -> String {
        if self.recording { self.take() } else { String::new() }
    }

    fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            self.parts.push(fragment.to_string());
        }
    }

    fn take(&mut self) -> String {
        let joined = self.parts.join(" ");
        self.parts.clear();
        joined
    }
}

/// Extract the first `start_tag ... end_tag` region from `lines`.
///
/// An end tag with no preceding start tag yields an empty string, as does
/// input with no start tag at all.
pub fn extract_tag_content<I, S>(lines: I, start_tag: &str, end_tag: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scanner = TagScanner::new(start_tag, end_tag);
    for line in lines {
        if let Some(content) = scanner.feed(line.as_ref()) {
            return content;
        }
    }
    scanner.finish()
}
