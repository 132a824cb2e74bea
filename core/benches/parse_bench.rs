use criterion::{criterion_group, criterion_main, Criterion};
use ftbench_core::corpus::parse_documents_str;
use ftbench_core::tagstream::extract_tag_content;

fn synthetic_corpus(docs: usize) -> String {
    let mut out = String::new();
    for i in 0..docs {
        out.push_str(&format!(
            "<DOC>\n<DOCNO>FT911-{i}</DOCNO>\n<PROFILE>_AN-BEOA7AAIFT</PROFILE>\n<DATE>910514\n</DATE>\n\
             <HEADLINE>\nFT  14 MAY 91 / Headline number {i}\n</HEADLINE>\n<TEXT>\n"
        ));
        for line in 0..20 {
            out.push_str(&format!("Body line {line} of document {i}, with some ordinary prose.\n"));
        }
        out.push_str("</TEXT>\n<PUB>The Financial Times</PUB>\n<PAGE>London Page 1</PAGE>\n</DOC>\n");
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let corpus = synthetic_corpus(500);
    c.bench_function("parse_documents_500", |b| b.iter(|| parse_documents_str(&corpus)));

    let lines: Vec<&str> = corpus.lines().take(30).collect();
    c.bench_function("extract_text_region", |b| b.iter(|| extract_tag_content(&lines, "<TEXT>", "</TEXT>")));
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
