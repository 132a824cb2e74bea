//! trec_eval metric names reported by the benchmark, with display labels.

pub const METRIC_CATALOG: &[(&str, &str)] = &[
    ("map", "Mean Average Precision"),
    ("ndcg_cut_10", "NDCG@10"),
    ("ndcg_cut_20", "NDCG@20"),
    ("P_5", "Precision@5"),
    ("P_10", "Precision@10"),
    ("P_20", "Precision@20"),
    ("P_100", "Precision@100"),
    ("recall_100", "Recall@100"),
    ("recall_1000", "Recall@1000"),
    ("recip_rank", "Reciprocal Rank"),
    ("iprec_at_recall_0.00", "Interpolated Precision at 0.00 Recall"),
    ("iprec_at_recall_0.10", "Interpolated Precision at 0.10 Recall"),
    ("iprec_at_recall_0.20", "Interpolated Precision at 0.20 Recall"),
    ("iprec_at_recall_0.30", "Interpolated Precision at 0.30 Recall"),
    ("iprec_at_recall_0.40", "Interpolated Precision at 0.40 Recall"),
    ("iprec_at_recall_0.50", "Interpolated Precision at 0.50 Recall"),
    ("iprec_at_recall_0.60", "Interpolated Precision at 0.60 Recall"),
    ("iprec_at_recall_0.70", "Interpolated Precision at 0.70 Recall"),
    ("iprec_at_recall_0.80", "Interpolated Precision at 0.80 Recall"),
    ("iprec_at_recall_0.90", "Interpolated Precision at 0.90 Recall"),
    ("iprec_at_recall_1.00", "Interpolated Precision at 1.00 Recall"),
    ("Rprec", "R-Precision"),
    ("bpref", "Binary Preference"),
];

pub fn metric_names() -> Vec<&'static str> {
    METRIC_CATALOG.iter().map(|(name, _)| *name).collect()
}

pub fn describe(name: &str) -> Option<&'static str> {
    METRIC_CATALOG.iter().find(|(n, _)| *n == name).map(|(_, label)| *label)
}
