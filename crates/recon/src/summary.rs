use std::collections::BTreeMap;

use crate::model::{MatchOutput, ReconSummary};

/// Counts for a finished match run.
///
/// `match_rate` is the matched share of the smaller catalog, so a perfect
/// run reads 1.0 even when the catalogs differ in size.
pub fn compute_summary(commercial: usize, reader: usize, output: &MatchOutput) -> ReconSummary {
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    for residual in output
        .unmatched_commercial
        .iter()
        .chain(&output.unmatched_reader)
    {
        *reason_counts
            .entry(format!("{}/{}", residual.side, residual.reason))
            .or_insert(0) += 1;
    }

    let smaller = commercial.min(reader);
    let match_rate = if smaller == 0 {
        0.0
    } else {
        output.matched.len() as f64 / smaller as f64
    };

    ReconSummary {
        commercial_records: commercial,
        reader_records: reader,
        matched: output.matched.len(),
        unmatched_commercial: output.unmatched_commercial.len(),
        unmatched_reader: output.unmatched_reader.len(),
        match_rate,
        reason_counts,
    }
}
