use crate::model::{DiscrepancyReport, DiscrepancyRow, DiscrepancyStats, MatchedPair};

/// Per-pair rescaled deltas, outlier flags and aggregate statistics.
///
/// A pair is an outlier when `|delta|` is strictly greater than
/// `outlier_threshold`.
pub fn analyze(pairs: &[MatchedPair], outlier_threshold: f64) -> DiscrepancyReport {
    let rows: Vec<DiscrepancyRow> = pairs
        .iter()
        .map(|p| {
            let abs_delta = p.delta.abs();
            DiscrepancyRow {
                commercial_id: p.commercial.source_id.clone(),
                reader_id: p.reader.source_id.clone(),
                title: p.commercial.raw_title.clone(),
                author: p.commercial.raw_author.clone(),
                commercial_rating_norm: p.commercial_rating_norm,
                reader_rating_norm: p.reader_rating_norm,
                delta: p.delta,
                abs_delta,
                is_outlier: abs_delta > outlier_threshold,
                commercial_count: p.commercial.rating_count,
                reader_count: p.reader.rating_count,
                price: p.commercial.price,
            }
        })
        .collect();

    let stats = compute_stats(&rows);
    if stats.outliers > 0 {
        tracing::info!(
            outliers = stats.outliers,
            threshold = outlier_threshold,
            "rating outliers flagged"
        );
    }

    DiscrepancyReport {
        outlier_threshold,
        stats,
        rows,
    }
}

fn compute_stats(rows: &[DiscrepancyRow]) -> DiscrepancyStats {
    if rows.is_empty() {
        return DiscrepancyStats::default();
    }
    let n = rows.len() as f64;

    let mut stats = DiscrepancyStats {
        pairs: rows.len(),
        ..DiscrepancyStats::default()
    };
    for row in rows {
        if row.is_outlier {
            stats.outliers += 1;
        }
        if row.delta > 0.0 {
            stats.higher_on_commercial += 1;
        } else if row.delta < 0.0 {
            stats.higher_on_reader += 1;
        }
        stats.mean_delta += row.delta;
        stats.mean_abs_delta += row.abs_delta;
        stats.max_abs_delta = stats.max_abs_delta.max(row.abs_delta);
        stats.commercial_mean += row.commercial_rating_norm;
        stats.reader_mean += row.reader_rating_norm;
    }
    stats.mean_delta /= n;
    stats.mean_abs_delta /= n;
    stats.commercial_mean /= n;
    stats.reader_mean /= n;
    stats.correlation = pearson(rows, stats.commercial_mean, stats.reader_mean);
    stats
}

/// `None` for fewer than two pairs or when either side has no variance.
fn pearson(rows: &[DiscrepancyRow], mean_x: f64, mean_y: f64) -> Option<f64> {
    if rows.len() < 2 {
        return None;
    }
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for row in rows {
        let dx = row.commercial_rating_norm - mean_x;
        let dy = row.reader_rating_norm - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
