//! Order statistics over duration samples.

/// Finite values, sorted ascending.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Standard median; the two middle values are averaged for even counts.
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Nearest-rank percentile: `sorted[ceil(pct/100 * n) - 1]`, `pct` in 1..=100.
/// Integer arithmetic keeps the rank exact for every `n`.
pub fn percentile_nearest_rank(sorted: &[f64], pct: u32) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let pct = pct.clamp(1, 100) as usize;
    let rank = (pct * n).div_ceil(100).max(1);
    sorted.get(rank - 1).copied()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); 0 for a single value.
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if values.len() < 2 {
        return Some(0.0);
    }
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_and_p95_of_ten() {
        let v = sorted_finite((1..=10).map(|i| i as f64 * 10.0));
        assert_eq!(median_sorted(&v), Some(55.0));
        assert_eq!(percentile_nearest_rank(&v, 95), Some(100.0));
    }

    #[test]
    fn p95_rank_boundaries() {
        let twenty: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile_nearest_rank(&twenty, 95), Some(19.0));
        let hundred: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile_nearest_rank(&hundred, 95), Some(95.0));
        assert_eq!(percentile_nearest_rank(&[7.0], 95), Some(7.0));
        assert_eq!(percentile_nearest_rank(&[], 95), None);
    }

    #[test]
    fn odd_median_and_sorting() {
        let v = sorted_finite([3.0, f64::NAN, 1.0, 2.0]);
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
        assert_eq!(median_sorted(&v), Some(2.0));
        assert_eq!(median_sorted(&[]), None);
    }

    #[test]
    fn stdev() {
        assert_eq!(sample_stdev(&[5.0]), Some(0.0));
        assert_eq!(sample_stdev(&[]), None);
        let s = sample_stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138089935).abs() < 1e-6);
    }
}
