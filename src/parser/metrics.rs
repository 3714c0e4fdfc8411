use anyhow::Result;

use crate::config::CrawlConfig;

/// Price per square metre for one listing. Needs a valid tax-adjusted price
/// and a valid non-zero area; ratios outside the open plausibility band are
/// data-quality faults and come back as `None`.
pub fn price_per_sqm(
    price_final: Option<i64>,
    area_sqm: Option<f64>,
    cfg: &CrawlConfig,
) -> Option<i64> {
    let price = price_final?;
    let area = area_sqm?;
    if area <= 0.0 {
        return None;
    }
    let ratio = (price as f64 / area).round() as i64;
    (ratio > cfg.ratio_min && ratio < cfg.ratio_max).then_some(ratio)
}

/// Dataset-wide average: valid ratios below `cap` are summed and divided by
/// the count of valid ratios. Zero valid ratios is a reportable error, not a
/// division crash.
pub fn average_price_per_sqm(ratios: &[Option<i64>], cap: i64) -> Result<f64> {
    let valid: Vec<i64> = ratios.iter().filter_map(|r| *r).collect();
    if valid.is_empty() {
        anyhow::bail!("no valid price per sqm data");
    }
    let sum: i64 = valid.iter().filter(|r| **r < cap).sum();
    Ok(sum as f64 / valid.len() as f64)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CrawlConfig {
        CrawlConfig::default()
    }

    #[test]
    fn ratio_is_rounded_quotient() {
        // 74500 / 62.5 = 1192
        assert_eq!(price_per_sqm(Some(74_500), Some(62.5), &cfg()), Some(1192));
        // 100000 / 63 = 1587.3 → 1587
        assert_eq!(price_per_sqm(Some(100_000), Some(63.0), &cfg()), Some(1587));
    }

    #[test]
    fn band_is_exclusive() {
        // 500 * 100 / 100 = 500, on the lower edge
        assert_eq!(price_per_sqm(Some(50_000), Some(100.0), &cfg()), None);
        assert_eq!(price_per_sqm(Some(50_100), Some(100.0), &cfg()), Some(501));
        // Upper edge
        assert_eq!(price_per_sqm(Some(500_000), Some(100.0), &cfg()), None);
        assert_eq!(price_per_sqm(Some(499_900), Some(100.0), &cfg()), Some(4999));
        // Far outside: mis-entered area, marked invalid rather than stored
        assert_eq!(price_per_sqm(Some(74_500), Some(7.0), &cfg()), None);
    }

    #[test]
    fn missing_or_zero_inputs_yield_none() {
        assert_eq!(price_per_sqm(None, Some(62.0), &cfg()), None);
        assert_eq!(price_per_sqm(Some(74_500), None, &cfg()), None);
        assert_eq!(price_per_sqm(Some(74_500), Some(0.0), &cfg()), None);
    }

    #[test]
    fn average_excludes_invalid() {
        let ratios = vec![Some(800), Some(1200), None, Some(1500)];
        let avg = average_price_per_sqm(&ratios, 10_000).unwrap();
        assert!((avg - 1166.6666).abs() < 0.01);
    }

    #[test]
    fn average_cap_drops_sum_not_count() {
        // The cap filters the sum only; the divisor stays the valid count.
        let ratios = vec![Some(1000), Some(2000), Some(12_000)];
        let avg = average_price_per_sqm(&ratios, 10_000).unwrap();
        assert!((avg - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_of_nothing_is_an_error() {
        assert!(average_price_per_sqm(&[], 10_000).is_err());
        assert!(average_price_per_sqm(&[None, None], 10_000).is_err());
    }
}
