//! Percent <-> dB conversion
//!
//! Hosts think in percent, the receiver in dB from -90 (0 %) to 0 (100 %).

use anthem_protocol::{VOLUME_MAX_DB, VOLUME_MIN_DB};

const RANGE_DB: f64 = (VOLUME_MAX_DB - VOLUME_MIN_DB) as f64;

/// `round(percent / 100 * 90) - 90`; percent above 100 is treated as 100
pub fn percent_to_db(percent: u8) -> i32 {
    let percent = f64::from(percent.min(100));
    (percent / 100.0 * RANGE_DB).round() as i32 + VOLUME_MIN_DB
}

/// `round((db + 90) / 90 * 100)`, clamped to 0..=100
pub fn db_to_percent(db: i32) -> u8 {
    let percent = ((f64::from(db) - f64::from(VOLUME_MIN_DB)) / RANGE_DB * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(percent_to_db(0), -90);
        assert_eq!(percent_to_db(100), 0);
        assert_eq!(db_to_percent(-90), 0);
        assert_eq!(db_to_percent(0), 100);
    }

    #[test]
    fn test_midpoints() {
        assert_eq!(percent_to_db(50), -45);
        assert_eq!(db_to_percent(-45), 50);
        assert_eq!(percent_to_db(33), -60);
    }

    #[test]
    fn test_out_of_range_db_is_clamped() {
        assert_eq!(db_to_percent(-120), 0);
        assert_eq!(db_to_percent(6), 100);
    }
}
