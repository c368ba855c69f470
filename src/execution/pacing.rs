//! Think Time and Resource Naming
//!
//! Random pauses between phases and random resource names, both drawn from
//! the thread-local generator.

use std::thread;
use std::time::Duration;

use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random parts of generated names.
const SUFFIX_LEN: usize = 8;

/// Picks a duration uniformly from `[min_secs, max_secs]`.
///
/// Returns `min_secs` when the range is empty and zero for bounds that are
/// negative or not representable as a [`Duration`].
pub fn pick_duration<R: Rng + ?Sized>(min_secs: f64, max_secs: f64, rng: &mut R) -> Duration {
    if !(is_representable(min_secs) && is_representable(max_secs)) {
        return Duration::ZERO;
    }
    let secs = if max_secs <= min_secs {
        min_secs
    } else {
        rng.gen_range(min_secs..=max_secs)
    };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Whether `secs` is a valid sleep length in seconds.
pub fn is_representable(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

/// Blocks the calling thread for a random duration in `[min_secs, max_secs]`.
///
/// Returns the duration slept.
pub fn sleep_between(min_secs: f64, max_secs: f64) -> Duration {
    let duration = pick_duration(min_secs, max_secs, &mut rand::thread_rng());
    if !duration.is_zero() {
        debug!("Sleeping {:.3}s", duration.as_secs_f64());
        thread::sleep(duration);
    }
    duration
}

/// Generates resource names sharing a random per-run prefix.
///
/// The prefix lets leftovers of one run be found by name.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    prefix: String,
}

impl NameGenerator {
    pub fn new(base: &str) -> Self {
        Self {
            prefix: format!("{}_{}", base, random_suffix()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a fresh name carrying this generator's prefix.
    pub fn generate(&self) -> String {
        format!("{}_{}", self.prefix, random_suffix())
    }

    /// True if `name` was produced by this generator.
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .map_or(false, |rest| rest.starts_with('_'))
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Instant;

    #[test]
    fn test_pick_duration_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let d = pick_duration(0.5, 1.5, &mut rng).as_secs_f64();
            assert!((0.5..=1.5).contains(&d), "{} out of range", d);
        }
    }

    #[test]
    fn test_pick_duration_degenerate_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_duration(0.0, 0.0, &mut rng), Duration::ZERO);
        assert_eq!(pick_duration(2.0, 1.0, &mut rng), Duration::from_secs(2));
        assert_eq!(pick_duration(-1.0, 1.0, &mut rng), Duration::ZERO);
        assert_eq!(pick_duration(f64::NAN, 1.0, &mut rng), Duration::ZERO);
    }

    #[test]
    fn test_pick_duration_out_of_range_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_duration(1e300, 1e300, &mut rng), Duration::ZERO);
        assert_eq!(pick_duration(0.0, f64::INFINITY, &mut rng), Duration::ZERO);
        assert!(is_representable(0.5));
        assert!(!is_representable(1e300));
        assert!(!is_representable(-1.0));
    }

    #[test]
    fn test_sleep_between_zero_returns_immediately() {
        let start = Instant::now();
        assert_eq!(sleep_between(0.0, 0.0), Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_between_blocks() {
        let start = Instant::now();
        let slept = sleep_between(0.02, 0.04);
        assert!(slept >= Duration::from_millis(20));
        assert!(start.elapsed() >= slept);
    }

    #[test]
    fn test_names_share_prefix() {
        let names = NameGenerator::new("novaload");
        let a = names.generate();
        let b = names.generate();

        assert!(names.prefix().starts_with("novaload_"));
        assert!(names.owns(&a));
        assert!(names.owns(&b));
        assert_ne!(a, b);
        assert!(!names.owns("cirros"));
        assert!(!NameGenerator::new("novaload").owns(&a));
    }
}
