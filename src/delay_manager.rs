use log::info;
use rand::Rng;
use std::thread;
use std::time::Duration;

/// All randomized wait ranges of an enrichment run, in one injectable value.
/// The target site throttles accounts that fire requests on a fixed cadence,
/// so every wait is drawn uniformly from a range.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Seconds to let the search page settle after navigation.
    pub search_settle: (f64, f64),
    /// Seconds to wait for results after submitting a query.
    pub results_settle: (f64, f64),
    /// Seconds between incremental scrolls of the result list.
    pub scroll_settle: (f64, f64),
    /// Seconds between two companies.
    pub between_companies: (f64, f64),
}

impl Pacing {
    pub fn standard() -> Self {
        Pacing {
            search_settle: (3.0, 5.0),
            results_settle: (4.0, 6.0),
            scroll_settle: (2.0, 3.0),
            between_companies: (5.0, 8.0),
        }
    }

    /// Zero waits everywhere. Test use only.
    pub fn none() -> Self {
        Pacing {
            search_settle: (0.0, 0.0),
            results_settle: (0.0, 0.0),
            scroll_settle: (0.0, 0.0),
            between_companies: (0.0, 0.0),
        }
    }

    pub fn search_settle_delay(&self) {
        sleep_uniform_secs(self.search_settle);
    }

    pub fn results_settle_delay(&self) {
        sleep_uniform_secs(self.results_settle);
    }

    pub fn scroll_settle_delay(&self) {
        sleep_uniform_secs(self.scroll_settle);
    }

    pub fn between_companies_delay(&self) {
        let secs = sleep_uniform_secs(self.between_companies);
        if secs >= 1.0 {
            info!("Waited {:.1}s before next company", secs);
        }
    }
}

fn sleep_uniform_secs(range: (f64, f64)) -> f64 {
    let secs = if range.1 > range.0 {
        rand::thread_rng().gen_range(range.0..=range.1)
    } else {
        range.0
    };
    if secs > 0.0 {
        thread::sleep(Duration::from_secs_f64(secs));
    }
    secs
}

/// Duration of a scheduled long pause, uniform 4-8 minutes.
pub fn long_pause_duration() -> Duration {
    let minutes = rand::thread_rng().gen_range(4..=8);
    Duration::from_secs(minutes * 60)
}

/// Interval until the next scheduled long pause, uniform 25-40 minutes.
pub fn next_pause_interval() -> Duration {
    let minutes = rand::thread_rng().gen_range(25..=40);
    Duration::from_secs(minutes * 60)
}

/// Per-character jitter while typing into the search field, 50-150 ms.
pub fn typing_delay() {
    let millis = rand::thread_rng().gen_range(50..=150);
    thread::sleep(Duration::from_millis(millis));
}
