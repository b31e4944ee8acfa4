use crate::delay_manager;
use crate::driver::{ChromeDriver, PageDriver};
use crate::error::EnrichmentError;
use chrono::Local;
use headless_chrome::{Browser, LaunchOptions};
use log::{info, warn};
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

pub const LANDING_URL: &str = "https://www.linkedin.com/sales/";

/// URL fragments that mark an unauthenticated or challenge state.
const LOGIN_URL_MARKERS: &[&str] = &["login", "checkpoint"];

const RELOGIN_EVERY_N_PAUSES: u32 = 2;

const LANDING_SETTLE: Duration = Duration::from_secs(3);
const LOGIN_RECHECK_SETTLE: Duration = Duration::from_secs(2);

/// Live authenticated browsing context. Dropping it tears down Chrome, so
/// holding the value is holding the resource.
pub struct Session {
    driver: ChromeDriver,
    _browser: Browser,
}

impl Session {
    pub fn driver(&self) -> &ChromeDriver {
        &self.driver
    }
}

/// When the next long pause is due and how many have fired. A plain value,
/// threaded through the row loop and replaced whenever a pause fires.
#[derive(Debug, Clone, Copy)]
pub struct PauseSchedule {
    next_pause_at: Instant,
    pause_count: u32,
}

impl PauseSchedule {
    pub fn starting_at(now: Instant) -> Self {
        PauseSchedule {
            next_pause_at: now + delay_manager::next_pause_interval(),
            pause_count: 0,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        now >= self.next_pause_at
    }

    /// Count the pause that just finished and schedule the next one,
    /// strictly later than `now`.
    pub fn record_pause(self, now: Instant) -> Self {
        PauseSchedule {
            next_pause_at: now + delay_manager::next_pause_interval(),
            pause_count: self.pause_count + 1,
        }
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_count
    }

    pub fn next_pause_at(&self) -> Instant {
        self.next_pause_at
    }

    #[cfg(test)]
    pub fn with_next_pause_at(next_pause_at: Instant, pause_count: u32) -> Self {
        PauseSchedule {
            next_pause_at,
            pause_count,
        }
    }
}

/// Blocking signal that a human finished logging in. Injectable so tests can
/// auto-confirm instead of reading the console.
pub type LoginPrompt = Box<dyn Fn() -> bool>;

fn console_login_prompt() -> bool {
    print!("Please log in in the browser window, then press ENTER to continue... ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).is_ok()
}

/// Owns the browser lifecycle: launch with a persistent profile, the login
/// gate, the scheduled long pauses with periodic relogin, and teardown.
pub struct SessionController {
    login_prompt: LoginPrompt,
}

impl SessionController {
    pub fn new() -> Self {
        SessionController {
            login_prompt: Box::new(console_login_prompt),
        }
    }

    pub fn with_login_prompt(login_prompt: LoginPrompt) -> Self {
        SessionController { login_prompt }
    }

    /// Launch non-headless Chrome on the persistent profile and open the one
    /// tab the whole run uses. The idle timeout must outlast the longest
    /// pause, or Chrome is reaped mid-run.
    pub fn start(&self, profile_dir: &Path) -> Result<Session, EnrichmentError> {
        std::fs::create_dir_all(profile_dir)?;
        info!("Launching browser with profile {:?}", profile_dir);

        let options = LaunchOptions::default_builder()
            .headless(false)
            .user_data_dir(Some(profile_dir.to_path_buf()))
            .window_size(Some((1280, 900)))
            .idle_browser_timeout(Duration::from_secs(24 * 60 * 60))
            .build()
            .map_err(|e| EnrichmentError::BrowserLaunch(e.to_string()))?;

        let browser =
            Browser::new(options).map_err(|e| EnrichmentError::BrowserLaunch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| EnrichmentError::BrowserLaunch(e.to_string()))?;

        Ok(Session {
            driver: ChromeDriver::new(tab),
            _browser: browser,
        })
    }

    /// Navigate to the landing page and check the URL for a login wall. If
    /// one is up, block on the human prompt and re-check once.
    pub fn ensure_logged_in(&self, driver: &dyn PageDriver) -> bool {
        if let Err(e) = driver.navigate(LANDING_URL) {
            warn!("Could not reach {}: {}", LANDING_URL, e);
            return false;
        }
        thread::sleep(LANDING_SETTLE);

        if !login_wall_up(driver) {
            info!("Session is already authenticated");
            return true;
        }

        info!("Login wall detected, waiting for manual login");
        if !(self.login_prompt)() {
            return false;
        }
        thread::sleep(LOGIN_RECHECK_SETTLE);
        !login_wall_up(driver)
    }

    /// If the schedule is due: sleep the long pause, count it, relogin after
    /// every second pause (failure is logged, never fatal), and hand back the
    /// rescheduled value.
    pub fn maybe_pause(&self, driver: &dyn PageDriver, schedule: PauseSchedule) -> PauseSchedule {
        if !schedule.due(Instant::now()) {
            return schedule;
        }

        let duration = delay_manager::long_pause_duration();
        info!("Scheduled pause, sleeping {} minutes", duration.as_secs() / 60);
        thread::sleep(duration);

        let schedule = schedule.record_pause(Instant::now());
        info!("Pause finished ({} so far)", schedule.pause_count());

        if schedule.pause_count() % RELOGIN_EVERY_N_PAUSES == 0 {
            info!("Refreshing login after {} pauses", schedule.pause_count());
            if !self.ensure_logged_in(driver) {
                warn!("Relogin failed, continuing with the current session state");
            }
        }

        let eta = Local::now()
            + chrono::Duration::from_std(schedule.next_pause_at() - Instant::now())
                .unwrap_or_else(|_| chrono::Duration::zero());
        info!("Next pause scheduled around {}", eta.format("%H:%M:%S"));
        schedule
    }

    pub fn stop(&self, session: Session) {
        drop(session);
        info!("Browser session closed");
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

fn login_wall_up(driver: &dyn PageDriver) -> bool {
    match driver.current_url() {
        Ok(url) => LOGIN_URL_MARKERS.iter().any(|marker| url.contains(marker)),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn schedule_is_not_due_before_its_time() {
        let now = Instant::now();
        let schedule = PauseSchedule::with_next_pause_at(now + Duration::from_secs(60), 0);
        assert!(!schedule.due(now));
        assert!(schedule.due(now + Duration::from_secs(60)));
        assert!(schedule.due(now + Duration::from_secs(90)));
    }

    #[test]
    fn recording_a_pause_reschedules_strictly_later_and_counts() {
        let now = Instant::now();
        let schedule = PauseSchedule::with_next_pause_at(now, 3);
        let after = schedule.record_pause(now);
        assert!(after.next_pause_at() > now);
        assert_eq!(after.pause_count(), 4);
    }

    #[test]
    fn fresh_schedule_is_at_least_the_minimum_interval_away() {
        let now = Instant::now();
        let schedule = PauseSchedule::starting_at(now);
        assert!(schedule.next_pause_at() >= now + Duration::from_secs(25 * 60));
        assert_eq!(schedule.pause_count(), 0);
    }

    #[test]
    fn authenticated_url_needs_no_prompt() {
        let mock = MockDriver::new();
        let prompted = Rc::new(Cell::new(false));
        let flag = prompted.clone();
        let controller = SessionController::with_login_prompt(Box::new(move || {
            flag.set(true);
            true
        }));
        assert!(controller.ensure_logged_in(&mock));
        assert!(!prompted.get());
    }

    #[test]
    fn login_wall_that_stays_up_after_prompt_fails() {
        let mock = MockDriver::new();
        *mock.url.borrow_mut() = "https://www.linkedin.com/login".to_string();
        let controller = SessionController::with_login_prompt(Box::new(|| true));
        assert!(!controller.ensure_logged_in(&mock));
    }

    #[test]
    fn login_wall_cleared_by_human_succeeds() {
        let mock = MockDriver::new();
        *mock.url.borrow_mut() = "https://www.linkedin.com/checkpoint/challenge".to_string();
        let url = mock.url.clone();
        let controller = SessionController::with_login_prompt(Box::new(move || {
            *url.borrow_mut() = "https://www.linkedin.com/sales/home".to_string();
            true
        }));
        assert!(controller.ensure_logged_in(&mock));
    }

    #[test]
    fn declined_prompt_fails_the_login() {
        let mock = MockDriver::new();
        *mock.url.borrow_mut() = "https://www.linkedin.com/login".to_string();
        let controller = SessionController::with_login_prompt(Box::new(|| false));
        assert!(!controller.ensure_logged_in(&mock));
    }

    #[test]
    fn maybe_pause_leaves_undue_schedule_untouched() {
        let mock = MockDriver::new();
        let controller = SessionController::with_login_prompt(Box::new(|| true));
        let next = Instant::now() + Duration::from_secs(3600);
        let schedule = PauseSchedule::with_next_pause_at(next, 1);
        let after = controller.maybe_pause(&mock, schedule);
        assert_eq!(after.pause_count(), 1);
        assert_eq!(after.next_pause_at(), next);
    }
}
