use std::time::{Duration, Instant};

use crate::options::TimingOption;
use crate::Error;

/// CPU time used by the calling thread so far
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn thread_cpu_time() -> Option<Duration> {
    let mut time = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: `time` is a valid timespec to write to
    let status = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut time) };
    if status != 0 {
        return None;
    }

    let seconds = u64::try_from(time.tv_sec).ok()?;
    let nanoseconds = u32::try_from(time.tv_nsec).ok()?;
    return Some(Duration::new(seconds, nanoseconds));
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn thread_cpu_time() -> Option<Duration> {
    None
}

/// CPU time of every thread in the current rayon pool, ordered by thread
/// index
fn pool_cpu_times() -> Vec<Option<Duration>> {
    rayon::broadcast(|_| thread_cpu_time())
}

#[derive(Debug, Clone)]
struct Start {
    wall: Instant,
    /// CPU time of the pool threads at start, empty for wall-clock timers
    threads: Vec<Option<Duration>>,
}

/// Timer accumulating the time spent between `start` and `stop` calls.
///
/// With [`TimingOption::ThreadTime`], the elapsed time is the minimum over
/// the threads of the rayon pool of the CPU time each thread used between
/// `start` and `stop`. This falls back to the wall-clock time when the
/// per-thread CPU time is not available on the current platform.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    mode: TimingOption,
    started: Option<Start>,
    total: Duration,
}

impl Timer {
    /// Create a new stopped wall-clock timer
    pub fn new() -> Timer {
        Timer::default()
    }

    /// Create a new stopped timer measuring time with `mode`
    pub fn with_mode(mode: TimingOption) -> Timer {
        Timer {
            mode: mode,
            started: None,
            total: Duration::ZERO,
        }
    }

    pub fn mode(&self) -> TimingOption {
        self.mode
    }

    /// Start the timer. It is an error to start a timer that is already
    /// running.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.started.is_some() {
            return Err(Error::Timer("trying to start a timer that is already started".into()));
        }

        let threads = match self.mode {
            TimingOption::WallClock => Vec::new(),
            TimingOption::ThreadTime => pool_cpu_times(),
        };

        self.started = Some(Start {
            wall: Instant::now(),
            threads: threads,
        });
        return Ok(());
    }

    /// Stop the timer and get the time elapsed since the corresponding call
    /// to `start`.
    pub fn stop(&mut self) -> Result<Duration, Error> {
        let started = self.started.take().ok_or_else(|| {
            Error::Timer("trying to stop a timer that was not started".into())
        })?;
        let wall = started.wall.elapsed();

        let elapsed = match self.mode {
            TimingOption::WallClock => wall,
            TimingOption::ThreadTime => {
                let end = pool_cpu_times();
                started.threads.iter().zip(&end)
                    .filter_map(|(start, end)| Some(end.as_ref()?.saturating_sub(*start.as_ref()?)))
                    .min()
                    .unwrap_or(wall)
            }
        };

        self.total += elapsed;
        return Ok(elapsed);
    }

    /// Is the timer currently running?
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Add some time to the total without measuring it
    pub fn add_time(&mut self, time: Duration) {
        self.total += time;
    }

    /// Total time accumulated by this timer
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Reset the total time to zero, and stop the timer if it is running
    pub fn reset(&mut self) {
        self.started = None;
        self.total = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use rayon::prelude::*;

    use super::*;

    /// Keep all threads of a pool busy for roughly `duration` of CPU time
    fn spin_all_threads(pool: &rayon::ThreadPool, duration: Duration) {
        pool.install(|| {
            rayon::broadcast(|_| {
                let start = thread_cpu_time().unwrap_or_default();
                let wall = Instant::now();
                let mut value = 0_u64;
                while thread_cpu_time().map_or(wall.elapsed(), |now| now - start) < duration {
                    value = value.wrapping_mul(6364136223846793005).wrapping_add(1);
                }
                std::hint::black_box(value);
            });
        });
    }

    #[test]
    fn start_stop() {
        let mut timer = Timer::new();
        assert_eq!(timer.mode(), TimingOption::WallClock);
        timer.start().unwrap();
        assert!(timer.is_running());
        let elapsed = timer.stop().unwrap();
        assert!(!timer.is_running());
        assert_eq!(timer.total(), elapsed);

        timer.add_time(Duration::from_nanos(100));
        assert_eq!(timer.total(), elapsed + Duration::from_nanos(100));

        timer.reset();
        assert_eq!(timer.total(), Duration::ZERO);
    }

    #[test]
    fn errors() {
        for mode in TimingOption::all() {
            let mut timer = Timer::with_mode(mode);
            let error = timer.stop().unwrap_err();
            assert_eq!(error.to_string(), "timer error: trying to stop a timer that was not started");

            timer.start().unwrap();
            let error = timer.start().unwrap_err();
            assert_eq!(error.to_string(), "timer error: trying to start a timer that is already started");
        }
    }

    #[test]
    fn thread_time() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let (busy, idle) = pool.install(|| {
            let mut timer = Timer::with_mode(TimingOption::ThreadTime);
            timer.start().unwrap();
            spin_all_threads(&pool, Duration::from_millis(20));
            let busy = timer.stop().unwrap();

            // sleeping does not use any CPU time
            timer.start().unwrap();
            std::thread::sleep(Duration::from_millis(20));
            let idle = timer.stop().unwrap();
            (busy, idle)
        });

        assert!(busy >= Duration::from_millis(15), "{:?}", busy);
        if thread_cpu_time().is_some() {
            assert!(idle < Duration::from_millis(15), "{:?}", idle);
        }
    }

    #[test]
    fn minimum_over_threads() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        if thread_cpu_time().is_none() {
            return;
        }

        let elapsed = pool.install(|| {
            let mut timer = Timer::with_mode(TimingOption::ThreadTime);
            timer.start().unwrap();
            // only one of the two threads does some work
            (0..1).into_par_iter().for_each(|_| {
                let start = Instant::now();
                let mut value = 0_u64;
                while start.elapsed() < Duration::from_millis(30) {
                    value = value.wrapping_add(1);
                }
                std::hint::black_box(value);
            });
            timer.stop().unwrap()
        });

        assert!(elapsed < Duration::from_millis(15), "{:?}", elapsed);
    }
}
