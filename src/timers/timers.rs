use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct InnerTimer {
    start: Option<Instant>,
    elapsed: Duration,
}

impl InnerTimer {
    fn reset(&mut self) {
        self.start = None;
        self.elapsed = Duration::ZERO;
    }

    fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    fn stop(&mut self) {
        self.elapsed += self.start.unwrap().elapsed();
        self.start = None;
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// A flat collection of named timers with a stack of active keys.
#[derive(Default, Debug)]
pub struct Timers {
    stack: Vec<&'static str>,
    timers: HashMap<&'static str, InnerTimer>,
}

impl Timers {
    pub fn reset_timer(&mut self, key: &'static str) {
        self.timers.entry(key).or_default().reset();
    }

    /// starts the timer with name `key` as the current timer
    pub fn start_as_current(&mut self, key: &'static str) {
        self.timers.entry(key).or_default().start();
        self.stack.push(key);
    }

    /// stops the current timer.  There should always be one
    /// active when this function is reached.
    pub fn stop_current(&mut self) {
        let key = self.stack.pop().unwrap();
        self.timers.get_mut(key).unwrap().stop();
    }

    /// elapsed time of a named timer, in microseconds
    pub fn elapsed_us(&self, key: &'static str) -> f64 {
        self.timers
            .get(key)
            .map_or(0f64, |t| t.elapsed().as_secs_f64() * 1e6)
    }

    pub fn total_time(&self) -> Duration {
        self.timers
            .values()
            .fold(Duration::ZERO, |acc, t| acc + t.elapsed())
    }
}

macro_rules! timeit {
    ($timer:ident => $key:literal; $($tt:tt)+) => {

        $timer.start_as_current($key);
        $(
            $tt
        )+
        $timer.stop_current();
    }
}
pub(crate) use timeit;
