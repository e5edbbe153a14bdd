//! Token-bucket pacing of message output.
//!
//! A pass-through [`JsonWriter`] decorator keeping the average output
//! rate at a configured bytes-per-second value with a configurable
//! burst. Messages that would overflow the bucket are either dropped
//! (reported as success) or delayed until they fit. The bucket math runs
//! in plain floating point; timestamps only appear when a sleep deadline
//! is scheduled.

use ttylog_core::{Error, JsonWriter, Result};
use ttylog_proto::TimeSpec;

/// A monotonic-ish time source the limiter drains its bucket against.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Result<TimeSpec>;

    /// Sleeps until an absolute deadline of this clock. An interrupted
    /// sleep returns the `Interrupted` I/O error without sleeping on.
    fn sleep_until(&self, deadline: TimeSpec) -> Result<()>;
}

/// The operating system's monotonic clock.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

#[cfg(unix)]
impl Clock for MonotonicClock {
    fn now(&self) -> Result<TimeSpec> {
        let ts = nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)
            .map_err(|errno| Error::Io(std::io::Error::from_raw_os_error(errno as i32)))?;
        Ok(TimeSpec::new(ts.tv_sec(), ts.tv_nsec()))
    }

    fn sleep_until(&self, deadline: TimeSpec) -> Result<()> {
        let req = nix::sys::time::TimeSpec::new(deadline.sec, deadline.nsec);
        match nix::time::clock_nanosleep(
            nix::time::ClockId::CLOCK_MONOTONIC,
            nix::time::ClockNanosleepFlags::TIMER_ABSTIME,
            &req,
        ) {
            Ok(_) => Ok(()),
            Err(errno) => Err(Error::Io(std::io::Error::from_raw_os_error(errno as i32))),
        }
    }
}

/// Pacing parameters.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Average rate limit, bytes per second. Must be non-zero.
    pub rate: u64,
    /// Burst capacity on top of the rate, bytes.
    pub burst: u64,
    /// Drop overflowing messages instead of delaying them.
    pub drop: bool,
}

/// A rate-limiting [`JsonWriter`] decorator.
#[derive(Debug)]
pub struct RateLimitJsonWriter<W, C> {
    below: W,
    clock: C,
    rate: f64,
    limit: f64,
    drop: bool,
    synced: bool,
    last_sync: TimeSpec,
    bucket: f64,
}

impl<W: JsonWriter, C: Clock> RateLimitJsonWriter<W, C> {
    /// Decorates `below` with pacing against `clock`.
    pub fn new(below: W, clock: C, config: &RateLimitConfig) -> Result<Self> {
        if config.rate == 0 {
            return Err(Error::InvalidParam("rate"));
        }
        Ok(RateLimitJsonWriter {
            below,
            clock,
            rate: config.rate as f64,
            limit: (config.rate + config.burst) as f64,
            drop: config.drop,
            synced: false,
            last_sync: TimeSpec::ZERO,
            bucket: 0.0,
        })
    }

    /// Consumes the decorator, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.below
    }
}

impl<W: JsonWriter, C: Clock> JsonWriter for RateLimitJsonWriter<W, C> {
    fn write(&mut self, id: u64, line: &[u8]) -> Result<()> {
        let now = self.clock.now()?;

        // Drain the bucket for the time passed since the last sync
        if self.synced {
            let elapsed = (now - self.last_sync).to_fp().max(0.0);
            self.bucket = (self.bucket - elapsed * self.rate).max(0.0);
        } else {
            self.synced = true;
        }
        self.last_sync = now;

        let poured = self.bucket + line.len() as f64;
        if poured > self.limit {
            if self.drop {
                tracing::debug!(id, len = line.len(), "rate limit exceeded, dropping message");
                return Ok(());
            }
            // Wait exactly until the overflow has drained away
            let delay = (poured - self.limit) / self.rate;
            let wakeup = self.last_sync.cap_add(TimeSpec::from_fp(delay));
            self.clock.sleep_until(wakeup)?;
            self.below.write(id, line)?;
            self.bucket = self.limit;
            self.last_sync = wakeup;
            return Ok(());
        }

        self.below.write(id, line)?;
        self.bucket = poured;
        Ok(())
    }
}
