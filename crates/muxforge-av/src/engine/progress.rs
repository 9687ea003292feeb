//! Parser for ffmpeg `-progress` key=value output.

/// Turns ffmpeg `-progress` blocks into percent-complete values.
///
/// Values are only emitted when they grow, so the resulting sequence is
/// non-decreasing. `progress=end` always yields 100.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    out_time_us: Option<i64>,
    last: Option<u8>,
}

impl ProgressParser {
    /// Create a parser for a source of the given duration.
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            out_time_us: None,
            last: None,
        }
    }

    /// Last percentage emitted.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Feed one output line; returns a percentage when a block completes
    /// with a higher value than the last one emitted.
    pub fn feed(&mut self, line: &str) -> Option<u8> {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = val.trim().parse::<i64>() {
                self.out_time_us = Some(us);
            }
        } else if let Some(val) = line.strip_prefix("out_time_ms=") {
            // Despite the name, ffmpeg reports microseconds here too.
            if self.out_time_us.is_none() {
                self.out_time_us = val.trim().parse::<i64>().ok();
            }
        } else if let Some(state) = line.strip_prefix("progress=") {
            let pct = if state.trim() == "end" {
                Some(100)
            } else {
                self.current_percent()
            };
            self.out_time_us = None;
            return pct.and_then(|p| self.emit(p));
        }
        None
    }

    fn current_percent(&self) -> Option<u8> {
        let duration = self.duration_secs?;
        let out_us = self.out_time_us?;
        let elapsed = out_us.max(0) as f64 / 1_000_000.0;
        let pct = (elapsed / duration * 100.0).clamp(0.0, 99.0);
        Some(pct as u8)
    }

    fn emit(&mut self, pct: u8) -> Option<u8> {
        match self.last {
            Some(last) if pct <= last => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }
}
