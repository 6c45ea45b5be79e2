pub mod duration {
    use color_eyre::{
        eyre::{bail, eyre, WrapErr as _},
        Result,
    };
    use itertools::Itertools as _;

    /// Human-friendly duration used in configuration values (`30s`, `5m`, `500ms`, `1h`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
    #[serde(try_from = "String")]
    pub struct DurationWrapper(pub chrono::Duration);
    use chrono::Duration;
    use serde::Deserialize;

    impl TryFrom<String> for DurationWrapper {
        type Error = color_eyre::Report;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            Self::try_from(value.as_str())
        }
    }

    impl TryFrom<&str> for DurationWrapper {
        type Error = color_eyre::Report;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            let chars = value.trim().chars().collect_vec();
            let (time, time_str, parse_fn): (&[char], &str, Box<dyn Fn(i64) -> Option<Duration>>) = match chars.as_slice() {
                [milliseconds @ .., 'm', 's'] => (milliseconds, "milliseconds", Box::new(Duration::try_milliseconds)),
                [seconds @ .., 's'] => (seconds, "seconds", Box::new(Duration::try_seconds)),
                [minutes @ .., 'm'] => (minutes, "minutes", Box::new(Duration::try_minutes)),
                [hours @ .., 'h'] => (hours, "hours", Box::new(Duration::try_hours)),
                x => bail!(
                    "parsing duration: {x}: invalid suffix (only h, m, s, ms)",
                    x = x.iter().collect::<String>()
                ),
            };
            let time = time.iter().collect::<String>();
            let duration = time
                .parse::<i64>()
                .wrap_err("parsing duration from string")
                .and_then(|dur| parse_fn(dur).ok_or_else(|| eyre!("Could not parse {} as {}", time, time_str)))?;
            if duration < Duration::zero() {
                bail!("parsing duration: {value}: must not be negative");
            }
            Ok(DurationWrapper(duration))
        }
    }

    impl DurationWrapper {
        /// Infallible after construction, negative durations are rejected while parsing.
        pub fn to_std(&self) -> std::time::Duration {
            self.0.to_std().unwrap_or_default()
        }
    }
}

/// Elapsed-time fields of `sacct` (`CPUTime`, `TotalCPU`, `UserCPU`, `SystemCPU`).
pub mod interval {
    use color_eyre::{
        eyre::{bail, WrapErr as _},
        Result,
    };
    use itertools::Itertools as _;

    const SECS_PER_DAY: f64 = 86_400.0;

    /// `[D-][HH:]MM:SS[.fff]` to seconds.
    pub fn parse_interval_secs(value: &str) -> Result<f64> {
        let value = value.trim();
        let (days, clock) = match value.split_once('-') {
            Some((days, clock)) => (days.parse::<u32>().wrap_err_with(|| format!("days of interval `{value}`"))?, clock),
            None => (0, value),
        };
        let parts = clock.split(':').collect_vec();
        let (hours, minutes, seconds) = match parts.as_slice() {
            &[hours, minutes, seconds] => (hours, minutes, seconds),
            &[minutes, seconds] => ("0", minutes, seconds),
            _ => bail!("interval `{value}`: expected [D-][HH:]MM:SS[.fff]"),
        };
        let hours = hours.parse::<u32>().wrap_err_with(|| format!("hours of interval `{value}`"))?;
        let minutes = minutes.parse::<u32>().wrap_err_with(|| format!("minutes of interval `{value}`"))?;
        let seconds = seconds.parse::<f64>().wrap_err_with(|| format!("seconds of interval `{value}`"))?;

        Ok(f64::from(days) * SECS_PER_DAY + f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
    }
}

/// Memory fields of `sacct` (`ReqMem`, `MaxRSS`).
pub mod memory {
    use color_eyre::{
        eyre::{bail, WrapErr as _},
        Result,
    };
    use itertools::Itertools as _;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MemoryScope {
        PerNode,
        PerCore,
        /// No `n`/`c` suffix: newer Slurm versions report the whole request.
        Total,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Memory {
        pub bytes: i64,
        pub scope: MemoryScope,
    }

    impl Memory {
        pub fn kilobytes(&self) -> i64 {
            self.bytes / 1024
        }
    }

    /// `<n>[K|M|G|T][n|c]`, binary units. A bare number is bytes.
    pub fn parse_memory(value: &str) -> Result<Memory> {
        let chars = value.trim().chars().collect_vec();
        let (rest, scope) = match chars.as_slice() {
            [rest @ .., 'n'] => (rest, MemoryScope::PerNode),
            [rest @ .., 'c'] => (rest, MemoryScope::PerCore),
            rest => (rest, MemoryScope::Total),
        };
        let (digits, factor): (&[char], f64) = match rest {
            [digits @ .., 'K'] => (digits, 1024.0),
            [digits @ .., 'M'] => (digits, 1024.0 * 1024.0),
            [digits @ .., 'G'] => (digits, 1024.0 * 1024.0 * 1024.0),
            [digits @ .., 'T'] => (digits, 1024.0 * 1024.0 * 1024.0 * 1024.0),
            digits => (digits, 1.0),
        };
        if digits.is_empty() {
            bail!("memory `{value}`: missing amount");
        }
        let amount = digits
            .iter()
            .collect::<String>()
            .parse::<f64>()
            .wrap_err_with(|| format!("memory `{value}`: parsing amount"))?;

        let bytes = (amount * factor).round();
        // `i64::MAX as f64` rounds up to 2^63, which no longer fits
        if !(0.0..i64::MAX as f64).contains(&bytes) {
            bail!("memory `{value}`: out of range");
        }

        Ok(Memory {
            bytes: bytes as i64,
            scope,
        })
    }
}

pub use duration::DurationWrapper as Duration;
