pub mod flags;

use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::Result;

use flags::FlagSet;

/// Warmup/measurement phase model. Count-based phases issue a fixed number of
/// calls per worker; duration-based phases run against the wall clock.
#[derive(Debug, Clone, Copy)]
pub enum Phases {
    Count { warmup: u64, measure: u64 },
    Duration { warmup: Duration, measure: Duration },
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub n_subscriber_records: u64,
    pub worker_count: NonZeroUsize,
    pub phases: Phases,
    pub seed: u64,
}

impl BenchConfig {
    /// Rejects configurations that must not reach the load or measurement
    /// stage.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.n_subscriber_records > 0,
            "the subscriber record count must be positive"
        );
        match self.phases {
            Phases::Count { warmup, measure } => {
                anyhow::ensure!(warmup > 0, "the warmup call count must be positive");
                anyhow::ensure!(measure > 0, "the measured call count must be positive");
            }
            Phases::Duration { warmup, measure } => {
                anyhow::ensure!(
                    warmup > Duration::from_secs(0),
                    "the warmup duration must be positive"
                );
                anyhow::ensure!(
                    measure > Duration::from_secs(0),
                    "the measurement duration must be positive"
                );
            }
        }
        Ok(())
    }
}

/// Parses the command line into a validated [`BenchConfig`]; `Ok(None)` means
/// help was requested and printed.
pub fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<BenchConfig>> {
    // Skip the program name
    args.next();

    let mut flag = FlagSet::new();

    let records = flag.u64_var("records", 100_000, "number of subscriber records");
    let workers = flag.u64_var("workers", 1, "number of concurrent workers");
    let warmup = flag.u64_var(
        "warmup",
        10_000,
        "warmup calls per worker (seconds with -time)",
    );
    let measure = flag.u64_var(
        "measure",
        100_000,
        "measured calls per worker (seconds with -time)",
    );
    let time_based = flag.bool_var("time", false, "interpret warmup/measure as seconds");
    let seed = flag.u64_var("seed", 42, "base seed for all random streams");
    let help = flag.bool_var("help", false, "print this help");

    flag.parse_args(args)?;

    if help.get() {
        println!("{}", flag.usage());
        return Ok(None);
    }

    let phases = if time_based.get() {
        Phases::Duration {
            warmup: Duration::from_secs(warmup.get()),
            measure: Duration::from_secs(measure.get()),
        }
    } else {
        Phases::Count {
            warmup: warmup.get(),
            measure: measure.get(),
        }
    };

    let worker_count = NonZeroUsize::new(workers.get() as usize)
        .ok_or_else(|| anyhow::anyhow!("at least one worker is required"))?;

    let config = BenchConfig {
        n_subscriber_records: records.get(),
        worker_count,
        phases,
        seed: seed.get(),
    };
    config.validate()?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("tatp-bench".to_owned())
            .chain(list.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn parses_a_count_based_run() {
        let config = parse_args(args(&[
            "-records", "1000", "-workers", "4", "-warmup", "10", "-measure", "20",
        ]))
        .unwrap()
        .expect("not a help invocation");

        assert_eq!(config.n_subscriber_records, 1000);
        assert_eq!(config.worker_count.get(), 4);
        match config.phases {
            Phases::Count { warmup, measure } => {
                assert_eq!(warmup, 10);
                assert_eq!(measure, 20);
            }
            Phases::Duration { .. } => panic!("expected count-based phases"),
        }
    }

    #[test]
    fn time_flag_switches_to_durations() {
        let config = parse_args(args(&["-time", "-warmup", "5", "-measure", "30"]))
            .unwrap()
            .expect("not a help invocation");
        match config.phases {
            Phases::Duration { warmup, measure } => {
                assert_eq!(warmup, Duration::from_secs(5));
                assert_eq!(measure, Duration::from_secs(30));
            }
            Phases::Count { .. } => panic!("expected duration-based phases"),
        }
    }

    #[test]
    fn help_short_circuits() {
        assert!(parse_args(args(&["-help"])).unwrap().is_none());
    }

    #[test]
    fn rejects_zero_workers_and_zero_records() {
        assert!(parse_args(args(&["-workers", "0"])).is_err());
        assert!(parse_args(args(&["-records", "0"])).is_err());
    }

    #[test]
    fn rejects_non_positive_phase_parameters() {
        assert!(parse_args(args(&["-warmup", "0"])).is_err());
        assert!(parse_args(args(&["-measure", "0"])).is_err());
        assert!(parse_args(args(&["-time", "-warmup", "0"])).is_err());
        assert!(parse_args(args(&["-time", "-measure", "0"])).is_err());
    }

    #[test]
    fn validate_accepts_a_sane_config() {
        let config = BenchConfig {
            n_subscriber_records: 10,
            worker_count: NonZeroUsize::new(1).unwrap(),
            phases: Phases::Count {
                warmup: 1,
                measure: 1,
            },
            seed: 0,
        };
        assert!(config.validate().is_ok());
    }
}
