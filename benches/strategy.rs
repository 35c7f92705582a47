#![feature(test)]
extern crate tapesched;
extern crate test;
#[macro_use]
extern crate trackable;

use std::time::Duration;
use tapesched::clock::{Clock, ManualClock};
use tapesched::informant::{MemoryTapeInfoProvider, TapeInformant};
use tapesched::job::{FileId, Job, JobId};
use tapesched::requirements::RequirementsCheckerBuilder;
use tapesched::strategy::{SchedulingStrategy, SchedulingStrategyBuilder};
use tapesched::tape::{FileInfo, TapeInfo};
use test::Bencher;

const TAPES: usize = 16;

fn file_id(i: usize) -> FileId {
    FileId::new(format!("{:016X}", i))
}

fn strategy(clock: &ManualClock, files: usize) -> SchedulingStrategy {
    let provider = MemoryTapeInfoProvider::new();
    for t in 0..TAPES {
        provider.add_tape_info(format!("tape{}", t), TapeInfo::new(1 << 40, 1 << 39));
    }
    for i in 0..files {
        provider.add_file_info(file_id(i), FileInfo::new(1 << 20, format!("tape{}", i % TAPES)));
    }
    let checker = track_try_unwrap!(RequirementsCheckerBuilder::new()
        .max_active_tapes(4)
        .min_requests_for_tape_selection(Some(1))
        .min_job_waiting_time(Duration::from_secs(0))
        .finish());
    SchedulingStrategyBuilder::new()
        .refresh_interval(Duration::from_secs(0))
        .clock(clock.clone())
        .finish(checker, TapeInformant::new(provider))
}

#[bench]
fn add_jobs(b: &mut Bencher) {
    let clock = ManualClock::default();
    let strategy = strategy(&clock, 0);
    let mut i = 0;
    b.iter(|| {
        strategy.add(Job::new(JobId::new("bench", file_id(i)), clock.now()));
        i += 1;
    });
}

#[bench]
fn add_and_remove_1000_jobs(b: &mut Bencher) {
    let clock = ManualClock::default();
    let strategy = strategy(&clock, 1000);
    b.iter(|| {
        for i in 0..1000 {
            strategy.add(Job::new(JobId::new("bench", file_id(i)), clock.now()));
        }
        let mut removed = 0;
        while strategy.remove().is_some() {
            removed += 1;
        }
        assert_eq!(removed, 1000);
    });
}
