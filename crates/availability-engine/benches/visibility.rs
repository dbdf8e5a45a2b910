use std::hint::black_box;

use availability_engine::{
    block, AppointmentRole, Attendee, AvailableSchedule, CalendarEvent, EventFormat, Identity,
    MeetingDurations, PartStat, VisibleScheduleBuilder,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn owner() -> Identity {
    Identity::new("Owner", "owner@example.edu")
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// Weekday 9:00-17:00 availability for `weeks` weeks, capacity 4.
fn schedule(weeks: i64) -> AvailableSchedule {
    let blocks = block::create_blocks(
        "9:00 AM",
        "5:00 PM",
        "MTWRF",
        day(0),
        day(weeks * 7 - 1),
        4,
        Some("Room 101"),
    )
    .unwrap();
    AvailableSchedule::new(blocks)
}

/// Two accepted events per day: one ordinary meeting, one shared appointment.
fn events(weeks: i64) -> Vec<CalendarEvent> {
    let accepted = Attendee::new(owner(), AppointmentRole::Owner, PartStat::Accepted);
    let visitor = Attendee::new(
        Identity::new("Visitor", "visitor@example.edu"),
        AppointmentRole::Visitor,
        PartStat::Accepted,
    );
    (0..weeks * 7)
        .flat_map(|offset| {
            let date = day(offset);
            [
                CalendarEvent::new(at(date, 10, 15), at(date, 11, 45), vec![accepted.clone()]),
                CalendarEvent::appointment(
                    at(date, 14, 0),
                    at(date, 14, 30),
                    vec![accepted.clone(), visitor.clone()],
                    EventFormat::Current(4),
                ),
            ]
        })
        .collect()
}

fn bench_visible_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("visible_schedule");
    let builder = VisibleScheduleBuilder::new();

    for weeks in [1i64, 4, 12] {
        let schedule = schedule(weeks);
        let events = events(weeks);
        let window_start = at(day(0), 0, 0);
        let window_end = at(day(weeks * 7), 0, 0);
        group.bench_with_input(BenchmarkId::new("weeks", weeks), &weeks, |b, _| {
            b.iter(|| {
                builder
                    .calculate_visible_schedule(
                        black_box(window_start),
                        black_box(window_end),
                        &schedule,
                        &events,
                        &MeetingDurations::THIRTY,
                        &owner(),
                        None,
                    )
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_expand_combine(c: &mut Criterion) {
    let schedule = schedule(12);
    c.bench_function("expand_combine_12_weeks", |b| {
        b.iter(|| {
            let minutes = block::expand_set(black_box(schedule.blocks()).iter(), 1);
            block::combine(&minutes)
        });
    });
}

criterion_group!(benches, bench_visible_schedule, bench_expand_combine);
criterion_main!(benches);
