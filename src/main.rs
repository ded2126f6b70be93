// src/main.rs
//
// Scripted session: a few notes, a note-off, a mute that is taken back,
// and an alarm, driven block by block from a sample clock.

use ringout::{
    AudioChange, CommandBackend, Notification, SampleClock, Scheduler, VoiceKind, Wake,
    config::DEFAULT_SAMPLE_RATE,
};

/// ===============================
/// Script
/// ===============================

/// Changes to send once the clock reaches the given time.
fn script() -> Vec<(f64, Vec<AudioChange>)> {
    vec![
        (
            0.0,
            vec![
                AudioChange::NoteOn {
                    t: 0.05,
                    frequency: 261.63,
                    kind: VoiceKind::Piano,
                    velocity: 0.8,
                },
                AudioChange::NoteOn {
                    t: 0.05,
                    frequency: 329.63,
                    kind: VoiceKind::Guitar,
                    velocity: 0.6,
                },
                AudioChange::Alarm { t: 0.5 },
            ],
        ),
        (
            0.3,
            vec![AudioChange::NoteOff {
                t: 0.3,
                frequency: 329.63,
            }],
        ),
        (
            0.4,
            vec![
                AudioChange::Mute { t: 0.9 },
                AudioChange::NoteOn {
                    t: 0.45,
                    frequency: 196.0,
                    kind: VoiceKind::Pad,
                    velocity: 1.0,
                },
            ],
        ),
        (0.6, vec![AudioChange::Cancel { t: 0.8 }]),
    ]
}

/// ===============================
/// Main
/// ===============================

fn main() {
    let block_frames = 512;
    let backend = CommandBackend::new();
    let commands = backend.clone();

    let mut scheduler = Scheduler::new(
        SampleClock::new(DEFAULT_SAMPLE_RATE),
        Vec::<Notification>::new(),
        Box::new(backend),
    );

    println!("Starting scheduler demo…");

    let mut script = script().into_iter().peekable();
    let mut wake = Wake::Idle;

    loop {
        let now = scheduler.now();

        while let Some((_, changes)) = script.next_if(|(at, _)| *at <= now) {
            wake = scheduler.apply(&changes);
            println!("{:.3}s  applied {} change(s) -> {:?}", now, changes.len(), wake);
        }

        if !wake.is_idle() {
            wake = scheduler.update();
        }

        for n in scheduler.observer_mut().drain(..) {
            match n {
                Notification::MetersShouldUpdate => {}
                other => println!("{:.3}s  {:?}", now, other),
            }
        }

        let replayed = commands.drain();
        if !replayed.is_empty() {
            println!("{:.3}s  {} graph command(s)", now, replayed.len());
        }

        if wake.is_idle() && script.peek().is_none() {
            break;
        }

        scheduler.clock_mut().advance_samples(block_frames);
    }

    println!("Demo finished at {:.3}s.", scheduler.now());
}
