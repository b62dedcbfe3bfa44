//! Ported from `rooms/graveyard.py`: a long scripted audio sequence with a
//! background "random cannon fire" task layered on top. The historical
//! script hand-tunes dozens of individual cue offsets; this keeps the
//! phase structure (stinger, wait, background loop, wait, stinger) and
//! the random-interval background task, not every individual timestamp.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::info;

use super::super::RoomContext;

const CHANNEL: &str = "graveyard";

pub fn run(ctx: &RoomContext) {
    info!("[graveyard] starting");

    while ctx.house.house_active() || ctx.house.demo() {
        medallion_calls_event(ctx);
        if ctx.should_exit() {
            break;
        }
        becketts_death_event(ctx);

        if ctx.poll_sleep(Duration::from_secs(30)) {
            break;
        }
        if ctx.house.demo() {
            break;
        }
    }

    info!("[graveyard] exiting");
}

fn play(ctx: &RoomContext, name: &str, gain: f32) {
    match ctx.clips.load(name) {
        Ok(clip) => {
            if let Err(e) = ctx.mixer.play_audio_with_gain(CHANNEL, clip, gain, false, true) {
                tracing::warn!("[graveyard] playback of {} failed: {:#}", name, e);
            }
        }
        Err(e) => tracing::warn!("[graveyard] missing clip {}: {:#}", name, e),
    }
}

fn medallion_calls_event(ctx: &RoomContext) {
    info!("[graveyard] Medallion Calls event starting");
    play(ctx, "TheMedallionCalls.wav", 0.6);
    if ctx.poll_sleep(Duration::from_secs(17)) {
        return;
    }

    let stop = Arc::new(AtomicBool::new(false));
    spawn_random_cannons(ctx, "attacker", stop.clone());

    if ctx.poll_sleep(Duration::from_secs(3)) {
        stop.store(true, Ordering::Release);
        return;
    }
    play(ctx, "waterWave01.wav", 1.0);
    if ctx.poll_sleep(Duration::from_millis(800)) {
        stop.store(true, Ordering::Release);
        return;
    }
    play(ctx, "impactDebris01.wav", 1.0);

    let remaining = ctx.poll_sleep(Duration::from_secs(25));
    stop.store(true, Ordering::Release);
    if remaining {
        return;
    }
    info!("[graveyard] Medallion Calls event ending");
}

fn becketts_death_event(ctx: &RoomContext) {
    info!("[graveyard] Beckett's Death event starting");
    play(ctx, "GraveyardScene2v2.wav", 0.6);
    if ctx.poll_sleep(Duration::from_secs(58)) {
        return;
    }
    play(ctx, "CannonDesigned_2.wav", 1.2);
    if ctx.poll_sleep(Duration::from_secs(5)) {
        return;
    }

    let stop = Arc::new(AtomicBool::new(false));
    spawn_random_cannons(ctx, "designed", stop.clone());
    let remaining = ctx.poll_sleep(Duration::from_secs(30));
    stop.store(true, Ordering::Release);
    if remaining {
        return;
    }
    info!("[graveyard] Beckett's Death event ending");
}

fn spawn_random_cannons(ctx: &RoomContext, kind: &str, stop: Arc<AtomicBool>) {
    let ctx = ctx.clone();
    let files: Vec<&'static str> = if kind == "attacker" {
        vec!["CannonFireLow01.wav", "CannonFireLow02.wav", "CannonFireLow04.wav"]
    } else {
        vec!["CannonDesigned_1.wav", "CannonDesigned_2.wav", "CannonDesigned_3.wav", "CannonDesigned_4.wav"]
    };
    std::thread::Builder::new()
        .name(format!("graveyard-cannons-{kind}"))
        .spawn(move || {
            let mut rng = rand::thread_rng();
            while !stop.load(Ordering::Acquire) && ctx.house.house_active() {
                let file = files[rng.gen_range(0..files.len())];
                play(&ctx, file, 0.2);
                let wait = Duration::from_secs_f64(rng.gen_range(0.2..5.0));
                if ctx.poll_sleep(wait) {
                    return;
                }
            }
        })
        .expect("spawning graveyard background cannon thread");
}
