//! Beat Clash headless runner
//!
//! Builds the built-in stage, plays a scripted match between two simple bots
//! and logs what happened. Pass a settings JSON path as the first argument to
//! override the defaults.

#[cfg(not(target_arch = "wasm32"))]
use std::process::ExitCode;

#[cfg(not(target_arch = "wasm32"))]
use beat_clash::consts::SIM_DT;
#[cfg(not(target_arch = "wasm32"))]
use beat_clash::sim::{
    Archetype, Button, Combatant, ControlIntent, DescriptorTable, FixedMusic, FrameReport,
    SimulationWorld, Stage, tick,
};
#[cfg(not(target_arch = "wasm32"))]
use beat_clash::{Settings, SimError};

/// Two minutes at 60 Hz
#[cfg(not(target_arch = "wasm32"))]
const MAX_FRAMES: u64 = 60 * 120;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Beat Clash (headless) starting...");

    let settings = match load_settings(std::env::args().nth(1)) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut world = SimulationWorld::new(
        Stage::proving_ground(),
        &[Archetype::Brawler, Archetype::Blinker],
        DescriptorTable::standard(),
        settings,
    );

    let mut bots = [Bot::default(), Bot::default()];
    let mut last = FrameReport::default();
    let mut clanks = 0;
    while world.frame < MAX_FRAMES {
        let inputs: Vec<ControlIntent> = world
            .combatants
            .iter()
            .zip(bots.iter_mut())
            .map(|(me, bot)| bot.think(me, &world.combatants, world.frame))
            .collect();
        // Music time tracks the frame clock, as a synced track would
        let music = FixedMusic(world.frame as f64 * SIM_DT as f64 * 1000.0);
        last = tick(&mut world, &inputs, &music, SIM_DT);

        clanks += last.clanks;
        for kill in &last.kills {
            log::info!(
                "Frame {}: combatant {} out ({:?}), {} stocks left",
                last.frame,
                kill.id,
                kill.cause,
                kill.stocks_left
            );
        }
        if last.match_over {
            break;
        }
    }

    log::info!("Finished after {} frames, {} clanks", world.frame, clanks);
    for view in &last.combatants {
        log::info!(
            "Combatant {}: {:.0}% damage, {} stocks, state '{}'",
            view.id,
            view.percent,
            view.stocks,
            view.animation
        );
    }
    match last.winner {
        Some(id) => log::info!("Winner: combatant {id}"),
        None => log::info!("No winner (time out)"),
    }
    match serde_json::to_string(&last) {
        Ok(json) => log::debug!("Final frame: {json}"),
        Err(e) => log::warn!("Could not serialize final frame: {e}"),
    }
    ExitCode::SUCCESS
}

#[cfg(not(target_arch = "wasm32"))]
fn load_settings(path: Option<String>) -> Result<Settings, SimError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    log::info!("Reading settings from {path}");
    let json = std::fs::read_to_string(&path)?;
    Settings::from_json(&json)
}

/// Chases the nearest opponent and swings when close
#[cfg(not(target_arch = "wasm32"))]
#[derive(Default)]
struct Bot {
    held: [bool; 3],
}

#[cfg(not(target_arch = "wasm32"))]
impl Bot {
    fn think(&mut self, me: &Combatant, all: &[Combatant], frame: u64) -> ControlIntent {
        let Some(foe) = all
            .iter()
            .filter(|c| c.id != me.id && !c.eliminated)
            .min_by(|a, b| {
                let da = a.center().distance_squared(me.center());
                let db = b.center().distance_squared(me.center());
                da.total_cmp(&db)
            })
        else {
            return ControlIntent::default();
        };

        let delta = foe.center() - me.center();
        let close = delta.x.abs() < 70.0 && delta.y.abs() < 60.0;
        let phase = (frame + me.id as u64 * 17) % 240;

        let jump = (!me.grounded && me.vel.y > 0.0 && me.center().y > 650.0) || delta.y < -120.0;
        let light = close && phase % 24 < 2;
        let heavy = close && (120..150).contains(&phase);
        let wants = [jump, light, heavy];
        let [jump, light, heavy] = std::array::from_fn(|i| Button::from_levels(self.held[i], wants[i]));
        self.held = wants;

        ControlIntent {
            move_x: if close { 0.0 } else { delta.x.signum() },
            move_y: 0.0,
            jump,
            light,
            heavy,
            special: Button::from_levels(false, !close && phase == 60),
            grab: Button::from_levels(false, close && phase == 200),
            ultimate: Button::from_levels(false, me.meter.is_full()),
            ..Default::default()
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on the web; the host embeds the simulation directly
}
