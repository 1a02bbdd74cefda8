//! Desktop simulator for the weather-anim display.
//!
//! Runs the core orchestrator against an `embedded-graphics-simulator`
//! display. With `HA_TOKEN` set it polls a real Home Assistant server,
//! otherwise it replays a scripted demo. See [`settings`] for variables.
//!
//! Built with the `sdl` feature it opens a window:
//!
//! | Key   | Action                             |
//! |-------|------------------------------------|
//! | 1-5   | Transition to Clear..Storm         |
//! | T     | Cycle the transition kind          |
//! | M     | Toggle simple / continuous mode    |
//! | R     | Poll Home Assistant now            |
//! | Q     | Quit                               |
//!
//! Without it the simulator runs headless on a simulated clock and writes
//! PNG snapshots to `SIM_OUTPUT_DIR`.

mod codec;
mod ha_client;
mod settings;

use embedded_graphics::pixelcolor::{BinaryColor, Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    BinaryColorTheme, OutputSettings, OutputSettingsBuilder, SimulatorDisplay,
};
use log::{error, info};

use weather_anim_core::display::{ColorDisplay, DisplayKind, MonochromeDisplay, WeatherDisplay};
use weather_anim_core::orchestrator::WeatherAnimations;
use weather_anim_core::source::{EntityState, ScriptedSource, WeatherSource};

use codec::ImageCrateDecoder;
use ha_client::HomeAssistantSource;
use settings::Settings;

/// Panel size of the colour TFT.
const TFT_SIZE: Size = Size::new(320, 240);

/// Window scale for the small OLED canvas.
const OLED_WINDOW_SCALE: u32 = 4;

type Animations<'a, P> = WeatherAnimations<'a, P, Box<dyn WeatherSource + 'a>, ImageCrateDecoder>;

/// A wrapped simulator display the runner can show or snapshot.
trait Panel: WeatherDisplay {
    type Color: PixelColor + Into<Rgb888>;

    fn simulator(&self) -> &SimulatorDisplay<Self::Color>;
}

impl Panel for MonochromeDisplay<SimulatorDisplay<BinaryColor>> {
    type Color = BinaryColor;

    fn simulator(&self) -> &SimulatorDisplay<BinaryColor> {
        self.inner()
    }
}

impl Panel for ColorDisplay<SimulatorDisplay<Rgb565>> {
    type Color = Rgb565;

    fn simulator(&self) -> &SimulatorDisplay<Rgb565> {
        self.inner()
    }
}

/// States replayed when no server is configured.
fn demo_source() -> ScriptedSource {
    let mut source = ScriptedSource::new()
        .with_reading("sensor.indoor", "21.4")
        .with_reading("sensor.outdoor", "12.9");
    for (state, is_day) in [
        ("sunny", true),
        ("partlycloudy", true),
        ("rainy", true),
        ("snowy", false),
        ("lightning-rainy", false),
        ("clear-night", false),
    ] {
        source.push_state(EntityState::new(state).with_daytime(is_day));
    }
    source
}

fn main() {
    // A missing .env is normal; everything has a default.
    dotenvy::dotenv().ok();
    env_logger::init();

    let settings = Settings::from_vars(std::env::vars());
    let mut config = settings.config();

    let source: Box<dyn WeatherSource + '_> = if settings.is_live() {
        match HomeAssistantSource::new(config.server.clone()) {
            Ok(source) => {
                info!("Polling {}", config.server.state_url(config.entities.weather));
                Box::new(source)
            }
            Err(e) => {
                error!("Could not create HTTP client: {}", e);
                return;
            }
        }
    } else {
        info!("HA_TOKEN not set, running the offline demo");
        if config.entities.indoor_temperature.is_none() {
            config.entities.indoor_temperature = Some("sensor.indoor");
            config.entities.outdoor_temperature = Some("sensor.outdoor");
        }
        Box::new(demo_source())
    };

    let canvas = Size::new(config.display.width, config.display.height);
    info!(
        "Display: {:?}, canvas {}x{}",
        config.display.kind, canvas.width, canvas.height
    );

    match config.display.kind {
        DisplayKind::Monochrome => {
            let display = MonochromeDisplay::new(SimulatorDisplay::<BinaryColor>::new(canvas));
            let output = OutputSettingsBuilder::new()
                .theme(BinaryColorTheme::OledBlue)
                .scale(OLED_WINDOW_SCALE)
                .build();
            let anim = WeatherAnimations::new(config, source, ImageCrateDecoder)
                .with_display(display);
            run(anim, &settings, &output);
        }
        DisplayKind::Color => {
            let mut display = ColorDisplay::new(SimulatorDisplay::<Rgb565>::new(TFT_SIZE), canvas)
                .with_colors(Rgb565::new(31, 50, 8), Rgb565::new(2, 4, 8));
            if let Err(e) = display.clear_panel() {
                error!("Could not clear panel: {:?}", e);
            }
            let output = OutputSettingsBuilder::new().scale(1).build();
            let anim = WeatherAnimations::new(config, source, ImageCrateDecoder)
                .with_display(display);
            run(anim, &settings, &output);
        }
    }

    info!("Simulator exiting");
}

#[cfg(not(feature = "sdl"))]
fn run<P: Panel>(mut anim: Animations<'_, P>, settings: &Settings, output: &OutputSettings) {
    use embassy_time::Instant;

    /// Simulated tick length (~30 FPS).
    const TICK_MS: u64 = 33;
    const SNAPSHOT_EVERY_MS: u64 = 500;

    let dir = std::path::Path::new(settings.output_dir());
    if let Err(e) = std::fs::create_dir_all(dir) {
        error!("Cannot create {}: {}", dir.display(), e);
        return;
    }

    if let Err(e) = anim.begin(Instant::from_millis(0)) {
        error!("Failed to start: {}", e);
        return;
    }

    let duration = settings.duration_ms();
    let mut next_snapshot = 0;
    let mut t = 0;
    while t <= duration {
        anim.update(Instant::from_millis(t));

        if t >= next_snapshot {
            let Some(panel) = anim.display() else { break };
            let path = dir.join(format!("frame_{:06}.png", t));
            if let Err(e) = panel.simulator().to_rgb_output_image(output).save_png(&path) {
                error!("Failed to write {}: {}", path.display(), e);
                return;
            }
            next_snapshot += SNAPSHOT_EVERY_MS;
        }
        t += TICK_MS;
    }

    info!(
        "Wrote {} ms of frames to {} (last weather {:?})",
        duration,
        dir.display(),
        anim.current_weather()
    );
}

#[cfg(feature = "sdl")]
fn run<P: Panel>(mut anim: Animations<'_, P>, _settings: &Settings, output: &OutputSettings) {
    use embassy_time::{Duration, Instant};
    use embedded_graphics_simulator::{SimulatorEvent, Window, sdl2::Keycode};
    use weather_anim_core::condition::WeatherCondition;
    use weather_anim_core::orchestrator::Mode;
    use weather_anim_core::transition::TransitionKind;

    /// Target frame duration (~30 FPS).
    const FRAME_DURATION: std::time::Duration = std::time::Duration::from_millis(33);
    const TRANSITION_MS: u64 = 800;
    const KINDS: [TransitionKind; 5] = [
        TransitionKind::Fade,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::SlideUp,
        TransitionKind::SlideDown,
    ];

    let mut window = Window::new("Weather Animations", output);
    if let Err(e) = anim.begin(Instant::now()) {
        error!("Failed to start: {}", e);
        return;
    }
    let mut kind = 0;

    // The SDL window is lazily initialized on the first `update()` call.
    if let Some(panel) = anim.display() {
        window.update(panel.simulator());
    }

    'running: loop {
        let frame_start = std::time::Instant::now();
        let now = Instant::now();

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,
                SimulatorEvent::KeyDown { keycode, .. } => {
                    let target = match keycode {
                        Keycode::Q | Keycode::Escape => break 'running,
                        Keycode::Num1 => Some(WeatherCondition::Clear),
                        Keycode::Num2 => Some(WeatherCondition::Cloudy),
                        Keycode::Num3 => Some(WeatherCondition::Rain),
                        Keycode::Num4 => Some(WeatherCondition::Snow),
                        Keycode::Num5 => Some(WeatherCondition::Storm),
                        Keycode::T => {
                            kind = (kind + 1) % KINDS.len();
                            info!("Transition kind: {:?}", KINDS[kind]);
                            None
                        }
                        Keycode::M => {
                            let mode = match anim.mode() {
                                Mode::SimpleTransition => Mode::ContinuousWeather,
                                Mode::ContinuousWeather => Mode::SimpleTransition,
                            };
                            anim.set_mode(mode, now);
                            None
                        }
                        Keycode::R => {
                            anim.force_refresh();
                            None
                        }
                        _ => None,
                    };
                    if let Some(condition) = target {
                        anim.run_transition(
                            condition,
                            KINDS[kind],
                            Duration::from_millis(TRANSITION_MS),
                            now,
                        );
                    }
                }
                _ => {}
            }
        }

        anim.update(now);
        if let Some(panel) = anim.display() {
            window.update(panel.simulator());
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }
}
