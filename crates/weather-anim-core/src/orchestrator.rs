//! Polling and rendering loop.
//!
//! [`WeatherAnimations`] owns the display, the weather source, the image
//! decoder, and every buffer. The host calls [`WeatherAnimations::update`]
//! with the current time; each call may poll Home Assistant, fetch an icon,
//! advance the state machine, and present one frame.
//!
//! ```text
//!   Idle --begin--> DisplayingAnimation | DisplayingStatic
//!   Displaying* --run_transition--> Transitioning
//!   Transitioning --progress 1.0--> DisplayingAnimation
//!   DisplayingAnimation --one cycle (simple mode)--> DisplayingStatic
//! ```

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use embassy_time::{Duration, Instant};
use embedded_graphics::mono_font::{MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use embedded_layout::prelude::*;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::animation::Playback;
use crate::bitmap::FrameBuffer;
use crate::cache::AnimationCache;
use crate::condition::{WeatherCondition, find_icon, icon_url};
use crate::config::Config;
use crate::decode::{ImageDecoder, ThresholdOptions};
use crate::display::WeatherDisplay;
use crate::error::WeatherError;
use crate::source::WeatherSource;
use crate::transition::{Transition, TransitionKind};

/// Height of the temperature row at the bottom of the canvas.
const TEMPERATURE_ROW_HEIGHT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Transition on every change, play one cycle, then hold frame 0.
    SimpleTransition,
    /// Loop the current animation, switching immediately on change.
    ContinuousWeather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    DisplayingStatic,
    DisplayingAnimation,
    Transitioning,
}

/// Latest temperature readings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Temperatures {
    pub indoor: Option<f32>,
    pub outdoor: Option<f32>,
}

struct ActiveTransition {
    transition: Transition,
    from: FrameBuffer,
    target: WeatherCondition,
}

/// Buffers allocated by `begin`.
struct Buffers {
    /// What the display shows.
    canvas: FrameBuffer,
    /// Next frame being composed.
    scratch: FrameBuffer,
    /// Incoming frame during a transition.
    staging: FrameBuffer,
}

pub struct WeatherAnimations<'a, D, S, Dec> {
    config: Config<'a>,
    display: Option<D>,
    source: S,
    decoder: Dec,
    threshold: ThresholdOptions,
    cache: AnimationCache,
    buffers: Option<Buffers>,
    state: RenderState,
    mode: Mode,
    condition: WeatherCondition,
    shown: WeatherCondition,
    weather_state: Option<String>,
    temperatures: Temperatures,
    anim_start: Instant,
    transition: Option<ActiveTransition>,
    next_poll: Option<Instant>,
    warned_no_display: bool,
}

impl<'a, D, S, Dec> WeatherAnimations<'a, D, S, Dec>
where
    D: WeatherDisplay,
    S: WeatherSource,
    Dec: ImageDecoder,
{
    /// Create an orchestrator without a display. The canvas size comes from
    /// `config.display`.
    pub fn new(config: Config<'a>, source: S, decoder: Dec) -> Self {
        let mut cache = AnimationCache::new(config.display.width, config.display.height);
        cache.set_use_builtin(config.animation.builtin_icons);

        Self {
            threshold: config.animation.threshold_options(),
            mode: config.animation.mode,
            config,
            display: None,
            source,
            decoder,
            cache,
            buffers: None,
            state: RenderState::Idle,
            condition: WeatherCondition::Clear,
            shown: WeatherCondition::Clear,
            weather_state: None,
            temperatures: Temperatures::default(),
            anim_start: Instant::from_ticks(0),
            transition: None,
            next_poll: None,
            warned_no_display: false,
        }
    }

    pub fn with_display(mut self, display: D) -> Self {
        self.attach_display(display);
        self
    }

    pub fn attach_display(&mut self, display: D) {
        let size = display.canvas_size();
        let (w, h) = self.cache.canvas_size();
        if size != Size::new(w, h) {
            warn!(
                "Display wants a {}x{} canvas, rendering {}x{}",
                size.width, size.height, w, h
            );
        }
        self.display = Some(display);
        self.warned_no_display = false;
        if let Some(buffers) = &mut self.buffers {
            buffers.canvas.mark_all_dirty();
        }
    }

    /// Allocate buffers, generate built-in glyphs, and show the initial
    /// condition.
    pub fn begin(&mut self, now: Instant) -> Result<(), WeatherError> {
        let (w, h) = self.cache.canvas_size();
        let mut canvas = FrameBuffer::try_new(w, h)?;
        canvas.mark_all_dirty();
        self.buffers = Some(Buffers {
            canvas,
            scratch: FrameBuffer::try_new(w, h)?,
            staging: FrameBuffer::try_new(w, h)?,
        });

        if self.config.animation.builtin_icons {
            self.cache.generate_builtin()?;
        }

        self.shown = self.condition;
        self.anim_start = now;
        self.transition = None;
        self.next_poll = None;
        self.state = match self.mode {
            Mode::SimpleTransition => RenderState::DisplayingStatic,
            Mode::ContinuousWeather => RenderState::DisplayingAnimation,
        };
        info!(
            "Weather display started: {}x{} canvas, {:?} mode",
            w, h, self.mode
        );

        self.render(now);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode, now: Instant) {
        if mode == self.mode {
            return;
        }
        info!("Mode changed to {:?}", mode);
        self.mode = mode;
        match (mode, self.state) {
            (Mode::ContinuousWeather, RenderState::DisplayingStatic)
            | (Mode::SimpleTransition, RenderState::DisplayingAnimation) => {
                self.state = RenderState::DisplayingAnimation;
                self.anim_start = now;
            }
            _ => {}
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Condition from the most recent successful poll (or transition).
    pub fn current_weather(&self) -> WeatherCondition {
        self.condition
    }

    pub fn current_state(&self) -> RenderState {
        self.state
    }

    /// Raw Home Assistant state string from the last successful poll.
    pub fn weather_state(&self) -> Option<&str> {
        self.weather_state.as_deref()
    }

    pub fn temperatures(&self) -> Temperatures {
        self.temperatures
    }

    /// Replace the user animation for `condition`.
    pub fn set_animation(
        &mut self,
        condition: WeatherCondition,
        frames: Vec<FrameBuffer>,
        frame_delay_ms: u32,
    ) -> Result<(), WeatherError> {
        self.cache.set_animation(condition, frames, frame_delay_ms)
    }

    /// Poll a different weather entity, starting at the next update.
    pub fn set_weather_entity(&mut self, entity_id: &'a str) {
        info!("Weather entity set to {}", entity_id);
        self.config.entities.weather = entity_id;
        self.next_poll = None;
    }

    /// Use the image at `url` for `condition`.
    pub fn set_icon_source(&mut self, condition: WeatherCondition, url: &str) {
        self.cache.set_source(condition, url);
    }

    /// Poll on the next update regardless of the fetch interval.
    pub fn force_refresh(&mut self) {
        self.next_poll = None;
    }

    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    pub fn display_mut(&mut self) -> Option<&mut D> {
        self.display.as_mut()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The last composed frame, once `begin` has run.
    pub fn canvas(&self) -> Option<&FrameBuffer> {
        self.buffers.as_ref().map(|b| &b.canvas)
    }

    pub fn cache(&self) -> &AnimationCache {
        &self.cache
    }

    /// Start a transition from whatever is on screen to `condition`.
    pub fn run_transition(
        &mut self,
        condition: WeatherCondition,
        kind: TransitionKind,
        duration: Duration,
        now: Instant,
    ) {
        self.change_condition(condition);
        self.end_transition();

        let Some(buffers) = &self.buffers else {
            warn!("Transition requested before begin");
            return;
        };

        let from = match FrameBuffer::try_new(buffers.canvas.width(), buffers.canvas.height())
            .and_then(|mut fb| fb.copy_from(&buffers.canvas).map(|_| fb))
        {
            Ok(fb) => fb,
            Err(e) => {
                warn!("No memory for transition ({}), switching directly", e);
                self.show(condition, now);
                return;
            }
        };

        debug!(
            "Transition {:?} -> {:?} ({:?}, {} ms)",
            self.shown,
            condition,
            kind,
            duration.as_millis()
        );
        self.transition = Some(ActiveTransition {
            transition: Transition::new(kind, now, duration),
            from,
            target: condition,
        });
        self.state = RenderState::Transitioning;
    }

    /// Advance by one tick.
    pub fn update(&mut self, now: Instant) {
        if self.state == RenderState::Idle {
            return;
        }

        if self.next_poll.is_none_or(|at| now >= at) {
            self.poll(now);
        }
        self.refresh_icon(now);

        if self
            .transition
            .as_ref()
            .is_some_and(|active| active.transition.is_finished(now))
            && let Some(target) = self.end_transition()
        {
            self.show(target, now);
        }

        if self.state != RenderState::Transitioning && self.shown != self.condition {
            self.follow_condition(now);
        }

        if self.state == RenderState::DisplayingAnimation && self.mode == Mode::SimpleTransition {
            let cycle = self
                .cache
                .lookup(self.shown)
                .map_or(0, |(anim, _)| anim.cycle_ms());
            if now.saturating_duration_since(self.anim_start).as_millis() >= cycle {
                debug!("Cycle complete, holding first frame");
                self.state = RenderState::DisplayingStatic;
            }
        }

        self.render(now);
    }

    /// Compose the current state into the canvas and present it.
    ///
    /// Without a display the canvas is still kept current, but nothing is
    /// presented.
    pub fn render_state(&mut self, now: Instant) {
        self.render(now);
    }

    fn render(&mut self, now: Instant) {
        let Some(buffers) = &mut self.buffers else {
            return;
        };

        match &self.transition {
            Some(active) if self.state == RenderState::Transitioning => {
                draw_condition(&self.cache, active.target, 0, Playback::Static, &mut buffers.staging);
                if let Err(e) = active.transition.render(
                    &active.from,
                    &buffers.staging,
                    now,
                    &mut buffers.scratch,
                ) {
                    warn!("Transition frame failed: {}", e);
                }
            }
            _ => {
                let playback = match self.state {
                    RenderState::DisplayingAnimation => Playback::Continuous,
                    _ => Playback::Static,
                };
                let elapsed = now.saturating_duration_since(self.anim_start).as_millis();
                draw_condition(&self.cache, self.shown, elapsed, playback, &mut buffers.scratch);
            }
        }

        if self.config.animation.show_temperature {
            draw_temperatures(&self.temperatures, &mut buffers.scratch);
        }

        if let Err(e) = buffers.canvas.copy_from(&buffers.scratch) {
            warn!("Canvas update failed: {}", e);
            return;
        }

        let Some(display) = &mut self.display else {
            if !self.warned_no_display {
                warn!("No display attached, nothing will be shown");
                self.warned_no_display = true;
            }
            return;
        };
        if let Err(e) = display.present(&mut buffers.canvas) {
            error!("Display error: {:?}", e);
        }
    }

    fn poll(&mut self, now: Instant) {
        let retry = now + Duration::from_millis(self.config.animation.retry_interval_ms);

        if !self.source.is_connected() {
            warn!("Skipping weather poll: {}", WeatherError::Connectivity);
            self.next_poll = Some(retry);
            return;
        }

        let entity = self.config.entities.weather;
        let state = match self.source.fetch_state(entity) {
            Ok(state) => state,
            Err(e) => {
                warn!("Weather poll for {} failed: {}", entity, e);
                self.next_poll = Some(retry);
                return;
            }
        };
        self.next_poll = Some(now + Duration::from_millis(self.config.animation.fetch_interval_ms));
        debug!("Weather state for {}: {}", entity, state.state);

        match WeatherCondition::from_state(&state.state) {
            Some(condition) => {
                self.change_condition(condition);
                if self.config.animation.online_icons {
                    let mapping = find_icon(&state.state, state.is_daytime());
                    let url = icon_url(self.config.animation.icon_base_url, mapping);
                    self.cache.set_source(condition, &url);
                }
            }
            None => debug!(
                "Unrecognised weather state '{}', keeping {:?}",
                state.state, self.condition
            ),
        }
        self.weather_state = Some(state.state);

        if let Some(entity) = self.config.entities.indoor_temperature {
            read_temperature(&mut self.source, entity, &mut self.temperatures.indoor);
        }
        if let Some(entity) = self.config.entities.outdoor_temperature {
            read_temperature(&mut self.source, entity, &mut self.temperatures.outdoor);
        }
    }

    fn refresh_icon(&mut self, now: Instant) {
        let retry = Duration::from_millis(self.config.animation.retry_interval_ms);
        if !self.cache.needs_fetch(self.condition, now, retry) || !self.source.is_connected() {
            return;
        }
        if let Err(e) = self.cache.refresh_online(
            self.condition,
            &mut self.source,
            &self.decoder,
            &self.threshold,
            now,
            retry,
        ) {
            warn!("Icon fetch for {:?} failed: {}", self.condition, e);
        }
    }

    fn change_condition(&mut self, condition: WeatherCondition) {
        if condition == self.condition {
            return;
        }
        info!("Weather changed: {:?} -> {:?}", self.condition, condition);
        // The in-flight target keeps its frames until the transition ends.
        if self.transition.as_ref().is_some_and(|a| a.target == self.condition) {
            debug!("Holding {:?} frames until the transition ends", self.condition);
        } else {
            self.cache.release_online(self.condition);
        }
        self.condition = condition;
    }

    /// Drop the active transition, returning its target. Online frames held
    /// for a target the weather has since moved away from are released.
    fn end_transition(&mut self) -> Option<WeatherCondition> {
        let active = self.transition.take()?;
        if active.target != self.condition {
            self.cache.release_online(active.target);
        }
        Some(active.target)
    }

    /// Bring the screen in line with the current condition.
    fn follow_condition(&mut self, now: Instant) {
        match self.mode {
            Mode::SimpleTransition => {
                let kind = self.config.animation.transition;
                let duration = Duration::from_millis(self.config.animation.transition_ms);
                self.run_transition(self.condition, kind, duration, now);
            }
            Mode::ContinuousWeather => self.show(self.condition, now),
        }
    }

    fn show(&mut self, condition: WeatherCondition, now: Instant) {
        self.shown = condition;
        self.anim_start = now;
        self.state = RenderState::DisplayingAnimation;
    }
}

fn read_temperature<S: WeatherSource>(source: &mut S, entity: &str, slot: &mut Option<f32>) {
    match source.fetch_state(entity) {
        Ok(state) => match state.temperature() {
            Some(t) => *slot = Some(t),
            None => debug!("{} is not numeric: '{}'", entity, state.state),
        },
        Err(e) => warn!("Temperature poll for {} failed: {}", entity, e),
    }
}

/// Draw `condition` into `out`: an animation frame if one is cached, its
/// label otherwise.
fn draw_condition(
    cache: &AnimationCache,
    condition: WeatherCondition,
    elapsed_ms: u64,
    playback: Playback,
    out: &mut FrameBuffer,
) {
    if let Some((anim, _)) = cache.lookup(condition)
        && let Some(frame) = anim.frame_at(elapsed_ms, playback)
        && out.copy_from(frame).is_ok()
    {
        return;
    }

    out.clear();
    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let area = out.bounding_box();
    // FrameBuffer drawing is infallible.
    let _ = Text::new(condition.label(), Point::zero(), style)
        .align_to(&area, horizontal::Center, vertical::Center)
        .draw(out);
}

/// Draw the readout on the bottom row, over a cleared band.
fn draw_temperatures(temps: &Temperatures, out: &mut FrameBuffer) {
    if temps.indoor.is_none() && temps.outdoor.is_none() {
        return;
    }

    let mut line: heapless::String<32> = heapless::String::new();
    if let Some(t) = temps.indoor {
        let _ = write!(line, "In {:.1}", t);
    }
    if let Some(t) = temps.outdoor {
        if !line.is_empty() {
            let _ = line.push_str("  ");
        }
        let _ = write!(line, "Out {:.1}", t);
    }

    let (w, h) = (out.width(), out.height());
    let band = TEMPERATURE_ROW_HEIGHT.min(h);
    let _ = Rectangle::new(Point::new(0, (h - band) as i32), Size::new(w, band))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(out);

    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Bottom)
        .build();
    let _ = Text::with_text_style(
        &line,
        Point::new(w as i32 / 2, h as i32 - 1),
        MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
        text_style,
    )
    .draw(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedImage, GrayFrame, LumaA};
    use crate::source::ScriptedSource;
    use alloc::rc::Rc;
    use alloc::vec;

    /// Display that keeps a copy of every presented canvas.
    #[derive(Default)]
    struct RecordingDisplay {
        presents: usize,
        last: Vec<u8>,
    }

    impl WeatherDisplay for RecordingDisplay {
        type Error = ();

        fn kind(&self) -> crate::display::DisplayKind {
            crate::display::DisplayKind::Monochrome
        }

        fn canvas_size(&self) -> Size {
            Size::new(128, 64)
        }

        fn present(&mut self, canvas: &mut FrameBuffer) -> Result<(), ()> {
            if canvas.dirty().is_some() {
                self.presents += 1;
                self.last = canvas.as_bytes().to_vec();
                canvas.mark_clean();
            }
            Ok(())
        }
    }

    /// Decodes any non-empty payload to a full-canvas ink block.
    struct InkDecoder;

    impl ImageDecoder for InkDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, WeatherError> {
            if bytes.is_empty() {
                return Err(WeatherError::decode("empty"));
            }
            Ok(DecodedImage {
                frames: vec![GrayFrame {
                    width: 2,
                    height: 1,
                    pixels: vec![LumaA { luma: 0, alpha: 255 }; 2],
                    delay_ms: 0,
                }],
            })
        }
    }

    type TestAnimations = WeatherAnimations<'static, RecordingDisplay, ScriptedSource, InkDecoder>;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn config(mode: Mode) -> Config<'static> {
        let mut config = Config::default();
        config.animation.mode = mode;
        config.animation.transition = TransitionKind::SlideLeft;
        config.animation.transition_ms = 200;
        config
    }

    fn started(config: Config<'static>, source: ScriptedSource) -> TestAnimations {
        let mut anim = WeatherAnimations::new(config, source, InkDecoder)
            .with_display(RecordingDisplay::default());
        anim.begin(at(0)).unwrap();
        anim
    }

    /// Three frames, each with a single lit column at x = index.
    fn marker_frames() -> Vec<FrameBuffer> {
        (0..3)
            .map(|i| {
                let mut fb = FrameBuffer::try_new(128, 64).unwrap();
                for y in 0..64 {
                    fb.set_pixel(i, y);
                }
                fb
            })
            .collect()
    }

    #[test]
    fn test_begin_enters_mode_state() {
        let anim = started(config(Mode::ContinuousWeather), ScriptedSource::new());
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);
        assert_eq!(anim.current_weather(), WeatherCondition::Clear);
        assert_eq!(anim.display().unwrap().presents, 1);

        let anim = started(config(Mode::SimpleTransition), ScriptedSource::new());
        assert_eq!(anim.current_state(), RenderState::DisplayingStatic);
    }

    #[test]
    fn test_update_before_begin_does_nothing() {
        let mut anim: TestAnimations = WeatherAnimations::new(
            config(Mode::ContinuousWeather),
            ScriptedSource::new().with_states(&["rainy"]),
            InkDecoder,
        );
        anim.update(at(10));
        assert_eq!(anim.current_state(), RenderState::Idle);
        assert_eq!(anim.source().state_calls(), 0);
    }

    #[test]
    fn test_continuous_mode_switches_immediately() {
        let source = ScriptedSource::new().with_states(&["rainy"]);
        let mut anim = started(config(Mode::ContinuousWeather), source);
        anim.update(at(10));
        assert_eq!(anim.current_weather(), WeatherCondition::Rain);
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);
        assert_eq!(anim.weather_state(), Some("rainy"));
    }

    #[test]
    fn test_poll_cadence_and_retry() {
        let source = ScriptedSource::new().with_states(&["sunny"]);
        let mut anim = started(config(Mode::ContinuousWeather), source);

        anim.update(at(0));
        assert_eq!(anim.source().state_calls(), 1);
        anim.update(at(299_999));
        assert_eq!(anim.source().state_calls(), 1);
        anim.update(at(300_000));
        assert_eq!(anim.source().state_calls(), 2);

        // Failure moves the next poll to the retry interval.
        anim.source_mut().fail_states(Some(WeatherError::Timeout));
        anim.update(at(600_000));
        assert_eq!(anim.source().state_calls(), 3);
        anim.update(at(629_999));
        assert_eq!(anim.source().state_calls(), 3);
        anim.update(at(630_000));
        assert_eq!(anim.source().state_calls(), 4);

        anim.force_refresh();
        anim.update(at(630_001));
        assert_eq!(anim.source().state_calls(), 5);
    }

    #[test]
    fn test_disconnected_source_is_skipped_and_state_kept() {
        let source = ScriptedSource::new().with_states(&["snowy"]);
        let mut anim = started(config(Mode::ContinuousWeather), source);
        anim.source_mut().set_connected(false);
        anim.update(at(0));
        assert_eq!(anim.source().state_calls(), 0);
        assert_eq!(anim.current_weather(), WeatherCondition::Clear);
    }

    #[test]
    fn test_failed_poll_keeps_previous_weather() {
        let source = ScriptedSource::new().with_states(&["lightning"]);
        let mut anim = started(config(Mode::ContinuousWeather), source);
        anim.update(at(0));
        assert_eq!(anim.current_weather(), WeatherCondition::Storm);

        anim.source_mut().fail_states(Some(WeatherError::parse("bad json")));
        anim.force_refresh();
        anim.update(at(1));
        assert_eq!(anim.current_weather(), WeatherCondition::Storm);
    }

    #[test]
    fn test_unknown_state_keeps_condition() {
        let source = ScriptedSource::new().with_states(&["pouring", "unavailable"]);
        let mut anim = started(config(Mode::ContinuousWeather), source);
        anim.update(at(0));
        anim.force_refresh();
        anim.update(at(1));
        assert_eq!(anim.current_weather(), WeatherCondition::Rain);
        assert_eq!(anim.weather_state(), Some("unavailable"));
    }

    #[test]
    fn test_continuous_frames_advance() {
        let mut anim = started(config(Mode::ContinuousWeather), ScriptedSource::new());
        anim.set_animation(WeatherCondition::Clear, marker_frames(), 100)
            .unwrap();
        anim.update(at(250));
        let canvas = anim.canvas().unwrap();
        assert!(canvas.get_pixel(2, 0));
        assert!(!canvas.get_pixel(0, 0));
        assert_eq!(anim.display().unwrap().last, canvas.as_bytes());
    }

    #[test]
    fn test_simple_mode_plays_one_cycle_then_holds_frame_zero() {
        let source = ScriptedSource::new().with_states(&["rainy"]);
        let mut anim = started(config(Mode::SimpleTransition), source);
        anim.set_animation(WeatherCondition::Rain, marker_frames(), 100)
            .unwrap();

        // Poll sees rain and starts the default transition.
        anim.update(at(0));
        assert_eq!(anim.current_state(), RenderState::Transitioning);

        anim.update(at(200));
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);

        anim.update(at(350));
        assert!(anim.canvas().unwrap().get_pixel(1, 5));

        anim.update(at(500));
        assert_eq!(anim.current_state(), RenderState::DisplayingStatic);
        let canvas = anim.canvas().unwrap();
        assert!(canvas.get_pixel(0, 5));
        assert!(!canvas.get_pixel(1, 5));

        anim.update(at(5_000));
        assert_eq!(anim.current_state(), RenderState::DisplayingStatic);
        assert!(anim.canvas().unwrap().get_pixel(0, 5));
    }

    #[test]
    fn test_weather_change_waits_for_transition() {
        let source = ScriptedSource::new().with_states(&["snowy"]);
        let mut config = config(Mode::SimpleTransition);
        config.animation.transition_ms = 1_000;
        let mut anim = started(config, source);

        anim.run_transition(
            WeatherCondition::Rain,
            TransitionKind::Fade,
            Duration::from_millis(1_000),
            at(0),
        );
        // Poll during the transition changes the weather, not the screen.
        anim.update(at(10));
        assert_eq!(anim.current_weather(), WeatherCondition::Snow);
        assert_eq!(anim.current_state(), RenderState::Transitioning);

        // Rain transition ends, then a new one to snow starts.
        anim.update(at(1_000));
        assert_eq!(anim.current_state(), RenderState::Transitioning);
        anim.update(at(2_000));
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);
    }

    #[test]
    fn test_transition_progress_reaches_target() {
        let mut anim = started(config(Mode::ContinuousWeather), ScriptedSource::new());
        anim.set_animation(WeatherCondition::Snow, marker_frames(), 100)
            .unwrap();
        anim.run_transition(
            WeatherCondition::Snow,
            TransitionKind::SlideUp,
            Duration::from_millis(100),
            at(0),
        );
        anim.update(at(150));
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);
        assert!(anim.canvas().unwrap().get_pixel(0, 10));
    }

    #[test]
    fn test_failed_icon_fetch_keeps_previous_frames() {
        let mut config = config(Mode::ContinuousWeather);
        config.animation.online_icons = true;
        config.animation.icon_base_url = "http://icons";
        let source = ScriptedSource::new()
            .with_states(&["rainy"])
            .with_image("http://icons/rain.png", vec![1]);
        let mut anim = started(config, source);

        anim.update(at(0));
        let icon = anim.cache().online(WeatherCondition::Rain).unwrap();
        assert!(icon.is_decoded());
        let (before, origin) = anim.cache().lookup(WeatherCondition::Rain).unwrap();
        assert_eq!(origin, crate::cache::AnimationOrigin::Online);
        let shown = anim.canvas().unwrap().clone();

        // New URL that the server rejects.
        anim.set_icon_source(WeatherCondition::Rain, "http://icons/broken.png");
        anim.source_mut().fail_images(Some(WeatherError::Http(404)));
        anim.update(at(10));

        let (after, _) = anim.cache().lookup(WeatherCondition::Rain).unwrap();
        assert!(Rc::ptr_eq(&before, &after));
        assert_eq!(anim.canvas().unwrap(), &shown);
    }

    #[test]
    fn test_condition_change_releases_online_frames() {
        let mut config = config(Mode::ContinuousWeather);
        config.animation.online_icons = true;
        config.animation.icon_base_url = "http://icons";
        let source = ScriptedSource::new()
            .with_states(&["rainy", "snowy"])
            .with_image("http://icons/rain.png", vec![1])
            .with_image("http://icons/snow.png", vec![1]);
        let mut anim = started(config, source);

        anim.update(at(0));
        assert!(anim.cache().online(WeatherCondition::Rain).unwrap().is_decoded());

        anim.force_refresh();
        anim.update(at(1));
        assert_eq!(anim.current_weather(), WeatherCondition::Snow);
        assert!(!anim.cache().online(WeatherCondition::Rain).unwrap().is_decoded());
        assert!(anim.cache().online(WeatherCondition::Snow).unwrap().is_decoded());
    }

    #[test]
    fn test_temperature_readout() {
        let mut config = config(Mode::ContinuousWeather);
        config.entities.indoor_temperature = Some("sensor.indoor");
        config.entities.outdoor_temperature = Some("sensor.outdoor");
        config.animation.show_temperature = true;
        let source = ScriptedSource::new()
            .with_states(&["sunny"])
            .with_reading("sensor.indoor", "21.5")
            .with_reading("sensor.outdoor", "unavailable");
        let mut anim = started(config, source);

        anim.update(at(0));
        assert_eq!(
            anim.temperatures(),
            Temperatures {
                indoor: Some(21.5),
                outdoor: None
            }
        );
        let canvas = anim.canvas().unwrap();
        let bottom_row_lit = (0..128).any(|x| (54..64).any(|y| canvas.get_pixel(x, y)));
        assert!(bottom_row_lit);
    }

    #[test]
    fn test_text_fallback_without_any_animation() {
        let mut config = config(Mode::ContinuousWeather);
        config.animation.builtin_icons = false;
        let anim = started(config, ScriptedSource::new());
        let canvas = anim.canvas().unwrap();
        assert!(canvas.count_lit() > 0);
        // Label is centred: nothing at the edges.
        assert!((0..64).all(|y| !canvas.get_pixel(0, y)));
    }

    #[test]
    fn test_missing_display_is_a_no_op() {
        let mut anim: TestAnimations = WeatherAnimations::new(
            config(Mode::ContinuousWeather),
            ScriptedSource::new().with_states(&["cloudy"]),
            InkDecoder,
        );
        anim.begin(at(0)).unwrap();
        anim.update(at(10));
        anim.update(at(20));
        assert!(anim.display().is_none());
        assert_eq!(anim.current_weather(), WeatherCondition::Cloudy);

        anim.attach_display(RecordingDisplay::default());
        anim.update(at(30));
        assert_eq!(anim.display().unwrap().presents, 1);
    }

    #[test]
    fn test_set_weather_entity_triggers_poll() {
        let source = ScriptedSource::new()
            .with_states(&["sunny"])
            .with_reading("weather.cabin", "snowy");
        let mut anim = started(config(Mode::ContinuousWeather), source);
        anim.update(at(0));
        anim.set_weather_entity("weather.cabin");
        anim.update(at(1));
        assert_eq!(anim.current_weather(), WeatherCondition::Snow);
    }

    #[test]
    fn test_set_animation_rejects_wrong_size() {
        let mut anim = started(config(Mode::ContinuousWeather), ScriptedSource::new());
        let frames = vec![FrameBuffer::try_new(64, 32).unwrap()];
        assert!(matches!(
            anim.set_animation(WeatherCondition::Rain, frames, 100),
            Err(WeatherError::FrameSize { .. })
        ));
    }

    #[test]
    fn test_set_mode_resumes_animation() {
        let source = ScriptedSource::new().with_states(&["sunny"]);
        let mut anim = started(config(Mode::SimpleTransition), source);
        anim.set_animation(WeatherCondition::Clear, marker_frames(), 100)
            .unwrap();

        anim.update(at(0));
        assert_eq!(anim.current_state(), RenderState::DisplayingStatic);

        anim.set_mode(Mode::ContinuousWeather, at(10));
        assert_eq!(anim.mode(), Mode::ContinuousWeather);
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);

        anim.update(at(160));
        assert!(anim.canvas().unwrap().get_pixel(1, 5));

        anim.update(at(5_000));
        assert_eq!(anim.current_state(), RenderState::DisplayingAnimation);
    }

    #[test]
    fn test_online_target_kept_when_weather_changes_mid_transition() {
        let mut config = config(Mode::SimpleTransition);
        config.animation.online_icons = true;
        config.animation.icon_base_url = "http://icons";
        config.animation.transition = TransitionKind::Fade;
        config.animation.transition_ms = 1_000;
        let source = ScriptedSource::new()
            .with_states(&["rainy", "snowy"])
            .with_image("http://icons/rain.png", vec![1])
            .with_image("http://icons/snow.png", vec![1]);
        let mut anim = started(config, source);

        anim.update(at(0));
        assert_eq!(anim.current_state(), RenderState::Transitioning);

        anim.force_refresh();
        anim.update(at(10));
        assert_eq!(anim.current_weather(), WeatherCondition::Snow);
        let origin = anim.cache().lookup(WeatherCondition::Rain).map(|(_, o)| o);
        assert_eq!(origin, Some(crate::cache::AnimationOrigin::Online));

        // Nearly complete fade shows the full-ink downloaded icon.
        anim.update(at(999));
        assert!(anim.canvas().unwrap().count_lit() > 8_000);

        // Once the rain transition ends its frames go.
        anim.update(at(1_000));
        assert!(!anim.cache().online(WeatherCondition::Rain).unwrap().is_decoded());
        assert_eq!(anim.current_state(), RenderState::Transitioning);
    }
}
