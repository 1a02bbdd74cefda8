//! Per-condition animation storage.
//!
//! Each condition has up to three frame sets: one decoded from an online
//! icon, one supplied by the user, and the built-in glyphs. Lookup returns
//! the first that exists in that order.

extern crate alloc;

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};
use log::{debug, info};

use crate::animation::Animation;
use crate::bitmap::FrameBuffer;
use crate::condition::{CONDITION_COUNT, WeatherCondition};
use crate::decode::{ImageDecoder, ThresholdOptions, animation_from_decoded};
use crate::error::WeatherError;
use crate::glyphs::fallback_animation;
use crate::source::WeatherSource;

/// Which slot an animation was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOrigin {
    Online,
    User,
    BuiltIn,
}

/// A downloaded icon and its bookkeeping.
#[derive(Debug, Clone)]
pub struct OnlineIcon {
    url: String,
    bytes_len: usize,
    decoded: bool,
    stale: bool,
    animation: Option<Rc<Animation>>,
    last_failure: Option<Instant>,
}

impl OnlineIcon {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            bytes_len: 0,
            decoded: false,
            stale: true,
            animation: None,
            last_failure: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Size of the last successful download.
    pub fn bytes_len(&self) -> usize {
        self.bytes_len
    }

    /// True when the current frames were decoded from the current URL.
    pub fn is_decoded(&self) -> bool {
        self.decoded
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Whether a fetch should be attempted at `now`.
    fn is_due(&self, now: Instant, retry: Duration) -> bool {
        if !self.stale {
            return false;
        }
        match self.last_failure {
            Some(failed) => now.saturating_duration_since(failed) >= retry,
            None => true,
        }
    }
}

pub struct AnimationCache {
    width: u32,
    height: u32,
    use_builtin: bool,
    online: [Option<OnlineIcon>; CONDITION_COUNT],
    user: [Option<Rc<Animation>>; CONDITION_COUNT],
    builtin: [Option<Rc<Animation>>; CONDITION_COUNT],
}

impl AnimationCache {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            use_builtin: true,
            online: Default::default(),
            user: Default::default(),
            builtin: Default::default(),
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Enable or disable the built-in glyph fallback.
    pub fn set_use_builtin(&mut self, enabled: bool) {
        self.use_builtin = enabled;
    }

    /// Generate the built-in glyphs for every condition.
    pub fn generate_builtin(&mut self) -> Result<(), WeatherError> {
        for condition in WeatherCondition::ALL {
            let anim = fallback_animation(condition, self.width, self.height)?;
            self.builtin[condition.index()] = Some(Rc::new(anim));
        }
        debug!(
            "Generated built-in animations for {}x{} canvas",
            self.width, self.height
        );
        Ok(())
    }

    /// Replace the user frame set for `condition`. An empty list clears it.
    pub fn set_animation(
        &mut self,
        condition: WeatherCondition,
        frames: Vec<FrameBuffer>,
        frame_delay_ms: u32,
    ) -> Result<(), WeatherError> {
        if frames.is_empty() {
            self.user[condition.index()] = None;
            return Ok(());
        }

        let expected = crate::bitmap::buffer_len(self.width, self.height);
        if let Some(bad) = frames
            .iter()
            .find(|f| f.width() != self.width || f.height() != self.height)
        {
            return Err(WeatherError::FrameSize {
                expected,
                actual: bad.as_bytes().len(),
            });
        }

        let anim = Animation::new(frames, frame_delay_ms)?;
        info!(
            "User animation set for {:?}: {} frames, {} ms",
            condition,
            anim.frame_count(),
            frame_delay_ms
        );
        self.user[condition.index()] = Some(Rc::new(anim));
        Ok(())
    }

    /// Point `condition` at an online icon.
    ///
    /// A new URL marks the entry for fetching; its current frames stay until
    /// the new download decodes.
    pub fn set_source(&mut self, condition: WeatherCondition, url: &str) {
        let slot = &mut self.online[condition.index()];
        match slot {
            Some(icon) if icon.url == url => {}
            Some(icon) => {
                debug!("Icon source for {:?} changed to {}", condition, url);
                icon.url = url.to_string();
                icon.decoded = false;
                icon.stale = true;
                icon.last_failure = None;
            }
            None => *slot = Some(OnlineIcon::new(url)),
        }
    }

    pub fn clear_source(&mut self, condition: WeatherCondition) {
        self.online[condition.index()] = None;
    }

    pub fn online(&self, condition: WeatherCondition) -> Option<&OnlineIcon> {
        self.online[condition.index()].as_ref()
    }

    /// Drop the downloaded frames for `condition`, keeping its URL so the
    /// icon is fetched again next time the condition is shown.
    pub fn release_online(&mut self, condition: WeatherCondition) {
        if let Some(icon) = &mut self.online[condition.index()] {
            if icon.animation.take().is_some() {
                debug!("Released online frames for {:?}", condition);
            }
            icon.decoded = false;
            icon.stale = true;
        }
    }

    /// Whether `condition` has an online icon waiting to be fetched at `now`.
    pub fn needs_fetch(&self, condition: WeatherCondition, now: Instant, retry: Duration) -> bool {
        self.online[condition.index()]
            .as_ref()
            .is_some_and(|icon| icon.is_due(now, retry))
    }

    /// Download and decode the online icon for `condition` if one is due.
    ///
    /// Returns `Ok(true)` when new frames were installed and `Ok(false)`
    /// when nothing was due. On error the previous frames are kept and the
    /// failure time recorded for the retry interval.
    pub fn refresh_online<S, Dec>(
        &mut self,
        condition: WeatherCondition,
        source: &mut S,
        decoder: &Dec,
        options: &ThresholdOptions,
        now: Instant,
        retry: Duration,
    ) -> Result<bool, WeatherError>
    where
        S: WeatherSource + ?Sized,
        Dec: ImageDecoder + ?Sized,
    {
        if !self.needs_fetch(condition, now, retry) {
            return Ok(false);
        }
        let (width, height) = (self.width, self.height);
        let Some(icon) = self.online[condition.index()].as_mut() else {
            return Ok(false);
        };

        let fetched = source.fetch_image(&icon.url).and_then(|bytes| {
            let decoded = decoder.decode(&bytes)?;
            let anim = animation_from_decoded(
                &decoded,
                width,
                height,
                options,
                condition.default_frame_delay_ms(),
            )?;
            Ok((bytes.len(), anim))
        });

        match fetched {
            Ok((len, anim)) => {
                info!(
                    "Loaded online icon for {:?}: {} bytes, {} frames",
                    condition,
                    len,
                    anim.frame_count()
                );
                icon.bytes_len = len;
                icon.animation = Some(Rc::new(anim));
                icon.decoded = true;
                icon.stale = false;
                icon.last_failure = None;
                Ok(true)
            }
            Err(e) => {
                icon.last_failure = Some(now);
                Err(e)
            }
        }
    }

    /// Best available animation for `condition`.
    pub fn lookup(&self, condition: WeatherCondition) -> Option<(Rc<Animation>, AnimationOrigin)> {
        let i = condition.index();
        let online = self.online[i]
            .as_ref()
            .and_then(|icon| icon.animation.clone())
            .map(|a| (a, AnimationOrigin::Online));
        let user = || self.user[i].clone().map(|a| (a, AnimationOrigin::User));
        let builtin = || {
            self.builtin[i]
                .clone()
                .filter(|_| self.use_builtin)
                .map(|a| (a, AnimationOrigin::BuiltIn))
        };

        online
            .or_else(user)
            .or_else(builtin)
            .filter(|(a, _)| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedImage, GrayFrame, LumaA};
    use crate::source::ScriptedSource;
    use alloc::vec;

    const W: u32 = 32;
    const H: u32 = 16;
    const URL: &str = "http://icons/rain.png";

    /// Decoder that ignores the bytes and returns a frame of solid ink.
    struct InkDecoder;

    impl ImageDecoder for InkDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, WeatherError> {
            if bytes.is_empty() {
                return Err(WeatherError::decode("empty"));
            }
            Ok(DecodedImage {
                frames: vec![GrayFrame {
                    width: 4,
                    height: 2,
                    pixels: vec![LumaA { luma: 0, alpha: 255 }; 8],
                    delay_ms: 0,
                }],
            })
        }
    }

    fn user_frames(n: usize) -> Vec<FrameBuffer> {
        (0..n).map(|_| FrameBuffer::try_new(W, H).unwrap()).collect()
    }

    fn refresh(
        cache: &mut AnimationCache,
        source: &mut ScriptedSource,
        now_ms: u64,
    ) -> Result<bool, WeatherError> {
        cache.refresh_online(
            WeatherCondition::Rain,
            source,
            &InkDecoder,
            &ThresholdOptions::default(),
            Instant::from_millis(now_ms),
            Duration::from_millis(30_000),
        )
    }

    #[test]
    fn test_lookup_precedence() {
        let mut cache = AnimationCache::new(W, H);
        assert!(cache.lookup(WeatherCondition::Rain).is_none());

        cache.generate_builtin().unwrap();
        assert_eq!(
            cache.lookup(WeatherCondition::Rain).unwrap().1,
            AnimationOrigin::BuiltIn
        );

        cache
            .set_animation(WeatherCondition::Rain, user_frames(2), 100)
            .unwrap();
        assert_eq!(
            cache.lookup(WeatherCondition::Rain).unwrap().1,
            AnimationOrigin::User
        );

        let mut source = ScriptedSource::new().with_image(URL, vec![1]);
        cache.set_source(WeatherCondition::Rain, URL);
        assert!(refresh(&mut cache, &mut source, 0).unwrap());
        assert_eq!(
            cache.lookup(WeatherCondition::Rain).unwrap().1,
            AnimationOrigin::Online
        );
    }

    #[test]
    fn test_builtin_can_be_disabled() {
        let mut cache = AnimationCache::new(W, H);
        cache.generate_builtin().unwrap();
        cache.set_use_builtin(false);
        assert!(cache.lookup(WeatherCondition::Snow).is_none());
    }

    #[test]
    fn test_set_animation_validates_size_and_clears() {
        let mut cache = AnimationCache::new(W, H);
        let wrong = vec![FrameBuffer::try_new(8, 8).unwrap()];
        assert!(matches!(
            cache.set_animation(WeatherCondition::Clear, wrong, 100),
            Err(WeatherError::FrameSize { .. })
        ));

        cache
            .set_animation(WeatherCondition::Clear, user_frames(3), 100)
            .unwrap();
        assert_eq!(
            cache.lookup(WeatherCondition::Clear).unwrap().0.frame_count(),
            3
        );

        cache
            .set_animation(WeatherCondition::Clear, Vec::new(), 100)
            .unwrap();
        assert!(cache.lookup(WeatherCondition::Clear).is_none());
    }

    #[test]
    fn test_failed_fetch_keeps_previous_frames_and_waits_to_retry() {
        let mut cache = AnimationCache::new(W, H);
        let mut source = ScriptedSource::new().with_image(URL, vec![1]);
        cache.set_source(WeatherCondition::Rain, URL);
        refresh(&mut cache, &mut source, 0).unwrap();
        let before = cache.lookup(WeatherCondition::Rain).unwrap().0;

        // New URL, but the server answers 500.
        cache.set_source(WeatherCondition::Rain, "http://icons/other.png");
        source.fail_images(Some(WeatherError::Http(500)));
        assert_eq!(
            refresh(&mut cache, &mut source, 1_000),
            Err(WeatherError::Http(500))
        );

        let after = cache.lookup(WeatherCondition::Rain).unwrap();
        assert_eq!(after.1, AnimationOrigin::Online);
        assert!(Rc::ptr_eq(&before, &after.0));
        let icon = cache.online(WeatherCondition::Rain).unwrap();
        assert!(!icon.is_decoded());
        assert_eq!(icon.last_failure(), Some(Instant::from_millis(1_000)));

        // Too early for a retry.
        let calls = source.image_calls();
        assert_eq!(refresh(&mut cache, &mut source, 20_000), Ok(false));
        assert_eq!(source.image_calls(), calls);

        assert!(refresh(&mut cache, &mut source, 31_000).is_err());
        assert_eq!(source.image_calls(), calls + 1);
    }

    #[test]
    fn test_decoded_icon_is_not_fetched_again() {
        let mut cache = AnimationCache::new(W, H);
        let mut source = ScriptedSource::new().with_image(URL, vec![1, 2, 3]);
        cache.set_source(WeatherCondition::Rain, URL);
        assert_eq!(refresh(&mut cache, &mut source, 0), Ok(true));
        assert_eq!(cache.online(WeatherCondition::Rain).unwrap().bytes_len(), 3);

        cache.set_source(WeatherCondition::Rain, URL);
        assert_eq!(refresh(&mut cache, &mut source, 10), Ok(false));
        assert_eq!(source.image_calls(), 1);
    }

    #[test]
    fn test_release_drops_frames_and_marks_stale() {
        let mut cache = AnimationCache::new(W, H);
        cache.generate_builtin().unwrap();
        let mut source = ScriptedSource::new().with_image(URL, vec![1]);
        cache.set_source(WeatherCondition::Rain, URL);
        refresh(&mut cache, &mut source, 0).unwrap();

        cache.release_online(WeatherCondition::Rain);
        assert_eq!(
            cache.lookup(WeatherCondition::Rain).unwrap().1,
            AnimationOrigin::BuiltIn
        );
        assert!(cache.needs_fetch(
            WeatherCondition::Rain,
            Instant::from_millis(5),
            Duration::from_millis(30_000)
        ));
    }
}
