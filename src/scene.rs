//! Scoreboard scene state machine.
//!
//! Default → Tracking when the coarse match hits, nothing else is on screen
//! and the last appearance is old enough. While tracking, each tick decides
//! whether the screen has stopped moving; the first still tick of an
//! appearance runs the analysis pass. Tracking → Default after one second
//! without a match.

use image::{GrayImage, Luma, RgbImage};
use log::{debug, info, warn};
use std::sync::mpsc::Sender;

use crate::analysis::Analyzer;
use crate::config::ScanConfig;
use crate::entries::{EntryClassifier, SpreadHistory};
use crate::error::{ScanError, ScanResult};
use crate::events::{emit, ScanEvent};
use crate::filters::{rgb_to_hsv, white_mask};
use crate::geometry::{Calibrator, Corrector, ReferenceModel};
use crate::layout::{crop, DIFF_BAND};
use crate::matcher::ScoreboardMask;
use crate::recognition::{finish_result, Recognizers, WeaponWorker};
use crate::result::GameResult;

/// Minimum gap between the last match and a new appearance.
pub const REENTRY_COOLDOWN_MSEC: i64 = 30_000;
/// Time without a match after which tracking ends.
pub const EXIT_AFTER_MSEC: i64 = 1_000;
/// Minimum gap between two analysis passes.
pub const RESULT_SUPPRESS_MSEC: i64 = 30_000;
/// Per-pixel hue difference that counts as motion.
pub const HUE_DIFF_THRESHOLD: u8 = 16;

/// Timestamp far enough in the past to pass every elapsed-time gate.
const NEVER: i64 = -100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    /// Waiting for the scoreboard to appear
    Default,
    /// Scoreboard on screen, waiting for it to settle
    Tracking,
}

impl std::fmt::Display for SceneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneState::Default => write!(f, "Default"),
            SceneState::Tracking => write!(f, "Tracking"),
        }
    }
}

/// One input step.
#[derive(Clone, Copy, Debug)]
pub struct Tick<'a> {
    /// Current capture; `None` when the capture produced nothing.
    pub frame: Option<&'a RgbImage>,
    /// Monotonic timestamp in milliseconds.
    pub msec: i64,
    /// Another scene (e.g. the in-game timer) is visible on this tick.
    pub overlay: bool,
}

/// Hue channel of an image in the 0..180 convention.
pub fn hue_channel(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([rgb_to_hsv(img.get_pixel(x, y)).h])
    })
}

/// Counts pixels that are white now and whose hue moved by at least
/// [`HUE_DIFF_THRESHOLD`]. Mismatched geometry counts every white pixel.
pub fn hue_motion(previous: &GrayImage, current: &GrayImage, white: &GrayImage) -> usize {
    if previous.dimensions() != current.dimensions() {
        return white.pixels().filter(|p| p[0] > 0).count();
    }
    current
        .enumerate_pixels()
        .filter(|&(x, y, hue)| {
            white.get_pixel(x, y)[0] > 0
                && hue[0].abs_diff(previous.get_pixel(x, y)[0]) >= HUE_DIFF_THRESHOLD
        })
        .count()
}

pub struct ScoreboardScene {
    state: SceneState,
    mask: ScoreboardMask,
    analyzer: Analyzer,
    events: Sender<ScanEvent>,
    worker: Option<WeaponWorker>,
    last_matched: i64,
    last_event: i64,
    fired: bool,
    band_cache: Option<GrayImage>,
    history: SpreadHistory,
    kill_names: Vec<GrayImage>,
}

impl ScoreboardScene {
    /// With `worker` set, weapon recognition runs in the background;
    /// otherwise results are finished on the tick thread.
    pub fn new(
        mask: ScoreboardMask,
        analyzer: Analyzer,
        events: Sender<ScanEvent>,
        worker: Option<WeaponWorker>,
    ) -> Self {
        Self {
            state: SceneState::Default,
            mask,
            analyzer,
            events,
            worker,
            last_matched: NEVER,
            last_event: NEVER,
            fired: false,
            band_cache: None,
            history: SpreadHistory::new(),
            kill_names: Vec::new(),
        }
    }

    /// Loads the mask (and the reference model when perspective correction
    /// is on) and wires the pipeline together.
    pub fn from_config(
        config: &ScanConfig,
        recognizers: Recognizers,
        events: Sender<ScanEvent>,
    ) -> ScanResult<Self> {
        let mask = ScoreboardMask::load(&config.masks_dir, &config.languages)?;

        let calibrator = if config.perspective_correction {
            let model = ReferenceModel::load_or_rebuild(&config.model_path, &config.reference_image)?;
            Some(Calibrator::new(model, mask.clone()))
        } else {
            info!("Perspective correction disabled");
            None
        };

        let analyzer = Analyzer::new(
            Corrector::new(&mask, calibrator),
            EntryClassifier::new(config.languages.clone(), recognizers.clone()),
        );
        let worker = config
            .background_weapon_recognition
            .then(|| WeaponWorker::spawn(recognizers, events.clone()));

        Ok(Self::new(mask, analyzer, events, worker))
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    /// Queues a kill-feed name image for the next analysis pass.
    pub fn push_kill_name(&mut self, name: GrayImage) {
        self.kill_names.push(name);
    }

    /// Forgets every appearance and timer.
    pub fn reset(&mut self) {
        self.state = SceneState::Default;
        self.last_matched = NEVER;
        self.last_event = NEVER;
        self.fired = false;
        self.band_cache = None;
        self.history.clear();
        self.kill_names.clear();
    }

    /// Advances the state machine. Returns true while the scoreboard is on
    /// screen.
    pub fn tick(&mut self, tick: &Tick) -> bool {
        let matched = match tick.frame {
            Some(frame) => self.mask.coarse_match(frame),
            None => {
                debug!("Tick {}: {}", tick.msec, ScanError::MissingFrame);
                false
            }
        };

        match self.state {
            SceneState::Default => {
                if !matched {
                    return false;
                }
                if tick.overlay {
                    debug!("Scoreboard match ignored: another scene is visible");
                    return false;
                }
                if tick.msec - self.last_matched < REENTRY_COOLDOWN_MSEC {
                    return false;
                }
                info!("Scoreboard appeared at {} msec", tick.msec);
                self.set_state(SceneState::Tracking, tick.msec);
                self.fired = false;
                self.track(tick, matched)
            }
            SceneState::Tracking => self.track(tick, matched),
        }
    }

    fn track(&mut self, tick: &Tick, matched: bool) -> bool {
        let frame = match tick.frame {
            Some(frame) if matched => frame,
            _ => {
                if tick.msec - self.last_matched >= EXIT_AFTER_MSEC {
                    self.leave(tick.msec);
                }
                return false;
            }
        };
        self.last_matched = tick.msec;

        if self.is_still(frame)
            && !self.fired
            && tick.msec - self.last_event >= RESULT_SUPPRESS_MSEC
        {
            self.fire(frame, tick.msec);
        }
        true
    }

    /// Diff test against the previous tick, then the marker alignment test
    /// when something moved.
    fn is_still(&mut self, frame: &RgbImage) -> bool {
        let band = crop(frame, DIFF_BAND);
        let hue = hue_channel(&band);
        let motion = self
            .band_cache
            .as_ref()
            .map(|previous| hue_motion(previous, &hue, &white_mask(&band)));
        self.band_cache = Some(hue);

        let Some(motion) = motion else {
            return false;
        };
        if motion == 0 {
            return true;
        }

        let spread = self.analyzer.measure_spread(frame);
        debug!("Last row moving ({} px changed), marker spread {}", motion, spread);
        spread == 0 || self.history.push(spread)
    }

    fn fire(&mut self, frame: &RgbImage, msec: i64) {
        info!("Scoreboard is still at {} msec, analyzing", msec);
        let kill_names = std::mem::take(&mut self.kill_names);
        let result = self.analyzer.analyze(frame, kill_names, &self.events);
        emit(&self.events, ScanEvent::ScoreboardStill { msec });
        self.dispatch(result);
        self.last_event = msec;
        self.fired = true;
    }

    fn dispatch(&self, result: GameResult) {
        let recognizers = self.analyzer.classifier().recognizers();
        match &self.worker {
            Some(worker) => {
                if let Err(result) = worker.submit(result) {
                    warn!("Weapon worker is gone, finishing result inline");
                    finish_result(result, recognizers, &self.events);
                }
            }
            None => finish_result(result, recognizers, &self.events),
        }
    }

    fn leave(&mut self, msec: i64) {
        if !self.fired {
            if let Some(best) = self.history.min() {
                warn!(
                    "Scoreboard never settled (best marker spread {} px). Check the capture setup.",
                    best
                );
            }
        }
        info!("Scoreboard gone at {} msec", msec);
        self.band_cache = None;
        self.history.clear();
        self.fired = false;
        self.set_state(SceneState::Default, msec);
    }

    fn set_state(&mut self, state: SceneState, msec: i64) {
        debug!("Scene {} -> {} at {} msec", self.state, state, msec);
        self.state = state;
    }
}
