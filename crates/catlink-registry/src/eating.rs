//! Eating detection for feeders with a weighing bowl
//!
//! Each poll feeds one bowl weight sample. A drop below the last stable
//! weight starts a meal; the meal ends once the weight has not changed for
//! the stable duration. Weight jumps above `stable + spike_threshold` are a
//! cat leaning on the bowl and are ignored while a meal is in progress.

use std::collections::VecDeque;

use catlink_core::DeviceSettings;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Samples kept for the stability check
const MAX_SAMPLES: usize = 720;
/// Expected seconds between samples
const SAMPLE_INTERVAL_SECS: i64 = 5;
/// Samples closer together than this are duplicates
const MIN_SAMPLE_SPACING_SECS: i64 = 3;
/// Unchanged weight this long while eating moves to stabilizing
const SETTLE_SECS: i64 = 10;
/// A meal counts as just finished for this long
const JUST_FINISHED_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EatingPhase {
    Idle,
    Eating,
    Stabilizing,
}

/// One finished meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EatingEvent {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Stable weight before the meal, grams
    pub start_weight: i64,
    pub end_weight: i64,
    /// Grams eaten, never negative
    pub amount: i64,
    pub duration_secs: i64,
    /// Highest weight seen during the meal
    pub max_weight: i64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: DateTime<Utc>,
    weight: i64,
}

/// Tuning taken from the resolved device settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EatingConfig {
    pub stable_duration_secs: i64,
    pub min_eating_amount: i64,
    pub spike_threshold: i64,
}

impl From<&DeviceSettings> for EatingConfig {
    fn from(settings: &DeviceSettings) -> Self {
        Self {
            stable_duration_secs: i64::from(settings.stable_duration),
            min_eating_amount: i64::from(settings.min_eating_amount),
            spike_threshold: i64::from(settings.spike_threshold),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EatingDetector {
    config: EatingConfig,
    samples: VecDeque<Sample>,
    last_sample_at: Option<DateTime<Utc>>,
    last_stable_weight: Option<i64>,
    phase: EatingPhase,
    meal_start: Option<(DateTime<Utc>, i64)>,
    max_weight: Option<i64>,
    /// Weight currently being watched for stability, and since when
    settle: Option<(DateTime<Utc>, i64)>,
    last_event: Option<EatingEvent>,
    today: Vec<EatingEvent>,
}

impl EatingDetector {
    pub fn new(config: EatingConfig) -> Self {
        Self {
            config,
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            last_sample_at: None,
            last_stable_weight: None,
            phase: EatingPhase::Idle,
            meal_start: None,
            max_weight: None,
            settle: None,
            last_event: None,
            today: Vec::new(),
        }
    }

    /// Apply changed tuning without losing history
    pub fn reconfigure(&mut self, config: EatingConfig) {
        self.config = config;
    }

    pub fn phase(&self) -> EatingPhase {
        self.phase
    }

    pub fn last_stable_weight(&self) -> Option<i64> {
        self.last_stable_weight
    }

    pub fn last_event(&self) -> Option<&EatingEvent> {
        self.last_event.as_ref()
    }

    /// Meals that started on the local day of `now`
    pub fn events_on(&self, now: DateTime<Utc>) -> impl Iterator<Item = &EatingEvent> {
        let day = local_day(now);
        self.today.iter().filter(move |e| local_day(e.start_time) == day)
    }

    /// Grams eaten today
    pub fn daily_intake(&self, now: DateTime<Utc>) -> i64 {
        self.events_on(now).map(|e| e.amount).sum()
    }

    /// Grams eaten so far in the current meal
    pub fn current_amount(&self) -> i64 {
        match (self.phase, self.meal_start, self.settle) {
            (EatingPhase::Idle, _, _) => 0,
            (_, Some((_, start)), Some((_, current))) => (start - current).max(0),
            _ => 0,
        }
    }

    /// Seconds since the current meal started
    pub fn current_duration(&self, now: DateTime<Utc>) -> i64 {
        match (self.phase, self.meal_start) {
            (EatingPhase::Idle, _) | (_, None) => 0,
            (_, Some((start, _))) => (now - start).num_seconds().max(0),
        }
    }

    /// `eating`, `stabilizing`, `just_finished` or `idle`
    pub fn status(&self, now: DateTime<Utc>) -> &'static str {
        match self.phase {
            EatingPhase::Eating => "eating",
            EatingPhase::Stabilizing => "stabilizing",
            EatingPhase::Idle => match &self.last_event {
                Some(e) if (now - e.end_time).num_seconds() < JUST_FINISHED_SECS => "just_finished",
                _ => "idle",
            },
        }
    }

    /// Feed one weight sample; returns a meal when one just ended
    pub fn process(&mut self, weight: i64, at: DateTime<Utc>) -> Option<EatingEvent> {
        if let Some(last) = self.last_sample_at {
            if (at - last).num_seconds() < MIN_SAMPLE_SPACING_SECS {
                return None;
            }
        }
        self.last_sample_at = Some(at);
        self.prune_days(at);
        self.add_sample(weight, at);

        if self.phase == EatingPhase::Eating {
            self.max_weight = Some(self.max_weight.map_or(weight, |m| m.max(weight)));
        }

        match self.phase {
            EatingPhase::Idle => {
                if let Some(stable) = self.last_stable_weight {
                    if weight < stable - self.config.min_eating_amount {
                        info!("Eating started: {}g -> {}g", stable, weight);
                        self.phase = EatingPhase::Eating;
                        self.meal_start = Some((at, stable));
                        self.max_weight = Some(weight);
                    }
                }
                None
            }
            EatingPhase::Eating => {
                if self.is_spike(weight) {
                    return None;
                }
                match self.settle {
                    Some((since, watched)) if watched == weight => {
                        if (at - since).num_seconds() >= SETTLE_SECS {
                            debug!("Entering stabilizing at {}g", weight);
                            self.phase = EatingPhase::Stabilizing;
                        }
                    }
                    _ => self.settle = Some((at, weight)),
                }
                None
            }
            EatingPhase::Stabilizing => {
                if self.is_spike(weight) {
                    return None;
                }
                let (since, watched) = self.settle?;
                if watched != weight {
                    debug!("Eating resumed at {}g", weight);
                    self.phase = EatingPhase::Eating;
                    self.settle = Some((at, weight));
                    return None;
                }
                if (at - since).num_seconds() >= self.config.stable_duration_secs {
                    return self.finish(at, weight);
                }
                None
            }
        }
    }

    fn finish(&mut self, at: DateTime<Utc>, weight: i64) -> Option<EatingEvent> {
        let (start_time, start_weight) = self.meal_start?;
        let event = EatingEvent {
            start_time,
            end_time: at,
            start_weight,
            end_weight: weight,
            amount: (start_weight - weight).max(0),
            duration_secs: (at - start_time).num_seconds(),
            max_weight: self.max_weight.unwrap_or(weight),
        };
        info!(
            "Eating ended: {}g consumed in {}s",
            event.amount, event.duration_secs
        );

        self.phase = EatingPhase::Idle;
        self.meal_start = None;
        self.settle = None;
        self.max_weight = None;
        self.last_event = Some(event.clone());
        self.today.push(event.clone());
        Some(event)
    }

    fn is_spike(&self, weight: i64) -> bool {
        self.last_stable_weight
            .is_some_and(|stable| weight > stable + self.config.spike_threshold)
    }

    /// Stability is judged on the samples before this one
    fn add_sample(&mut self, weight: i64, at: DateTime<Utc>) {
        if let Some(stable) = self.check_stability() {
            if self.last_stable_weight != Some(stable) {
                debug!("New stable bowl weight {}g", stable);
                self.last_stable_weight = Some(stable);
            }
        }
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at, weight });
    }

    /// The weight, if every sample in the stable window is identical
    pub fn check_stability(&self) -> Option<i64> {
        if self.samples.len() < 2 {
            return None;
        }
        let newest = self.samples.back()?;
        let cutoff = newest.at - Duration::seconds(self.config.stable_duration_secs);
        let mut recent = self.samples.iter().filter(|s| s.at > cutoff);
        let first = recent.next()?;
        let mut last = first;
        for sample in recent {
            if sample.weight != first.weight {
                return None;
            }
            last = sample;
        }
        let span = (last.at - first.at).num_seconds();
        (span >= self.config.stable_duration_secs - SAMPLE_INTERVAL_SECS).then_some(first.weight)
    }

    fn prune_days(&mut self, now: DateTime<Utc>) {
        let day = local_day(now);
        self.today.retain(|e| local_day(e.start_time) == day);
    }
}

fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}
