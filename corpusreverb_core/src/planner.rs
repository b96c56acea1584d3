//! Per-utterance corruption decisions and pipeline rendering.
//!
//! The planner owns the run's cyclic selectors and walks the corpus in a
//! fixed order: replicas outermost, utterances in ascending id order. With
//! a fixed seed the draw sequence, and therefore the whole output, is
//! reproducible. The draw order per utterance is: reverberation coin,
//! primary RIR index, isotropic index, noise-adding coin, noise count,
//! then per added noise an RIR index and (for foreground noises) a start
//! time. Selector draws consume no randomness.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::Rng;

use crate::catalog::{Catalog, NoiseRole};
use crate::selector::CyclicSelector;
use crate::{Config, CorpusReverbError, ProgressEvent};

/// One additive noise with its mixing parameters; the three parallel
/// option lists are rendered from these in order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AdditiveFragment {
    pub pipeline: String,
    pub snr: f64,
    pub start_time: f64,
}

/// The corruption chosen for a single utterance replica.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct CorruptionPlan {
    pub impulse_response: Option<String>,
    pub additive: Vec<AdditiveFragment>,
}

impl CorruptionPlan {
    pub fn is_clean(&self) -> bool {
        self.impulse_response.is_none() && self.additive.is_empty()
    }

    /// Render the plan as a pipeline applied to `source_pipe`.
    pub fn render(&self, source_pipe: &str) -> String {
        let mut opts = Vec::new();
        if let Some(location) = &self.impulse_response {
            opts.push(format!("--impulse-response={location}"));
        }
        if !self.additive.is_empty() {
            let signals = self
                .additive
                .iter()
                .map(|fragment| format!("\"{}\"", fragment.pipeline))
                .collect::<Vec<_>>()
                .join(",");
            let snrs = self
                .additive
                .iter()
                .map(|fragment| fragment.snr.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let start_times = self
                .additive
                .iter()
                .map(|fragment| fragment.start_time.to_string())
                .collect::<Vec<_>>()
                .join(",");
            opts.push(format!("--additive-signals='{signals}'"));
            opts.push(format!("--snrs='{snrs}'"));
            opts.push(format!("--start-times='{start_times}'"));
        }
        format!("{source_pipe} wav-reverberate {} - - |", opts.join(" "))
    }
}

pub(crate) struct CorruptionPlanner<'a> {
    catalog: &'a Catalog,
    rooms: CyclicSelector<usize>,
    noises: Option<CyclicSelector<usize>>,
    foreground_snrs: CyclicSelector<f64>,
    background_snrs: CyclicSelector<f64>,
    speech_rvb_probability: f64,
    noise_adding_probability: f64,
    max_noises_added: u32,
}

impl<'a> CorruptionPlanner<'a> {
    /// Build the planner's selectors. The shuffle order is part of the
    /// reproducibility contract: rooms, then point-source noises, then
    /// foreground SNRs, then background SNRs.
    pub fn new(catalog: &'a Catalog, config: &Config, rng: &mut StdRng) -> Self {
        let rooms = CyclicSelector::new((0..catalog.rooms.len()).collect(), rng);
        let noises = if catalog.point_noises.is_empty() {
            None
        } else {
            Some(CyclicSelector::new(
                (0..catalog.point_noises.len()).collect(),
                rng,
            ))
        };
        let foreground_snrs = CyclicSelector::new(config.foreground_snrs.clone(), rng);
        let background_snrs = CyclicSelector::new(config.background_snrs.clone(), rng);

        Self {
            catalog,
            rooms,
            noises,
            foreground_snrs,
            background_snrs,
            speech_rvb_probability: config.speech_rvb_probability,
            noise_adding_probability: config.noise_adding_probability,
            max_noises_added: config.max_noises_added,
        }
    }

    /// Decide the corruption for one utterance replica of `duration` seconds.
    pub fn plan_utterance(&mut self, duration: f64, rng: &mut StdRng) -> CorruptionPlan {
        let catalog = self.catalog;
        let room = &catalog.rooms[*self.rooms.next()];
        let mut plan = CorruptionPlan::default();

        if rng.random::<f64>() < self.speech_rvb_probability {
            let rir_index = room.rir_indices[rng.random_range(0..room.rir_indices.len())];
            let rir = &catalog.rirs[rir_index];
            plan.impulse_response = Some(rir.location.clone());

            // The isotropic noise recorded at this RIR's location, extended
            // to span the whole utterance.
            if !rir.isotropic_noises.is_empty() {
                let noise =
                    &rir.isotropic_noises[rng.random_range(0..rir.isotropic_noises.len())];
                plan.additive.push(AdditiveFragment {
                    pipeline: format!(
                        "wav-reverberate --duration={duration} {} - |",
                        noise.location
                    ),
                    snr: *self.background_snrs.next(),
                    start_time: 0.0,
                });
            }
        }

        if let Some(noises) = &mut self.noises {
            if rng.random::<f64>() < self.noise_adding_probability {
                // Every added noise reverberates through a fresh RIR drawn
                // from the room chosen above, never from another room.
                for _ in 0..rng.random_range(1..=self.max_noises_added) {
                    let noise = &catalog.point_noises[*noises.next()];
                    let rir_index =
                        room.rir_indices[rng.random_range(0..room.rir_indices.len())];
                    let rir = &catalog.rirs[rir_index];
                    match noise.role {
                        NoiseRole::Background => plan.additive.push(AdditiveFragment {
                            pipeline: format!(
                                "wav-reverberate --duration={duration} --impulse-response={} {} - |",
                                rir.location, noise.location
                            ),
                            snr: *self.background_snrs.next(),
                            start_time: 0.0,
                        }),
                        NoiseRole::Foreground => {
                            let start_time =
                                (rng.random::<f64>() * duration * 100.0).round() / 100.0;
                            plan.additive.push(AdditiveFragment {
                                pipeline: format!(
                                    "wav-reverberate --impulse-response={} {} - |",
                                    rir.location, noise.location
                                ),
                                snr: *self.foreground_snrs.next(),
                                start_time,
                            });
                        }
                    }
                }
            }
        }

        plan
    }
}

/// Plan every utterance replica and return the output wav.scp lines.
pub(crate) fn corrupt_corpus<F>(
    catalog: &Catalog,
    wav_scp: &BTreeMap<String, String>,
    durations: &HashMap<String, f64>,
    config: &Config,
    rng: &mut StdRng,
    progress: &mut F,
) -> Result<Vec<String>, CorpusReverbError>
where
    F: FnMut(ProgressEvent),
{
    let mut planner = CorruptionPlanner::new(catalog, config, rng);
    let total_plans = wav_scp.len() as u64 * u64::from(config.num_replica);
    progress(ProgressEvent::Start { total_plans });

    let mut lines = Vec::with_capacity(total_plans as usize);
    let mut planned = 0u64;
    for i in 0..config.num_replica {
        for (utt_id, source) in wav_scp {
            let duration = *durations
                .get(utt_id)
                .ok_or_else(|| CorpusReverbError::MissingDuration(utt_id.clone()))?;
            let out_id = match &config.prefix {
                Some(prefix) => format!("{prefix}{i}_{utt_id}"),
                None => utt_id.clone(),
            };

            let plan = planner.plan_utterance(duration, rng);
            let line = if plan.is_clean() {
                format!("{out_id} {source}")
            } else {
                // A bare file path only needs to become a pipe when a
                // corruption is actually applied to it.
                let source_pipe = if source.split_whitespace().count() == 1 {
                    format!("cat {source} |")
                } else {
                    source.clone()
                };
                format!("{out_id} {}", plan.render(&source_pipe))
            };
            lines.push(line);
            planned += 1;
            progress(ProgressEvent::Advance { planned });
        }
    }

    Ok(lines)
}
