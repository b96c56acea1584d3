use std::path::PathBuf;

use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

pub mod catalog;
mod data_dir;
mod planner;
mod replica;
pub mod selector;

pub use catalog::{Catalog, ImpulseResponse, Noise, NoiseRole, NoiseType, Room};
pub use selector::CyclicSelector;

/// Prefix assigned automatically when several replicas are requested
/// without an explicit `--prefix`.
pub const DEFAULT_PREFIX: &str = "rvb";

/// Errors that can occur while planning a corrupted corpus.
#[derive(Debug, Error)]
pub enum CorpusReverbError {
    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The RIR list file does not exist.
    #[error("rir list file not found: {0}")]
    RirListNotFound(PathBuf),

    /// A noise list was configured but the file does not exist.
    #[error("noise list file not found: {0}")]
    NoiseListNotFound(PathBuf),

    /// A catalog record lacks one of its required named fields.
    #[error("{kind} record is missing required field --{field}: '{line}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
        line: String,
    },

    /// A catalog record carries a named field this tool does not know.
    #[error("{kind} record has unknown field --{field}: '{line}'")]
    UnknownField {
        kind: &'static str,
        field: String,
        line: String,
    },

    /// A named field appeared without a value.
    #[error("{kind} record field --{field} has no value: '{line}'")]
    MissingFieldValue {
        kind: &'static str,
        field: String,
        line: String,
    },

    /// A named field value failed to parse.
    #[error("{kind} record field --{field} has invalid value '{value}'")]
    InvalidFieldValue {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    /// A catalog record has no trailing location reference.
    #[error("{kind} record has no location: '{line}'")]
    MissingLocation { kind: &'static str, line: String },

    /// An isotropic noise must name the impulse response it was recorded with.
    #[error("isotropic noise '{0}' does not specify --rir-file")]
    IsotropicWithoutRir(String),

    /// A point-source noise is reverberated freely and must not pin an RIR.
    #[error("point-source noise '{0}' must not specify --rir-file")]
    PointSourceWithRir(String),

    /// The RIR list parsed to zero records.
    #[error("rir list contains no impulse responses")]
    EmptyRirList,

    /// The input corpus directory has no wav.scp.
    #[error("wav.scp not found in input directory: {0}")]
    MissingWavScp(PathBuf),

    /// Durations are an external input; this tool never decodes audio.
    #[error("{0} not found; run wav-to-duration on the corpus to generate it")]
    MissingDurations(PathBuf),

    /// An utterance in wav.scp has no duration record.
    #[error("no duration found for utterance '{0}'")]
    MissingDuration(String),

    /// A corpus table line did not have the expected shape.
    #[error("malformed line in {file}: '{line}'")]
    MalformedTableLine { file: String, line: String },

    /// A duration value failed to parse as seconds.
    #[error("invalid duration for utterance '{utt_id}': '{value}'")]
    InvalidDuration { utt_id: String, value: String },

    /// A probability option fell outside `[0, 1]`.
    #[error("{option} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { option: &'static str, value: f64 },

    /// The replica count must be at least one.
    #[error("number of replications must be at least 1")]
    InvalidReplicaCount,

    /// At least one simultaneous point-source noise must be allowed.
    #[error("maximum number of added noises must be at least 1")]
    InvalidMaxNoises,

    /// An SNR pool must hold at least one value.
    #[error("{0} snr list must not be empty")]
    EmptySnrList(&'static str),
}

/// Configuration for one corruption run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Input corpus directory holding wav.scp, reco2dur and optional tables.
    pub input_dir: PathBuf,
    /// Directory the corrupted corpus is written to.
    pub output_dir: PathBuf,
    /// RIR list file describing the available impulse responses.
    pub rir_list: PathBuf,
    /// Optional noise list file.
    pub noise_list: Option<PathBuf>,
    /// Number of corrupted copies to emit.
    pub num_replica: u32,
    /// SNR pool for foreground noises, in dB.
    pub foreground_snrs: Vec<f64>,
    /// SNR pool for background and isotropic noises, in dB.
    pub background_snrs: Vec<f64>,
    /// Prefix for derived utterance ids; `None` keeps ids unchanged.
    pub prefix: Option<String>,
    /// Probability of reverberating the speech signal.
    pub speech_rvb_probability: f64,
    /// Probability of mixing in point-source noises.
    pub noise_adding_probability: f64,
    /// Upper bound on simultaneous point-source noises per utterance.
    pub max_noises_added: u32,
    /// Seed for the run's random generator.
    pub seed: u64,
}

impl Config {
    /// Start building a [`Config`] from the three mandatory paths.
    pub fn builder<P, Q, R>(input_dir: P, output_dir: Q, rir_list: R) -> ConfigBuilder
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
        R: Into<PathBuf>,
    {
        ConfigBuilder {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            rir_list: rir_list.into(),
            noise_list: None,
            num_replica: 1,
            foreground_snrs: vec![20.0, 10.0, 0.0],
            background_snrs: vec![20.0, 10.0, 0.0],
            prefix: None,
            speech_rvb_probability: 0.8,
            noise_adding_probability: 0.4,
            max_noises_added: 2,
            seed: 0,
        }
    }
}

/// Builder for [`Config`]; [`build`](ConfigBuilder::build) validates option
/// ranges and applies the automatic prefix rule.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input_dir: PathBuf,
    output_dir: PathBuf,
    rir_list: PathBuf,
    noise_list: Option<PathBuf>,
    num_replica: u32,
    foreground_snrs: Vec<f64>,
    background_snrs: Vec<f64>,
    prefix: Option<String>,
    speech_rvb_probability: f64,
    noise_adding_probability: f64,
    max_noises_added: u32,
    seed: u64,
}

impl ConfigBuilder {
    pub fn noise_list<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.noise_list = Some(path.into());
        self
    }

    pub fn num_replica(mut self, num_replica: u32) -> Self {
        self.num_replica = num_replica;
        self
    }

    pub fn foreground_snrs(mut self, snrs: Vec<f64>) -> Self {
        self.foreground_snrs = snrs;
        self
    }

    pub fn background_snrs(mut self, snrs: Vec<f64>) -> Self {
        self.background_snrs = snrs;
        self
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn speech_rvb_probability(mut self, probability: f64) -> Self {
        self.speech_rvb_probability = probability;
        self
    }

    pub fn noise_adding_probability(mut self, probability: f64) -> Self {
        self.noise_adding_probability = probability;
        self
    }

    pub fn max_noises_added(mut self, max_noises_added: u32) -> Self {
        self.max_noises_added = max_noises_added;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<Config, CorpusReverbError> {
        check_probability("speech-rvb-probability", self.speech_rvb_probability)?;
        check_probability("noise-adding-probability", self.noise_adding_probability)?;
        if self.num_replica < 1 {
            return Err(CorpusReverbError::InvalidReplicaCount);
        }
        if self.max_noises_added < 1 {
            return Err(CorpusReverbError::InvalidMaxNoises);
        }
        if self.foreground_snrs.is_empty() {
            return Err(CorpusReverbError::EmptySnrList("foreground"));
        }
        if self.background_snrs.is_empty() {
            return Err(CorpusReverbError::EmptySnrList("background"));
        }

        // Several replicas without distinguishing ids would collide utterance
        // ids across copies.
        let prefix = if self.num_replica > 1 && self.prefix.is_none() {
            warn!(
                "prefix is set to '{DEFAULT_PREFIX}' as the number of replications is larger than 1"
            );
            Some(DEFAULT_PREFIX.to_owned())
        } else {
            self.prefix
        };

        Ok(Config {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            rir_list: self.rir_list,
            noise_list: self.noise_list,
            num_replica: self.num_replica,
            foreground_snrs: self.foreground_snrs,
            background_snrs: self.background_snrs,
            prefix,
            speech_rvb_probability: self.speech_rvb_probability,
            noise_adding_probability: self.noise_adding_probability,
            max_noises_added: self.max_noises_added,
            seed: self.seed,
        })
    }
}

fn check_probability(option: &'static str, value: f64) -> Result<(), CorpusReverbError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CorpusReverbError::ProbabilityOutOfRange { option, value })
    }
}

/// Progress notifications emitted while utterance plans are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Planning starts; `total_plans` counts utterances times replicas.
    Start { total_plans: u64 },
    /// Another utterance replica has been planned.
    Advance { planned: u64 },
    /// The run finished writing all output files.
    Finish,
}

/// Corrupt the corpus described by `config`.
pub fn run(config: Config) -> Result<(), CorpusReverbError> {
    run_with_progress(config, |_| {})
}

/// Corrupt the corpus described by `config`, reporting progress through
/// `progress`.
///
/// Builds the RIR/noise catalogs, plans one corrupted pipeline per utterance
/// replica, writes the output wav.scp, and replicates whichever auxiliary
/// tables exist in the input directory with matching id prefixes.
pub fn run_with_progress<F>(config: Config, mut progress: F) -> Result<(), CorpusReverbError>
where
    F: FnMut(ProgressEvent),
{
    let wav_scp_path = require_corpus_inputs(&config)?;

    let catalog = Catalog::load(&config.rir_list, config.noise_list.as_deref())?;
    let wav_scp = data_dir::read_wav_scp(&wav_scp_path)?;
    let durations = data_dir::read_durations(&config.input_dir.join("reco2dur"))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let lines = planner::corrupt_corpus(
        &catalog,
        &wav_scp,
        &durations,
        &config,
        &mut rng,
        &mut progress,
    )?;
    data_dir::write_lines(&config.output_dir.join("wav.scp"), &lines)?;

    let prefix = config.prefix.as_deref();
    let utt2spk_in = config.input_dir.join("utt2spk");
    if utt2spk_in.is_file() {
        let utt2spk_out = config.output_dir.join("utt2spk");
        replica::add_prefix_to_fields(
            &utt2spk_in,
            &utt2spk_out,
            config.num_replica,
            prefix,
            &[0, 1],
        )?;
        replica::utt2spk_to_spk2utt(&utt2spk_out, &config.output_dir.join("spk2utt"))?;
    }
    for (name, fields) in AUX_TABLES {
        let input = config.input_dir.join(name);
        if input.is_file() {
            replica::add_prefix_to_fields(
                &input,
                &config.output_dir.join(name),
                config.num_replica,
                prefix,
                fields,
            )?;
        }
    }

    progress(ProgressEvent::Finish);
    Ok(())
}

/// Optional tables replicated verbatim apart from id prefixing, with the
/// field positions that carry ids.
const AUX_TABLES: [(&str, &[usize]); 3] = [
    ("text", &[0]),
    ("segments", &[0, 1]),
    ("reco2file_and_channel", &[0, 1]),
];

/// List the files a run with `config` would write, without writing anything.
pub fn plan_outputs(config: &Config) -> Result<Vec<PathBuf>, CorpusReverbError> {
    require_corpus_inputs(config)?;

    let mut outputs = vec![config.output_dir.join("wav.scp")];
    if config.input_dir.join("utt2spk").is_file() {
        outputs.push(config.output_dir.join("utt2spk"));
        outputs.push(config.output_dir.join("spk2utt"));
    }
    for (name, _) in AUX_TABLES {
        if config.input_dir.join(name).is_file() {
            outputs.push(config.output_dir.join(name));
        }
    }
    Ok(outputs)
}

fn require_corpus_inputs(config: &Config) -> Result<PathBuf, CorpusReverbError> {
    let wav_scp_path = config.input_dir.join("wav.scp");
    if !wav_scp_path.is_file() {
        return Err(CorpusReverbError::MissingWavScp(config.input_dir.clone()));
    }
    let durations_path = config.input_dir.join("reco2dur");
    if !durations_path.is_file() {
        return Err(CorpusReverbError::MissingDurations(durations_path));
    }
    Ok(wav_scp_path)
}
