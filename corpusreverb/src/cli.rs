use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub mod snr;

/// Parse a probability option, requiring a value within `[0, 1]`.
pub fn parse_probability(value: &str) -> Result<f64, String> {
    let probability: f64 = value
        .parse()
        .map_err(|_| format!("invalid probability '{value}'"))?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(format!("probability must be within [0, 1], got '{value}'"));
    }
    Ok(probability)
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(
            "Reverberate a speech corpus with room impulse responses, \
             optionally adding isotropic and point-source noises",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("rir-list-file")
                .long("rir-list-file")
                .value_name("FILE")
                .help(
                    "RIR list: per line --rir-id <id> --room-id <id> \
                     [--receiver-position-id <id>] [--source-position-id <id>] \
                     [--rt60 <float>] [--drr <float>] <location>",
                )
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("noise-list-file")
                .long("noise-list-file")
                .value_name("FILE")
                .help(
                    "Noise list: per line --noise-id <id> \
                     --noise-type <isotropic|point-source> \
                     [--bg-fg-type <background|foreground>] \
                     [--rir-file <location>] <location>",
                )
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("num-replications")
                .long("num-replications")
                .value_name("N")
                .help("Number of corrupted copies to generate")
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("foreground-snrs")
                .long("foreground-snrs")
                .value_name("SNRS")
                .help("Colon-separated SNRs in dB for foreground noises")
                .default_value("20:10:0")
                .value_parser(ValueParser::new(snr::parse_snr_list)),
        )
        .arg(
            Arg::new("background-snrs")
                .long("background-snrs")
                .value_name("SNRS")
                .help("Colon-separated SNRs in dB for background noises")
                .default_value("20:10:0")
                .value_parser(ValueParser::new(snr::parse_snr_list)),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("PREFIX")
                .help("Prefix for the ids of the corrupted utterances"),
        )
        .arg(
            Arg::new("speech-rvb-probability")
                .long("speech-rvb-probability")
                .value_name("P")
                .help("Probability of reverberating the speech signal")
                .default_value("0.8")
                .value_parser(ValueParser::new(parse_probability)),
        )
        .arg(
            Arg::new("noise-adding-probability")
                .long("noise-adding-probability")
                .value_name("P")
                .help("Probability of adding point-source noises")
                .default_value("0.4")
                .value_parser(ValueParser::new(parse_probability)),
        )
        .arg(
            Arg::new("max-noises-added")
                .long("max-noises-added")
                .value_name("N")
                .help("Maximum number of point-source noises added per utterance")
                .default_value("2")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("random-seed")
                .long("random-seed")
                .value_name("SEED")
                .help("Seed for the randomization of impulse responses and noises")
                .default_value("0")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("List the files a run would write without writing them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("input_dir")
                .value_name("INPUT_DIR")
                .help("Input corpus directory")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output_dir")
                .value_name("OUTPUT_DIR")
                .help("Output corpus directory")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}
