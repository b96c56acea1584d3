mod cli;

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use corpusreverb_core::{plan_outputs, run_with_progress, Config, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;

use crate::cli::build_cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let input_dir = matches
        .get_one::<PathBuf>("input_dir")
        .expect("required argument");
    if !input_dir.is_dir() {
        return Err(anyhow!(
            "input directory does not exist: {}",
            input_dir.display()
        ));
    }
    let output_dir = matches
        .get_one::<PathBuf>("output_dir")
        .expect("required argument");
    let rir_list = matches
        .get_one::<PathBuf>("rir-list-file")
        .expect("required argument");

    let mut builder = Config::builder(input_dir, output_dir, rir_list)
        .num_replica(
            *matches
                .get_one::<u32>("num-replications")
                .expect("defaulted argument"),
        )
        .foreground_snrs(
            matches
                .get_one::<Vec<f64>>("foreground-snrs")
                .cloned()
                .expect("defaulted argument"),
        )
        .background_snrs(
            matches
                .get_one::<Vec<f64>>("background-snrs")
                .cloned()
                .expect("defaulted argument"),
        )
        .speech_rvb_probability(
            *matches
                .get_one::<f64>("speech-rvb-probability")
                .expect("defaulted argument"),
        )
        .noise_adding_probability(
            *matches
                .get_one::<f64>("noise-adding-probability")
                .expect("defaulted argument"),
        )
        .max_noises_added(
            *matches
                .get_one::<u32>("max-noises-added")
                .expect("defaulted argument"),
        )
        .seed(
            *matches
                .get_one::<u64>("random-seed")
                .expect("defaulted argument"),
        );
    if let Some(path) = matches.get_one::<PathBuf>("noise-list-file") {
        builder = builder.noise_list(path);
    }
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        builder = builder.prefix(prefix.clone());
    }
    let config = builder.build().with_context(|| {
        format!("invalid configuration for '{}'", input_dir.display())
    })?;
    debug!("resolved configuration: {config:?}");

    if matches.get_flag("dry-run") {
        let outputs = plan_outputs(&config)
            .with_context(|| format!("failed to plan outputs for '{}'", input_dir.display()))?;
        println!("Dry run: would write {} file(s):", outputs.len());
        for path in outputs {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory '{}'", output_dir.display())
    })?;

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} utterances",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let progress_handle = progress.clone();
    let result = run_with_progress(config, move |event| match event {
        ProgressEvent::Start { total_plans } => {
            progress_handle.set_style(bar_style.clone());
            progress_handle.set_length(total_plans);
        }
        ProgressEvent::Advance { planned } => {
            progress_handle.set_position(planned);
        }
        ProgressEvent::Finish => {}
    })
    .with_context(|| format!("failed to corrupt corpus '{}'", input_dir.display()));

    progress.finish_and_clear();

    result?;

    Ok(())
}
