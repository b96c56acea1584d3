use std::error::Error;
use std::fs;
use std::path::Path;

use corpusreverb_core::{plan_outputs, run, Config, CorpusReverbError};
use tempfile::tempdir;

/// Build a small corpus directory on the fly.
///
/// Fixtures are plain text tables, so they are synthesised per test instead
/// of being stored in the repository. Entries are (utterance id, wav.scp
/// pipeline, duration in seconds, speaker id).
fn write_corpus(dir: &Path, entries: &[(&str, &str, f64, &str)]) -> Result<(), Box<dyn Error>> {
    let mut wav_scp = String::new();
    let mut reco2dur = String::new();
    let mut utt2spk = String::new();
    let mut text = String::new();
    for (utt_id, pipeline, duration, speaker) in entries {
        wav_scp.push_str(&format!("{utt_id} {pipeline}\n"));
        reco2dur.push_str(&format!("{utt_id} {duration}\n"));
        utt2spk.push_str(&format!("{utt_id} {speaker}\n"));
        text.push_str(&format!("{utt_id} one two three\n"));
    }
    fs::write(dir.join("wav.scp"), wav_scp)?;
    fs::write(dir.join("reco2dur"), reco2dur)?;
    fs::write(dir.join("utt2spk"), utt2spk)?;
    fs::write(dir.join("text"), text)?;
    Ok(())
}

const DEFAULT_ENTRIES: &[(&str, &str, f64, &str)] = &[
    ("utt1", "audio/utt1.wav", 3.5, "spkA"),
    ("utt2", "sox audio/utt2.sph -t wav - |", 7.25, "spkA"),
    ("utt3", "audio/utt3.wav", 1.2, "spkB"),
    ("utt4", "audio/utt4.wav", 12.0, "spkB"),
];

const RIR_LIST: &str = "--rir-id r01 --room-id east --rt60 0.3 rirs/east/r01.wav\n\
                        --rir-id r02 --room-id east rirs/east/r02.wav\n\
                        --rir-id r03 --room-id west --drr -1.5 rirs/west/r03.wav\n";

const NOISE_LIST: &str =
    "--noise-id iso1 --noise-type isotropic --rir-file rirs/east/r01.wav noises/iso1.wav\n\
     --noise-id bg1 --noise-type point-source noises/bg1.wav\n\
     --noise-id fg1 --noise-type point-source --bg-fg-type foreground noises/fg1.wav\n";

fn read_output(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap_or_else(|_| panic!("missing output {name}"))
}

fn option_value<'a>(line: &'a str, option: &str) -> Option<&'a str> {
    let marker = format!("{option}='");
    let start = line.find(&marker)? + marker.len();
    let rest = &line[start..];
    Some(&rest[..rest.find('\'')?])
}

#[test]
fn run_is_deterministic_for_a_fixed_seed() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    let noise_list = input_dir.path().join("noise_list");
    fs::write(&rir_list, RIR_LIST)?;
    fs::write(&noise_list, NOISE_LIST)?;

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let output_dir = tempdir()?;
        let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
            .noise_list(&noise_list)
            .num_replica(2)
            .seed(7)
            .build()?;
        run(config)?;
        outputs.push((
            read_output(output_dir.path(), "wav.scp"),
            read_output(output_dir.path(), "utt2spk"),
            read_output(output_dir.path(), "spk2utt"),
            read_output(output_dir.path(), "text"),
        ));
        output_dir.close()?;
    }

    assert_eq!(outputs[0], outputs[1]);
    input_dir.close()?;
    Ok(())
}

#[test]
fn certain_reverberation_emits_one_impulse_response_per_line() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    fs::write(&rir_list, "--rir-id r01 --room-id only rirs/r01.wav\n")?;

    let output_dir = tempdir()?;
    let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
        .speech_rvb_probability(1.0)
        .noise_adding_probability(0.0)
        .build()?;
    run(config)?;

    let wav_scp = read_output(output_dir.path(), "wav.scp");
    let lines: Vec<&str> = wav_scp.lines().collect();
    assert_eq!(lines.len(), DEFAULT_ENTRIES.len());
    for line in lines {
        assert_eq!(line.matches("--impulse-response=").count(), 1, "line: {line}");
        assert!(!line.contains("--additive-signals="), "line: {line}");
    }

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn zero_probabilities_reproduce_the_input_wav_scp() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    fs::write(&rir_list, RIR_LIST)?;

    let output_dir = tempdir()?;
    let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
        .speech_rvb_probability(0.0)
        .noise_adding_probability(0.0)
        .build()?;
    run(config)?;

    assert_eq!(
        read_output(output_dir.path(), "wav.scp"),
        fs::read_to_string(input_dir.path().join("wav.scp"))?
    );

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn unmatched_isotropic_noise_is_dropped_and_the_run_succeeds() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    let noise_list = input_dir.path().join("noise_list");
    fs::write(&rir_list, RIR_LIST)?;
    fs::write(
        &noise_list,
        "--noise-id ghost --noise-type isotropic --rir-file rirs/ghost.wav noises/ghost.wav\n\
         --noise-id bg1 --noise-type point-source noises/bg1.wav\n",
    )?;

    let output_dir = tempdir()?;
    let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
        .noise_list(&noise_list)
        .speech_rvb_probability(1.0)
        .noise_adding_probability(1.0)
        .build()?;
    run(config)?;

    let wav_scp = read_output(output_dir.path(), "wav.scp");
    assert!(!wav_scp.contains("noises/ghost.wav"));
    assert!(wav_scp.contains("noises/bg1.wav"));

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn replicas_multiply_every_table_with_prefixed_ids() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    fs::write(
        input_dir.path().join("text"),
        "; transcripts\nutt1 one\nutt2 two\nutt3 three\nutt4 four\n",
    )?;
    let rir_list = input_dir.path().join("rir_list");
    fs::write(&rir_list, RIR_LIST)?;

    let output_dir = tempdir()?;
    let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
        .num_replica(3)
        .seed(5)
        .build()?;
    run(config)?;

    let wav_scp = read_output(output_dir.path(), "wav.scp");
    let lines: Vec<&str> = wav_scp.lines().collect();
    assert_eq!(lines.len(), 3 * DEFAULT_ENTRIES.len());
    for (index, line) in lines.iter().enumerate() {
        let replica = index / DEFAULT_ENTRIES.len();
        assert!(
            line.starts_with(&format!("rvb{replica}_utt")),
            "line: {line}"
        );
    }

    let text = read_output(output_dir.path(), "text");
    assert_eq!(text.lines().count(), 3 * 5);
    assert_eq!(text.lines().filter(|l| *l == "; transcripts").count(), 3);

    let utt2spk = read_output(output_dir.path(), "utt2spk");
    assert_eq!(utt2spk.lines().count(), 3 * DEFAULT_ENTRIES.len());
    assert!(utt2spk.contains("rvb2_utt4 rvb2_spkB"));

    let spk2utt = read_output(output_dir.path(), "spk2utt");
    assert!(spk2utt.contains("rvb0_spkA rvb0_utt1 rvb0_utt2"));

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn additive_option_lists_stay_parallel_and_bounded() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    let noise_list = input_dir.path().join("noise_list");
    fs::write(&rir_list, RIR_LIST)?;
    fs::write(&noise_list, NOISE_LIST)?;

    let output_dir = tempdir()?;
    let config = Config::builder(input_dir.path(), output_dir.path(), &rir_list)
        .noise_list(&noise_list)
        .speech_rvb_probability(1.0)
        .noise_adding_probability(1.0)
        .max_noises_added(2)
        .seed(13)
        .build()?;
    run(config)?;

    let wav_scp = read_output(output_dir.path(), "wav.scp");
    let durations: Vec<f64> = DEFAULT_ENTRIES.iter().map(|entry| entry.2).collect();
    for (line, duration) in wav_scp.lines().zip(&durations) {
        let Some(signals) = option_value(line, "--additive-signals") else {
            continue;
        };
        let fragments = signals.split(',').count();
        // at most one isotropic fragment plus max-noises-added point sources
        assert!((1..=3).contains(&fragments), "line: {line}");

        let snrs = option_value(line, "--snrs").expect("snrs present");
        assert_eq!(snrs.split(',').count(), fragments, "line: {line}");

        let start_times = option_value(line, "--start-times").expect("start times present");
        let starts: Vec<f64> = start_times
            .split(',')
            .map(|value| value.parse().expect("numeric start time"))
            .collect();
        assert_eq!(starts.len(), fragments, "line: {line}");
        for start in starts {
            assert!((0.0..=*duration).contains(&start), "line: {line}");
        }
    }

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn missing_durations_are_reported_before_any_output() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    fs::remove_file(input_dir.path().join("reco2dur"))?;
    let rir_list = input_dir.path().join("rir_list");
    fs::write(&rir_list, RIR_LIST)?;

    let output_dir = tempdir()?;
    let config =
        Config::builder(input_dir.path(), output_dir.path(), &rir_list).build()?;
    let err = run(config).expect_err("missing reco2dur should fail");
    assert!(matches!(err, CorpusReverbError::MissingDurations(_)));
    assert!(!output_dir.path().join("wav.scp").exists());

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn plan_outputs_lists_only_tables_present_on_input() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_corpus(input_dir.path(), DEFAULT_ENTRIES)?;
    let rir_list = input_dir.path().join("rir_list");
    fs::write(&rir_list, RIR_LIST)?;

    let output_dir = tempdir()?;
    let config =
        Config::builder(input_dir.path(), output_dir.path(), &rir_list).build()?;
    let outputs = plan_outputs(&config)?;

    let names: Vec<String> = outputs
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["wav.scp", "utt2spk", "spk2utt", "text"]);
    assert!(!output_dir.path().join("wav.scp").exists());

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}
