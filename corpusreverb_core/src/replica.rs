//! Replication of auxiliary corpus tables with id prefixing.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::CorpusReverbError;

const COMMENT_MARKER: char = ';';

/// Re-emit every record of `input` once per replica, prefixing the id
/// fields at the given positions with `<prefix><replica>_` — the same
/// scheme the planner uses for utterance ids. Comment and blank lines pass
/// through unprefixed, once per replica.
pub(crate) fn add_prefix_to_fields(
    input: &Path,
    output: &Path,
    num_replica: u32,
    prefix: Option<&str>,
    fields: &[usize],
) -> Result<(), CorpusReverbError> {
    let lines: Vec<String> = BufReader::new(File::open(input)?)
        .lines()
        .collect::<Result<_, _>>()?;
    let mut writer = BufWriter::new(File::create(output)?);

    for i in 0..num_replica {
        for line in &lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                writeln!(writer, "{line}")?;
                continue;
            }
            let mut parts: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
            if let Some(prefix) = prefix {
                for &field in fields {
                    let part = parts.get_mut(field).ok_or_else(|| {
                        CorpusReverbError::MalformedTableLine {
                            file: input.display().to_string(),
                            line: line.to_owned(),
                        }
                    })?;
                    let prefixed = format!("{prefix}{i}_{part}");
                    *part = prefixed;
                }
            }
            writeln!(writer, "{}", parts.join(" "))?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Invert utt2spk into spk2utt. Speakers keep first-seen order and
/// utterances keep their encounter order within each speaker.
pub(crate) fn utt2spk_to_spk2utt(input: &Path, output: &Path) -> Result<(), CorpusReverbError> {
    let mut speaker_order: Vec<String> = Vec::new();
    let mut utts_by_speaker: HashMap<String, Vec<String>> = HashMap::new();

    for line in BufReader::new(File::open(input)?).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(utt_id), Some(speaker), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(CorpusReverbError::MalformedTableLine {
                file: input.display().to_string(),
                line: line.to_owned(),
            });
        };
        utts_by_speaker
            .entry(speaker.to_owned())
            .or_insert_with(|| {
                speaker_order.push(speaker.to_owned());
                Vec::new()
            })
            .push(utt_id.to_owned());
    }

    let mut writer = BufWriter::new(File::create(output)?);
    for speaker in &speaker_order {
        writeln!(writer, "{} {}", speaker, utts_by_speaker[speaker].join(" "))?;
    }
    writer.flush()?;
    Ok(())
}
