//! Reading and writing the corpus directory tables.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::CorpusReverbError;

/// Read wav.scp into an ordered map so that iteration visits utterances in
/// ascending id order. The pipeline tokens are re-joined with single
/// spaces.
pub(crate) fn read_wav_scp(path: &Path) -> Result<BTreeMap<String, String>, CorpusReverbError> {
    parse_wav_scp(BufReader::new(File::open(path)?), &path.display().to_string())
}

fn parse_wav_scp<R: BufRead>(
    reader: R,
    file: &str,
) -> Result<BTreeMap<String, String>, CorpusReverbError> {
    let mut entries = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((utt_id, rest)) = line.split_once(char::is_whitespace) else {
            return Err(CorpusReverbError::MalformedTableLine {
                file: file.to_owned(),
                line: line.to_owned(),
            });
        };
        let pipeline = rest.split_whitespace().collect::<Vec<_>>().join(" ");
        entries.insert(utt_id.to_owned(), pipeline);
    }
    Ok(entries)
}

/// Read reco2dur: one `<utterance-id> <seconds>` pair per line.
pub(crate) fn read_durations(path: &Path) -> Result<HashMap<String, f64>, CorpusReverbError> {
    parse_durations(BufReader::new(File::open(path)?), &path.display().to_string())
}

fn parse_durations<R: BufRead>(
    reader: R,
    file: &str,
) -> Result<HashMap<String, f64>, CorpusReverbError> {
    let mut durations = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(utt_id), Some(value), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(CorpusReverbError::MalformedTableLine {
                file: file.to_owned(),
                line: line.to_owned(),
            });
        };
        let duration = value
            .parse()
            .map_err(|_| CorpusReverbError::InvalidDuration {
                utt_id: utt_id.to_owned(),
                value: value.to_owned(),
            })?;
        durations.insert(utt_id.to_owned(), duration);
    }
    Ok(durations)
}

pub(crate) fn write_lines(path: &Path, lines: &[String]) -> Result<(), CorpusReverbError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_scp_orders_by_utterance_id_and_normalizes_spacing() {
        let entries =
            parse_wav_scp("utt2   sox  b.sph -t wav - |\nutt1 a.wav\n".as_bytes(), "wav.scp")
                .unwrap();
        let ids: Vec<&String> = entries.keys().collect();
        assert_eq!(ids, ["utt1", "utt2"]);
        assert_eq!(entries["utt2"], "sox b.sph -t wav - |");
    }

    #[test]
    fn wav_scp_line_without_pipeline_is_malformed() {
        let err = parse_wav_scp("utt1\n".as_bytes(), "wav.scp").unwrap_err();
        assert!(matches!(err, CorpusReverbError::MalformedTableLine { .. }));
    }

    #[test]
    fn durations_parse_as_seconds() {
        let durations = parse_durations("utt1 3.25\nutt2 10\n".as_bytes(), "reco2dur").unwrap();
        assert_eq!(durations["utt1"], 3.25);
        assert_eq!(durations["utt2"], 10.0);
    }

    #[test]
    fn non_numeric_duration_is_fatal() {
        let err = parse_durations("utt1 fast\n".as_bytes(), "reco2dur").unwrap_err();
        assert!(matches!(
            err,
            CorpusReverbError::InvalidDuration { utt_id, .. } if utt_id == "utt1"
        ));
    }

    #[test]
    fn extra_duration_fields_are_malformed() {
        let err = parse_durations("utt1 3.25 extra\n".as_bytes(), "reco2dur").unwrap_err();
        assert!(matches!(err, CorpusReverbError::MalformedTableLine { .. }));
    }
}
