//! Typed catalogs of room impulse responses and noises.
//!
//! Both list files share the same record grammar: one record per line,
//! `--key value` pairs in any order, and everything after the first
//! non-flag token joined into the trailing location reference (which may
//! itself be a piped command). The catalogs are built in two passes:
//! parse the flat records, then link isotropic noises to the impulse
//! response they were recorded with.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};

use crate::CorpusReverbError;

/// One room impulse response from the RIR list.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpulseResponse {
    pub rir_id: String,
    pub room_id: String,
    pub receiver_position_id: Option<String>,
    pub source_position_id: Option<String>,
    /// Time for reflections of a direct sound to decay 60 dB, in seconds.
    pub rt60: Option<f64>,
    /// Direct-to-reverberant ratio of the impulse, in dB.
    pub drr: Option<f64>,
    pub location: String,
    /// Isotropic noises recorded at this impulse response's location,
    /// attached during linking.
    pub isotropic_noises: Vec<Noise>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseType {
    Isotropic,
    PointSource,
}

/// How an additive noise is mixed: background noises span the whole
/// utterance, foreground noises start somewhere inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseRole {
    Background,
    Foreground,
}

/// One noise from the noise list.
#[derive(Clone, Debug, PartialEq)]
pub struct Noise {
    pub noise_id: String,
    pub noise_type: NoiseType,
    pub role: NoiseRole,
    /// Location of the paired impulse response; present exactly when the
    /// noise is isotropic.
    pub rir_location: Option<String>,
    pub location: String,
}

/// All impulse responses recorded in one room, as indices into the
/// catalog's RIR list.
#[derive(Clone, Debug)]
pub struct Room {
    pub room_id: String,
    pub rir_indices: Vec<usize>,
}

/// The loaded, linked and grouped catalogs a corruption run draws from.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub rirs: Vec<ImpulseResponse>,
    pub rooms: Vec<Room>,
    pub point_noises: Vec<Noise>,
}

impl Catalog {
    /// Load and link the catalogs from the RIR list and optional noise list.
    pub fn load(
        rir_list: &Path,
        noise_list: Option<&Path>,
    ) -> Result<Self, CorpusReverbError> {
        if !rir_list.is_file() {
            return Err(CorpusReverbError::RirListNotFound(rir_list.to_path_buf()));
        }
        let mut rirs = parse_rirs(BufReader::new(File::open(rir_list)?))?;
        if rirs.is_empty() {
            return Err(CorpusReverbError::EmptyRirList);
        }

        let mut point_noises = Vec::new();
        if let Some(path) = noise_list {
            if !path.is_file() {
                return Err(CorpusReverbError::NoiseListNotFound(path.to_path_buf()));
            }
            let noises = parse_noises(BufReader::new(File::open(path)?))?;
            point_noises = link_noises(&mut rirs, noises);
            info!("number of point-source noises is {}", point_noises.len());
        }

        let rooms = group_rooms(&rirs);
        Ok(Self {
            rirs,
            rooms,
            point_noises,
        })
    }
}

/// A raw record line split into named fields and the trailing location.
struct RawRecord {
    fields: Vec<(String, String)>,
    location: String,
}

fn split_record(kind: &'static str, line: &str) -> Result<RawRecord, CorpusReverbError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut fields = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let Some(key) = tokens[index].strip_prefix("--") else {
            break;
        };
        let Some(value) = tokens.get(index + 1) else {
            return Err(CorpusReverbError::MissingFieldValue {
                kind,
                field: key.to_owned(),
                line: line.to_owned(),
            });
        };
        fields.push((key.to_owned(), (*value).to_owned()));
        index += 2;
    }

    if index == tokens.len() {
        return Err(CorpusReverbError::MissingLocation {
            kind,
            line: line.to_owned(),
        });
    }

    Ok(RawRecord {
        fields,
        location: tokens[index..].join(" "),
    })
}

fn parse_float(
    kind: &'static str,
    field: &'static str,
    value: &str,
) -> Result<f64, CorpusReverbError> {
    value
        .parse()
        .map_err(|_| CorpusReverbError::InvalidFieldValue {
            kind,
            field,
            value: value.to_owned(),
        })
}

/// Parse the RIR list. Every record gets an empty isotropic-noise list;
/// linking fills it in later.
pub fn parse_rirs<R: BufRead>(reader: R) -> Result<Vec<ImpulseResponse>, CorpusReverbError> {
    const KIND: &str = "rir";
    let mut rirs = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = split_record(KIND, line)?;

        let mut rir_id = None;
        let mut room_id = None;
        let mut receiver_position_id = None;
        let mut source_position_id = None;
        let mut rt60 = None;
        let mut drr = None;
        for (key, value) in record.fields {
            match key.as_str() {
                "rir-id" => rir_id = Some(value),
                "room-id" => room_id = Some(value),
                "receiver-position-id" => receiver_position_id = Some(value),
                "source-position-id" => source_position_id = Some(value),
                "rt60" => rt60 = Some(parse_float(KIND, "rt60", &value)?),
                "drr" => drr = Some(parse_float(KIND, "drr", &value)?),
                _ => {
                    return Err(CorpusReverbError::UnknownField {
                        kind: KIND,
                        field: key,
                        line: line.to_owned(),
                    })
                }
            }
        }

        let missing = |field| CorpusReverbError::MissingField {
            kind: KIND,
            field,
            line: line.to_owned(),
        };
        rirs.push(ImpulseResponse {
            rir_id: rir_id.ok_or_else(|| missing("rir-id"))?,
            room_id: room_id.ok_or_else(|| missing("room-id"))?,
            receiver_position_id,
            source_position_id,
            rt60,
            drr,
            location: record.location,
            isotropic_noises: Vec::new(),
        });
    }

    Ok(rirs)
}

/// Parse the noise list. Per-record invariants are enforced here: an
/// isotropic noise must name its paired `--rir-file`, a point-source noise
/// must not.
pub fn parse_noises<R: BufRead>(reader: R) -> Result<Vec<Noise>, CorpusReverbError> {
    const KIND: &str = "noise";
    let mut noises = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = split_record(KIND, line)?;

        let mut noise_id = None;
        let mut noise_type = None;
        let mut role = NoiseRole::Background;
        let mut rir_location = None;
        for (key, value) in record.fields {
            match key.as_str() {
                "noise-id" => noise_id = Some(value),
                "noise-type" => {
                    noise_type = Some(match value.as_str() {
                        "isotropic" => NoiseType::Isotropic,
                        "point-source" => NoiseType::PointSource,
                        _ => {
                            return Err(CorpusReverbError::InvalidFieldValue {
                                kind: KIND,
                                field: "noise-type",
                                value,
                            })
                        }
                    })
                }
                "bg-fg-type" => {
                    role = match value.as_str() {
                        "background" => NoiseRole::Background,
                        "foreground" => NoiseRole::Foreground,
                        _ => {
                            return Err(CorpusReverbError::InvalidFieldValue {
                                kind: KIND,
                                field: "bg-fg-type",
                                value,
                            })
                        }
                    }
                }
                "rir-file" => rir_location = Some(value),
                _ => {
                    return Err(CorpusReverbError::UnknownField {
                        kind: KIND,
                        field: key,
                        line: line.to_owned(),
                    })
                }
            }
        }

        let missing = |field| CorpusReverbError::MissingField {
            kind: KIND,
            field,
            line: line.to_owned(),
        };
        let noise_id = noise_id.ok_or_else(|| missing("noise-id"))?;
        let noise_type = noise_type.ok_or_else(|| missing("noise-type"))?;
        match noise_type {
            NoiseType::Isotropic if rir_location.is_none() => {
                return Err(CorpusReverbError::IsotropicWithoutRir(noise_id));
            }
            NoiseType::PointSource if rir_location.is_some() => {
                return Err(CorpusReverbError::PointSourceWithRir(noise_id));
            }
            _ => {}
        }

        noises.push(Noise {
            noise_id,
            noise_type,
            role,
            rir_location,
            location: record.location,
        });
    }

    Ok(noises)
}

/// Attach isotropic noises to the impulse response recorded at their
/// paired location and return the point-source noises.
///
/// An isotropic noise whose paired location matches no impulse response
/// cannot be played back; it is dropped with a warning rather than failing
/// the run.
pub fn link_noises(rirs: &mut [ImpulseResponse], noises: Vec<Noise>) -> Vec<Noise> {
    let mut point_noises = Vec::new();
    for noise in noises {
        match noise.noise_type {
            NoiseType::PointSource => point_noises.push(noise),
            NoiseType::Isotropic => {
                let paired = noise.rir_location.as_deref();
                match rirs
                    .iter_mut()
                    .find(|rir| Some(rir.location.as_str()) == paired)
                {
                    Some(rir) => rir.isotropic_noises.push(noise),
                    None => warn!(
                        "dropping isotropic noise '{}': no impulse response at '{}'",
                        noise.noise_id,
                        paired.unwrap_or_default()
                    ),
                }
            }
        }
    }
    point_noises
}

/// Group impulse responses by room id, preserving first-seen room order and
/// catalog order within each room.
pub fn group_rooms(rirs: &[ImpulseResponse]) -> Vec<Room> {
    let mut rooms: Vec<Room> = Vec::new();
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();
    for (index, rir) in rirs.iter().enumerate() {
        let room_index = *index_by_id.entry(rir.room_id.as_str()).or_insert_with(|| {
            rooms.push(Room {
                room_id: rir.room_id.clone(),
                rir_indices: Vec::new(),
            });
            rooms.len() - 1
        });
        rooms[room_index].rir_indices.push(index);
    }
    rooms
}
