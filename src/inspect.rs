use std::collections::BTreeSet;
use std::fmt;

use hmi_codec::{decode, sniff, DecodeError, SourceFormat};
use hmi_core::{Format, Message, Sequence, Track};
use serde::Serialize;

use crate::convert::ConvertError;
use crate::location::Location;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceReport {
    pub source: &'static str,
    pub format: Format,
    pub ppqn: u16,
    pub end_time: u64,
    pub tracks: Vec<TrackReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackReport {
    pub events: usize,
    pub channels: Vec<u8>,
    pub tempo_changes: usize,
    pub has_volume: bool,
    pub end_time: u64,
}

impl SequenceReport {
    pub fn new(source: SourceFormat, seq: &Sequence) -> Self {
        Self {
            source: source.name(),
            format: seq.format,
            ppqn: seq.ppqn,
            end_time: seq.end_time(),
            tracks: seq.tracks.iter().map(TrackReport::new).collect(),
        }
    }
}

impl TrackReport {
    fn new(track: &Track) -> Self {
        let channels: BTreeSet<u8> = track.messages().filter_map(Message::channel).collect();
        Self {
            events: track.len(),
            channels: channels.into_iter().collect(),
            tempo_changes: track
                .messages()
                .filter(|m| matches!(m, Message::Tempo(_)))
                .count(),
            has_volume: track
                .messages()
                .any(|m| m.controller() == Some(hmi_core::controller::CHANNEL_VOLUME)),
            end_time: track.end_time(),
        }
    }
}

impl fmt::Display for SequenceReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} {:?}, {} PPQN, {} ticks, {} tracks",
            self.source,
            self.format,
            self.ppqn,
            self.end_time,
            self.tracks.len()
        )?;
        for (i, track) in self.tracks.iter().enumerate() {
            write!(f, "  track {i:>2}: {:>5} events", track.events)?;
            if !track.channels.is_empty() {
                write!(f, ", channels {:?}", track.channels)?;
            }
            if track.tempo_changes > 0 {
                write!(f, ", {} tempo changes", track.tempo_changes)?;
            }
            if !track.channels.is_empty() && !track.has_volume {
                write!(f, ", no volume")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Decode whatever `location` holds and summarize it
pub fn inspect(location: &Location) -> Result<SequenceReport, ConvertError> {
    let bytes = location.read()?;
    let decode_error = |source: DecodeError| ConvertError::Decode {
        path: location.path(),
        source,
    };
    let format = sniff(&bytes).ok_or_else(|| {
        decode_error(DecodeError::BadSignature {
            expected: "MIDI or HMP",
        })
    })?;
    let seq = decode(&bytes, format).map_err(decode_error)?;
    Ok(SequenceReport::new(format, &seq))
}
