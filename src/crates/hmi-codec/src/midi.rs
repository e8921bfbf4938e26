use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{
    Fps, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
};
use tracing::debug;

use hmi_core::model::END_OF_TRACK;
use hmi_core::{Format, Message, Sequence, TimedEvent, Track};

use crate::error::{DecodeError, EncodeError, Result};

pub const SIGNATURE: &[u8] = b"MThd";

/// Decode a Standard MIDI File
pub fn decode_midi(bytes: &[u8]) -> Result<Sequence> {
    if !bytes.starts_with(SIGNATURE) {
        return Err(DecodeError::BadSignature { expected: "MIDI" });
    }

    let smf = Smf::parse(bytes)?;

    let ppqn = match smf.header.timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
        _ => return Err(DecodeError::UnsupportedTiming),
    };

    let format = match smf.header.format {
        midly::Format::SingleTrack => Format::SingleTrack,
        midly::Format::Parallel => Format::Parallel,
        midly::Format::Sequential => Format::Sequential,
    };

    let tracks: Vec<Track> = smf.tracks.iter().map(|t| read_track(t)).collect();

    debug!(?format, ppqn, tracks = tracks.len(), "decoded MIDI");
    Ok(Sequence::new(format, ppqn, tracks))
}

fn read_track(events: &[TrackEvent]) -> Track {
    let mut time = 0u64;
    let timed = events
        .iter()
        .map(|event| {
            time += event.delta.as_int() as u64;
            TimedEvent {
                time,
                message: message_from_kind(&event.kind),
            }
        })
        .collect();
    Track::from_events(timed)
}

fn message_from_kind(kind: &TrackEventKind) -> Message {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOff { key, vel } => Message::NoteOff {
                    channel,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOn { key, vel } => Message::NoteOn {
                    channel,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::Aftertouch { key, vel } => Message::PolyPressure {
                    channel,
                    key: key.as_int(),
                    pressure: vel.as_int(),
                },
                MidiMessage::Controller { controller, value } => Message::Controller {
                    channel,
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => Message::ProgramChange {
                    channel,
                    program: program.as_int(),
                },
                MidiMessage::ChannelAftertouch { vel } => Message::ChannelPressure {
                    channel,
                    pressure: vel.as_int(),
                },
                MidiMessage::PitchBend { bend } => Message::PitchBend {
                    channel,
                    value: bend.0.as_int(),
                },
            }
        }
        // escape packets carry raw bytes; keep them alongside SysEx
        TrackEventKind::SysEx(data) | TrackEventKind::Escape(data) => Message::SysEx(data.to_vec()),
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Message::Tempo(tempo.as_int()),
        TrackEventKind::Meta(meta) => {
            let (kind, data) = raw_meta(&meta);
            Message::Meta { kind, data }
        }
    }
}

/// The type byte and payload of a meta message as stored in the file
fn raw_meta(meta: &MetaMessage) -> (u8, Vec<u8>) {
    match *meta {
        MetaMessage::TrackNumber(None) => (0x00, Vec::new()),
        MetaMessage::TrackNumber(Some(n)) => (0x00, n.to_be_bytes().to_vec()),
        MetaMessage::Text(d) => (0x01, d.to_vec()),
        MetaMessage::Copyright(d) => (0x02, d.to_vec()),
        MetaMessage::TrackName(d) => (0x03, d.to_vec()),
        MetaMessage::InstrumentName(d) => (0x04, d.to_vec()),
        MetaMessage::Lyric(d) => (0x05, d.to_vec()),
        MetaMessage::Marker(d) => (0x06, d.to_vec()),
        MetaMessage::CuePoint(d) => (0x07, d.to_vec()),
        MetaMessage::ProgramName(d) => (0x08, d.to_vec()),
        MetaMessage::DeviceName(d) => (0x09, d.to_vec()),
        MetaMessage::MidiChannel(ch) => (0x20, vec![ch.as_int()]),
        MetaMessage::MidiPort(port) => (0x21, vec![port.as_int()]),
        MetaMessage::EndOfTrack => (END_OF_TRACK, Vec::new()),
        MetaMessage::Tempo(tempo) => (0x51, tempo.as_int().to_be_bytes()[1..].to_vec()),
        MetaMessage::SmpteOffset(smpte) => {
            let rate = match smpte.fps() {
                Fps::Fps24 => 0,
                Fps::Fps25 => 1,
                Fps::Fps29 => 2,
                Fps::Fps30 => 3,
            };
            (
                0x54,
                vec![
                    rate << 5 | smpte.hour(),
                    smpte.minute(),
                    smpte.second(),
                    smpte.frame(),
                    smpte.subframe(),
                ],
            )
        }
        MetaMessage::TimeSignature(num, den, clocks, notes) => {
            (0x58, vec![num, den, clocks, notes])
        }
        MetaMessage::KeySignature(sharps, minor) => (0x59, vec![sharps as u8, minor as u8]),
        MetaMessage::SequencerSpecific(d) => (0x7F, d.to_vec()),
        MetaMessage::Unknown(kind, d) => (kind, d.to_vec()),
    }
}

/// Encode a sequence as a Standard MIDI File.
///
/// `Hmi` sequences are written as type 1. Every track gets exactly one
/// end-of-track marker, at its last event.
pub fn encode_midi(seq: &Sequence) -> std::result::Result<Vec<u8>, EncodeError> {
    let format = match seq.format {
        Format::SingleTrack if seq.tracks.len() == 1 => midly::Format::SingleTrack,
        Format::Sequential => midly::Format::Sequential,
        _ => midly::Format::Parallel,
    };
    let header = Header::new(format, Timing::Metrical(u15::new(seq.ppqn.min(0x7FFF))));

    let tracks = seq.tracks.iter().map(write_track).collect();
    let smf = Smf { header, tracks };

    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    debug!(tracks = seq.tracks.len(), bytes = out.len(), "encoded MIDI");
    Ok(out)
}

fn write_track(track: &Track) -> Vec<TrackEvent<'_>> {
    let mut events = Vec::with_capacity(track.len() + 1);
    let mut last = 0u64;

    for event in track.events() {
        if event.message.is_end_of_track() {
            continue;
        }
        events.push(TrackEvent {
            delta: delta(event.time - last),
            kind: kind_from_message(&event.message),
        });
        last = event.time;
    }

    events.push(TrackEvent {
        delta: delta(track.end_time() - last),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}

fn delta(ticks: u64) -> u28 {
    u28::new(ticks.min(0x0FFF_FFFF) as u32)
}

fn kind_from_message(message: &Message) -> TrackEventKind<'_> {
    let midi = |channel: u8, message: MidiMessage| TrackEventKind::Midi {
        channel: u4::new(channel & 0x0F),
        message,
    };
    let d7 = |v: u8| u7::new(v & 0x7F);

    match message {
        Message::NoteOff {
            channel,
            key,
            velocity,
        } => midi(
            *channel,
            MidiMessage::NoteOff {
                key: d7(*key),
                vel: d7(*velocity),
            },
        ),
        Message::NoteOn {
            channel,
            key,
            velocity,
        } => midi(
            *channel,
            MidiMessage::NoteOn {
                key: d7(*key),
                vel: d7(*velocity),
            },
        ),
        Message::PolyPressure {
            channel,
            key,
            pressure,
        } => midi(
            *channel,
            MidiMessage::Aftertouch {
                key: d7(*key),
                vel: d7(*pressure),
            },
        ),
        Message::Controller {
            channel,
            controller,
            value,
        } => midi(
            *channel,
            MidiMessage::Controller {
                controller: d7(*controller),
                value: d7(*value),
            },
        ),
        Message::ProgramChange { channel, program } => midi(
            *channel,
            MidiMessage::ProgramChange {
                program: d7(*program),
            },
        ),
        Message::ChannelPressure { channel, pressure } => midi(
            *channel,
            MidiMessage::ChannelAftertouch {
                vel: d7(*pressure),
            },
        ),
        Message::PitchBend { channel, value } => midi(
            *channel,
            MidiMessage::PitchBend {
                bend: PitchBend(u14::new(value & 0x3FFF)),
            },
        ),
        Message::Tempo(tempo) => {
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo & 0x00FF_FFFF)))
        }
        Message::Meta { kind, data } => TrackEventKind::Meta(MetaMessage::Unknown(*kind, data)),
        Message::SysEx(data) => TrackEventKind::SysEx(data),
    }
}
