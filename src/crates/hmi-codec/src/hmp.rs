//! HMI "HMIMIDIP" sequences (.HMP, and .HMQ which only differs in extension)
//!
//! Layout:
//!
//! | Offset  | Contents                                         |
//! |---------|--------------------------------------------------|
//! | `0x000` | `HMIMIDIP`, zero padded to `0x20`                |
//! | `0x020` | file length (u32 LE)                             |
//! | `0x030` | track count                                      |
//! | `0x038` | ticks per second (120 at 60 PPQN)                |
//! | `0x03C` | song length in seconds                           |
//! | `0x308` | track chunks                                     |
//!
//! Each chunk is `index, length (header included), reserved` as u32 LE,
//! followed by events. Delta times use the HMI variable-length number, while
//! meta and SysEx lengths use the standard MIDI one.

use tracing::debug;

use hmi_core::model::END_OF_TRACK;
use hmi_core::{Format, Message, Sequence, TimedEvent, Track, HMP_PPQN};

use crate::error::{DecodeError, Result};
use crate::vlq;

pub const SIGNATURE: &[u8] = b"HMIMIDIP";
/// The later revision with a different header, not used by Descent
const REVISED_SIGNATURE: &[u8] = b"HMIMIDIP013195";

pub const HEADER_LEN: usize = 0x308;
const FILE_LENGTH_OFFSET: usize = 0x20;
const TRACK_COUNT_OFFSET: usize = 0x30;
const TICKS_PER_SECOND_OFFSET: usize = 0x38;
const SONG_SECONDS_OFFSET: usize = 0x3C;
const CHUNK_HEADER_LEN: usize = 12;

const META: u8 = 0xFF;
const SYSEX: u8 = 0xF0;
const META_TEMPO: u8 = 0x51;

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(DecodeError::truncated(offset))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn take(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or(DecodeError::truncated(data.len()))
}

/// Decode an HMP/HMQ file. The result is always format `Hmi` at 60 PPQN.
pub fn decode_hmp(bytes: &[u8]) -> Result<Sequence> {
    if !bytes.starts_with(SIGNATURE) {
        return Err(DecodeError::BadSignature { expected: "HMP" });
    }
    if bytes.starts_with(REVISED_SIGNATURE) {
        return Err(DecodeError::UnsupportedVariant(
            String::from_utf8_lossy(REVISED_SIGNATURE).into_owned(),
        ));
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::truncated(bytes.len()));
    }

    let track_count = read_u32(bytes, TRACK_COUNT_OFFSET)? as usize;
    let mut tracks = Vec::with_capacity(track_count.min(32));
    let mut pos = HEADER_LEN;

    for _ in 0..track_count {
        let chunk_len = read_u32(bytes, pos + 4)? as usize;
        let end = pos
            .checked_add(chunk_len)
            .filter(|&end| chunk_len >= CHUNK_HEADER_LEN && end <= bytes.len())
            .ok_or(DecodeError::truncated(pos))?;
        tracks.push(read_track(&bytes[..end], pos + CHUNK_HEADER_LEN)?);
        pos = end;
    }

    debug!(tracks = tracks.len(), "decoded HMP");
    Ok(Sequence::new(Format::Hmi, HMP_PPQN, tracks))
}

fn read_track(data: &[u8], mut pos: usize) -> Result<Track> {
    let mut events = Vec::new();
    let mut time = 0u64;
    let mut running: Option<u8> = None;

    while pos < data.len() {
        let (delta, next) = vlq::read_hmi(data, pos)?;
        pos = next;
        time += delta as u64;

        let mut status = *data.get(pos).ok_or(DecodeError::truncated(pos))?;
        if status < 0x80 {
            status = running.ok_or(DecodeError::InvalidStatus {
                status,
                offset: pos,
            })?;
        } else {
            pos += 1;
        }

        let message = match status {
            META => {
                let kind = *data.get(pos).ok_or(DecodeError::truncated(pos))?;
                let (len, next) = vlq::read_midi(data, pos + 1)?;
                let payload = take(data, next, len as usize)?;
                pos = next + payload.len();
                meta_message(kind, payload)
            }
            SYSEX => {
                let (len, next) = vlq::read_midi(data, pos)?;
                let payload = take(data, next, len as usize)?;
                pos = next + payload.len();
                Message::SysEx(payload.to_vec())
            }
            0x80..=0xEF => {
                running = Some(status);
                let (message, next) = channel_message(data, pos, status)?;
                pos = next;
                message
            }
            _ => {
                return Err(DecodeError::InvalidStatus {
                    status,
                    offset: pos - 1,
                })
            }
        };

        let end_of_track = message.is_end_of_track();
        events.push(TimedEvent { time, message });
        if end_of_track {
            break;
        }
    }

    Ok(Track::from_events(events))
}

fn meta_message(kind: u8, payload: &[u8]) -> Message {
    match (kind, payload) {
        (META_TEMPO, &[a, b, c]) => Message::Tempo(u32::from_be_bytes([0, a, b, c])),
        _ => Message::Meta {
            kind,
            data: payload.to_vec(),
        },
    }
}

fn channel_message(data: &[u8], pos: usize, status: u8) -> Result<(Message, usize)> {
    let channel = status & 0x0F;
    let byte = |i: usize| {
        data.get(pos + i)
            .map(|b| b & 0x7F)
            .ok_or(DecodeError::truncated(pos + i))
    };

    let parsed = match status & 0xF0 {
        0x80 => (
            Message::NoteOff {
                channel,
                key: byte(0)?,
                velocity: byte(1)?,
            },
            2,
        ),
        0x90 => (
            Message::NoteOn {
                channel,
                key: byte(0)?,
                velocity: byte(1)?,
            },
            2,
        ),
        0xA0 => (
            Message::PolyPressure {
                channel,
                key: byte(0)?,
                pressure: byte(1)?,
            },
            2,
        ),
        0xB0 => (
            Message::Controller {
                channel,
                controller: byte(0)?,
                value: byte(1)?,
            },
            2,
        ),
        0xC0 => (
            Message::ProgramChange {
                channel,
                program: byte(0)?,
            },
            1,
        ),
        0xD0 => (
            Message::ChannelPressure {
                channel,
                pressure: byte(0)?,
            },
            1,
        ),
        _ => (
            Message::PitchBend {
                channel,
                value: byte(0)? as u16 | (byte(1)? as u16) << 7,
            },
            2,
        ),
    };

    Ok((parsed.0, pos + parsed.1))
}

/// Encode a sequence as an HMP/HMQ file.
///
/// Times are written as they are; run the sequence through
/// [`hmi_core::prepare_for_hmp`] first to get something the driver can play.
pub fn encode_hmp(seq: &Sequence) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN];
    out[..SIGNATURE.len()].copy_from_slice(SIGNATURE);

    for (index, track) in seq.tracks.iter().enumerate() {
        let body = write_track(track);
        out.extend_from_slice(&(index as u32).to_le_bytes());
        out.extend_from_slice(&((CHUNK_HEADER_LEN + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&body);
    }

    // a quarter note lasts half a second at the nominal tempo
    let ticks_per_second = u32::from(seq.ppqn) * 2;
    let song_seconds = seq.end_time().div_ceil(ticks_per_second as u64);

    let file_len = out.len() as u32;
    put_u32(&mut out, FILE_LENGTH_OFFSET, file_len);
    put_u32(&mut out, TRACK_COUNT_OFFSET, seq.tracks.len() as u32);
    put_u32(&mut out, TICKS_PER_SECOND_OFFSET, ticks_per_second);
    put_u32(
        &mut out,
        SONG_SECONDS_OFFSET,
        u32::try_from(song_seconds).unwrap_or(u32::MAX),
    );

    debug!(tracks = seq.tracks.len(), bytes = out.len(), "encoded HMP");
    out
}

fn write_track(track: &Track) -> Vec<u8> {
    let mut body = Vec::new();
    let mut last = 0u64;

    for event in track.events() {
        if event.message.is_end_of_track() {
            continue;
        }
        vlq::write_hmi(&mut body, clamp_delta(event.time - last));
        last = event.time;
        write_message(&mut body, &event.message);
    }

    vlq::write_hmi(&mut body, clamp_delta(track.end_time() - last));
    body.extend_from_slice(&[META, END_OF_TRACK, 0x00]);
    body
}

fn clamp_delta(delta: u64) -> u32 {
    u32::try_from(delta).unwrap_or(u32::MAX)
}

fn write_message(out: &mut Vec<u8>, message: &Message) {
    match message {
        Message::NoteOff {
            channel,
            key,
            velocity,
        } => out.extend_from_slice(&[0x80 | channel & 0x0F, key & 0x7F, velocity & 0x7F]),
        Message::NoteOn {
            channel,
            key,
            velocity,
        } => out.extend_from_slice(&[0x90 | channel & 0x0F, key & 0x7F, velocity & 0x7F]),
        Message::PolyPressure {
            channel,
            key,
            pressure,
        } => out.extend_from_slice(&[0xA0 | channel & 0x0F, key & 0x7F, pressure & 0x7F]),
        Message::Controller {
            channel,
            controller,
            value,
        } => out.extend_from_slice(&[0xB0 | channel & 0x0F, controller & 0x7F, value & 0x7F]),
        Message::ProgramChange { channel, program } => {
            out.extend_from_slice(&[0xC0 | channel & 0x0F, program & 0x7F])
        }
        Message::ChannelPressure { channel, pressure } => {
            out.extend_from_slice(&[0xD0 | channel & 0x0F, pressure & 0x7F])
        }
        Message::PitchBend { channel, value } => out.extend_from_slice(&[
            0xE0 | channel & 0x0F,
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        ]),
        Message::Tempo(tempo) => {
            let [_, a, b, c] = tempo.to_be_bytes();
            out.extend_from_slice(&[META, META_TEMPO, 3, a, b, c]);
        }
        Message::Meta { kind, data } => {
            out.extend_from_slice(&[META, *kind]);
            vlq::write_midi(out, data.len() as u32);
            out.extend_from_slice(data);
        }
        Message::SysEx(data) => {
            out.push(SYSEX);
            vlq::write_midi(out, data.len() as u32);
            out.extend_from_slice(data);
        }
    }
}
