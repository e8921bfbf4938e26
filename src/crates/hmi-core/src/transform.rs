//! Normalization passes applied between decoding and encoding
//!
//! None of these can fail: they assume a structurally valid sequence, which is
//! what the decoders hand out.

use tracing::debug;

use crate::model::{controller, Format, Message, Sequence, Track};
use crate::remap::ProgramMap;
use crate::ticks::{rescale_tick, scale_rounded};

/// Resolution every HMP/HMQ file is written at
pub const HMP_PPQN: u16 = 60;

/// Resolution used for MIDI files converted from HMP
pub const MIDI_PPQN: u16 = 480;

/// 120 BPM, in microseconds per quarter note. At [`HMP_PPQN`] this is the
/// 120 ticks per second the HMI driver runs at.
pub const NOMINAL_TEMPO: u32 = 500_000;

/// Channel mode messages the HMI driver does not handle
pub const UNSUPPORTED_CONTROLLERS: [u8; 6] = [
    controller::RESET_ALL_CONTROLLERS,
    controller::LOCAL_CONTROL,
    controller::OMNI_MODE_OFF,
    controller::OMNI_MODE_ON,
    controller::MONO_MODE_ON,
    controller::POLY_MODE_ON,
];

/// Volume given to tracks without one when building an HMP
pub const HMP_DEFAULT_VOLUME: u8 = 127;

/// Volume the original DOS driver effectively gives tracks without one
pub const FAITHFUL_DEFAULT_VOLUME: u8 = 0;

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: u64,
    tempo: u32,
    /// Sum of ticks * tempo for everything before `start`
    elapsed: u128,
}

/// Piecewise-constant tempo over ticks
///
/// Elapsed time is kept in tick-microseconds-per-quarter units, which divided
/// by the PPQN gives microseconds. Working in these units keeps the math exact.
#[derive(Debug, Clone)]
pub struct TempoMap {
    segments: Vec<Segment>,
}

impl TempoMap {
    /// Build a map from `(tick, tempo)` changes. Changes do not need to be
    /// sorted; of several changes on one tick the last one given wins.
    pub fn new<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = (u64, u32)>,
    {
        let mut changes: Vec<(u64, u32)> = changes.into_iter().collect();
        changes.sort_by_key(|&(tick, _)| tick);

        let mut segments = Vec::with_capacity(changes.len() + 1);
        let mut current = Segment {
            start: 0,
            tempo: NOMINAL_TEMPO,
            elapsed: 0,
        };

        for (tick, tempo) in changes {
            if tick == current.start {
                current.tempo = tempo;
                continue;
            }
            let elapsed =
                current.elapsed + (tick - current.start) as u128 * current.tempo as u128;
            segments.push(current);
            current = Segment {
                start: tick,
                tempo,
                elapsed,
            };
        }
        segments.push(current);

        TempoMap { segments }
    }

    /// Tempo changes found in one track
    pub fn for_track(track: &Track) -> Self {
        Self::new(tempo_changes(track))
    }

    /// Tempo changes found in every track of the sequence
    pub fn for_sequence(seq: &Sequence) -> Self {
        Self::new(seq.tracks.iter().flat_map(tempo_changes))
    }

    fn elapsed(&self, tick: u64) -> u128 {
        let idx = self.segments.partition_point(|s| s.start <= tick) - 1;
        let seg = &self.segments[idx];
        seg.elapsed + (tick - seg.start) as u128 * seg.tempo as u128
    }

    /// Tick at which `tick` falls when the whole sequence runs at [`NOMINAL_TEMPO`]
    pub fn to_nominal(&self, tick: u64) -> u64 {
        scale_rounded(self.elapsed(tick), 1, NOMINAL_TEMPO as u128)
    }

    /// Wall-clock microseconds from the start to `tick`
    pub fn micros_at(&self, tick: u64, ppqn: u16) -> f64 {
        self.elapsed(tick) as f64 / ppqn as f64
    }

    pub fn is_constant_nominal(&self) -> bool {
        self.segments.iter().all(|s| s.tempo == NOMINAL_TEMPO)
    }
}

fn tempo_changes(track: &Track) -> impl Iterator<Item = (u64, u32)> + '_ {
    track.events().iter().filter_map(|e| match e.message {
        Message::Tempo(tempo) => Some((e.time, tempo)),
        _ => None,
    })
}

/// Bake every tempo change into event timing and drop the tempo events.
///
/// After this the sequence plays the same at [`NOMINAL_TEMPO`] as it did
/// with its own tempo changes. Tempo is global unless the format says tracks
/// are independent.
pub fn normalize_tempo(seq: &mut Sequence) {
    let per_track = seq.format.has_track_tempo();
    apply_tempo(seq, per_track);
}

fn apply_tempo(seq: &mut Sequence, per_track: bool) {
    let removed = seq.tempo_changes();
    let global = if per_track {
        None
    } else {
        Some(TempoMap::for_sequence(seq))
    };

    for track in &mut seq.tracks {
        let map = match &global {
            Some(map) => map.clone(),
            None => TempoMap::for_track(track),
        };
        if !map.is_constant_nominal() {
            track.map_times(|t| map.to_nominal(t));
        }
        track.retain(|m| !matches!(m, Message::Tempo(_)));
    }

    debug!(removed, per_track, "normalized tempo");
}

/// Change the PPQN, moving every event proportionally
pub fn rescale(seq: &mut Sequence, ppqn: u16) {
    assert!(ppqn > 0, "PPQN must be positive");
    let from = seq.ppqn;
    if from == ppqn {
        return;
    }
    for track in &mut seq.tracks {
        track.map_times(|t| rescale_tick(t, from, ppqn));
    }
    seq.ppqn = ppqn;
    debug!(from, to = ppqn, "rescaled resolution");
}

/// Give a track without any channel volume message one at tick 0.
///
/// The channel is taken from the first channel message in the track; a track
/// with no channel messages is left alone. Returns whether an event was added.
pub fn backfill_channel_volume(track: &mut Track, value: u8) -> bool {
    if track
        .messages()
        .any(|m| m.controller() == Some(controller::CHANNEL_VOLUME))
    {
        return false;
    }

    let Some(channel) = track
        .messages()
        .find(|m| !m.is_extended())
        .and_then(Message::channel)
    else {
        return false;
    };

    track.insert_first(
        0,
        Message::Controller {
            channel,
            controller: controller::CHANNEL_VOLUME,
            value,
        },
    );
    true
}

/// Drop meta/SysEx events and the channel mode messages the driver can't take.
/// Returns how many events were removed.
pub fn strip_unsupported(track: &mut Track) -> usize {
    track.retain(|m| {
        !m.is_extended()
            && !m
                .controller()
                .is_some_and(|c| UNSUPPORTED_CONTROLLERS.contains(&c))
    })
}

/// Put an end-of-track marker back at `end` when stripping moved the track end
/// earlier, so trailing silence is kept.
fn keep_end(track: &mut Track, end: u64) {
    if end > track.end_time() {
        track.push(end, Message::end_of_track());
    }
}

/// Rewrite every program change through `map`. Returns how many were changed.
pub fn remap_programs(seq: &mut Sequence, map: &ProgramMap) -> usize {
    let mut changed = 0;
    for track in &mut seq.tracks {
        track.map_messages(|m| {
            if let Message::ProgramChange { program, .. } = m {
                let mapped = map.map(*program);
                if mapped != *program {
                    *program = mapped;
                    changed += 1;
                }
            }
        });
    }
    debug!(changed, "remapped programs");
    changed
}

/// Turn a decoded MIDI sequence into one the HMI driver plays correctly.
///
/// Steps, in order: mark as HMI, bake tempo changes, move to 60 PPQN, give
/// every track a channel volume, strip unsupported events. The only extended
/// event left afterwards is an end-of-track marker holding trailing silence.
/// Program remapping for HMQ output is a separate step ([`remap_programs`]).
pub fn prepare_for_hmp(seq: &mut Sequence) {
    let per_track = seq.format.has_track_tempo();
    seq.format = Format::Hmi;
    apply_tempo(seq, per_track);
    rescale(seq, HMP_PPQN);

    let mut backfilled = 0;
    let mut stripped = 0;
    for track in &mut seq.tracks {
        if backfill_channel_volume(track, HMP_DEFAULT_VOLUME) {
            backfilled += 1;
        }
    }
    for track in &mut seq.tracks {
        let end = track.end_time();
        stripped += strip_unsupported(track);
        keep_end(track, end);
    }
    debug!(backfilled, stripped, "prepared sequence for HMP");
}

/// Turn a decoded HMP sequence into a standard type 1 MIDI sequence.
///
/// With `faithful`, tracks lacking a channel volume get volume 0 the way the
/// original driver would have played them.
pub fn prepare_for_midi(seq: &mut Sequence, faithful: bool) {
    seq.format = Format::Parallel;
    seq.ppqn = HMP_PPQN;
    rescale(seq, MIDI_PPQN);

    if faithful {
        let mut backfilled = 0;
        for track in &mut seq.tracks {
            if backfill_channel_volume(track, FAITHFUL_DEFAULT_VOLUME) {
                backfilled += 1;
            }
        }
        debug!(backfilled, "muted tracks without channel volume");
    }
}
