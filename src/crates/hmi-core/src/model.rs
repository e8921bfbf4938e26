use serde::{Deserialize, Serialize};

/// Well-known controller numbers
pub mod controller {
    pub const CHANNEL_VOLUME: u8 = 7;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const LOCAL_CONTROL: u8 = 122;
    pub const OMNI_MODE_OFF: u8 = 124;
    pub const OMNI_MODE_ON: u8 = 125;
    /// Mono mode on, a.k.a. poly mode off
    pub const MONO_MODE_ON: u8 = 126;
    pub const POLY_MODE_ON: u8 = 127;
}

/// Meta event type of the end-of-track marker
pub const END_OF_TRACK: u8 = 0x2F;

/// Declared layout of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Type 0: one track carrying every channel
    SingleTrack,
    /// Type 1: simultaneous tracks sharing one tempo map
    Parallel,
    /// Type 2: independent tracks, each with its own tempo map
    Sequential,
    /// The HMI multi-track layout used by HMP/HMQ files
    Hmi,
}

impl Format {
    /// True when tempo changes apply per track instead of to the whole sequence
    pub fn has_track_tempo(&self) -> bool {
        matches!(self, Format::Sequential)
    }
}

/// A single decoded message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    NoteOff { channel: u8, key: u8, velocity: u8 },
    NoteOn { channel: u8, key: u8, velocity: u8 },
    PolyPressure { channel: u8, key: u8, pressure: u8 },
    Controller {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit bend, 8192 is centered
    PitchBend { channel: u8, value: u16 },
    /// Set tempo, in microseconds per quarter note
    Tempo(u32),
    /// Any other meta event, kept opaque
    Meta { kind: u8, data: Vec<u8> },
    /// System exclusive payload without the leading 0xF0
    SysEx(Vec<u8>),
}

impl Message {
    /// Meta events (tempo included) and system exclusive messages
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Message::Tempo(_) | Message::Meta { .. } | Message::SysEx(_)
        )
    }

    /// The channel of a channel voice/mode message
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Message::NoteOff { channel, .. }
            | Message::NoteOn { channel, .. }
            | Message::PolyPressure { channel, .. }
            | Message::Controller { channel, .. }
            | Message::ProgramChange { channel, .. }
            | Message::ChannelPressure { channel, .. }
            | Message::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Message::NoteOn {
            channel,
            key,
            velocity,
        }
    }

    pub fn note_off(channel: u8, key: u8, velocity: u8) -> Self {
        Message::NoteOff {
            channel,
            key,
            velocity,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Message::Controller {
            channel,
            controller,
            value,
        }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Message::ProgramChange { channel, program }
    }

    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        Message::PitchBend { channel, value }
    }

    pub fn end_of_track() -> Self {
        Message::Meta {
            kind: END_OF_TRACK,
            data: Vec::new(),
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(self, Message::Meta { kind, .. } if *kind == END_OF_TRACK)
    }

    /// Controller number when this is a control change
    pub fn controller(&self) -> Option<u8> {
        match *self {
            Message::Controller { controller, .. } => Some(controller),
            _ => None,
        }
    }
}

/// A message placed at an absolute tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub time: u64,
    pub message: Message,
}

/// Events of one track, ordered by absolute tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    events: Vec<TimedEvent>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track from events, sorting them stably by time
    pub fn from_events(mut events: Vec<TimedEvent>) -> Self {
        events.sort_by_key(|e| e.time);
        Track { events }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append after every event at or before `time`
    pub fn push(&mut self, time: u64, message: Message) {
        let idx = self.events.partition_point(|e| e.time <= time);
        self.events.insert(idx, TimedEvent { time, message });
    }

    /// Insert before every event already at `time`
    pub fn insert_first(&mut self, time: u64, message: Message) {
        let idx = self.events.partition_point(|e| e.time < time);
        self.events.insert(idx, TimedEvent { time, message });
    }

    /// Keep only the events matching `keep`; returns how many were dropped
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.events.len();
        self.events.retain(|e| keep(&e.message));
        before - self.events.len()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.events.iter().map(|e| &e.message)
    }

    /// Rewrite every event time; order is re-established afterwards
    pub fn map_times<F>(&mut self, mut f: F)
    where
        F: FnMut(u64) -> u64,
    {
        for event in &mut self.events {
            event.time = f(event.time);
        }
        self.events.sort_by_key(|e| e.time);
    }

    pub fn map_messages<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Message),
    {
        for event in &mut self.events {
            f(&mut event.message);
        }
    }

    /// Time of the last event, 0 for an empty track
    pub fn end_time(&self) -> u64 {
        self.events.last().map_or(0, |e| e.time)
    }

    /// Pairs of (delta, message) as they would be written to a file
    pub fn deltas(&self) -> impl Iterator<Item = (u64, &Message)> {
        let mut last = 0;
        self.events.iter().map(move |e| {
            let delta = e.time - last;
            last = e.time;
            (delta, &e.message)
        })
    }
}

/// A decoded sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub format: Format,
    /// Pulses per quarter note, never zero
    pub ppqn: u16,
    pub tracks: Vec<Track>,
}

impl Sequence {
    pub fn new(format: Format, ppqn: u16, tracks: Vec<Track>) -> Self {
        assert!(ppqn > 0, "PPQN must be positive");
        Sequence {
            format,
            ppqn,
            tracks,
        }
    }

    /// Tick of the last event across all tracks
    pub fn end_time(&self) -> u64 {
        self.tracks.iter().map(Track::end_time).max().unwrap_or(0)
    }

    /// Number of tempo change events in the sequence
    pub fn tempo_changes(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(Track::messages)
            .filter(|m| matches!(m, Message::Tempo(_)))
            .count()
    }
}
