// Property and scenario tests for the conversion passes

#[cfg(test)]
mod tests {
    use crate::model::{controller, Format, Message, Sequence, TimedEvent, Track};
    use crate::remap::{FmBank, ProgramMap};
    use crate::transform::*;
    use proptest::prelude::*;

    fn arb_channel_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            (0u8..16, 0u8..128, 1u8..128).prop_map(|(channel, key, velocity)| {
                Message::NoteOn {
                    channel,
                    key,
                    velocity,
                }
            }),
            (0u8..16, 0u8..128).prop_map(|(channel, key)| Message::NoteOff {
                channel,
                key,
                velocity: 0
            }),
            (0u8..16, 0u8..128).prop_map(|(channel, program)| Message::ProgramChange {
                channel,
                program
            }),
            (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, controller, value)| {
                Message::Controller {
                    channel,
                    controller,
                    value,
                }
            }),
            (0u8..16, 0u16..16384).prop_map(|(channel, value)| Message::PitchBend {
                channel,
                value
            }),
        ]
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            4 => arb_channel_message(),
            1 => (200_000u32..2_000_000).prop_map(Message::Tempo),
            1 => prop::collection::vec(any::<u8>(), 0..8)
                .prop_map(|data| Message::Meta { kind: 0x01, data }),
            1 => prop::collection::vec(0u8..128, 0..8).prop_map(Message::SysEx),
        ]
    }

    fn arb_track() -> impl Strategy<Value = Track> {
        prop::collection::vec((0u64..20_000, arb_message()), 0..40).prop_map(|events| {
            Track::from_events(
                events
                    .into_iter()
                    .map(|(time, message)| TimedEvent { time, message })
                    .collect(),
            )
        })
    }

    fn arb_sequence() -> impl Strategy<Value = Sequence> {
        (
            prop::sample::select(vec![Format::SingleTrack, Format::Parallel, Format::Hmi]),
            1u16..1000,
            prop::collection::vec(arb_track(), 1..5),
        )
            .prop_map(|(format, ppqn, tracks)| Sequence::new(format, ppqn, tracks))
    }

    fn times(seq: &Sequence) -> Vec<Vec<u64>> {
        seq.tracks
            .iter()
            .map(|t| t.events().iter().map(|e| e.time).collect())
            .collect()
    }

    fn volume_events(track: &Track) -> Vec<&TimedEvent> {
        track
            .events()
            .iter()
            .filter(|e| e.message.controller() == Some(controller::CHANNEL_VOLUME))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_tempo_normalization_preserves_duration(seq in arb_sequence()) {
            let map = TempoMap::for_sequence(&seq);
            let mut normalized = seq.clone();
            normalize_tempo(&mut normalized);

            prop_assert_eq!(normalized.tempo_changes(), 0);

            // tick length at the nominal tempo, in microseconds
            let tick_micros = NOMINAL_TEMPO as f64 / seq.ppqn as f64;
            let mut original: Vec<Vec<f64>> = seq
                .tracks
                .iter()
                .map(|t| {
                    t.events()
                        .iter()
                        .filter(|e| !matches!(e.message, Message::Tempo(_)))
                        .map(|e| map.micros_at(e.time, seq.ppqn))
                        .collect()
                })
                .collect();
            for track in &mut original {
                track.sort_by(|a, b| a.partial_cmp(b).unwrap());
            }

            for (before, after) in original.iter().zip(normalized.tracks.iter()) {
                prop_assert_eq!(before.len(), after.len());
                for (micros, event) in before.iter().zip(after.events()) {
                    let now = event.time as f64 * tick_micros;
                    prop_assert!((now - micros).abs() <= tick_micros / 2.0 + 1e-3);
                }
            }
        }

        #[test]
        fn prop_rescale_same_ppqn_is_idempotent(seq in arb_sequence(), ppqn in 1u16..1000) {
            let mut once = seq.clone();
            rescale(&mut once, ppqn);
            let mut twice = once.clone();
            rescale(&mut twice, ppqn);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_rescale_composes_within_rounding(
            seq in arb_sequence(),
            b in 1u16..1000,
            c in 1u16..1000,
        ) {
            let mut two_step = seq.clone();
            rescale(&mut two_step, b);
            rescale(&mut two_step, c);
            let mut direct = seq.clone();
            rescale(&mut direct, c);

            let slack = 0.5 * c as f64 / b as f64 + 1.0;
            for (x, y) in times(&two_step).iter().flatten().zip(times(&direct).iter().flatten()) {
                prop_assert!((*x as f64 - *y as f64).abs() <= slack);
            }
        }

        #[test]
        fn prop_rescale_keeps_order(seq in arb_sequence(), ppqn in 1u16..1000) {
            let mut scaled = seq.clone();
            rescale(&mut scaled, ppqn);
            for track in times(&scaled) {
                prop_assert!(track.windows(2).all(|w| w[0] <= w[1]));
            }
        }

        #[test]
        fn prop_backfill_adds_one_volume(track in arb_track(), value in 0u8..128) {
            let had_volume = !volume_events(&track).is_empty();
            let has_channel = track.messages().any(|m| !m.is_extended());
            let mut filled = track.clone();
            let added = backfill_channel_volume(&mut filled, value);

            if had_volume || !has_channel {
                prop_assert!(!added);
                prop_assert_eq!(filled, track);
            } else {
                prop_assert!(added);
                let volumes = volume_events(&filled);
                prop_assert_eq!(volumes.len(), 1);
                prop_assert_eq!(volumes[0].time, 0);
                prop_assert_eq!(&filled.events()[0], volumes[0]);
                match volumes[0].message {
                    Message::Controller { value: v, .. } => prop_assert_eq!(v, value),
                    _ => unreachable!(),
                }
            }
        }

        #[test]
        fn prop_strip_leaves_only_supported(track in arb_track()) {
            let mut stripped = track.clone();
            strip_unsupported(&mut stripped);
            for message in stripped.messages() {
                prop_assert!(!message.is_extended());
                if let Some(c) = message.controller() {
                    prop_assert!(!UNSUPPORTED_CONTROLLERS.contains(&c));
                }
            }
        }

        #[test]
        fn prop_prepare_for_hmp_output_is_driver_safe(seq in arb_sequence()) {
            let mut out = seq.clone();
            prepare_for_hmp(&mut out);

            prop_assert_eq!(out.format, Format::Hmi);
            prop_assert_eq!(out.ppqn, HMP_PPQN);
            prop_assert_eq!(out.tempo_changes(), 0);
            for track in &out.tracks {
                prop_assert!(track
                    .messages()
                    .all(|m| !m.is_extended() || m.is_end_of_track()));
                if track.messages().any(|m| m.channel().is_some()) {
                    prop_assert!(!volume_events(track).is_empty());
                }
            }
        }

        #[test]
        fn prop_prepare_for_hmp_keeps_track_length(seq in arb_sequence()) {
            let mut expected = seq.clone();
            normalize_tempo(&mut expected);
            rescale(&mut expected, HMP_PPQN);

            let mut out = seq.clone();
            prepare_for_hmp(&mut out);
            for (before, after) in expected.tracks.iter().zip(&out.tracks) {
                prop_assert_eq!(after.end_time(), before.end_time());
            }
        }

        #[test]
        fn prop_identity_remap_changes_nothing(seq in arb_sequence()) {
            let mut out = seq.clone();
            prop_assert_eq!(remap_programs(&mut out, &ProgramMap::IDENTITY), 0);
            prop_assert_eq!(out, seq);
        }
    }

    #[test]
    fn test_bank_tables_drive_remap() {
        for bank in FmBank::ALL {
            assert_eq!(FmBank::from_number(bank.number()), Some(bank));

            let map = bank.program_map();
            let mut track = Track::new();
            for program in 0..128u8 {
                track.push(program as u64, Message::program_change(0, program));
            }
            let mut seq = Sequence::new(Format::Hmi, HMP_PPQN, vec![track]);
            remap_programs(&mut seq, map);

            let programs: Vec<u8> = seq.tracks[0]
                .messages()
                .map(|m| match m {
                    Message::ProgramChange { program, .. } => *program,
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            let expected: Vec<u8> = (0..128u8).map(|p| map.map(p)).collect();
            assert_eq!(programs, expected, "{bank}");
        }

        let files: std::collections::HashSet<_> =
            FmBank::ALL.iter().map(FmBank::bank_files).collect();
        assert_eq!(files.len(), FmBank::ALL.len());
        for i in 0..=255u8 {
            assert_eq!(ProgramMap::IDENTITY.map(i), i);
        }
    }

    #[test]
    fn test_trailing_silence_survives_hmp_preparation() {
        let mut track = Track::new();
        track.push(0, Message::note_on(0, 60, 100));
        track.push(96, Message::note_off(0, 60, 0));
        track.push(960, Message::end_of_track());
        let mut seq = Sequence::new(Format::Parallel, 96, vec![track]);

        prepare_for_hmp(&mut seq);

        let last = seq.tracks[0].events().last().unwrap();
        assert_eq!(last.time, 600);
        assert!(last.message.is_end_of_track());
        assert_eq!(seq.end_time(), 600);
    }

    #[test]
    fn test_two_segment_tempo_to_hmp() {
        // 120 BPM until tick 480, then 90 BPM, at 96 PPQN
        let mut conductor = Track::new();
        conductor.push(0, Message::Tempo(500_000));
        conductor.push(480, Message::Tempo(666_667));

        let mut music = Track::new();
        music.push(0, Message::program_change(0, 10));
        music.push(480, Message::note_on(0, 60, 100));
        music.push(720, Message::note_off(0, 60, 0));
        music.push(960, Message::note_on(0, 62, 100));

        let mut seq = Sequence::new(Format::Parallel, 96, vec![conductor, music]);
        prepare_for_hmp(&mut seq);

        assert_eq!(seq.tempo_changes(), 0);
        assert_eq!(seq.ppqn, 60);
        // conductor only had tempo events
        assert!(seq.tracks[0].is_empty());

        let times: Vec<u64> = seq.tracks[1]
            .events()
            .iter()
            .filter(|e| e.message.controller().is_none())
            .map(|e| e.time)
            .collect();
        // 480 ticks at 120 BPM, then 90 BPM stretches by 4/3:
        // 720 -> 480 + 320 = 800 nominal, 960 -> 1120 nominal; then * 60 / 96
        assert_eq!(times, vec![0, 300, 500, 700]);
    }

    #[test]
    fn test_untagged_track_gets_full_volume_on_its_channel() {
        let mut track = Track::new();
        track.push(
            0,
            Message::Meta {
                kind: 0x03,
                data: b"Bass".to_vec(),
            },
        );
        track.push(12, Message::note_on(3, 40, 110));
        track.push(24, Message::note_off(3, 40, 0));

        let mut seq = Sequence::new(Format::Parallel, 96, vec![track]);
        prepare_for_hmp(&mut seq);

        let first = &seq.tracks[0].events()[0];
        assert_eq!(first.time, 0);
        assert_eq!(
            first.message,
            Message::Controller {
                channel: 3,
                controller: controller::CHANNEL_VOLUME,
                value: 127
            }
        );
        assert_eq!(seq.tracks[0].len(), 3);
    }

    #[test]
    fn test_hmp_to_midi_round_resolution() {
        let mut track = Track::new();
        track.push(0, Message::control_change(1, 7, 90));
        track.push(61, Message::note_on(1, 50, 64));
        let mut seq = Sequence::new(Format::Hmi, 60, vec![track]);

        prepare_for_midi(&mut seq, true);

        assert_eq!(seq.ppqn, MIDI_PPQN);
        assert_eq!(seq.tracks[0].events()[1].time, 488);
        // already had a volume, faithful mode leaves it
        assert_eq!(seq.tracks[0].len(), 2);
    }
}
