use midly::num::u7;
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;

use crate::error::Result;

use super::note_event_times::NoteEventTime;

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    kind: TrackEventKind<'a>,
}

fn is_note_off(kind: &TrackEventKind) -> bool {
    matches!(kind, TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. })
}

pub fn generate_ordered_midi_events(note_events: &[NoteEventTime], ticks_per_second: f32) -> Vec<TrackEvent<'static>> {
    let mut track_events_absolute: Vec<TrackEventAbsolute> = vec![];
    for note_event in note_events {
        let key = u7::new(note_event.pitch_midi.min(127));
        let vel = u7::new(note_event.velocity.min(127));

        // NoteOn event
        let start_tick = (note_event.start_time_seconds * ticks_per_second).round() as u32;
        track_events_absolute.push(TrackEventAbsolute {
            tick: start_tick,
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn { key, vel },
            },
        });

        // NoteOff event, at least one tick after the NoteOn
        let end_tick = ((note_event.duration_seconds * ticks_per_second).round() as u32).max(1) + start_tick;
        track_events_absolute.push(TrackEventAbsolute {
            tick: end_tick,
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff { key, vel: u7::new(0) },
            },
        });
    }

    // NoteOffs first so a repeated pitch is released before it is struck again
    track_events_absolute.sort_by_key(|e| (e.tick, !is_note_off(&e.kind)));

    let mut track_events = vec![];
    let mut previous_tick = 0;
    for track_event_absolute in track_events_absolute {
        track_events.push(TrackEvent {
            delta: (track_event_absolute.tick - previous_tick).into(),
            kind: track_event_absolute.kind,
        });
        previous_tick = track_event_absolute.tick;
    }

    track_events
}

/// Generate MIDI file data from note events.
///
/// # Arguments
///
/// * `notes` - List of time-based note events.
/// * `ticks_per_beat` - Metrical timing resolution.
/// * `beats_per_minute` - Tempo written to the track.
///
/// # Returns
///
/// * A vector of bytes representing the MIDI file.
pub fn generate_midi_file_data(notes: &[NoteEventTime], ticks_per_beat: u16, beats_per_minute: u32) -> Result<Vec<u8>> {
    let timing = Timing::Metrical(ticks_per_beat.into());
    let ticks_per_second = (ticks_per_beat as f32) * (beats_per_minute as f32) / 60.0;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing,
    });
    let mut track = Track::new();

    // Set tempo to match the BPM
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo((60_000_000 / beats_per_minute).into())),
    });

    track.extend(generate_ordered_midi_events(notes, ticks_per_second));

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(start: f32, duration: f32, pitch: u8, velocity: u8) -> NoteEventTime {
        NoteEventTime {
            start_time_seconds: start,
            duration_seconds: duration,
            pitch_midi: pitch,
            velocity,
        }
    }

    #[test]
    fn test_events_are_delta_encoded_in_order() {
        // 960 ticks per second
        let events = generate_ordered_midi_events(&[note(1.0, 0.5, 60, 100), note(0.0, 0.25, 64, 90)], 960.0);
        let deltas: Vec<u32> = events.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 240, 720, 480]);
    }

    #[test]
    fn test_note_off_precedes_note_on_at_same_tick() {
        let events = generate_ordered_midi_events(&[note(0.0, 1.0, 60, 100), note(1.0, 1.0, 60, 100)], 10.0);
        assert!(is_note_off(&events[1].kind));
        assert_eq!(events[2].delta.as_int(), 0);
        assert!(!is_note_off(&events[2].kind));
    }

    #[test]
    fn test_file_parses_back() {
        let data = generate_midi_file_data(&[note(0.0, 0.5, 60, 100)], 480, 120).unwrap();
        let smf = Smf::parse(&data).unwrap();
        assert_eq!(smf.tracks.len(), 1);
        // tempo, note on, note off, end of track
        assert_eq!(smf.tracks[0].len(), 4);
    }
}
