//! Placeholder content for live sessions. Nothing here is real data.

use chrono::Utc;
use rand::Rng;

use songjam_core::ids::ParticipantId;
use songjam_core::space::{InviteTarget, Participant, ParticipantRole, TranscriptLine};

const NAMES: &[(&str, &str)] = &[
    ("Ada", "ada_builds"),
    ("Kofi", "kofi_onchain"),
    ("Mei", "meiwaves"),
    ("Ravi", "ravi_eth"),
    ("Lena", "lenalistens"),
    ("Tomas", "tomas_dev"),
    ("Zuri", "zuri_sound"),
    ("Idris", "idris_jam"),
];

const LINES: &[&str] = &[
    "gm everyone, glad you could make it",
    "the liquidity pool just opened up",
    "who else is building on Base this week?",
    "drop your questions in the chat",
    "we should get a few more speakers up",
    "that point about creator fees is underrated",
    "let's keep this going after the hour",
];

const REASONS: &[&str] = &[
    "frequently engages with the host",
    "active in this topic",
    "mutual follows with three speakers",
    "recently joined a similar space",
];

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

pub fn participant<R: Rng>(rng: &mut R) -> Participant {
    let (name, handle) = *pick(rng, NAMES);
    let role = if rng.gen_bool(0.2) {
        ParticipantRole::Speaker
    } else {
        ParticipantRole::Listener
    };
    Participant {
        id: ParticipantId::new(),
        display_name: name.to_string(),
        handle: handle.to_string(),
        role,
        joined_at: Utc::now().to_rfc3339(),
    }
}

/// A line attributed to one of `speakers`, or the host when none are given.
pub fn transcript_line<R: Rng>(rng: &mut R, speakers: &[&str], host: &str) -> TranscriptLine {
    let speaker = if speakers.is_empty() {
        host.to_string()
    } else {
        pick(rng, speakers).to_string()
    };
    TranscriptLine {
        speaker,
        text: pick(rng, LINES).to_string(),
        at: Utc::now().to_rfc3339(),
    }
}

pub fn invite_target<R: Rng>(rng: &mut R) -> InviteTarget {
    let (_, handle) = *pick(rng, NAMES);
    InviteTarget {
        handle: handle.to_string(),
        reason: pick(rng, REASONS).to_string(),
        followers: rng.gen_range(100..50_000),
    }
}
