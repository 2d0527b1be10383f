//! Candidate builders for tests.

use mediamatch_core::parser::MediaKind;
use mediamatch_core::provider::ProviderCandidate;

pub fn movie_candidate(id: &str, title: &str, year: Option<i32>) -> ProviderCandidate {
    ProviderCandidate {
        external_id: id.to_string(),
        title: title.to_string(),
        original_title: None,
        year,
        kind: MediaKind::Movie,
        runtime_minutes: None,
        overview: None,
        popularity: None,
    }
}

pub fn episode_candidate(id: &str, title: &str, year: Option<i32>) -> ProviderCandidate {
    ProviderCandidate {
        kind: MediaKind::Episode,
        ..movie_candidate(id, title, year)
    }
}
