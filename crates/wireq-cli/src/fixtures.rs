//! Synthetic wire articles for seeding a local queue.

use chrono::{DateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Value, json};

/// `n` minimal articles. Consecutive articles share a urn in runs of one to
/// six versions, with `version_created` increasing inside a run.
pub fn generate_articles<R: Rng>(n: usize, now: DateTime<Utc>, rng: &mut R) -> Vec<Value> {
    let epoch = Utc
        .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let mut articles = Vec::with_capacity(n);

    while articles.len() < n {
        let versions = rng.gen_range(1..=6);
        let urn = format!(
            "urn:newsml:dpa.com:{}:{}-{}-{}",
            digits(rng, 8),
            digits(rng, 6),
            digits(rng, 2),
            digits(rng, 6)
        );

        let mut floor = epoch;
        for version in 1..=versions {
            if articles.len() == n {
                break;
            }
            let created = between(rng, floor, now);
            floor = created;
            let updated = between(rng, created, now);

            articles.push(json!({
                "urn": urn,
                "entry_id": alphanumeric(rng, 41),
                "version": version,
                "version_created": created.to_rfc3339_opts(SecondsFormat::Secs, true),
                "updated": updated.to_rfc3339_opts(SecondsFormat::Secs, true),
            }));
        }
    }
    articles
}

fn digits<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn alphanumeric<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn between<R: Rng>(rng: &mut R, lo: DateTime<Utc>, hi: DateTime<Utc>) -> DateTime<Utc> {
    let span = (hi - lo).num_seconds().max(0);
    lo + TimeDelta::seconds(rng.gen_range(0..=span))
}
