use rand::Rng;

/// Mint an opaque identifier: unix millis plus a random suffix.
///
/// Used for both conversation ids and session identifiers.
pub fn mint_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{}-{}", millis, suffix)
}
