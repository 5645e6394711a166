use sentinel_common::{Result, SentinelError, SignatureRecord};

/// Checks that `records` carry exactly the ids `first_expected, first_expected + 1, ...`.
///
/// A gap or duplicate means the append invariant was broken somewhere and the
/// shared state can no longer be trusted.
pub fn verify_sequence(records: &[SignatureRecord], first_expected: u64) -> Result<()> {
    let mut expected = first_expected;
    for record in records {
        if record.id != expected {
            let kind = if record.id < expected { "duplicate or out-of-order" } else { "gap" };
            return Err(SentinelError::Integrity(format!(
                "{} at ledger id {} (expected {})",
                kind, record.id, expected
            )));
        }
        expected += 1;
    }
    Ok(())
}
