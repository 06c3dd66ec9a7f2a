use sha2::{Digest, Sha256};

use crate::tasks::record::TaskKind;

/// Deterministic identifier for a task, computed from its semantic inputs.
///
/// The digest covers `tag|pocket|param0|param1|...` in that exact order with
/// `|` as the separator; the backend stores the value opaquely and echoes it
/// back in task listings, so this recomputation is the only correlation
/// mechanism between local records and remote tasks.
///
/// Pure function: same inputs give the same hex string at submission time and
/// at poll time. Callers validate parameters before hashing.
pub fn fingerprint(kind: TaskKind, pocket: u32, params: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.tag().as_bytes());
    hasher.update(b"|");
    hasher.update(pocket.to_string().as_bytes());
    for param in params {
        hasher.update(b"|");
        hasher.update(param.as_bytes());
    }
    hex::encode(hasher.finalize())
}
