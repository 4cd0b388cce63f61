//! Line-oriented client session over a replicated store.

use crate::Envelope;
use crate::InProcessReplicator;
use crate::KvCommand;
use crate::ReplicatedStore;
use crate::Replicator;

pub const MALFORMED_LINE_REPLY: &str = "ERR expected `<verb> <key> [value]`";

/// Runs one input line and renders the reply printed for it.
///
/// Every line gets a reply, blank ones included: `OK` for an applied write,
/// the value or `(nil)` for a read, otherwise the error text.
pub async fn execute_line<S>(
    store: &S,
    replicator: &InProcessReplicator,
    line: &str,
) -> String
where
    S: ReplicatedStore<Command = KvCommand>,
{
    let Some(command) = KvCommand::parse_line(line) else {
        return MALFORMED_LINE_REPLY.to_string();
    };

    // Reads are local and never enter the log.
    if command.verb.trim().eq_ignore_ascii_case("get") {
        return match store.get(&command.key).await {
            Ok(Some(value)) => String::from_utf8_lossy(&value).into_owned(),
            Ok(None) => "(nil)".to_string(),
            Err(e) => e.to_string(),
        };
    }

    let result = match command.to_bytes() {
        Ok(payload) => replicator.replicate(payload).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => "OK".to_string(),
        Err(e) => e.to_string(),
    }
}
