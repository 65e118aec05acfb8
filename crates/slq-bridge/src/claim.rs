//! The claim composite: reserve one slot, enqueue its intent.

use anyhow::{Context, Result};
use uuid::Uuid;

use slq_schemas::IntakePayload;

use crate::stores::{IntakeQueue, SlotStore};

/// Atomically-ish claim a slot in `pool_id` for `user_id` and enqueue a
/// `queued` intent carrying the slot id as `resource_id`.
///
/// `None` means sold out — no queue write happens. The two steps are not
/// jointly transactional by design: if the enqueue fails after the claim
/// succeeded, the slot is left RESERVED with no matching message and the
/// reaper returns it to AVAILABLE after the orphan threshold. That bounded
/// transient loss of availability buys independence between the queue and
/// the slot store.
pub async fn claim_resource_and_queue(
    slots: &dyn SlotStore,
    queue: &dyn IntakeQueue,
    pool_id: &str,
    user_id: &str,
) -> Result<Option<Uuid>> {
    let Some(slot_id) = slots.claim_one(pool_id, user_id).await? else {
        return Ok(None);
    };

    let payload = IntakePayload::queued(pool_id, slot_id, user_id);
    queue
        .send(&payload.to_value())
        .await
        .with_context(|| format!("intent enqueue failed for slot {slot_id}"))?;

    Ok(Some(slot_id))
}
