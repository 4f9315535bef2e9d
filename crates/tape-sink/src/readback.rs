//! End-of-session readback of everything stored in the container.

use serde_json::Value;
use tracing::{info, warn};

use crate::ItemStore;
use crate::cosmos::CosmosError;

/// Read every item, log the total and each item's `id`, and return the ids
/// in the order the server produced them.
///
/// `page_size` only bounds how many items each round-trip carries; the
/// whole feed is always read.
pub async fn read_items<S>(store: &S, page_size: u32) -> Result<Vec<String>, CosmosError>
where
    S: ItemStore + ?Sized,
{
    info!("[readback] reading all items from '{}'", store.id());
    let items = store.read_all_items(page_size.max(1)).await?;
    info!("Found {} items", items.len());

    let mut ids = Vec::with_capacity(items.len());
    for item in &items {
        match item.get("id").and_then(Value::as_str) {
            Some(id) => {
                info!("Item Id: {id}");
                ids.push(id.to_string());
            }
            None => warn!("[readback] item without an id: {item}"),
        }
    }
    Ok(ids)
}
