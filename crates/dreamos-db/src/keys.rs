//! Storage key layout.
//!
//! | Key                   | Shape                          |
//! |-----------------------|--------------------------------|
//! | `cache:bookings`      | array of Booking               |
//! | `cache:k3`            | array of K3Report              |
//! | `cache:inventory`     | array of InventoryItem         |
//! | `sync:queue`          | array of QueuedMutation        |
//! | `sync:forced-offline` | boolean                        |
//! | `tenant:profile`      | TenantConfig                   |
//! | `user:booking-ids`    | array of booking ids           |
//!
//! Collection cache keys come from [`Collection::cache_key`] so the two
//! can't drift apart.

use dreamos_core::Collection;

pub const CACHE_BOOKINGS: &str = Collection::Bookings.cache_key();
pub const CACHE_K3: &str = Collection::K3Reports.cache_key();
pub const CACHE_INVENTORY: &str = Collection::Inventory.cache_key();

pub const SYNC_QUEUE: &str = "sync:queue";
pub const FORCED_OFFLINE: &str = "sync:forced-offline";
pub const TENANT_PROFILE: &str = "tenant:profile";

/// Bookings submitted from this device.
pub const OWN_BOOKINGS: &str = "user:booking-ids";

/// Every key this crate writes.
pub const ALL: [&str; 7] = [
    CACHE_BOOKINGS,
    CACHE_K3,
    CACHE_INVENTORY,
    SYNC_QUEUE,
    FORCED_OFFLINE,
    TENANT_PROFILE,
    OWN_BOOKINGS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(CACHE_BOOKINGS, "cache:bookings");
        assert_eq!(CACHE_K3, "cache:k3");
        assert_eq!(CACHE_INVENTORY, "cache:inventory");
        let unique: std::collections::HashSet<_> = ALL.iter().collect();
        assert_eq!(unique.len(), ALL.len());
    }
}
